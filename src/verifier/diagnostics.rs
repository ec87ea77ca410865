use super::{Error, Settings};
use crate::dex::Method;
use std::fmt;

/// Report a verification failure
///
/// In lenient mode nothing is logged. Otherwise the message is logged as a warning, followed by
/// the identity of the rejected method (if there is one).
pub fn log_verify_failure(method: Option<&Method>, settings: &Settings, message: fmt::Arguments) {
    if !settings.log_failures() {
        return;
    }

    log::warn!("{}", message);
    if let Some(method) = method {
        log::warn!("VFY:  rejected {}", method);
    }
}

/// Report that a class referenced from a method could not be found
pub fn log_unable_to_resolve_class(
    missing_class_descriptor: &str,
    method: &Method,
    settings: &Settings,
) {
    if !settings.log_failures() {
        return;
    }

    log::error!(
        "Could not find class '{}', referenced from method {}.{}",
        descriptor_to_dot(missing_class_descriptor),
        descriptor_to_dot(&method.class_descriptor),
        method.name
    );
}

/// Turn a type descriptor into the dotted form used in Java source
///
/// `Ljava/lang/String;` becomes `java.lang.String`. Other descriptors (arrays, primitives, anything
/// not both starting with `L` and ending with `;`) only have their slashes replaced.
pub fn descriptor_to_dot(descriptor: &str) -> String {
    let class_name = descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(descriptor);
    class_name.replace('/', ".")
}

/// Log a failure against a method and hand it back for returning
pub(crate) fn reject(method: &Method, settings: &Settings, error: Error) -> Error {
    log_verify_failure(Some(method), settings, format_args!("{}", error));
    error
}
