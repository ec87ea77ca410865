use super::Code;
use std::fmt;

/// Method being verified
///
/// Besides the code, only the method's identity is needed - it shows up in diagnostics so that a
/// rejection can be traced back to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// Descriptor of the declaring class (eg. `Ljava/lang/Object;`)
    pub class_descriptor: String,

    /// Method name (eg. `hashCode`)
    pub name: String,

    /// Parameter and return type descriptor (eg. `(II)V`)
    pub prototype: String,

    /// Method body
    pub code: Code,
}

impl Method {
    pub fn new(
        class_descriptor: impl Into<String>,
        name: impl Into<String>,
        prototype: impl Into<String>,
        code: Code,
    ) -> Method {
        Method {
            class_descriptor: class_descriptor.into(),
            name: name.into(),
            prototype: prototype.into(),
            code,
        }
    }
}

/// Renders as `Lpkg/Class;.name (Params)Ret`
impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {}", self.class_descriptor, self.name, self.prototype)
    }
}
