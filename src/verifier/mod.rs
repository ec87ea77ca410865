//! Structural pre-verification
//!
//! The full bytecode verifier propagates register types along every control-flow path of a
//! method, merging them wherever paths join. Before that can even start, it needs a map of the
//! method's code: which addresses are instruction starts, which are inside `try` blocks, and which
//! are legal landing sites for jumps or exception handlers. That map is an [`InsnFlagsTable`],
//! with one entry per code unit.
//!
//! The map is built in two passes that must run in order:
//!
//!   1. [`compute_code_widths`] walks the instruction stream and records the width of every
//!      instruction, rejecting streams that don't decode cleanly from the first unit to the last
//!
//!   2. [`set_try_flags`] checks the exception table against those widths, then marks protected
//!      instructions and handler entry points
//!
//! [`pre_verify`] runs both. The remaining helpers are used opportunistically by the full
//! verifier: [`get_branch_target`] decodes jumps while discovering control flow, and
//! [`RegType::from_cat1_const`] narrows literal constants.
//!
//! All of this operates on untrusted input. Every failure is a [`Error`] returned immediately,
//! after being reported through the `log` facade (subject to the [`VerifyMode`] in the
//! [`Settings`]).

mod branch;
mod diagnostics;
mod errors;
mod insn_flags;
mod reg_type;
mod settings;
mod tries;
mod widths;

pub use branch::*;
pub use diagnostics::*;
pub use errors::*;
pub use insn_flags::*;
pub use reg_type::*;
pub use settings::*;
pub use tries::*;
pub use widths::*;

use crate::dex::{Method, WidthTable};

/// Annotations produced by the structural passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsnAnnotations {
    /// Per-address widths and flags
    pub insn_flags: InsnFlagsTable,

    /// Number of `new-instance` instructions in the method
    pub new_instance_count: usize,
}

/// Compute instruction widths and `try`/handler flags for a method
pub fn pre_verify(
    method: &Method,
    width_table: &WidthTable,
    settings: &Settings,
) -> Result<InsnAnnotations, Error> {
    let mut annotations = compute_code_widths(method, width_table, settings)?;
    set_try_flags(method, &mut annotations.insn_flags, settings)?;
    log::debug!(
        "{}: {} code units, {} try entries, {} new-instance",
        method,
        method.code.insns_size(),
        method.code.tries().len(),
        annotations.new_instance_count,
    );
    Ok(annotations)
}
