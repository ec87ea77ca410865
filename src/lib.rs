//! Structural pre-verification of register-based VM bytecode
//!
//! Before a method's instructions can be handed to the full data-flow verifier (or executed), we
//! need to know where every instruction starts, which addresses are protected by `try` blocks,
//! and which addresses are legal landing sites for exception handlers. The input is untrusted, so
//! everything here is checked defensively and rejected through [`verifier::Error`].
//!
//!   - [`dex`] models the method being verified: its code item, exception table, and the
//!     per-opcode width table
//!
//!   - [`verifier`] holds the passes themselves along with the per-address annotations they
//!     produce
//!
//! ```
//! use dexcheck::dex::{CatchHandler, CodeBuilder, Method, WidthTable};
//! use dexcheck::verifier::{pre_verify, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let code = CodeBuilder::new(vec![0x0000, 0x0000, 0x000e])
//!     .try_block(0, 2, vec![CatchHandler::catch_all(2)])
//!     .build()?;
//! let method = Method::new("LFoo;", "bar", "()V", code);
//!
//! let annotations = pre_verify(&method, &WidthTable::standard(), &Settings::default())?;
//! assert!(annotations.insn_flags.in_try(0));
//! assert!(annotations.insn_flags.is_branch_target(2));
//! # Ok(())
//! # }
//! ```

pub mod dex;
pub mod verifier;
