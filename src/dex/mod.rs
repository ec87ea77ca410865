//! Method code, as it is laid out in a `.dex` file
//!
//! Only the parts needed for structural verification are modelled: the instruction stream (a
//! sequence of 16-bit code units), the `try` table, and the encoded catch handler lists. Nothing
//! here resolves types or members - type indices in catch handlers stay as raw indices.

mod code;
mod errors;
mod leb128;
mod method;
pub mod opcode;

pub use code::*;
pub use errors::*;
pub use method::*;
pub use opcode::WidthTable;
