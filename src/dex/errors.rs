use std::fmt;

/// Malformed code item
///
/// These come up while decoding the binary layout of a method's code, before any verification
/// happens. Offsets are byte offsets into the data being decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeFormatError {
    /// Input ended in the middle of a structure
    UnexpectedEof,

    /// A LEB128 value is longer than 5 bytes or doesn't fit in 32 bits
    InvalidLeb128 { offset: usize },

    /// A catch handler claims an implausible number of typed handlers
    BadHandlerCount { offset: usize, size: i32 },

    /// A `try` entry's handler offset doesn't point at the start of any handler
    BadHandlerOffset { try_index: usize, handler_off: u16 },

    /// A catch handler must have at least one typed or catch-all handler
    EmptyHandler,

    /// A catch handler can have at most one catch-all handler
    DuplicateCatchAll,

    /// The encoded handler lists no longer fit in the 16-bit handler offsets
    HandlerListOverflow,

    /// Too many instructions or `try` entries to encode
    CodeOverflow,
}

impl fmt::Display for CodeFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeFormatError::UnexpectedEof => write!(f, "unexpected end of code item"),
            CodeFormatError::InvalidLeb128 { offset } => {
                write!(f, "invalid LEB128 value at offset {}", offset)
            }
            CodeFormatError::BadHandlerCount { offset, size } => {
                write!(f, "bad catch handler size {} at offset {}", size, offset)
            }
            CodeFormatError::BadHandlerOffset {
                try_index,
                handler_off,
            } => write!(
                f,
                "try entry {} has bad handler offset {}",
                try_index, handler_off
            ),
            CodeFormatError::EmptyHandler => write!(f, "catch handler without any handlers"),
            CodeFormatError::DuplicateCatchAll => {
                write!(f, "catch handler with more than one catch-all")
            }
            CodeFormatError::HandlerListOverflow => {
                write!(f, "catch handler list too large for 16-bit offsets")
            }
            CodeFormatError::CodeOverflow => write!(f, "code item too large to encode"),
        }
    }
}

impl std::error::Error for CodeFormatError {}

impl From<std::io::Error> for CodeFormatError {
    fn from(_: std::io::Error) -> CodeFormatError {
        // Decoding only ever reads from in-memory slices, where the only failure is running out
        CodeFormatError::UnexpectedEof
    }
}
