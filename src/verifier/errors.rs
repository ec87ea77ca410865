use std::fmt;

/// Structural verification failure
///
/// Addresses are in code units from the start of the method's instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The unit at this address doesn't decode as an instruction or payload
    InvalidInstruction { addr: usize, unit: u16 },

    /// The instruction at this address is wider than the configured ceiling
    InsaneWidth { addr: usize, width: usize },

    /// The last instruction runs past the end of the stream
    CodeEndMismatch { end: usize, insns_size: usize },

    /// A `try` entry's range is empty, inverted, or out of bounds
    BadTryRange {
        start: u64,
        end: u64,
        insns_size: usize,
    },

    /// A `try` entry starts in the middle of an instruction
    TryStartsMidInstruction { start: usize },

    /// An exception handler doesn't start on an instruction
    BadHandlerAddress { addr: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInstruction { addr, unit } => {
                write!(f, "VFY: invalid instruction (0x{:04x}) at {}", unit, addr)
            }
            Error::InsaneWidth { addr, width } => {
                write!(f, "VFY: insane width {} at {}", width, addr)
            }
            Error::CodeEndMismatch { end, insns_size } => write!(
                f,
                "VFY: code did not end where expected ({} vs. {})",
                end, insns_size
            ),
            Error::BadTryRange {
                start,
                end,
                insns_size,
            } => write!(
                f,
                "VFY: bad exception entry: startAddr={} endAddr={} (size={})",
                start, end, insns_size
            ),
            Error::TryStartsMidInstruction { start } => {
                write!(f, "VFY: 'try' block starts inside an instruction ({})", start)
            }
            Error::BadHandlerAddress { addr } => {
                write!(f, "VFY: exception handler starts at bad address ({})", addr)
            }
        }
    }
}

impl std::error::Error for Error {}
