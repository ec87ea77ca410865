use crate::dex::opcode::*;
use crate::dex::Code;

/// Decoded control transfer
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BranchTarget {
    /// Offset in code units, relative to the address of the branch instruction
    pub offset: i32,

    /// Whether execution may also fall through to the next instruction
    pub conditional: bool,
}

impl BranchTarget {
    /// Absolute target address when branching from `addr`
    ///
    /// This is `None` if the target would be negative or overflow - it is _not_ checked against
    /// the length of the code or instruction boundaries.
    pub fn target_address(&self, addr: usize) -> Option<usize> {
        if self.offset >= 0 {
            addr.checked_add(self.offset as usize)
        } else {
            addr.checked_sub(self.offset.unsigned_abs() as usize)
        }
    }
}

/// Extract the relative offset of the branch instruction at `addr`
///
/// Only `goto` (in all three widths) and the `if-*` comparisons count as branches. Anything else
/// is `None`, as is an address past the end of the code or a branch whose offset units are cut
/// off. Whether the target is a valid instruction is not checked.
pub fn get_branch_target(code: &Code, addr: usize) -> Option<BranchTarget> {
    let insns = code.insns().get(addr..)?;
    let unit = *insns.first()?;
    let operand = |idx: usize| insns.get(idx).copied();

    match opcode_of(unit) {
        GOTO => Some(BranchTarget {
            offset: ((unit as i16) >> 8) as i32,
            conditional: false,
        }),
        GOTO_16 => Some(BranchTarget {
            offset: operand(1)? as i16 as i32,
            conditional: false,
        }),
        GOTO_32 => {
            let low = operand(1)? as u32;
            let high = operand(2)? as u32;
            Some(BranchTarget {
                offset: (low | (high << 16)) as i32,
                conditional: false,
            })
        }
        IF_EQ | IF_NE | IF_LT | IF_GE | IF_GT | IF_LE | IF_EQZ | IF_NEZ | IF_LTZ | IF_GEZ
        | IF_GTZ | IF_LEZ => Some(BranchTarget {
            offset: operand(1)? as i16 as i32,
            conditional: true,
        }),
        _ => None,
    }
}
