//! Opcodes and instruction widths
//!
//! The low byte of the first code unit of an instruction is its opcode. Most opcodes have a fixed
//! width, but `nop` doubles as the header of the variable-sized payloads (switch tables and array
//! data) that get embedded in the instruction stream.

pub const NOP: u8 = 0x00;
pub const NEW_INSTANCE: u8 = 0x22;
pub const GOTO: u8 = 0x28;
pub const GOTO_16: u8 = 0x29;
pub const GOTO_32: u8 = 0x2a;
pub const IF_EQ: u8 = 0x32;
pub const IF_NE: u8 = 0x33;
pub const IF_LT: u8 = 0x34;
pub const IF_GE: u8 = 0x35;
pub const IF_GT: u8 = 0x36;
pub const IF_LE: u8 = 0x37;
pub const IF_EQZ: u8 = 0x38;
pub const IF_NEZ: u8 = 0x39;
pub const IF_LTZ: u8 = 0x3a;
pub const IF_GEZ: u8 = 0x3b;
pub const IF_GTZ: u8 = 0x3c;
pub const IF_LEZ: u8 = 0x3d;

/// First code unit of a `packed-switch` payload
pub const PACKED_SWITCH_SIGNATURE: u16 = 0x0100;

/// First code unit of a `sparse-switch` payload
pub const SPARSE_SWITCH_SIGNATURE: u16 = 0x0200;

/// First code unit of a `fill-array-data` payload
pub const ARRAY_DATA_SIGNATURE: u16 = 0x0300;

/// Opcode of an instruction, given its first code unit
#[inline]
pub fn opcode_of(unit: u16) -> u8 {
    (unit & 0xff) as u8
}

/// Widths (in code units) of the documented instruction set, indexed by opcode
///
/// Unused opcodes have width 0.
#[rustfmt::skip]
const STANDARD_WIDTHS: [u8; 256] = [
    // 0x00: nop, move*, move-result*, move-exception, return-void, return
    1, 1, 2, 3, 1, 2, 3, 1, 2, 3, 1, 1, 1, 1, 1, 1,
    // 0x10: return-wide, return-object, const*, monitor-*, check-cast
    1, 1, 1, 2, 3, 2, 2, 3, 5, 2, 2, 3, 2, 1, 1, 2,
    // 0x20: instance-of .. goto*, packed/sparse-switch, cmpl-float, cmpg-float, cmpl-double
    2, 1, 2, 2, 3, 3, 3, 1, 1, 2, 3, 3, 3, 2, 2, 2,
    // 0x30: cmpg-double, cmp-long, if-*, if-*z
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 0, 0,
    // 0x40: aget*
    0, 0, 0, 0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0x50: aput*, iget*, iput*
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0x60: sget*, sput*, invoke-virtual, invoke-super
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 3,
    // 0x70: invoke-*, invoke-*/range, unary ops
    3, 3, 3, 0, 3, 3, 3, 3, 3, 0, 0, 1, 1, 1, 1, 1,
    // 0x80: conversions
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    // 0x90: binary ops
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0xa0
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0xb0: binary ops, 2addr
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    // 0xc0
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    // 0xd0: binary ops, lit16 and lit8
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    // 0xe0
    2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    // 0xf0: invoke-polymorphic*, invoke-custom*, const-method-handle, const-method-type
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 4, 3, 3, 2, 2,
];

/// Lookup table from opcode to the canonical width of that instruction
///
/// A width of 0 marks an opcode which is not valid in the instruction set being verified. The
/// table is a plain value so that callers verifying a different instruction set (eg. one with
/// optimized opcodes filled in) can build their own.
#[derive(Clone, PartialEq, Eq)]
pub struct WidthTable {
    widths: [u8; 256],
}

impl WidthTable {
    /// Widths for the documented instruction set
    pub fn standard() -> WidthTable {
        WidthTable {
            widths: STANDARD_WIDTHS,
        }
    }

    /// Table with custom widths
    pub fn from_widths(widths: [u8; 256]) -> WidthTable {
        WidthTable { widths }
    }

    /// Canonical width of an opcode (0 if the opcode is invalid)
    #[inline]
    pub fn width(&self, opcode: u8) -> usize {
        self.widths[opcode as usize] as usize
    }

    /// Override the width of one opcode
    pub fn set_width(&mut self, opcode: u8, width: u8) {
        self.widths[opcode as usize] = width;
    }

    /// Width of the instruction or payload at the start of `insns`
    ///
    /// Returns 0 if the first unit isn't a valid instruction, or if it is a payload whose header
    /// is cut off by the end of `insns`. Payload sizes come straight from untrusted data, so the
    /// computed width may be enormous; it saturates at `usize::MAX` instead of wrapping.
    pub fn instr_or_table_width(&self, insns: &[u16]) -> usize {
        let unit = match insns.first() {
            Some(unit) => *unit,
            None => return 0,
        };
        if opcode_of(unit) != NOP {
            return self.width(opcode_of(unit));
        }

        let header = |idx: usize| insns.get(idx).map(|u| *u as u64);
        let width: Option<u64> = match unit {
            PACKED_SWITCH_SIGNATURE => header(1).map(|size| 4 + size * 2),
            SPARSE_SWITCH_SIGNATURE => header(1).map(|size| 2 + size * 4),
            ARRAY_DATA_SIGNATURE => header(1).and_then(|element_width| {
                let length = header(2)? | (header(3)? << 16);
                Some(4 + (element_width * length + 1) / 2)
            }),
            _ => Some(self.width(NOP) as u64),
        };

        match width {
            None => 0,
            Some(width) => usize::try_from(width).unwrap_or(usize::MAX),
        }
    }
}

impl Default for WidthTable {
    fn default() -> Self {
        WidthTable::standard()
    }
}

impl std::fmt::Debug for WidthTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let valid = self.widths.iter().filter(|w| **w != 0).count();
        f.debug_struct("WidthTable")
            .field("valid_opcodes", &valid)
            .finish()
    }
}
