use bitflags::bitflags;
use std::fmt;
use std::ops::Index;

bitflags! {
    /// Per-address annotation
    ///
    /// The low 16 bits hold the width of the instruction starting at the address (0 if no
    /// instruction starts there), the rest are flags.
    #[derive(Default)]
    pub struct InsnFlags: u32 {
        const WIDTH_MASK = 0x0000_ffff;
        const IN_TRY = 1 << 16;
        const BRANCH_TARGET = 1 << 17;
    }
}

impl InsnFlags {
    /// Width of the instruction starting here
    #[inline]
    pub fn width(self) -> usize {
        (self.bits() & InsnFlags::WIDTH_MASK.bits()) as usize
    }

    /// Does an instruction start here?
    #[inline]
    pub fn is_opcode(self) -> bool {
        self.width() != 0
    }

    fn with_width(self, width: u16) -> InsnFlags {
        InsnFlags::from_bits_truncate((self.bits() & !InsnFlags::WIDTH_MASK.bits()) | width as u32)
    }
}

/// Annotations for every address of one method's instruction stream
///
/// Addresses are dense, so this is a plain array indexed by address. Queries past the end of the
/// stream are answered as if the address held no instruction and no flags.
#[derive(Clone, PartialEq, Eq)]
pub struct InsnFlagsTable {
    flags: Vec<InsnFlags>,
}

impl InsnFlagsTable {
    /// Zeroed annotations for a stream of `insns_size` code units
    pub fn new(insns_size: usize) -> InsnFlagsTable {
        InsnFlagsTable {
            flags: vec![InsnFlags::empty(); insns_size],
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn get(&self, addr: usize) -> InsnFlags {
        self.flags.get(addr).copied().unwrap_or_default()
    }

    pub fn width(&self, addr: usize) -> usize {
        self.get(addr).width()
    }

    pub fn is_opcode(&self, addr: usize) -> bool {
        self.get(addr).is_opcode()
    }

    pub fn in_try(&self, addr: usize) -> bool {
        self.get(addr).contains(InsnFlags::IN_TRY)
    }

    pub fn is_branch_target(&self, addr: usize) -> bool {
        self.get(addr).contains(InsnFlags::BRANCH_TARGET)
    }

    /// Record the width of the instruction at `addr`
    ///
    /// Panics if `addr` is out of bounds.
    pub fn set_width(&mut self, addr: usize, width: u16) {
        self.flags[addr] = self.flags[addr].with_width(width);
    }

    /// Panics if `addr` is out of bounds.
    pub fn set_in_try(&mut self, addr: usize, in_try: bool) {
        self.flags[addr].set(InsnFlags::IN_TRY, in_try);
    }

    /// Panics if `addr` is out of bounds.
    pub fn set_branch_target(&mut self, addr: usize, is_target: bool) {
        self.flags[addr].set(InsnFlags::BRANCH_TARGET, is_target);
    }

    /// Instruction starts, in address order
    pub fn opcodes(&self) -> impl Iterator<Item = (usize, InsnFlags)> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, flags)| flags.is_opcode())
            .map(|(addr, flags)| (addr, *flags))
    }
}

impl Index<usize> for InsnFlagsTable {
    type Output = InsnFlags;

    fn index(&self, addr: usize) -> &InsnFlags {
        &self.flags[addr]
    }
}

impl fmt::Debug for InsnFlagsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (addr, flags) in self.opcodes() {
            let mut marks = String::new();
            if flags.contains(InsnFlags::IN_TRY) {
                marks.push('T');
            }
            if flags.contains(InsnFlags::BRANCH_TARGET) {
                marks.push('B');
            }
            list.entry(&format_args!("#{} = {}{}", addr, flags.width(), marks));
        }
        list.finish()
    }
}
