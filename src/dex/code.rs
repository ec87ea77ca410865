use super::leb128::{read_sleb128, read_uleb128, write_sleb128, write_uleb128};
use super::CodeFormatError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor};

/// Largest number of typed handlers accepted in a single catch handler
const MAX_TYPED_HANDLERS: i32 = 65536;

/// Method code: instructions along with the exception table protecting them
///
/// The catch handlers are kept in their packed binary encoding and decoded lazily through
/// [`CatchHandlers`]. The encoding is fully checked when the `Code` is constructed, so iterating
/// handlers afterwards never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub debug_info_off: u32,

    /// Instruction stream, in 16-bit code units
    insns: Vec<u16>,

    /// Protected ranges, in the order they appear in the code item
    tries: Vec<TryItem>,

    /// Encoded catch handler list (empty when there are no `try` entries)
    handlers: Vec<u8>,
}

/// Entry in the exception table
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TryItem {
    /// First address covered (inclusive)
    pub start_addr: u32,

    /// Number of code units covered
    pub insn_count: u16,

    /// Byte offset of the handler for this range, relative to the start of the handler list
    pub handler_off: u16,
}

impl TryItem {
    /// Address just past the covered range
    pub fn end_addr(&self) -> u64 {
        self.start_addr as u64 + self.insn_count as u64
    }
}

/// What sort of exception a handler catches
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CatchType {
    /// Exceptions assignable to the type at this index in the type table
    Type(u32),

    /// Anything (eg. `finally` blocks)
    All,
}

/// Where control transfers when a matching exception is thrown
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CatchHandler {
    pub catch_type: CatchType,
    pub address: u32,
}

impl CatchHandler {
    pub fn typed(type_idx: u32, address: u32) -> CatchHandler {
        CatchHandler {
            catch_type: CatchType::Type(type_idx),
            address,
        }
    }

    pub fn catch_all(address: u32) -> CatchHandler {
        CatchHandler {
            catch_type: CatchType::All,
            address,
        }
    }
}

impl Code {
    /// Instruction stream
    pub fn insns(&self) -> &[u16] {
        &self.insns
    }

    /// Length of the instruction stream, in code units
    pub fn insns_size(&self) -> usize {
        self.insns.len()
    }

    /// Exception table entries
    pub fn tries(&self) -> &[TryItem] {
        &self.tries
    }

    /// Number of catch handlers in the encoded handler list
    pub fn handlers_size(&self) -> usize {
        let mut offset = 0;
        read_uleb128(&self.handlers, &mut offset).unwrap_or(0) as usize
    }

    /// Offset of the first catch handler in the encoded handler list
    pub fn first_handler_offset(&self) -> usize {
        let mut offset = 0;
        match read_uleb128(&self.handlers, &mut offset) {
            Ok(_) => offset,
            Err(_) => self.handlers.len(),
        }
    }

    /// Handlers starting at a byte offset into the encoded handler list
    pub fn catch_handlers_at(&self, offset: usize) -> CatchHandlers<'_> {
        CatchHandlers::new(&self.handlers, offset)
    }

    /// Handlers for one `try` entry
    pub fn handlers_for(&self, try_item: &TryItem) -> CatchHandlers<'_> {
        self.catch_handlers_at(try_item.handler_off as usize)
    }

    /// Every catch handler in the encoded handler list, in encoding order
    ///
    /// This includes handlers which no `try` entry refers to.
    pub fn catch_handler_lists(&self) -> CatchHandlerLists<'_> {
        CatchHandlerLists {
            list: &self.handlers,
            offset: self.first_handler_offset(),
            remaining: self.handlers_size(),
        }
    }

    /// Decode a code item
    ///
    /// Anything after the end of the last catch handler is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Code, CodeFormatError> {
        let mut reader = Cursor::new(bytes);
        let registers_size = reader.read_u16::<LittleEndian>()?;
        let ins_size = reader.read_u16::<LittleEndian>()?;
        let outs_size = reader.read_u16::<LittleEndian>()?;
        let tries_size = reader.read_u16::<LittleEndian>()?;
        let debug_info_off = reader.read_u32::<LittleEndian>()?;
        let insns_size = reader.read_u32::<LittleEndian>()? as usize;

        // Check the length up front so a bogus size can't trigger a huge allocation
        let insns_bytes = insns_size
            .checked_mul(2)
            .ok_or(CodeFormatError::UnexpectedEof)?;
        if bytes.len() - (reader.position() as usize) < insns_bytes {
            return Err(CodeFormatError::UnexpectedEof);
        }
        let mut insns = vec![0u16; insns_size];
        reader.read_u16_into::<LittleEndian>(&mut insns)?;

        if tries_size == 0 {
            return Ok(Code {
                registers_size,
                ins_size,
                outs_size,
                debug_info_off,
                insns,
                tries: vec![],
                handlers: vec![],
            });
        }

        // `tries` are 4-byte aligned
        if insns_size % 2 == 1 {
            reader.read_u16::<LittleEndian>()?;
        }

        let mut tries = Vec::with_capacity(tries_size as usize);
        for _ in 0..tries_size {
            tries.push(TryItem {
                start_addr: reader.read_u32::<LittleEndian>()?,
                insn_count: reader.read_u16::<LittleEndian>()?,
                handler_off: reader.read_u16::<LittleEndian>()?,
            });
        }

        let list_start = reader.position() as usize;
        let list = &bytes[list_start..];
        let (handler_offsets, list_len) = scan_handler_list(list)?;

        for (try_index, try_item) in tries.iter().enumerate() {
            let handler_off = try_item.handler_off;
            if handler_offsets
                .binary_search(&(handler_off as usize))
                .is_err()
            {
                return Err(CodeFormatError::BadHandlerOffset {
                    try_index,
                    handler_off,
                });
            }
        }

        Ok(Code {
            registers_size,
            ins_size,
            outs_size,
            debug_info_off,
            insns,
            tries,
            handlers: list[..list_len].to_vec(),
        })
    }

    /// Encode the code item (the inverse of [`Code::parse`])
    pub fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> io::Result<()> {
        let overflow =
            || io::Error::new(io::ErrorKind::InvalidInput, CodeFormatError::CodeOverflow);
        let tries_size = u16::try_from(self.tries.len()).map_err(|_| overflow())?;
        let insns_size = u32::try_from(self.insns.len()).map_err(|_| overflow())?;

        writer.write_u16::<LittleEndian>(self.registers_size)?;
        writer.write_u16::<LittleEndian>(self.ins_size)?;
        writer.write_u16::<LittleEndian>(self.outs_size)?;
        writer.write_u16::<LittleEndian>(tries_size)?;
        writer.write_u32::<LittleEndian>(self.debug_info_off)?;
        writer.write_u32::<LittleEndian>(insns_size)?;
        for unit in &self.insns {
            writer.write_u16::<LittleEndian>(*unit)?;
        }

        if self.tries.is_empty() {
            return Ok(());
        }
        if self.insns.len() % 2 == 1 {
            writer.write_u16::<LittleEndian>(0)?;
        }
        for try_item in &self.tries {
            writer.write_u32::<LittleEndian>(try_item.start_addr)?;
            writer.write_u16::<LittleEndian>(try_item.insn_count)?;
            writer.write_u16::<LittleEndian>(try_item.handler_off)?;
        }
        writer.write_all(&self.handlers)
    }
}

/// Walk an encoded catch handler list, returning the offset of every handler (sorted) along with
/// the total length of the list in bytes
fn scan_handler_list(list: &[u8]) -> Result<(Vec<usize>, usize), CodeFormatError> {
    let mut offset = 0;
    let handlers_size = read_uleb128(list, &mut offset)?;

    // Every handler takes at least 2 bytes, which bounds how much we can need to allocate
    if handlers_size as usize > list.len() / 2 {
        return Err(CodeFormatError::UnexpectedEof);
    }

    let mut handler_offsets = Vec::with_capacity(handlers_size as usize);
    for _ in 0..handlers_size {
        handler_offsets.push(offset);

        let size_offset = offset;
        let size = read_sleb128(list, &mut offset)?;
        if !(-MAX_TYPED_HANDLERS..=MAX_TYPED_HANDLERS).contains(&size) {
            return Err(CodeFormatError::BadHandlerCount {
                offset: size_offset,
                size,
            });
        }
        for _ in 0..size.unsigned_abs() {
            read_uleb128(list, &mut offset)?;
            read_uleb128(list, &mut offset)?;
        }
        if size <= 0 {
            read_uleb128(list, &mut offset)?;
        }
    }

    Ok((handler_offsets, offset))
}

/// Lazy iterator over the handlers of one catch handler
///
/// Typed handlers come first, in encoding order, followed by the catch-all handler (if there is
/// one). Cloning the iterator gives an independent cursor, so the same handler can be walked as
/// many times as needed.
#[derive(Debug, Clone)]
pub struct CatchHandlers<'a> {
    list: &'a [u8],
    offset: usize,
    typed_remaining: u32,
    catch_all: bool,
}

impl<'a> CatchHandlers<'a> {
    fn new(list: &'a [u8], offset: usize) -> CatchHandlers<'a> {
        let mut cursor = offset;
        match read_sleb128(list, &mut cursor) {
            Ok(size) => CatchHandlers {
                list,
                offset: cursor,
                typed_remaining: size.unsigned_abs(),
                catch_all: size <= 0,
            },
            Err(_) => CatchHandlers {
                list,
                offset: list.len(),
                typed_remaining: 0,
                catch_all: false,
            },
        }
    }

    /// Offset just past the end of this catch handler
    pub fn end_offset(mut self) -> usize {
        while self.next().is_some() {}
        self.offset
    }

    fn stop(&mut self) -> Option<CatchHandler> {
        self.typed_remaining = 0;
        self.catch_all = false;
        self.offset = self.list.len();
        None
    }
}

impl<'a> Iterator for CatchHandlers<'a> {
    type Item = CatchHandler;

    fn next(&mut self) -> Option<CatchHandler> {
        if self.typed_remaining > 0 {
            self.typed_remaining -= 1;
            let type_idx = match read_uleb128(self.list, &mut self.offset) {
                Ok(type_idx) => type_idx,
                Err(_) => return self.stop(),
            };
            return match read_uleb128(self.list, &mut self.offset) {
                Ok(address) => Some(CatchHandler::typed(type_idx, address)),
                Err(_) => self.stop(),
            };
        }

        if self.catch_all {
            self.catch_all = false;
            return match read_uleb128(self.list, &mut self.offset) {
                Ok(address) => Some(CatchHandler::catch_all(address)),
                Err(_) => self.stop(),
            };
        }

        None
    }
}

/// Iterator over all catch handlers of a method, in encoding order
#[derive(Debug, Clone)]
pub struct CatchHandlerLists<'a> {
    list: &'a [u8],
    offset: usize,
    remaining: usize,
}

impl<'a> Iterator for CatchHandlerLists<'a> {
    type Item = CatchHandlers<'a>;

    fn next(&mut self) -> Option<CatchHandlers<'a>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let handlers = CatchHandlers::new(self.list, self.offset);
        self.offset = handlers.clone().end_offset();
        Some(handlers)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Assemble a [`Code`] without having to encode the handler lists by hand
///
/// Each `try` block gets its own catch handler, in the order the blocks are added.
#[derive(Debug, Clone, Default)]
pub struct CodeBuilder {
    registers_size: u16,
    ins_size: u16,
    outs_size: u16,
    insns: Vec<u16>,
    try_blocks: Vec<(u32, u16, Vec<CatchHandler>)>,
}

impl CodeBuilder {
    pub fn new(insns: Vec<u16>) -> CodeBuilder {
        CodeBuilder {
            insns,
            ..CodeBuilder::default()
        }
    }

    /// Set the register counts (total registers, incoming arguments, outgoing arguments)
    pub fn registers(mut self, registers_size: u16, ins_size: u16, outs_size: u16) -> Self {
        self.registers_size = registers_size;
        self.ins_size = ins_size;
        self.outs_size = outs_size;
        self
    }

    /// Protect `insn_count` code units starting at `start_addr`
    ///
    /// At most one catch-all handler is allowed, and it is always encoded last.
    pub fn try_block(
        mut self,
        start_addr: u32,
        insn_count: u16,
        handlers: Vec<CatchHandler>,
    ) -> Self {
        self.try_blocks.push((start_addr, insn_count, handlers));
        self
    }

    pub fn build(self) -> Result<Code, CodeFormatError> {
        if u32::try_from(self.insns.len()).is_err() || self.try_blocks.len() > u16::MAX as usize
        {
            return Err(CodeFormatError::CodeOverflow);
        }

        let mut handlers = vec![];
        let mut tries = vec![];
        if !self.try_blocks.is_empty() {
            write_uleb128(&mut handlers, self.try_blocks.len() as u32);
        }
        for (start_addr, insn_count, block_handlers) in &self.try_blocks {
            let handler_off =
                u16::try_from(handlers.len()).map_err(|_| CodeFormatError::HandlerListOverflow)?;
            encode_catch_handler(&mut handlers, block_handlers)?;
            tries.push(TryItem {
                start_addr: *start_addr,
                insn_count: *insn_count,
                handler_off,
            });
        }

        Ok(Code {
            registers_size: self.registers_size,
            ins_size: self.ins_size,
            outs_size: self.outs_size,
            debug_info_off: 0,
            insns: self.insns,
            tries,
            handlers,
        })
    }
}

fn encode_catch_handler(
    out: &mut Vec<u8>,
    handlers: &[CatchHandler],
) -> Result<(), CodeFormatError> {
    let typed: Vec<(u32, u32)> = handlers
        .iter()
        .filter_map(|handler| match handler.catch_type {
            CatchType::Type(type_idx) => Some((type_idx, handler.address)),
            CatchType::All => None,
        })
        .collect();
    let mut catch_alls = handlers
        .iter()
        .filter(|handler| handler.catch_type == CatchType::All);
    let catch_all = catch_alls.next();

    if typed.is_empty() && catch_all.is_none() {
        return Err(CodeFormatError::EmptyHandler);
    }
    if catch_alls.next().is_some() {
        return Err(CodeFormatError::DuplicateCatchAll);
    }
    let typed_count = match i32::try_from(typed.len()) {
        Ok(count) if count <= MAX_TYPED_HANDLERS => count,
        _ => {
            return Err(CodeFormatError::BadHandlerCount {
                offset: out.len(),
                size: i32::MAX,
            })
        }
    };

    write_sleb128(out, if catch_all.is_some() { -typed_count } else { typed_count });
    for (type_idx, address) in typed {
        write_uleb128(out, type_idx);
        write_uleb128(out, address);
    }
    if let Some(catch_all) = catch_all {
        write_uleb128(out, catch_all.address);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_code() -> Code {
        CodeBuilder::new(vec![0x0000, 0x0000, 0x000e])
            .registers(2, 1, 0)
            .try_block(0, 2, vec![CatchHandler::typed(7, 2)])
            .try_block(
                1,
                1,
                vec![CatchHandler::catch_all(2), CatchHandler::typed(3, 1)],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn builder_encodes_handler_lists() {
        let code = sample_code();
        assert_eq!(code.insns_size(), 3);
        assert_eq!(code.handlers_size(), 2);
        assert_eq!(code.first_handler_offset(), 1);

        let tries = code.tries();
        assert_eq!(tries.len(), 2);
        assert_eq!(
            code.handlers_for(&tries[0]).collect::<Vec<_>>(),
            vec![CatchHandler::typed(7, 2)]
        );

        // Catch-all is moved to the end
        assert_eq!(
            code.handlers_for(&tries[1]).collect::<Vec<_>>(),
            vec![CatchHandler::typed(3, 1), CatchHandler::catch_all(2)]
        );
    }

    #[test]
    fn handler_lists_in_order() {
        let code = sample_code();
        let lists: Vec<Vec<CatchHandler>> = code
            .catch_handler_lists()
            .map(|handlers| handlers.collect())
            .collect();
        assert_eq!(
            lists,
            vec![
                vec![CatchHandler::typed(7, 2)],
                vec![CatchHandler::typed(3, 1), CatchHandler::catch_all(2)],
            ]
        );
    }

    #[test]
    fn handlers_are_restartable() {
        let code = sample_code();
        let handlers = code.handlers_for(&code.tries()[1]);
        let first_pass: Vec<_> = handlers.clone().collect();
        let second_pass: Vec<_> = handlers.collect();
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn parse_what_was_serialized() {
        let code = sample_code();
        let mut bytes = vec![];
        code.serialize(&mut bytes).unwrap();

        // header + 3 units + padding + 2 tries
        assert_eq!(&bytes[16..22], &[0x00, 0x00, 0x00, 0x00, 0x0e, 0x00]);
        assert_eq!(&bytes[22..24], &[0x00, 0x00]);

        // Trailing bytes are not part of the code item
        bytes.extend_from_slice(&[0xde, 0xad]);
        assert_eq!(Code::parse(&bytes), Ok(code));
    }

    #[test]
    fn parse_without_tries() {
        let bytes = [
            1, 0, 1, 0, 0, 0, 0, 0, // registers, ins, outs, tries
            0, 0, 0, 0, // debug info
            2, 0, 0, 0, // insns_size
            0x0e, 0x00, 0x00, 0x00,
        ];
        let code = Code::parse(&bytes).unwrap();
        assert_eq!(code.insns(), &[0x000e, 0x0000]);
        assert!(code.tries().is_empty());
        assert_eq!(code.handlers_size(), 0);
        assert_eq!(code.catch_handler_lists().count(), 0);
    }

    #[test]
    fn parse_truncated() {
        let mut bytes = vec![];
        sample_code().serialize(&mut bytes).unwrap();
        for len in [0, 10, 17, 30, bytes.len() - 1] {
            assert_eq!(
                Code::parse(&bytes[..len]),
                Err(CodeFormatError::UnexpectedEof),
                "truncated to {} bytes",
                len
            );
        }
    }

    #[test]
    fn parse_huge_insns_size() {
        let bytes = [
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // header
            0xff, 0xff, 0xff, 0xff, // insns_size
        ];
        assert_eq!(Code::parse(&bytes), Err(CodeFormatError::UnexpectedEof));
    }

    #[test]
    fn parse_bad_handler_offset() {
        let code = sample_code();
        let mut bytes = vec![];
        code.serialize(&mut bytes).unwrap();

        // Second try entry's `handler_off` lives at 24 + 8 + 6; point it mid-handler
        bytes[38] = 2;
        assert_eq!(
            Code::parse(&bytes),
            Err(CodeFormatError::BadHandlerOffset {
                try_index: 1,
                handler_off: 2
            })
        );
    }

    #[test]
    fn parse_bad_handler_count() {
        let mut bytes = vec![
            0, 0, 0, 0, 0, 0, 1, 0, // registers, ins, outs, tries
            0, 0, 0, 0, // debug info
            2, 0, 0, 0, // insns_size
            0x0e, 0x00, 0x00, 0x00, // insns
            0, 0, 0, 0, 1, 0, 1, 0, // try
            1, // handlers_size
        ];
        write_sleb128(&mut bytes, 70000);
        bytes.extend_from_slice(&[0; 16]);
        assert_eq!(
            Code::parse(&bytes),
            Err(CodeFormatError::BadHandlerCount {
                offset: 1,
                size: 70000
            })
        );
    }

    #[test]
    fn builder_rejects_empty_handler() {
        let built = CodeBuilder::new(vec![0x000e])
            .try_block(0, 1, vec![])
            .build();
        assert_eq!(built, Err(CodeFormatError::EmptyHandler));
    }

    #[test]
    fn builder_rejects_duplicate_catch_all() {
        let built = CodeBuilder::new(vec![0x0000, 0x000e])
            .try_block(
                0,
                1,
                vec![
                    CatchHandler::catch_all(1),
                    CatchHandler::typed(2, 1),
                    CatchHandler::catch_all(0),
                ],
            )
            .build();
        assert_eq!(built, Err(CodeFormatError::DuplicateCatchAll));
    }

    #[test]
    fn try_end_does_not_overflow() {
        let try_item = TryItem {
            start_addr: u32::MAX,
            insn_count: u16::MAX,
            handler_off: 0,
        };
        assert_eq!(try_item.end_addr(), u32::MAX as u64 + u16::MAX as u64);
    }
}
