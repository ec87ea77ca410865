use super::diagnostics::reject;
use super::{Error, InsnAnnotations, InsnFlagsTable, Settings};
use crate::dex::opcode::{self, WidthTable};
use crate::dex::Method;

/// Compute the width of the instruction at each address of a method
///
/// Addresses in the middle of an instruction or payload are left with width 0. Along the way,
/// this checks that:
///
///   - the first instruction starts at address 0
///   - every opcode is valid according to `width_table`
///   - each instruction immediately follows the previous one
///   - the last instruction ends exactly at the end of the stream
///
/// The returned annotations have no `try` or branch target flags set yet.
pub fn compute_code_widths(
    method: &Method,
    width_table: &WidthTable,
    settings: &Settings,
) -> Result<InsnAnnotations, Error> {
    let insns = method.code.insns();
    let insns_size = insns.len();
    let width_limit = settings.insn_width_limit();

    let mut insn_flags = InsnFlagsTable::new(insns_size);
    let mut new_instance_count = 0;
    let mut addr = 0;

    while addr < insns_size {
        let unit = insns[addr];
        let width = width_table.instr_or_table_width(&insns[addr..]);
        if width == 0 {
            return Err(reject(
                method,
                settings,
                Error::InvalidInstruction { addr, unit },
            ));
        }
        if width > width_limit {
            return Err(reject(method, settings, Error::InsaneWidth { addr, width }));
        }

        if opcode::opcode_of(unit) == opcode::NEW_INSTANCE {
            new_instance_count += 1;
        }

        // `width_limit` never exceeds `u16::MAX`
        insn_flags.set_width(addr, width as u16);
        addr += width;
    }

    if addr != insns_size {
        return Err(reject(
            method,
            settings,
            Error::CodeEndMismatch {
                end: addr,
                insns_size,
            },
        ));
    }

    log::trace!("{}: widths {:?}", method, insn_flags);
    Ok(InsnAnnotations {
        insn_flags,
        new_instance_count,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dex::opcode::*;
    use crate::dex::CodeBuilder;

    fn method(insns: Vec<u16>) -> Method {
        Method::new("LTest;", "run", "()V", CodeBuilder::new(insns).build().unwrap())
    }

    fn widths(insns: Vec<u16>) -> Result<InsnAnnotations, Error> {
        compute_code_widths(&method(insns), &WidthTable::standard(), &Settings::lenient())
    }

    #[test]
    fn straight_line_code() {
        // const/4 v0, #0; new-instance v1, type@1; move-result v0; const v0, #0; return-void
        let insns = vec![0x0012, 0x0122, 0x0001, 0x000a, 0x0014, 0x0000, 0x0000, 0x000e];
        let annotations = widths(insns).unwrap();
        let flags = &annotations.insn_flags;

        assert_eq!(annotations.new_instance_count, 1);
        assert_eq!(
            flags
                .opcodes()
                .map(|(addr, flags)| (addr, flags.width()))
                .collect::<Vec<_>>(),
            vec![(0, 1), (1, 2), (3, 1), (4, 3), (7, 1)]
        );
        assert_eq!(flags.width(2), 0);
        assert_eq!(flags.width(5), 0);
        assert_eq!(flags.width(6), 0);
    }

    #[test]
    fn widths_chain_to_the_end() {
        let insns = vec![
            0x0028, // goto +0
            0x0029, 0x0000, // goto/16
            0x002b, 0x0000, 0x0000, // packed-switch
            0x000e, // return-void
            0x0000, // padding nop
            PACKED_SWITCH_SIGNATURE, 1, 0, 0, 0, 0, // packed-switch payload
        ];
        let insns_size = insns.len();
        let annotations = widths(insns).unwrap();

        let mut addr = 0;
        let mut starts = 0;
        while addr < insns_size {
            let width = annotations.insn_flags.width(addr);
            assert_ne!(width, 0, "chain broken at {}", addr);
            for inner in addr + 1..addr + width {
                assert!(!annotations.insn_flags.is_opcode(inner));
            }
            addr += width;
            starts += 1;
        }
        assert_eq!(addr, insns_size);
        assert_eq!(starts, annotations.insn_flags.opcodes().count());
        assert_eq!(annotations.insn_flags.width(8), 6);
    }

    #[test]
    fn empty_code() {
        let annotations = widths(vec![]).unwrap();
        assert!(annotations.insn_flags.is_empty());
        assert_eq!(annotations.new_instance_count, 0);
    }

    #[test]
    fn invalid_opcode() {
        assert_eq!(
            widths(vec![0x0000, 0x003e, 0x000e]),
            Err(Error::InvalidInstruction {
                addr: 1,
                unit: 0x003e
            })
        );
    }

    #[test]
    fn truncated_last_instruction() {
        // const/16 needs 2 units
        assert_eq!(
            widths(vec![0x0000, 0x0013]),
            Err(Error::CodeEndMismatch {
                end: 3,
                insns_size: 2
            })
        );
    }

    #[test]
    fn truncated_payload_header() {
        assert_eq!(
            widths(vec![0x000e, SPARSE_SWITCH_SIGNATURE]),
            Err(Error::InvalidInstruction {
                addr: 1,
                unit: SPARSE_SWITCH_SIGNATURE
            })
        );
    }

    #[test]
    fn insane_width() {
        // 0xffff * 2 elements of width 2 => 4 + 0x1fffe code units
        let insns = vec![ARRAY_DATA_SIGNATURE, 2, 0xffff, 0x0001];
        assert_eq!(
            widths(insns),
            Err(Error::InsaneWidth {
                addr: 0,
                width: 4 + (2 * 0x1ffff + 1) / 2
            })
        );
    }

    #[test]
    fn configurable_width_ceiling() {
        let insns = vec![PACKED_SWITCH_SIGNATURE, 2, 0, 0, 0, 0, 0, 0];
        let mut settings = Settings::lenient();
        settings.max_insn_width = 7;
        assert_eq!(
            compute_code_widths(&method(insns.clone()), &WidthTable::standard(), &settings),
            Err(Error::InsaneWidth { addr: 0, width: 8 })
        );

        settings.max_insn_width = 8;
        assert!(compute_code_widths(&method(insns), &WidthTable::standard(), &settings).is_ok());
    }

    #[test]
    fn custom_width_table() {
        let insns = vec![0x00f0, 0x0000, 0x000e];
        assert!(widths(insns.clone()).is_err());

        let mut table = WidthTable::standard();
        table.set_width(0xf0, 2);
        let annotations =
            compute_code_widths(&method(insns), &table, &Settings::lenient()).unwrap();
        assert_eq!(annotations.insn_flags.width(0), 2);
        assert_eq!(annotations.insn_flags.width(2), 1);
    }
}
