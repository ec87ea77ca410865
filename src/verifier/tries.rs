use super::diagnostics::reject;
use super::{Error, InsnFlagsTable, Settings};
use crate::dex::Method;
use std::ops::Range;

/// Set the "in try" flag on every instruction protected by a `try` entry, and the "branch
/// target" flag on every exception handler
///
/// This must run after [`super::compute_code_widths`], since both the `try` ranges and the
/// handler addresses are checked against the recorded instruction boundaries. The whole exception
/// table is checked before any flag is set, so on failure `insn_flags` is left untouched.
pub fn set_try_flags(
    method: &Method,
    insn_flags: &mut InsnFlagsTable,
    settings: &Settings,
) -> Result<(), Error> {
    let code = &method.code;
    if code.tries().is_empty() {
        return Ok(());
    }
    debug_assert_eq!(insn_flags.len(), code.insns_size());

    let try_ranges = code
        .tries()
        .iter()
        .map(|try_item| {
            check_try_range(try_item.start_addr, try_item.end_addr(), insn_flags)
                .map_err(|err| reject(method, settings, err))
        })
        .collect::<Result<Vec<Range<usize>>, Error>>()?;

    for handlers in code.catch_handler_lists() {
        for handler in handlers {
            if !insn_flags.is_opcode(handler.address as usize) {
                return Err(reject(
                    method,
                    settings,
                    Error::BadHandlerAddress {
                        addr: handler.address,
                    },
                ));
            }
        }
    }

    // Everything checks out, now actually set the flags
    for range in try_ranges {
        let mut addr = range.start;
        while addr < range.end {
            insn_flags.set_in_try(addr, true);
            let width = insn_flags.width(addr);
            if width == 0 {
                // Only possible if `insn_flags` didn't come from this method's code
                break;
            }
            addr += width;
        }
    }
    for handlers in code.catch_handler_lists() {
        for handler in handlers {
            insn_flags.set_branch_target(handler.address as usize, true);
        }
    }

    Ok(())
}

/// Check that a `try` range is non-empty, in bounds, and starts on an instruction
fn check_try_range(
    start: u32,
    end: u64,
    insn_flags: &InsnFlagsTable,
) -> Result<Range<usize>, Error> {
    let insns_size = insn_flags.len();
    let start_wide = start as u64;
    if start_wide >= end || start_wide >= insns_size as u64 || end > insns_size as u64 {
        return Err(Error::BadTryRange {
            start: start_wide,
            end,
            insns_size,
        });
    }

    // Both bounds are now known to fit in `usize`
    let range = (start as usize)..(end as usize);
    if !insn_flags.is_opcode(range.start) {
        return Err(Error::TryStartsMidInstruction { start: range.start });
    }
    Ok(range)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dex::{CatchHandler, CodeBuilder, WidthTable};
    use crate::verifier::compute_code_widths;

    /// nop; const/16 v0, #0; return-void (widths 1, 2, 1)
    const INSNS: [u16; 4] = [0x0000, 0x0013, 0x0000, 0x000e];

    fn method(builder: CodeBuilder) -> Method {
        Method::new("LTest;", "run", "()V", builder.build().unwrap())
    }

    fn run(method: &Method) -> (InsnFlagsTable, Result<(), Error>) {
        let settings = Settings::lenient();
        let mut flags = compute_code_widths(method, &WidthTable::standard(), &settings)
            .unwrap()
            .insn_flags;
        let result = set_try_flags(method, &mut flags, &settings);
        (flags, result)
    }

    #[test]
    fn no_tries() {
        let method = method(CodeBuilder::new(INSNS.to_vec()));
        let (flags, result) = run(&method);
        assert_eq!(result, Ok(()));
        assert!((0..INSNS.len()).all(|addr| !flags.in_try(addr) && !flags.is_branch_target(addr)));
    }

    #[test]
    fn covers_instruction_starts() {
        let method = method(
            CodeBuilder::new(INSNS.to_vec()).try_block(0, 3, vec![CatchHandler::typed(1, 3)]),
        );
        let (flags, result) = run(&method);
        assert_eq!(result, Ok(()));
        assert!(flags.in_try(0));
        assert!(flags.in_try(1));
        assert!(!flags.in_try(2), "middle of const/16");
        assert!(!flags.in_try(3), "past the end of the range");
        assert!(flags.is_branch_target(3));
        assert!(!flags.is_branch_target(0));
    }

    #[test]
    fn range_ending_mid_instruction() {
        // The range ends inside `const/16`, which is still marked since it starts in range
        let method = method(
            CodeBuilder::new(INSNS.to_vec()).try_block(1, 1, vec![CatchHandler::catch_all(3)]),
        );
        let (flags, result) = run(&method);
        assert_eq!(result, Ok(()));
        assert!(!flags.in_try(0));
        assert!(flags.in_try(1));
        assert!(!flags.in_try(3));
    }

    #[test]
    fn bad_ranges() {
        let cases: [(u32, u16); 4] = [(0, 0), (4, 1), (3, 2), (u32::MAX, 1)];
        for (start, count) in cases {
            let method = method(
                CodeBuilder::new(INSNS.to_vec())
                    .try_block(0, 1, vec![CatchHandler::catch_all(0)])
                    .try_block(start, count, vec![CatchHandler::catch_all(0)]),
            );
            let (flags, result) = run(&method);
            assert_eq!(
                result,
                Err(Error::BadTryRange {
                    start: start as u64,
                    end: start as u64 + count as u64,
                    insns_size: 4
                })
            );

            // The valid first entry wasn't applied either
            assert!(!flags.in_try(0));
            assert!(!flags.is_branch_target(0));
        }
    }

    #[test]
    fn try_starting_mid_instruction() {
        let method = method(
            CodeBuilder::new(INSNS.to_vec()).try_block(2, 1, vec![CatchHandler::catch_all(0)]),
        );
        let (_, result) = run(&method);
        assert_eq!(result, Err(Error::TryStartsMidInstruction { start: 2 }));
    }

    #[test]
    fn bad_handler_addresses() {
        for addr in [2, 4, 1000] {
            let method = method(CodeBuilder::new(INSNS.to_vec()).try_block(
                0,
                1,
                vec![CatchHandler::typed(0, 0), CatchHandler::catch_all(addr)],
            ));
            let (flags, result) = run(&method);
            assert_eq!(result, Err(Error::BadHandlerAddress { addr }));
            assert!(!flags.in_try(0));
            assert!(!flags.is_branch_target(0));
        }
    }

    #[test]
    fn handlers_from_every_list() {
        let method = method(
            CodeBuilder::new(INSNS.to_vec())
                .try_block(0, 1, vec![CatchHandler::typed(0, 1)])
                .try_block(1, 2, vec![CatchHandler::typed(0, 3), CatchHandler::catch_all(0)]),
        );
        let (flags, result) = run(&method);
        assert_eq!(result, Ok(()));
        for addr in [0, 1, 3] {
            assert!(flags.is_branch_target(addr), "handler at {}", addr);
        }
        assert!(!flags.is_branch_target(2));
    }
}
