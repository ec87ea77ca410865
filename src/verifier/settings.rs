/// Largest width, in code units, that a single instruction or payload may have
///
/// This is also the most that fits in the width bits of [`super::InsnFlags`].
pub const MAX_INSN_WIDTH: usize = 65535;

/// How loudly to reject
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VerifyMode {
    /// Verification is mandatory (eg. ahead-of-time): every rejection is logged
    Strict,

    /// Verification is opportunistic (eg. just-in-time): rejections are silent
    ///
    /// Failures still reject the method, this only affects diagnostics.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode: VerifyMode,

    /// Widths above this are treated as a corrupt instruction stream
    ///
    /// Values above [`MAX_INSN_WIDTH`] are capped to it.
    pub max_insn_width: usize,
}

impl Settings {
    pub fn strict() -> Settings {
        Settings {
            mode: VerifyMode::Strict,
            max_insn_width: MAX_INSN_WIDTH,
        }
    }

    pub fn lenient() -> Settings {
        Settings {
            mode: VerifyMode::Lenient,
            ..Settings::strict()
        }
    }

    /// Whether failures should be logged
    pub fn log_failures(&self) -> bool {
        self.mode == VerifyMode::Strict
    }

    /// Width ceiling actually enforced
    pub fn insn_width_limit(&self) -> usize {
        self.max_insn_width.min(MAX_INSN_WIDTH)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::strict()
    }
}
