/// Per-call parsing policy.
///
/// `accept_invalid_signatures` is honoured identically by every operation
/// that checks a signature, as a per-call field rather than a compile-time
/// toggle so a single process can parse both strictly and leniently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// When `false` (the default), `attach` rejects a missing `MZ`, a
    /// missing `PE\0\0`, or an Optional-header magic that doesn't match the
    /// declared width. When `true`, those checks are skipped and parsing
    /// continues best-effort.
    pub accept_invalid_signatures: bool,
}

impl ParseOptions {
    pub const fn strict() -> Self {
        ParseOptions {
            accept_invalid_signatures: false,
        }
    }

    pub const fn lenient() -> Self {
        ParseOptions {
            accept_invalid_signatures: true,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::strict()
    }
}

/// Hard cap on the number of sections a view will expose. A `NumberOfSections`
/// beyond this is truncated with a diagnostic; the remainder is unreachable
/// through the resulting view.
pub const MAX_SECTIONS: usize = 96;
