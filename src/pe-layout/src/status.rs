/// Per-view lifecycle flags.
///
/// `attached` is the policy flag `release` dispatches on; it is tracked
/// separately from the view's `Storage` (see `storage.rs`), which is the
/// thing that actually governs whether bytes get freed when the view is
/// dropped. This split is what lets a conversion/copy destination be
/// `attached == false` while still safely wrapping caller-supplied memory
/// the crate must not deallocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadStatus {
    pub attached: bool,
    pub protected: bool,
    pub relocated: bool,
    pub imported: bool,
    /// Set once a view has been consumed by `detach`/`free`/`release`.
    /// Calling any release entry point again is a `PeError`, not a crash.
    pub released: bool,
}

impl LoadStatus {
    pub fn attached() -> Self {
        LoadStatus {
            attached: true,
            ..Default::default()
        }
    }

    /// The status a conversion/copy destination inherits from its source:
    /// everything else carries over, `attached` is forced to `false`.
    pub fn inherited_owned(source: LoadStatus) -> Self {
        LoadStatus {
            attached: false,
            released: false,
            ..source
        }
    }
}
