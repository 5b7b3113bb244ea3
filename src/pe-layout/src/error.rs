use thiserror::Error;

/// The structural contract of a PE was violated, or an operation's
/// precondition on `LoadStatus` did not hold.
///
/// On any of these, outputs are not initialised and the caller's inputs
/// are left untouched.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PeError {
    #[error("buffer too short for a DOS header")]
    BufferTooShortForDosHeader,
    #[error("DOS signature is not 'MZ'")]
    BadDosSignature,
    #[error("e_lfanew points outside the buffer")]
    NtHeadersOutOfBounds,
    #[error("NT signature is not 'PE\\0\\0'")]
    BadNtSignature,
    #[error("optional header magic does not match the declared width")]
    BadOptionalMagic,
    #[error("section table extends past SizeOfHeaders")]
    SectionTableOutOfBounds,
    #[error("a section's header or data region lies outside the buffer")]
    SectionOutOfBounds,
    #[error("destination extent overflowed the address width")]
    ExtentOverflow,
    #[error("operation requires an attached view")]
    NotAttached,
    #[error("operation requires an owned (non-attached) view")]
    NotOwned,
    #[error("operation requires an image-layout view")]
    NotImageLayout,
    #[error("image is already protected")]
    AlreadyProtected,
    #[error("image is not protected")]
    NotProtected,
    #[error("view has already been released")]
    AlreadyReleased,
    #[error("unsupported optional header width")]
    UnsupportedWidth,
    #[error("caller-supplied destination buffer is smaller than the computed extent")]
    DestinationTooSmall,
}

/// A descriptor-array or backing-buffer allocation could not be satisfied.
/// Any descriptor arrays already acquired within the failed operation are
/// dropped before the error is returned, by ordinary `Vec`/`Box` teardown.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AllocError {
    #[error("failed to allocate the section descriptor arrays")]
    Descriptors,
    #[error("failed to allocate the destination buffer ({requested} bytes)")]
    Buffer { requested: u64 },
}

/// The tri-valued result surface: `Ok` is success, `Err(Error::Pe(_))` is a
/// structural error, `Err(Error::Alloc(_))` is an allocation failure. Kept
/// as two variants rather than collapsed into one so a caller can recover
/// differently from "the input is bad" than from "we ran out of memory".
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error(transparent)]
    Pe(#[from] PeError),
    #[error(transparent)]
    Alloc(#[from] AllocError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::Alloc(AllocError::Descriptors)
    }
}
