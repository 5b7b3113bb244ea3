//! The allocator collaborator the non-`_Ex` conversion entry points use to
//! obtain their destination buffer.
//! `detach`/`free`/`release` themselves live as inherent methods on
//! `RawPe`/`VirtualModule` (see `view.rs`), since they need no external
//! resource beyond the view's own `Storage`.

use crate::error::AllocError;
use crate::storage::try_zeroed_boxed_slice;

/// Supplies a zero-filled destination buffer of a given length. Modeled as
/// a trait, the way the page-protection primitive is (`protect.rs`),
/// rather than a direct call to the global allocator, so a caller that
/// wants to account for or cap destination allocations can supply their
/// own.
pub trait BufferAllocator {
    fn reserve_and_commit(&self, length: usize) -> Result<Box<[u8]>, AllocError>;
}

/// The allocator every public conversion function uses unless a caller
/// threads a different one through the `_with` variant: a fallible,
/// zero-filled heap allocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl BufferAllocator for DefaultAllocator {
    fn reserve_and_commit(&self, length: usize) -> Result<Box<[u8]>, AllocError> {
        try_zeroed_boxed_slice(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;
    impl BufferAllocator for AlwaysFails {
        fn reserve_and_commit(&self, length: usize) -> Result<Box<[u8]>, AllocError> {
            Err(AllocError::Buffer {
                requested: length as u64,
            })
        }
    }

    #[test]
    fn default_allocator_zero_fills() {
        let buf = DefaultAllocator.reserve_and_commit(16).unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn custom_allocator_surfaces_its_own_error() {
        assert_eq!(
            AlwaysFails.reserve_and_commit(16),
            Err(AllocError::Buffer { requested: 16 })
        );
    }
}
