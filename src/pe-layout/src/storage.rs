/// Tagged backing storage for a view, replacing the `Attached` boolean's
/// job of deciding what `free`/`detach` must do. `Borrowed` never deallocates on drop — whether it wraps a
/// read-only caller buffer (`attach`) or a caller-supplied write buffer
/// (an `_Ex` conversion destination), the bytes belong to someone else.
/// `Owned` frees its buffer on drop like any other `Box<[u8]>`.
#[derive(Debug)]
pub enum Storage<'a> {
    Borrowed(&'a [u8]),
    BorrowedMut(&'a mut [u8]),
    Owned(Box<[u8]>),
}

impl<'a> Storage<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Borrowed(b) => b,
            Storage::BorrowedMut(b) => b,
            Storage::Owned(b) => b,
        }
    }

    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            Storage::Borrowed(_) => None,
            Storage::BorrowedMut(b) => Some(b),
            Storage::Owned(b) => Some(b),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Storage::Owned(_))
    }
}

/// Fallibly allocates a zeroed buffer of `len` bytes, surfacing an
/// `AllocError` instead of aborting the process the way an infallible
/// `vec![0u8; len]` would.
pub fn try_zeroed_boxed_slice(len: usize) -> Result<Box<[u8]>, crate::error::AllocError> {
    let mut v: Vec<u8> = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| crate::error::AllocError::Buffer { requested: len as u64 })?;
    v.resize(len, 0);
    Ok(v.into_boxed_slice())
}
