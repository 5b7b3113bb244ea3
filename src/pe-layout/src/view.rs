//! Structural views over a PE buffer: `RawPe` for the file layout,
//! `VirtualModule` for the image layout.

use crate::config::ParseOptions;
use crate::error::{AllocError, Error, PeError};
use crate::headers::Headers;
use crate::layout::LayoutKind;
use crate::section::SectionDescriptor;
use crate::sibling::SiblingId;
use crate::status::LoadStatus;
use crate::storage::Storage;

/// Builds the section-descriptor array for a view. The `Vec` itself is
/// allocated with `try_reserve_exact` rather than `with_capacity`, so a
/// file claiming an unreasonable `NumberOfSections` surfaces
/// `AllocError::Descriptors` instead of aborting the process.
pub(crate) fn build_sections(
    bytes: &[u8],
    headers: &Headers,
    kind: LayoutKind,
) -> crate::error::Result<Vec<SectionDescriptor>> {
    let raw = headers.section_headers(bytes).map_err(Error::Pe)?;
    let mut out = Vec::new();
    out.try_reserve_exact(raw.len())
        .map_err(|_| Error::Alloc(AllocError::Descriptors))?;
    for (i, header) in raw.into_iter().enumerate() {
        let (data_offset, data_len) = match kind {
            LayoutKind::File => (
                header.pointer_to_raw_data as usize,
                header.size_of_raw_data as usize,
            ),
            LayoutKind::Image => (
                header.virtual_address as usize,
                header.virtual_size as usize,
            ),
        };
        if data_len > 0 {
            let end = data_offset
                .checked_add(data_len)
                .ok_or(PeError::SectionOutOfBounds)?;
            if end > bytes.len() {
                return Err(Error::Pe(PeError::SectionOutOfBounds));
            }
        }
        out.push(SectionDescriptor {
            header,
            header_offset: headers.header_offset(i),
            data_offset,
            data_len,
        });
    }
    Ok(out)
}

/// A file-layout view: sections addressed by `PointerToRawData`.
#[derive(Debug)]
pub struct RawPe<'a> {
    storage: Storage<'a>,
    pub headers: Headers,
    pub sections: Vec<SectionDescriptor>,
    pub status: LoadStatus,
}

impl<'a> RawPe<'a> {
    /// Attaches a read-only view over `bytes` without copying it. The
    /// returned view never frees `bytes`. Can fail with `Error::Alloc` if
    /// the section-descriptor array can't be allocated, as well as with
    /// the usual `Error::Pe` structural errors.
    pub fn attach(bytes: &'a [u8], opts: ParseOptions) -> crate::error::Result<RawPe<'a>> {
        let headers = Headers::parse(bytes, opts)?;
        if headers.file.number_of_sections as usize > crate::config::MAX_SECTIONS {
            log::warn!(
                "file has {} sections, truncating to {}",
                headers.file.number_of_sections,
                crate::config::MAX_SECTIONS
            );
        } else if headers.file.number_of_sections == 0 {
            log::warn!("PE file at {:p} has 0 sections", bytes.as_ptr());
        }
        let sections = build_sections(bytes, &headers, LayoutKind::File)?;
        log::trace!("attached to PE file at {:p}", bytes.as_ptr());
        Ok(RawPe {
            storage: Storage::Borrowed(bytes),
            headers,
            sections,
            status: LoadStatus::attached(),
        })
    }

    /// Wraps an owned buffer the crate already fully controls (a
    /// conversion/copy destination), skipping re-validation of bytes this
    /// crate itself just wrote.
    pub(crate) fn from_owned(
        storage: Storage<'a>,
        headers: Headers,
        sections: Vec<SectionDescriptor>,
        status: LoadStatus,
    ) -> RawPe<'a> {
        RawPe {
            storage,
            headers,
            sections,
            status,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    pub fn is_owned(&self) -> bool {
        self.storage.is_owned()
    }

    pub fn into_storage(self) -> Storage<'a> {
        self.storage
    }

    /// Releases the borrow without freeing anything. Requires the view to still be attached.
    pub fn detach(mut self) -> Result<(), PeError> {
        if self.status.released {
            return Err(PeError::AlreadyReleased);
        }
        if !self.status.attached {
            return Err(PeError::NotAttached);
        }
        self.status.released = true;
        log::trace!("detached from PE file at {:p}", self.bytes().as_ptr());
        Ok(())
    }

    /// Drops the owned backing buffer. Requires the
    /// view to be owned, i.e. not attached.
    pub fn free(mut self) -> Result<(), PeError> {
        if self.status.released {
            return Err(PeError::AlreadyReleased);
        }
        if self.status.attached {
            return Err(PeError::NotOwned);
        }
        self.status.released = true;
        drop(self.storage);
        log::trace!("freed owned PE file buffer");
        Ok(())
    }

    /// Dispatches to `detach` or `free` depending on `status.attached`,
    /// the one release entry point callers who don't already know which
    /// kind of view they're holding need.
    pub fn release(self) -> Result<(), PeError> {
        if self.status.attached {
            self.detach()
        } else {
            self.free()
        }
    }
}

/// An image-layout view: sections addressed by `VirtualAddress`, plus the
/// sibling-list membership an image-layout module participates in.
#[derive(Debug)]
pub struct VirtualModule<'a> {
    storage: Storage<'a>,
    pub headers: Headers,
    pub sections: Vec<SectionDescriptor>,
    pub status: LoadStatus,
    pub sibling: Option<SiblingId>,
    /// The module's display name. Never set by `attach` or by the
    /// conversion engine; left `None` for the caller to fill in once it
    /// knows (e.g. from the path it loaded the bytes from).
    pub name: Option<String>,
}

impl<'a> VirtualModule<'a> {
    /// See `RawPe::attach`; can fail the same two ways.
    pub fn attach(bytes: &'a [u8], opts: ParseOptions) -> crate::error::Result<VirtualModule<'a>> {
        let headers = Headers::parse(bytes, opts)?;
        if headers.file.number_of_sections as usize > crate::config::MAX_SECTIONS {
            log::warn!(
                "image has {} sections, truncating to {}",
                headers.file.number_of_sections,
                crate::config::MAX_SECTIONS
            );
        } else if headers.file.number_of_sections == 0 {
            log::warn!("PE image at {:p} has 0 sections", bytes.as_ptr());
        }
        let sections = build_sections(bytes, &headers, LayoutKind::Image)?;
        log::trace!("attached to PE image at {:p}", bytes.as_ptr());
        Ok(VirtualModule {
            storage: Storage::Borrowed(bytes),
            headers,
            sections,
            status: LoadStatus::attached(),
            sibling: None,
            name: None,
        })
    }

    /// Sets the module's display name. Left to the caller rather than
    /// derived by `attach`, since the bytes alone don't carry one.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub(crate) fn from_owned(
        storage: Storage<'a>,
        headers: Headers,
        sections: Vec<SectionDescriptor>,
        status: LoadStatus,
    ) -> VirtualModule<'a> {
        VirtualModule {
            storage,
            headers,
            sections,
            status,
            sibling: None,
            name: None,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }

    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        self.storage.as_mut_slice()
    }

    pub fn is_owned(&self) -> bool {
        self.storage.is_owned()
    }

    pub fn into_storage(self) -> Storage<'a> {
        self.storage
    }

    pub fn detach(mut self) -> Result<(), PeError> {
        if self.status.released {
            return Err(PeError::AlreadyReleased);
        }
        if !self.status.attached {
            return Err(PeError::NotAttached);
        }
        self.status.released = true;
        log::trace!("detached from PE image at {:p}", self.bytes().as_ptr());
        Ok(())
    }

    pub fn free(mut self) -> Result<(), PeError> {
        if self.status.released {
            return Err(PeError::AlreadyReleased);
        }
        if self.status.attached {
            return Err(PeError::NotOwned);
        }
        self.status.released = true;
        drop(self.storage);
        log::trace!("freed owned PE image buffer");
        Ok(())
    }

    /// Dispatches to `detach` or `free` depending on `status.attached`,
    /// the one release entry point callers who don't already know which
    /// kind of view they're holding need.
    pub fn release(self) -> Result<(), PeError> {
        if self.status.attached {
            self.detach()
        } else {
            self.free()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::minimal_pe;

    #[test]
    fn attach_zero_section_file_succeeds() {
        let buf = minimal_pe(&[]);
        let view = RawPe::attach(&buf, ParseOptions::strict()).unwrap();
        assert!(view.sections.is_empty());
        assert!(view.status.attached);
    }

    #[test]
    fn attach_rejects_bad_dos_signature() {
        let mut buf = minimal_pe(&[]);
        buf[0..2].copy_from_slice(b"ZZ");
        assert_eq!(
            RawPe::attach(&buf, ParseOptions::strict()).unwrap_err(),
            Error::Pe(PeError::BadDosSignature)
        );
    }

    #[test]
    fn attached_module_has_no_name_until_the_caller_sets_one() {
        let buf = minimal_pe(&[]);
        let mut module = VirtualModule::attach(&buf, ParseOptions::strict()).unwrap();
        assert_eq!(module.name, None);
        module.set_name("ntdll.dll");
        assert_eq!(module.name.as_deref(), Some("ntdll.dll"));
    }

    #[test]
    fn detach_twice_is_an_error_not_a_crash() {
        let buf = minimal_pe(&[]);
        let view = RawPe::attach(&buf, ParseOptions::strict()).unwrap();
        view.detach().unwrap();
        // A fresh view stands in for "call release again": the original
        // is consumed by the first `detach`, so we assert the guard
        // directly against a view already marked released.
        let mut reattached = RawPe::attach(&buf, ParseOptions::strict()).unwrap();
        reattached.status.released = true;
        assert_eq!(reattached.detach().unwrap_err(), PeError::AlreadyReleased);
    }
}
