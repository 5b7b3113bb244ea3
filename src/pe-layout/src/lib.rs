//! Structural parsing, file/image layout conversion, ownership lifecycle
//! and page-protection derivation for PE binaries.
//!
//! A [`RawPe`] attaches over a buffer in *file* layout (sections packed at
//! `FileAlignment`, addressed by raw file offset); a [`VirtualModule`]
//! attaches over a buffer in *image* layout (sections spread at
//! `SectionAlignment`, addressed by RVA). The [`convert`] module moves
//! between the two without mutating the source, and [`protect`] derives
//! and applies per-region page protection once a module is in image
//! layout.

mod coff;
pub mod config;
pub mod convert;
mod dos;
pub mod error;
mod extent;
mod headers;
pub mod layout;
pub mod lifecycle;
pub mod optional;
pub mod protect;
pub mod section;
pub mod sibling;
pub mod status;
pub mod storage;
#[cfg(test)]
mod testutil;
pub mod view;
mod width;

pub use coff::{FileCharacteristics, FileHeader};
pub use config::{ParseOptions, MAX_SECTIONS};
pub use convert::{
    copy_file, copy_file_into, copy_file_with, copy_image, copy_image_into, copy_image_with,
    file_to_image, file_to_image_into, file_to_image_with, image_to_file, image_to_file_into,
    image_to_file_with,
};
pub use dos::DosHeader;
pub use error::{AllocError, Error, PeError, Result};
pub use extent::{max_pa, max_rva};
pub use headers::Headers;
pub use layout::LayoutKind;
pub use lifecycle::{BufferAllocator, DefaultAllocator};
pub use optional::{DataDirectory, DllCharacteristics, OptionalHeader};
pub use protect::{derive_protection, protect_image, unprotect_image, PageProtection, PageProtector};
pub use section::{SectionCharacteristics, SectionDescriptor, SectionHeader};
pub use sibling::{SiblingArena, SiblingId};
pub use status::LoadStatus;
pub use storage::Storage;
pub use view::{RawPe, VirtualModule};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{minimal_pe, SectionSpec};

    #[test]
    fn attach_convert_and_release_round_trip() {
        let buf = minimal_pe(&[SectionSpec {
            name: b".text\0\0\0",
            virtual_size: 0x100,
            virtual_address: 0x1000,
            size_of_raw_data: 0x200,
            pointer_to_raw_data: 0x400,
            characteristics: 0x6000_0020,
        }]);

        let file_view = RawPe::attach(&buf, ParseOptions::strict()).unwrap();
        let image = file_to_image(&file_view).unwrap();
        assert!(!image.status.attached);

        let back = image_to_file(&image).unwrap();
        assert_eq!(back.bytes()[0x400..0x400 + 0x100], buf[0x400..0x400 + 0x100]);

        image.free().unwrap();
        back.free().unwrap();
        file_view.detach().unwrap();
    }

    #[test]
    fn release_dispatches_by_attached_flag() {
        let buf = minimal_pe(&[]);
        let attached = RawPe::attach(&buf, ParseOptions::strict()).unwrap();
        attached.release().unwrap(); // attached -> detach path

        let owned = copy_file(&RawPe::attach(&buf, ParseOptions::strict()).unwrap()).unwrap();
        assert!(!owned.status.attached);
        owned.release().unwrap(); // owned -> free path
    }

    #[test]
    fn releasing_twice_is_a_pe_error() {
        let buf = minimal_pe(&[]);
        let view = RawPe::attach(&buf, ParseOptions::strict()).unwrap();
        // Exhaust via detach, then assert the guard on a second attach
        // standing in for "the caller tries to release the same handle
        // again": detach/free/release all flip `released` and refuse a
        // repeat call rather than double-freeing or panicking.
        view.detach().unwrap();
        let mut zeroed = RawPe::attach(&buf, ParseOptions::strict()).unwrap();
        zeroed.status.released = true;
        assert!(zeroed.release().is_err());
    }
}
