//! Destination-extent computation for the layout-conversion engine: how large a buffer a `file_to_image`/`image_to_file`/`copy_*`
//! destination needs, derived from the source's headers and section table
//! rather than trusted wholesale from `SizeOfImage`/`SizeOfHeaders`.

use crate::error::PeError;
use crate::headers::Headers;
use crate::section::SectionDescriptor;

/// Largest RVA-addressed byte one past the end of any section, or past the
/// headers if there are no sections.
pub fn max_rva(headers: &Headers, sections: &[SectionDescriptor]) -> Result<u64, PeError> {
    let mut extent = headers.headers_extent() as u64;
    for s in sections {
        extent = extent.max(s.header.rva_end());
    }
    if extent > u32::MAX as u64 {
        return Err(PeError::ExtentOverflow);
    }
    Ok(extent)
}

/// Largest file-offset-addressed byte one past the end of any section, or
/// past the headers if there are no sections.
pub fn max_pa(headers: &Headers, sections: &[SectionDescriptor]) -> Result<u64, PeError> {
    let mut extent = headers.headers_extent() as u64;
    for s in sections {
        extent = extent.max(s.header.pa_end());
    }
    if extent > u32::MAX as u64 {
        return Err(PeError::ExtentOverflow);
    }
    Ok(extent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;
    use crate::testutil::{minimal_pe, SectionSpec};
    use crate::view::RawPe;

    #[test]
    fn extent_covers_widest_section_not_just_last() {
        let sections = [
            SectionSpec {
                name: b".text\0\0\0",
                virtual_size: 0x50,
                virtual_address: 0x1000,
                size_of_raw_data: 0x200,
                pointer_to_raw_data: 0x400,
                characteristics: 0x6000_0020,
            },
            SectionSpec {
                name: b".data\0\0\0",
                virtual_size: 0x1000,
                virtual_address: 0x2000,
                size_of_raw_data: 0x80,
                pointer_to_raw_data: 0x600,
                characteristics: 0xC000_0040,
            },
        ];
        let buf = minimal_pe(&sections);
        let view = RawPe::attach(&buf, ParseOptions::strict()).unwrap();

        let rva = max_rva(&view.headers, &view.sections).unwrap();
        let pa = max_pa(&view.headers, &view.sections).unwrap();

        assert_eq!(rva, 0x3000); // .data's VirtualAddress + VirtualSize
        assert_eq!(pa, 0x680); // .data's PointerToRawData + SizeOfRawData
    }

    #[test]
    fn zero_section_extent_is_headers_only() {
        let buf = minimal_pe(&[]);
        let view = RawPe::attach(&buf, ParseOptions::strict()).unwrap();
        let rva = max_rva(&view.headers, &view.sections).unwrap();
        assert_eq!(rva, view.headers.headers_extent() as u64);
    }
}
