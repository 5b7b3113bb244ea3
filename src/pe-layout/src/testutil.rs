//! Synthetic PE buffer construction for in-process tests. Nothing here
//! reads a fixture off disk; every test builds exactly the bytes its
//! assertions need.

#![cfg(test)]

use crate::width::MAGIC_PE32;

#[derive(Clone, Copy)]
pub struct SectionSpec {
    pub name: &'static [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

const DOS_HEADER_SIZE: usize = 64;
const FILE_HEADER_SIZE: usize = 20;
const OPTIONAL_HEADER_SIZE: usize = 224; // standard + windows32 + 16 data dirs
const SECTION_HEADER_SIZE: usize = 40;
const SIZE_OF_HEADERS_FIELD_OFFSET: usize = DOS_HEADER_SIZE + 4 + FILE_HEADER_SIZE + 60;

/// Builds a minimal well-formed PE32 buffer with the given sections. The
/// buffer is exactly long enough to hold headers plus every section's
/// file-layout data region (sections are expected to be listed in
/// ascending `pointer_to_raw_data` order, as a real linker would emit
/// them).
pub fn minimal_pe(sections: &[SectionSpec]) -> Vec<u8> {
    let e_lfanew = DOS_HEADER_SIZE as u32;
    let nt_sig_end = e_lfanew as usize + 4;
    let file_header_end = nt_sig_end + FILE_HEADER_SIZE;
    let optional_end = file_header_end + OPTIONAL_HEADER_SIZE;
    let section_table_end = optional_end + sections.len() * SECTION_HEADER_SIZE;

    let file_extent = sections
        .iter()
        .map(|s| (s.pointer_to_raw_data + s.size_of_raw_data) as usize)
        .max()
        .unwrap_or(section_table_end);
    let total = section_table_end.max(file_extent);

    let mut buf = vec![0u8; total];

    // DOS header.
    buf[0..2].copy_from_slice(b"MZ");
    buf[0x3c..0x40].copy_from_slice(&e_lfanew.to_le_bytes());

    // NT signature.
    buf[e_lfanew as usize..nt_sig_end].copy_from_slice(&0x0000_4550u32.to_le_bytes());

    // COFF file header.
    let fh = &mut buf[nt_sig_end..file_header_end];
    fh[0..2].copy_from_slice(&0x014cu16.to_le_bytes()); // machine: I386
    fh[2..4].copy_from_slice(&(sections.len() as u16).to_le_bytes());
    fh[16..18].copy_from_slice(&(OPTIONAL_HEADER_SIZE as u16).to_le_bytes());
    fh[18..20].copy_from_slice(&0x0102u16.to_le_bytes()); // EXECUTABLE_IMAGE | MACHINE_32BIT

    // Optional header (PE32).
    let oh = &mut buf[file_header_end..optional_end];
    oh[0..2].copy_from_slice(&MAGIC_PE32.to_le_bytes());
    oh[28..32].copy_from_slice(&0x0040_0000u32.to_le_bytes()); // image base
    oh[32..36].copy_from_slice(&0x1000u32.to_le_bytes()); // section alignment
    oh[36..40].copy_from_slice(&0x0200u32.to_le_bytes()); // file alignment
    oh[60..64].copy_from_slice(&(section_table_end as u32).to_le_bytes()); // size_of_headers
    let image_extent = sections
        .iter()
        .map(|s| s.virtual_address + s.virtual_size)
        .max()
        .unwrap_or(0x1000);
    oh[56..60].copy_from_slice(&image_extent.to_le_bytes()); // size_of_image

    // Section header table.
    for (i, s) in sections.iter().enumerate() {
        let off = optional_end + i * SECTION_HEADER_SIZE;
        let entry = &mut buf[off..off + SECTION_HEADER_SIZE];
        entry[0..8].copy_from_slice(s.name);
        entry[8..12].copy_from_slice(&s.virtual_size.to_le_bytes());
        entry[12..16].copy_from_slice(&s.virtual_address.to_le_bytes());
        entry[16..20].copy_from_slice(&s.size_of_raw_data.to_le_bytes());
        entry[20..24].copy_from_slice(&s.pointer_to_raw_data.to_le_bytes());
        entry[36..40].copy_from_slice(&s.characteristics.to_le_bytes());
    }

    buf
}

/// Builds the same buffer as [`minimal_pe`] but overwrites `SizeOfHeaders`
/// to `size_of_headers`, a value file-alignment rounding would normally
/// push past the literal DOS/NT/section-table byte count. Lets a test
/// prove a region computed from `SizeOfHeaders` differs from one computed
/// from the raw parsed extent.
pub fn minimal_pe_with_size_of_headers(sections: &[SectionSpec], size_of_headers: u32) -> Vec<u8> {
    let mut buf = minimal_pe(sections);
    buf[SIZE_OF_HEADERS_FIELD_OFFSET..SIZE_OF_HEADERS_FIELD_OFFSET + 4]
        .copy_from_slice(&size_of_headers.to_le_bytes());
    buf
}
