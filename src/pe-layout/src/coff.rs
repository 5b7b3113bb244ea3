use bitflags::bitflags;

/// Size in bytes of the COFF file header.
pub const FILE_HEADER_SIZE: usize = 20;

bitflags! {
    /// File header `Characteristics` flags. Modeled as `bitflags!`
    /// rather than a hand-rolled newtype with one `is_*` accessor per bit,
    /// following `peff::SectionFlags` in the retrieval pack.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileCharacteristics: u16 {
        const RELOCS_STRIPPED     = 0x0001;
        const EXECUTABLE_IMAGE    = 0x0002;
        const LINE_NUMS_STRIPPED  = 0x0004;
        const LOCAL_SYMS_STRIPPED = 0x0008;
        const AGGRESSIVE_WS_TRIM  = 0x0010;
        const LARGE_ADDRESS_AWARE = 0x0020;
        const BYTES_REVERSED_LO   = 0x0080;
        const MACHINE_32BIT       = 0x0100;
        const DEBUG_STRIPPED      = 0x0200;
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        const NET_RUN_FROM_SWAP   = 0x0800;
        const SYSTEM              = 0x1000;
        const DLL                 = 0x2000;
        const UP_SYSTEM_ONLY      = 0x4000;
        const BYTES_REVERSED_HI   = 0x8000;
    }
}

/// Typed view over the COFF file header that follows the `"PE\0\0"`
/// signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: FileCharacteristics,
}

impl FileHeader {
    pub fn parse(bytes: &[u8]) -> Option<FileHeader> {
        let slice = bytes.get(0..FILE_HEADER_SIZE)?;
        Some(FileHeader {
            machine: u16::from_le_bytes(slice[0..2].try_into().ok()?),
            number_of_sections: u16::from_le_bytes(slice[2..4].try_into().ok()?),
            time_date_stamp: u32::from_le_bytes(slice[4..8].try_into().ok()?),
            pointer_to_symbol_table: u32::from_le_bytes(slice[8..12].try_into().ok()?),
            number_of_symbols: u32::from_le_bytes(slice[12..16].try_into().ok()?),
            size_of_optional_header: u16::from_le_bytes(slice[16..18].try_into().ok()?),
            characteristics: FileCharacteristics::from_bits_truncate(u16::from_le_bytes(
                slice[18..20].try_into().ok()?,
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fields_in_order() {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[0..2].copy_from_slice(&0x014cu16.to_le_bytes());
        buf[2..4].copy_from_slice(&2u16.to_le_bytes());
        buf[16..18].copy_from_slice(&224u16.to_le_bytes());
        buf[18..20].copy_from_slice(&0x0102u16.to_le_bytes());
        let header = FileHeader::parse(&buf).unwrap();
        assert_eq!(header.machine, 0x014c);
        assert_eq!(header.number_of_sections, 2);
        assert_eq!(header.size_of_optional_header, 224);
        assert!(header.characteristics.contains(FileCharacteristics::EXECUTABLE_IMAGE));
        assert!(header.characteristics.contains(FileCharacteristics::MACHINE_32BIT));
    }
}
