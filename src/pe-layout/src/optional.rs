use crate::error::PeError;
use crate::width::{MAGIC_PE32, MAGIC_PE32_PLUS};
use crate::width_accessor;
use bitflags::bitflags;

/// Number of data directory entries a well-formed PE optional header
/// declares.
pub const NUM_DATA_DIRECTORIES: usize = 16;

pub const DATA_DIRECTORY_IMPORT: usize = 1;
pub const DATA_DIRECTORY_BASE_RELOC: usize = 5;

bitflags! {
    /// `DllCharacteristics` field of the Windows-specific fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DllCharacteristics: u16 {
        const HIGH_ENTROPY_VA       = 0x0020;
        const DYNAMIC_BASE          = 0x0040;
        const FORCE_INTEGRITY       = 0x0080;
        const NX_COMPAT             = 0x0100;
        const NO_ISOLATION          = 0x0200;
        const NO_SEH                = 0x0400;
        const NO_BIND               = 0x0800;
        const APPCONTAINER          = 0x1000;
        const WDM_DRIVER            = 0x2000;
        const GUARD_CF              = 0x4000;
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// One `(VirtualAddress, Size)` pair from the data directory array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

/// The portion of the optional header that does not vary by address width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardFields {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
}

impl StandardFields {
    fn parse(bytes: &[u8]) -> Option<StandardFields> {
        Some(StandardFields {
            magic: u16::from_le_bytes(bytes.get(0..2)?.try_into().ok()?),
            major_linker_version: *bytes.get(2)?,
            minor_linker_version: *bytes.get(3)?,
            size_of_code: u32::from_le_bytes(bytes.get(4..8)?.try_into().ok()?),
            size_of_initialized_data: u32::from_le_bytes(bytes.get(8..12)?.try_into().ok()?),
            size_of_uninitialized_data: u32::from_le_bytes(bytes.get(12..16)?.try_into().ok()?),
            address_of_entry_point: u32::from_le_bytes(bytes.get(16..20)?.try_into().ok()?),
            base_of_code: u32::from_le_bytes(bytes.get(20..24)?.try_into().ok()?),
        })
    }
}

/// Windows-specific fields sized for a PE32 (32-bit address) image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsFields32 {
    pub base_of_data: u32,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: u16,
    pub dll_characteristics: DllCharacteristics,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

/// Windows-specific fields sized for a PE32+ image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowsFields64 {
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: u16,
    pub dll_characteristics: DllCharacteristics,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader32 {
    pub standard: StandardFields,
    pub windows: WindowsFields32,
    pub data_directories: Vec<DataDirectory>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader64 {
    pub standard: StandardFields,
    pub windows: WindowsFields64,
    pub data_directories: Vec<DataDirectory>,
}

/// Optional header, dispatching on the width its `Magic` declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalHeader {
    Pe32(OptionalHeader32),
    Pe64(OptionalHeader64),
}

fn parse_data_directories(bytes: &[u8]) -> Option<Vec<DataDirectory>> {
    let mut dirs = Vec::with_capacity(NUM_DATA_DIRECTORIES);
    for i in 0..NUM_DATA_DIRECTORIES {
        let off = i * 8;
        let entry = bytes.get(off..off + 8)?;
        dirs.push(DataDirectory {
            virtual_address: u32::from_le_bytes(entry[0..4].try_into().ok()?),
            size: u32::from_le_bytes(entry[4..8].try_into().ok()?),
        });
    }
    Some(dirs)
}

impl OptionalHeader {
    /// Parses the optional header starting at `bytes[0]`, given
    /// `size_of_optional_header` bytes are available. `strict` governs
    /// whether an unrecognised magic is rejected.
    pub fn parse(bytes: &[u8], size_of_optional_header: u16, strict: bool) -> Result<OptionalHeader, PeError> {
        let size = size_of_optional_header as usize;
        let region = bytes.get(0..size).ok_or(PeError::SectionTableOutOfBounds)?;
        let magic = u16::from_le_bytes(
            region
                .get(0..2)
                .ok_or(PeError::BadOptionalMagic)?
                .try_into()
                .unwrap(),
        );
        match magic {
            MAGIC_PE32 => {
                let standard = StandardFields::parse(region).ok_or(PeError::BadOptionalMagic)?;
                let base_of_data = u32::from_le_bytes(
                    region.get(24..28).ok_or(PeError::BadOptionalMagic)?.try_into().unwrap(),
                );
                let w = region.get(28..96).ok_or(PeError::BadOptionalMagic)?;
                let windows = WindowsFields32 {
                    base_of_data,
                    image_base: u32::from_le_bytes(w[0..4].try_into().unwrap()),
                    section_alignment: u32::from_le_bytes(w[4..8].try_into().unwrap()),
                    file_alignment: u32::from_le_bytes(w[8..12].try_into().unwrap()),
                    size_of_image: u32::from_le_bytes(w[28..32].try_into().unwrap()),
                    size_of_headers: u32::from_le_bytes(w[32..36].try_into().unwrap()),
                    checksum: u32::from_le_bytes(w[36..40].try_into().unwrap()),
                    subsystem: u16::from_le_bytes(w[40..42].try_into().unwrap()),
                    dll_characteristics: DllCharacteristics::from_bits_truncate(u16::from_le_bytes(
                        w[42..44].try_into().unwrap(),
                    )),
                    size_of_stack_reserve: u32::from_le_bytes(w[44..48].try_into().unwrap()),
                    size_of_stack_commit: u32::from_le_bytes(w[48..52].try_into().unwrap()),
                    size_of_heap_reserve: u32::from_le_bytes(w[52..56].try_into().unwrap()),
                    size_of_heap_commit: u32::from_le_bytes(w[56..60].try_into().unwrap()),
                    loader_flags: u32::from_le_bytes(w[60..64].try_into().unwrap()),
                    number_of_rva_and_sizes: u32::from_le_bytes(w[64..68].try_into().unwrap()),
                };
                let data_directories =
                    parse_data_directories(region.get(96..).ok_or(PeError::BadOptionalMagic)?)
                        .ok_or(PeError::BadOptionalMagic)?;
                Ok(OptionalHeader::Pe32(OptionalHeader32 {
                    standard,
                    windows,
                    data_directories,
                }))
            }
            MAGIC_PE32_PLUS => {
                let standard = StandardFields::parse(region).ok_or(PeError::BadOptionalMagic)?;
                let w = region.get(24..112).ok_or(PeError::BadOptionalMagic)?;
                let windows = WindowsFields64 {
                    image_base: u64::from_le_bytes(w[0..8].try_into().unwrap()),
                    section_alignment: u32::from_le_bytes(w[8..12].try_into().unwrap()),
                    file_alignment: u32::from_le_bytes(w[12..16].try_into().unwrap()),
                    size_of_image: u32::from_le_bytes(w[32..36].try_into().unwrap()),
                    size_of_headers: u32::from_le_bytes(w[36..40].try_into().unwrap()),
                    checksum: u32::from_le_bytes(w[40..44].try_into().unwrap()),
                    subsystem: u16::from_le_bytes(w[44..46].try_into().unwrap()),
                    dll_characteristics: DllCharacteristics::from_bits_truncate(u16::from_le_bytes(
                        w[46..48].try_into().unwrap(),
                    )),
                    size_of_stack_reserve: u64::from_le_bytes(w[48..56].try_into().unwrap()),
                    size_of_stack_commit: u64::from_le_bytes(w[56..64].try_into().unwrap()),
                    size_of_heap_reserve: u64::from_le_bytes(w[64..72].try_into().unwrap()),
                    size_of_heap_commit: u64::from_le_bytes(w[72..80].try_into().unwrap()),
                    loader_flags: u32::from_le_bytes(w[80..84].try_into().unwrap()),
                    number_of_rva_and_sizes: u32::from_le_bytes(w[84..88].try_into().unwrap()),
                };
                let data_directories =
                    parse_data_directories(region.get(112..).ok_or(PeError::BadOptionalMagic)?)
                        .ok_or(PeError::BadOptionalMagic)?;
                Ok(OptionalHeader::Pe64(OptionalHeader64 {
                    standard,
                    windows,
                    data_directories,
                }))
            }
            _ if strict => Err(PeError::BadOptionalMagic),
            _ => {
                log::warn!("optional header magic 0x{magic:04x} is unrecognised, accepted leniently as PE32");
                // Lenient: best-effort as PE32, the common case.
                let standard = StandardFields::parse(region).unwrap_or(StandardFields {
                    magic,
                    major_linker_version: 0,
                    minor_linker_version: 0,
                    size_of_code: 0,
                    size_of_initialized_data: 0,
                    size_of_uninitialized_data: 0,
                    address_of_entry_point: 0,
                    base_of_code: 0,
                });
                Ok(OptionalHeader::Pe32(OptionalHeader32 {
                    standard,
                    windows: WindowsFields32 {
                        base_of_data: 0,
                        image_base: 0,
                        section_alignment: 0,
                        file_alignment: 0,
                        size_of_image: 0,
                        size_of_headers: 0,
                        checksum: 0,
                        subsystem: 0,
                        dll_characteristics: DllCharacteristics::empty(),
                        size_of_stack_reserve: 0,
                        size_of_stack_commit: 0,
                        size_of_heap_reserve: 0,
                        size_of_heap_commit: 0,
                        loader_flags: 0,
                        number_of_rva_and_sizes: 0,
                    },
                    data_directories: Vec::new(),
                }))
            }
        }
    }

    pub fn magic(&self) -> u16 {
        match self {
            OptionalHeader::Pe32(h) => h.standard.magic,
            OptionalHeader::Pe64(h) => h.standard.magic,
        }
    }

    pub fn data_directories(&self) -> &[DataDirectory] {
        match self {
            OptionalHeader::Pe32(h) => &h.data_directories,
            OptionalHeader::Pe64(h) => &h.data_directories,
        }
    }

    width_accessor!(image_base);
    width_accessor!(size_of_stack_reserve);
    width_accessor!(size_of_stack_commit);
    width_accessor!(size_of_heap_reserve);
    width_accessor!(size_of_heap_commit);

    pub fn section_alignment(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.windows.section_alignment,
            OptionalHeader::Pe64(h) => h.windows.section_alignment,
        }
    }

    pub fn file_alignment(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.windows.file_alignment,
            OptionalHeader::Pe64(h) => h.windows.file_alignment,
        }
    }

    pub fn size_of_headers(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.windows.size_of_headers,
            OptionalHeader::Pe64(h) => h.windows.size_of_headers,
        }
    }

    pub fn size_of_image(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.windows.size_of_image,
            OptionalHeader::Pe64(h) => h.windows.size_of_image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pe32_optional_header_bytes() -> Vec<u8> {
        let mut buf = vec![0u8; 224];
        buf[0..2].copy_from_slice(&MAGIC_PE32.to_le_bytes());
        buf[28..32].copy_from_slice(&0x0040_0000u32.to_le_bytes()); // image base
        buf[32..36].copy_from_slice(&0x1000u32.to_le_bytes()); // section alignment
        buf[36..40].copy_from_slice(&0x0200u32.to_le_bytes()); // file alignment
        buf
    }

    #[test]
    fn parses_pe32_optional_header() {
        let buf = pe32_optional_header_bytes();
        let header = OptionalHeader::parse(&buf, 224, true).unwrap();
        assert_eq!(header.magic(), MAGIC_PE32);
        assert_eq!(header.image_base(), 0x0040_0000);
        assert_eq!(header.section_alignment(), 0x1000);
        assert_eq!(header.file_alignment(), 0x0200);
        assert_eq!(header.data_directories().len(), NUM_DATA_DIRECTORIES);
    }

    #[test]
    fn strict_mode_rejects_unknown_magic() {
        let mut buf = pe32_optional_header_bytes();
        buf[0..2].copy_from_slice(&0xFFFFu16.to_le_bytes());
        assert_eq!(
            OptionalHeader::parse(&buf, 224, true),
            Err(PeError::BadOptionalMagic)
        );
    }

    #[test]
    fn lenient_mode_accepts_unknown_magic() {
        let mut buf = pe32_optional_header_bytes();
        buf[0..2].copy_from_slice(&0xFFFFu16.to_le_bytes());
        assert!(OptionalHeader::parse(&buf, 224, false).is_ok());
    }
}
