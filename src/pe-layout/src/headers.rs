//! Structural header model shared by both layouts: DOS header, NT
//! signature, COFF file header, optional header, and the section header
//! table. A `RawPe` and a `VirtualModule` both carry one of these; they
//! differ only in how each `SectionDescriptor`'s `data_offset`/`data_len`
//! are derived from it (see `view.rs`).

use crate::coff::{FileHeader, FILE_HEADER_SIZE};
use crate::config::{ParseOptions, MAX_SECTIONS};
use crate::dos::DosHeader;
use crate::error::PeError;
use crate::optional::OptionalHeader;
use crate::section::{SectionHeader, SECTION_HEADER_SIZE};

const NT_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    pub dos: DosHeader,
    pub file: FileHeader,
    pub optional: OptionalHeader,
    /// Offset of the `"PE\0\0"` signature, i.e. `dos.e_lfanew`.
    pub nt_signature_offset: usize,
    /// Offset of the first section header table entry.
    pub section_table_offset: usize,
}

impl Headers {
    /// Parses DOS header, NT signature, COFF file header and optional
    /// header out of `bytes`.
    pub fn parse(bytes: &[u8], opts: ParseOptions) -> Result<Headers, PeError> {
        let dos = DosHeader::parse(bytes, opts)?;
        let nt_signature_offset = dos.e_lfanew as usize;
        let signature_end = nt_signature_offset
            .checked_add(4)
            .ok_or(PeError::NtHeadersOutOfBounds)?;
        let signature_bytes = bytes
            .get(nt_signature_offset..signature_end)
            .ok_or(PeError::NtHeadersOutOfBounds)?;
        let signature = u32::from_le_bytes(signature_bytes.try_into().unwrap());
        if signature != NT_SIGNATURE {
            if !opts.accept_invalid_signatures {
                return Err(PeError::BadNtSignature);
            }
            log::warn!("NT signature 0x{signature:08x} is not 'PE\\0\\0', accepted leniently");
        }

        let file_header_offset = signature_end;
        let file_bytes = bytes
            .get(file_header_offset..file_header_offset + FILE_HEADER_SIZE)
            .ok_or(PeError::NtHeadersOutOfBounds)?;
        let file = FileHeader::parse(file_bytes).ok_or(PeError::NtHeadersOutOfBounds)?;

        let optional_offset = file_header_offset + FILE_HEADER_SIZE;
        let optional_bytes = bytes
            .get(optional_offset..)
            .ok_or(PeError::NtHeadersOutOfBounds)?;
        let optional = OptionalHeader::parse(
            optional_bytes,
            file.size_of_optional_header,
            !opts.accept_invalid_signatures,
        )?;

        let section_table_offset = optional_offset + file.size_of_optional_header as usize;
        let section_count = (file.number_of_sections as usize).min(MAX_SECTIONS);
        let section_table_end = section_table_offset
            .checked_add(section_count * SECTION_HEADER_SIZE)
            .ok_or(PeError::SectionTableOutOfBounds)?;
        if (section_table_end as u64) > optional.size_of_headers() as u64
            && optional.size_of_headers() != 0
        {
            return Err(PeError::SectionTableOutOfBounds);
        }

        Ok(Headers {
            dos,
            file,
            optional,
            nt_signature_offset,
            section_table_offset,
        })
    }

    /// Number of sections this view will expose, after the
    /// `MAX_SECTIONS` truncation. The
    /// caller is expected to log a diagnostic when this is less than
    /// `self.file.number_of_sections`.
    pub fn section_count(&self) -> usize {
        (self.file.number_of_sections as usize).min(MAX_SECTIONS)
    }

    /// Reads out the raw `SectionHeader` table entries, bounds-checked
    /// against `bytes`.
    pub fn section_headers(&self, bytes: &[u8]) -> Result<Vec<SectionHeader>, PeError> {
        let count = self.section_count();
        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            let offset = self.section_table_offset + i * SECTION_HEADER_SIZE;
            let entry = bytes
                .get(offset..offset + SECTION_HEADER_SIZE)
                .ok_or(PeError::SectionTableOutOfBounds)?;
            headers.push(SectionHeader::parse(entry).ok_or(PeError::SectionTableOutOfBounds)?);
        }
        Ok(headers)
    }

    pub fn header_offset(&self, index: usize) -> usize {
        self.section_table_offset + index * SECTION_HEADER_SIZE
    }

    /// Total size, in bytes, of everything before the first section: DOS
    /// header, stub, NT headers, optional header, section header table.
    pub fn headers_extent(&self) -> usize {
        self.section_table_offset + self.section_count() * SECTION_HEADER_SIZE
    }
}
