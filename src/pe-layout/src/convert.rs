//! Layout-conversion engine: `file_to_image`, `image_to_file`,
//! `copy_file`, `copy_image`, each with an allocating form and an `_into`
//! (`_Ex` in the original) form writing into a caller-supplied buffer.
//!
//! All four share one procedure: compute the destination extent, zero-fill
//! the destination, copy the header prefix verbatim, then copy each
//! section's data with the size policy appropriate to the destination
//! layout. The amount actually
//! copied is further bounded by what the source has available, so a
//! section whose `VirtualSize` exceeds its `SizeOfRawData` (or vice versa)
//! never reads past the source buffer; the rest of the destination region
//! stays zero from the initial fill.

use crate::error::{PeError, Result};
use crate::headers::Headers;
use crate::layout::LayoutKind;
use crate::lifecycle::{BufferAllocator, DefaultAllocator};
use crate::section::SectionDescriptor;
use crate::sibling::{SiblingArena, SiblingId};
use crate::status::LoadStatus;
use crate::storage::Storage;
use crate::view::{build_sections, RawPe, VirtualModule};

fn copy_header_prefix(source: &[u8], dest: &mut [u8], headers: &Headers) -> Result<()> {
    let extent = headers.headers_extent();
    let src = source.get(0..extent).ok_or(PeError::SectionTableOutOfBounds)?;
    let dst = dest
        .get_mut(0..extent)
        .ok_or(PeError::DestinationTooSmall)?;
    dst.copy_from_slice(src);
    Ok(())
}

fn copy_section_data(
    source: &[u8],
    dest: &mut [u8],
    sections: &[SectionDescriptor],
    dest_kind: LayoutKind,
) -> Result<()> {
    for s in sections {
        let (dest_offset, dest_len) = match dest_kind {
            LayoutKind::Image => (s.header.virtual_address as usize, s.header.virtual_size as usize),
            LayoutKind::File => (
                s.header.pointer_to_raw_data as usize,
                s.header.size_of_raw_data as usize,
            ),
        };
        if dest_len == 0 {
            continue;
        }
        let copy_len = dest_len.min(s.data_len);
        if copy_len == 0 {
            continue;
        }
        let src_slice = source
            .get(s.data_offset..s.data_offset + copy_len)
            .ok_or(PeError::SectionOutOfBounds)?;
        let dst_slice = dest
            .get_mut(dest_offset..dest_offset + copy_len)
            .ok_or(PeError::DestinationTooSmall)?;
        dst_slice.copy_from_slice(src_slice);
    }
    Ok(())
}

fn convert_into(
    source_bytes: &[u8],
    source_headers: &Headers,
    source_sections: &[SectionDescriptor],
    source_status: LoadStatus,
    dest: &mut [u8],
    dest_kind: LayoutKind,
) -> Result<(Headers, Vec<SectionDescriptor>, LoadStatus)> {
    copy_header_prefix(source_bytes, dest, source_headers)?;
    copy_section_data(source_bytes, dest, source_sections, dest_kind)?;
    let dest_headers = source_headers.clone();
    let dest_sections = build_sections(dest, &dest_headers, dest_kind)?;
    let status = LoadStatus::inherited_owned(source_status);
    Ok((dest_headers, dest_sections, status))
}

/// `dest_kind` is `Image` for `file_to_image`/`copy_image`, `File` for
/// `image_to_file`/`copy_file`.
fn extent_for(headers: &Headers, sections: &[SectionDescriptor], dest_kind: LayoutKind) -> Result<usize> {
    let extent = match dest_kind {
        LayoutKind::Image => crate::extent::max_rva(headers, sections)?,
        LayoutKind::File => crate::extent::max_pa(headers, sections)?,
    };
    Ok(extent as usize)
}

pub fn file_to_image(source: &RawPe) -> Result<VirtualModule<'static>> {
    file_to_image_with(source, &DefaultAllocator)
}

pub fn file_to_image_with<A: BufferAllocator>(
    source: &RawPe,
    alloc: &A,
) -> Result<VirtualModule<'static>> {
    let len = extent_for(&source.headers, &source.sections, LayoutKind::Image)?;
    let mut dest = alloc.reserve_and_commit(len)?;
    let (headers, sections, status) = convert_into(
        source.bytes(),
        &source.headers,
        &source.sections,
        source.status,
        &mut dest,
        LayoutKind::Image,
    )?;
    Ok(VirtualModule::from_owned(
        Storage::Owned(dest),
        headers,
        sections,
        status,
    ))
}

/// In-place form writing into `dest`, which must be at least as long as
/// the computed image extent.
pub fn file_to_image_into<'d>(source: &RawPe, dest: &'d mut [u8]) -> Result<VirtualModule<'d>> {
    let len = extent_for(&source.headers, &source.sections, LayoutKind::Image)?;
    if dest.len() < len {
        return Err(PeError::DestinationTooSmall.into());
    }
    for b in dest.iter_mut() {
        *b = 0;
    }
    let (headers, sections, status) = convert_into(
        source.bytes(),
        &source.headers,
        &source.sections,
        source.status,
        &mut *dest,
        LayoutKind::Image,
    )?;
    Ok(VirtualModule::from_owned(
        Storage::BorrowedMut(dest),
        headers,
        sections,
        status,
    ))
}

pub fn image_to_file(source: &VirtualModule) -> Result<RawPe<'static>> {
    image_to_file_with(source, &DefaultAllocator)
}

pub fn image_to_file_with<A: BufferAllocator>(
    source: &VirtualModule,
    alloc: &A,
) -> Result<RawPe<'static>> {
    let len = extent_for(&source.headers, &source.sections, LayoutKind::File)?;
    let mut dest = alloc.reserve_and_commit(len)?;
    let (headers, sections, status) = convert_into(
        source.bytes(),
        &source.headers,
        &source.sections,
        source.status,
        &mut dest,
        LayoutKind::File,
    )?;
    Ok(RawPe::from_owned(
        Storage::Owned(dest),
        headers,
        sections,
        status,
    ))
}

pub fn image_to_file_into<'d>(source: &VirtualModule, dest: &'d mut [u8]) -> Result<RawPe<'d>> {
    let len = extent_for(&source.headers, &source.sections, LayoutKind::File)?;
    if dest.len() < len {
        return Err(PeError::DestinationTooSmall.into());
    }
    for b in dest.iter_mut() {
        *b = 0;
    }
    let (headers, sections, status) = convert_into(
        source.bytes(),
        &source.headers,
        &source.sections,
        source.status,
        &mut *dest,
        LayoutKind::File,
    )?;
    Ok(RawPe::from_owned(
        Storage::BorrowedMut(dest),
        headers,
        sections,
        status,
    ))
}

pub fn copy_file(source: &RawPe) -> Result<RawPe<'static>> {
    copy_file_with(source, &DefaultAllocator)
}

pub fn copy_file_with<A: BufferAllocator>(source: &RawPe, alloc: &A) -> Result<RawPe<'static>> {
    let len = extent_for(&source.headers, &source.sections, LayoutKind::File)?;
    let mut dest = alloc.reserve_and_commit(len)?;
    let (headers, sections, status) = convert_into(
        source.bytes(),
        &source.headers,
        &source.sections,
        source.status,
        &mut dest,
        LayoutKind::File,
    )?;
    Ok(RawPe::from_owned(
        Storage::Owned(dest),
        headers,
        sections,
        status,
    ))
}

pub fn copy_file_into<'d>(source: &RawPe, dest: &'d mut [u8]) -> Result<RawPe<'d>> {
    let len = extent_for(&source.headers, &source.sections, LayoutKind::File)?;
    if dest.len() < len {
        return Err(PeError::DestinationTooSmall.into());
    }
    for b in dest.iter_mut() {
        *b = 0;
    }
    let (headers, sections, status) = convert_into(
        source.bytes(),
        &source.headers,
        &source.sections,
        source.status,
        &mut *dest,
        LayoutKind::File,
    )?;
    Ok(RawPe::from_owned(
        Storage::BorrowedMut(dest),
        headers,
        sections,
        status,
    ))
}

/// Copies an image-layout module into a fresh owned buffer and splices the
/// copy into `arena` immediately after `source.sibling`. If
/// `source` has no recorded sibling id yet, the copy is inserted
/// unlinked.
pub fn copy_image(
    source: &VirtualModule,
    arena: &mut SiblingArena<()>,
) -> Result<(VirtualModule<'static>, SiblingId)> {
    copy_image_with(source, arena, &DefaultAllocator)
}

pub fn copy_image_with<A: BufferAllocator>(
    source: &VirtualModule,
    arena: &mut SiblingArena<()>,
    alloc: &A,
) -> Result<(VirtualModule<'static>, SiblingId)> {
    let len = extent_for(&source.headers, &source.sections, LayoutKind::Image)?;
    let mut dest = alloc.reserve_and_commit(len)?;
    let (headers, sections, status) = convert_into(
        source.bytes(),
        &source.headers,
        &source.sections,
        source.status,
        &mut dest,
        LayoutKind::Image,
    )?;
    let new_id = match source.sibling {
        Some(after) => arena.insert_after(after, ()),
        None => arena.insert(()),
    };
    let mut module = VirtualModule::from_owned(Storage::Owned(dest), headers, sections, status);
    module.sibling = Some(new_id);
    Ok((module, new_id))
}

pub fn copy_image_into<'d>(
    source: &VirtualModule,
    arena: &mut SiblingArena<()>,
    dest: &'d mut [u8],
) -> Result<(VirtualModule<'d>, SiblingId)> {
    let len = extent_for(&source.headers, &source.sections, LayoutKind::Image)?;
    if dest.len() < len {
        return Err(PeError::DestinationTooSmall.into());
    }
    for b in dest.iter_mut() {
        *b = 0;
    }
    let (headers, sections, status) = convert_into(
        source.bytes(),
        &source.headers,
        &source.sections,
        source.status,
        &mut *dest,
        LayoutKind::Image,
    )?;
    let new_id = match source.sibling {
        Some(after) => arena.insert_after(after, ()),
        None => arena.insert(()),
    };
    let mut module = VirtualModule::from_owned(Storage::BorrowedMut(dest), headers, sections, status);
    module.sibling = Some(new_id);
    Ok((module, new_id))
}
