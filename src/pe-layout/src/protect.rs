//! Page-protection derivation: a closed R/W/X truth table over
//! section `Characteristics`, applied through an external page-protection
//! primitive rather than a direct OS call.

use bitflags::bitflags;

use crate::error::{PeError, Result};
use crate::section::SectionCharacteristics;
use crate::view::VirtualModule;

bitflags! {
    /// The derived protection to apply to a region, independent of any
    /// particular OS's numeric protection constants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageProtection: u8 {
        const READ          = 0b0001;
        const WRITE         = 0b0010;
        const EXECUTE       = 0b0100;
        const NOCACHE       = 0b1000;
        const WRITECOMBINE  = 0b0001_0000;
    }
}

/// Derives the protection for a section from its `Characteristics` bits.
/// Closed over the eight R/W/X combinations; a section with none of
/// `MEM_READ`/`MEM_WRITE`/`MEM_EXECUTE` set still gets `READ`, matching
/// the convention that an unreadable mapping is useless to a loader.
pub fn derive_protection(characteristics: SectionCharacteristics) -> PageProtection {
    let mut prot = PageProtection::empty();
    if characteristics.contains(SectionCharacteristics::MEM_EXECUTE) {
        prot |= PageProtection::EXECUTE;
    }
    if characteristics.contains(SectionCharacteristics::MEM_WRITE) {
        prot |= PageProtection::WRITE;
    }
    if characteristics.contains(SectionCharacteristics::MEM_READ) || prot.is_empty() {
        prot |= PageProtection::READ;
    }
    if characteristics.contains(SectionCharacteristics::MEM_NOT_CACHED) {
        prot |= PageProtection::NOCACHE;
    }
    prot
}

/// The headers region (`[0, SizeOfHeaders)`) is always read-only: nothing
/// in the Characteristics model applies to it, and a loader has no reason
/// to execute or write it once relocations and imports are resolved.
pub fn headers_protection() -> PageProtection {
    PageProtection::READ
}

/// The length of the headers region to protect: the file-alignment-rounded
/// `SizeOfHeaders`, not the raw parsed DOS/NT/section-table byte count
/// (`Headers::headers_extent`, which the conversion engine's extent math
/// uses instead). `SizeOfHeaders` is always the larger of the two.
fn headers_protection_len(module: &VirtualModule) -> usize {
    module.headers.optional.size_of_headers() as usize
}

/// External collaborator applying a derived protection to a live mapping.
/// Returns the region's previous protection, the way `VirtualProtect` does.
pub trait PageProtector {
    fn set_protection(
        &self,
        base: usize,
        length: usize,
        desired: PageProtection,
    ) -> Result<PageProtection>;
}

/// Applies the derived protection to the headers and to each section's
/// unaligned `VirtualSize` region. Requires the module to not
/// already be protected.
pub fn protect_image<P: PageProtector>(module: &mut VirtualModule, protector: &P) -> Result<()> {
    if module.status.protected {
        return Err(PeError::AlreadyProtected.into());
    }
    let headers_len = headers_protection_len(module);
    protector.set_protection(0, headers_len, headers_protection())?;
    for section in module.sections.clone() {
        if section.header.virtual_size == 0 {
            continue;
        }
        let prot = derive_protection(section.header.characteristics);
        protector.set_protection(
            section.header.virtual_address as usize,
            section.header.virtual_size as usize,
            prot,
        )?;
    }
    module.status.protected = true;
    Ok(())
}

/// Restores the headers and every section to `READ | WRITE`, the
/// convention for an unprotected, freely-editable mapping. Requires the
/// module to currently be protected.
pub fn unprotect_image<P: PageProtector>(module: &mut VirtualModule, protector: &P) -> Result<()> {
    if !module.status.protected {
        return Err(PeError::NotProtected.into());
    }
    let writable = PageProtection::READ | PageProtection::WRITE;
    let headers_len = headers_protection_len(module);
    protector.set_protection(0, headers_len, writable)?;
    for section in module.sections.clone() {
        if section.header.virtual_size == 0 {
            continue;
        }
        protector.set_protection(
            section.header.virtual_address as usize,
            section.header.virtual_size as usize,
            writable,
        )?;
    }
    module.status.protected = false;
    Ok(())
}
