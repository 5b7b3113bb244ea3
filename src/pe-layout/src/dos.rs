use crate::config::ParseOptions;
use crate::error::PeError;

/// Size, in bytes, of the fixed MS-DOS header fields this crate cares about.
/// Everything else in the 64-byte on-disk `IMAGE_DOS_HEADER` besides
/// `e_magic` and `e_lfanew` is legacy MS-DOS loader trivia with no bearing
/// on PE structure; callers that need it can read it out of the DOS stub
/// directly.
pub const DOS_HEADER_SIZE: usize = 64;
const DOS_SIGNATURE: u16 = 0x5A4D; // "MZ"
const E_LFANEW_OFFSET: usize = 0x3c;

/// Typed view over the two fields of the DOS header this crate uses, plus
/// the `[DOS_HEADER_SIZE, e_lfanew)` stub gap that separates it from the NT
/// headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosHeader {
    pub e_magic: u16,
    pub e_lfanew: u32,
}

impl DosHeader {
    /// Reads the DOS header out of `bytes` starting at offset 0.
    ///
    /// `bytes` is not required to hold more than `DOS_HEADER_SIZE`; whether
    /// the stub and NT headers are actually reachable is validated
    /// separately once `e_lfanew` is known.
    pub fn parse(bytes: &[u8], opts: ParseOptions) -> Result<DosHeader, PeError> {
        if bytes.len() < DOS_HEADER_SIZE {
            return Err(PeError::BufferTooShortForDosHeader);
        }
        let e_magic = u16::from_le_bytes(bytes[0..2].try_into().unwrap());
        let e_lfanew = u32::from_le_bytes(
            bytes[E_LFANEW_OFFSET..E_LFANEW_OFFSET + 4]
                .try_into()
                .unwrap(),
        );
        if e_magic != DOS_SIGNATURE {
            if !opts.accept_invalid_signatures {
                return Err(PeError::BadDosSignature);
            }
            log::warn!("DOS signature 0x{e_magic:04x} is not 'MZ', accepted leniently");
        }
        Ok(DosHeader { e_magic, e_lfanew })
    }

    /// Length in bytes of the DOS stub: the gap between the fixed DOS
    /// header and `e_lfanew`. Zero-length is valid.
    pub fn stub_len(&self) -> Option<usize> {
        (self.e_lfanew as usize).checked_sub(DOS_HEADER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_header(e_lfanew: u32) -> Vec<u8> {
        let mut buf = vec![0u8; DOS_HEADER_SIZE];
        buf[0..2].copy_from_slice(&DOS_SIGNATURE.to_le_bytes());
        buf[E_LFANEW_OFFSET..E_LFANEW_OFFSET + 4].copy_from_slice(&e_lfanew.to_le_bytes());
        buf
    }

    #[test]
    fn parses_valid_header() {
        let buf = minimal_header(DOS_HEADER_SIZE as u32);
        let dos = DosHeader::parse(&buf, ParseOptions::strict()).unwrap();
        assert_eq!(dos.e_magic, DOS_SIGNATURE);
        assert_eq!(dos.stub_len(), Some(0));
    }

    #[test]
    fn strict_mode_rejects_bad_magic() {
        let mut buf = minimal_header(DOS_HEADER_SIZE as u32);
        buf[0..2].copy_from_slice(b"ZM");
        assert_eq!(
            DosHeader::parse(&buf, ParseOptions::strict()),
            Err(PeError::BadDosSignature)
        );
    }

    #[test]
    fn lenient_mode_accepts_bad_magic() {
        let mut buf = minimal_header(DOS_HEADER_SIZE as u32);
        buf[0..2].copy_from_slice(b"ZM");
        assert!(DosHeader::parse(&buf, ParseOptions::lenient()).is_ok());
    }

    #[test]
    fn too_short_buffer_is_rejected() {
        let buf = vec![0u8; 10];
        assert_eq!(
            DosHeader::parse(&buf, ParseOptions::strict()),
            Err(PeError::BufferTooShortForDosHeader)
        );
    }
}
