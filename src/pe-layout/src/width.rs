//! Address-width polymorphism.
//!
//! Only the Optional Header's Windows-specific fields actually vary by
//! width (`ImageBase`, the stack/heap reserve and commit sizes);
//! everything else in the header model is width-invariant. `OptionalHeader`
//! carries the two widths as enum variants (`Pe32`/`Pe64` structs in
//! `optional.rs`) and `width_accessor!` below generates the matching
//! dispatch for each such field.

/// Optional-header magic for a 32-bit (PE32) image.
pub const MAGIC_PE32: u16 = 0x010B;
/// Optional-header magic for a 64-bit (PE32+) image.
pub const MAGIC_PE32_PLUS: u16 = 0x020B;

/// Generates a pair of width-dispatching accessor methods on
/// `OptionalHeader`, one delegating to the `Pe32` field and one to the
/// `Pe64` field, both returning `u64` so callers don't need to match on
/// width for values that always fit.
#[macro_export]
macro_rules! width_accessor {
    ($field:ident) => {
        paste::paste! {
            pub fn $field(&self) -> u64 {
                match self {
                    OptionalHeader::Pe32(h) => h.windows.$field.into(),
                    OptionalHeader::Pe64(h) => h.windows.$field.into(),
                }
            }
        }
    };
}
