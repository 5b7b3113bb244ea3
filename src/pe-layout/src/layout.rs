/// Which of the two canonical PE memory layouts a view addresses sections
/// in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// Sections packed at `FileAlignment`, addressed by raw file offset.
    File,
    /// Sections spread at `SectionAlignment`, addressed by RVA.
    Image,
}
