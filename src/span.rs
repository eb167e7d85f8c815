use std::ops::Range;

use miette::SourceSpan;

/// Position relative to start of source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Idx(pub usize);

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct Span {
    offs: Idx,
    len: usize,
}

impl Span {
    pub fn new(offs: Idx, len: usize) -> Self {
        Span { offs, len }
    }

    /// Span used for lines which were not read from a source file.
    pub fn dummy() -> Self {
        Span::default()
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn end(&self) -> usize {
        self.offs.0 + self.len
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(&self, other: Span) -> Span {
        let start = self.offs().min(other.offs());
        let end = self.end().max(other.end());
        Span::new(Idx(start), end - start)
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.offs()..value.end()
    }
}
