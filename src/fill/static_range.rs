//! Filler over an immutable in-memory byte range.

use crate::{
    errors::FillError,
    fill::{FillStep, Filler},
};

/// Serves a static byte range, chunk by chunk.
///
/// Used for assets compiled into the binary and as the raw-copy path for
/// pre-compressed assets when the client accepts `gzip`.
///
/// # Examples
/// ```
/// use thermoweb::fill::{Filler, FillStep, StaticFiller};
///
/// let mut filler = StaticFiller::new(b"hello world");
/// let mut chunk = [0; 8];
///
/// assert_eq!(filler.fill(&mut chunk, 0).unwrap(), FillStep::Data(8));
/// assert_eq!(&chunk, b"hello wo");
/// assert_eq!(filler.fill(&mut chunk, 8).unwrap(), FillStep::Data(3));
/// assert_eq!(&chunk[..3], b"rld");
/// ```
#[derive(Debug)]
pub struct StaticFiller {
    bytes: &'static [u8],
}

impl StaticFiller {
    /// Creates a filler over `bytes`.
    #[inline]
    pub const fn new(bytes: &'static [u8]) -> Self {
        Self { bytes }
    }
}

impl Filler for StaticFiller {
    fn fill(&mut self, chunk: &mut [u8], index: usize) -> Result<FillStep, FillError> {
        debug_assert!(index <= self.bytes.len());

        let rest = &self.bytes[index.min(self.bytes.len())..];
        let n = rest.len().min(chunk.len());
        chunk[..n].copy_from_slice(&rest[..n]);

        Ok(FillStep::Data(n))
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.bytes.len()
    }
}
