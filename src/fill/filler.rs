//! The resumable body-filler contract.
//!
//! Response bodies are not materialized up front. Instead a [`Filler`] is
//! asked repeatedly for the next slice of the body, each call receiving a
//! caller-owned chunk buffer and the absolute offset the previous calls
//! have reached. This keeps peak memory at one chunk regardless of body
//! size and lets the connection writer pace output at socket speed.

use crate::errors::FillError;

/// Outcome of a single [`Filler::fill`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStep {
    /// `n` bytes were written to the front of the chunk buffer.
    ///
    /// `Data(0)` is only valid once the filler has produced its full
    /// declared length; the writer treats it as end of body.
    Data(usize),

    /// Nothing was written because the next indivisible piece of the body
    /// is larger than the chunk buffer. The caller must retry with a
    /// larger buffer at the same offset.
    Retry,
}

/// A resumable producer of response body bytes.
///
/// # Contract
///
/// * `index` is the total number of body bytes produced by previous
///   calls. The writer only ever advances it by the returned `Data(n)`,
///   so a filler observes a strictly non-decreasing, gap-free sequence
///   of offsets.
/// * The sum of all returned `Data(n)` must equal the declared content
///   length exactly. Producing more is a logic error; producing less
///   (returning `Data(0)` early) truncates the response on the wire.
/// * After [`FillStep::Retry`] the next call repeats the same `index`
///   with a larger buffer. Fillers must not consume input speculatively
///   before knowing the piece fits.
///
/// Fillers hold per-response state (decoder position, substitution
/// cursor) and are therefore `&mut self`; a new filler is built for
/// every response.
pub trait Filler: Send {
    /// Produces the next body bytes starting at absolute offset `index`.
    fn fill(&mut self, chunk: &mut [u8], index: usize) -> Result<FillStep, FillError>;

    /// Total number of body bytes this filler will produce.
    fn len(&self) -> usize;

    /// Checks whether the body is empty.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Drives a filler to completion the way the connection writer does,
    /// collecting the produced bytes. Starts with `chunk` capacity and
    /// doubles it on `Retry` up to `max_chunk`.
    pub(crate) fn drain(
        filler: &mut dyn Filler,
        chunk: usize,
        max_chunk: usize,
    ) -> Result<Vec<u8>, FillError> {
        let declared = filler.len();
        let mut buf = vec![0; chunk];
        let mut out = Vec::new();

        while out.len() < declared {
            match filler.fill(&mut buf, out.len())? {
                FillStep::Data(0) => break,
                FillStep::Data(n) => {
                    assert!(n <= buf.len(), "filler overran the chunk buffer");
                    out.extend_from_slice(&buf[..n]);
                }
                FillStep::Retry => {
                    assert!(buf.len() < max_chunk, "filler stuck at max chunk size");
                    buf.resize((buf.len() * 2).min(max_chunk), 0);
                }
            }
        }

        assert!(
            out.len() <= declared,
            "filler produced past its declared length"
        );
        Ok(out)
    }
}
