//! Filler that inflates a stored gzip member on the fly.
//!
//! Assets are kept gzip-compressed in flash-friendly `static` storage.
//! Clients that accept `gzip` get the stored bytes verbatim (see
//! [`StaticFiller`](crate::fill::StaticFiller)); everyone else gets this
//! filler, which decompresses into each chunk as it is requested so the
//! full decompressed asset never exists in memory.

use crate::{
    errors::FillError,
    fill::{FillStep, Filler},
};
use flate2::read::GzDecoder;
use std::io::{self, Read};

// Header (10) + deflate data (>= 2) + CRC32 and ISIZE trailer (8).
const MIN_MEMBER_LEN: usize = 20;

/// Streams the decompressed form of a stored gzip member.
///
/// The declared length is taken from the member's ISIZE trailer (the
/// last four bytes, little-endian), so no decompression pass is needed
/// to build response headers. Assets are far below 4 GiB, where ISIZE
/// would wrap.
pub struct GzipFiller {
    decoder: GzDecoder<&'static [u8]>,
    len: usize,
    produced: usize,
}

impl GzipFiller {
    /// Creates a filler over a stored gzip member.
    ///
    /// Fails if `stored` is too short to be a gzip member; corruption in
    /// the deflate stream itself only surfaces later, from
    /// [`fill`](Filler::fill).
    pub fn new(stored: &'static [u8]) -> Result<Self, FillError> {
        Ok(Self {
            decoder: GzDecoder::new(stored),
            len: Self::decompressed_len(stored)?,
            produced: 0,
        })
    }

    /// Reads the decompressed size from the member's ISIZE trailer.
    pub fn decompressed_len(stored: &'static [u8]) -> Result<usize, FillError> {
        if stored.len() < MIN_MEMBER_LEN || stored[..2] != [0x1f, 0x8b] {
            return Err(FillError::Decode(io::Error::new(
                io::ErrorKind::InvalidData,
                "stored data is not a gzip member",
            )));
        }

        let isize_bytes: [u8; 4] = stored[stored.len() - 4..]
            .try_into()
            .unwrap_or([0, 0, 0, 0]);

        Ok(u32::from_le_bytes(isize_bytes) as usize)
    }
}

impl Filler for GzipFiller {
    fn fill(&mut self, chunk: &mut [u8], index: usize) -> Result<FillStep, FillError> {
        debug_assert_eq!(index, self.produced);

        let mut n = 0;
        while n < chunk.len() {
            match self.decoder.read(&mut chunk[n..]) {
                Ok(0) => {
                    // Decoder hit end of stream; the trailer promised more.
                    if self.produced + n < self.len {
                        return Err(FillError::LengthMismatch {
                            declared: self.len,
                            produced: self.produced + n,
                        });
                    }
                    break;
                }
                Ok(m) => n += m,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(FillError::Decode(err)),
            }

            // The stream inflating past ISIZE means the trailer lied.
            if self.produced + n > self.len {
                return Err(FillError::LengthMismatch {
                    declared: self.len,
                    produced: self.produced + n,
                });
            }
        }

        self.produced += n;
        Ok(FillStep::Data(n))
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::filler::test_support::drain;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    fn compress(data: &[u8]) -> &'static [u8] {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap().leak()
    }

    #[test]
    fn trailer_reports_decompressed_len() {
        let stored = compress(b"temperature and humidity");
        assert_eq!(GzipFiller::decompressed_len(stored).unwrap(), 24);
    }

    #[test]
    fn rejects_non_gzip_data() {
        assert!(GzipFiller::decompressed_len(b"plainly not compressed data").is_err());
        assert!(GzipFiller::decompressed_len(b"short").is_err());
    }

    #[test]
    fn round_trip_at_many_capacities() {
        // Larger than one deflate block so partial chunk reads occur.
        let body: Vec<u8> = (0..40_000).map(|i| (i % 251) as u8).collect();
        let stored = compress(&body);

        for chunk in [1, 7, 64, 1436, body.len() + 10] {
            let mut filler = GzipFiller::new(stored).unwrap();
            assert_eq!(filler.len(), body.len());
            assert_eq!(drain(&mut filler, chunk, chunk).unwrap(), body);
        }
    }

    #[test]
    fn corrupt_stream_surfaces_as_decode_error() {
        let mut stored = compress(b"some compressible content here").to_vec();
        let mid = stored.len() / 2;
        stored[mid] ^= 0xff;
        let stored: &'static [u8] = stored.leak();

        let mut filler = GzipFiller::new(stored).unwrap();
        let mut chunk = [0; 64];
        assert!(matches!(
            filler.fill(&mut chunk, 0),
            Err(FillError::Decode(_)) | Err(FillError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn truncated_stream_is_length_mismatch() {
        let stored = compress(b"0123456789 0123456789 0123456789");
        // Keep the trailer, drop deflate bytes before it.
        let mut cut = stored[..stored.len() - 12].to_vec();
        cut.extend_from_slice(&stored[stored.len() - 8..]);
        let cut: &'static [u8] = cut.leak();

        let mut filler = match GzipFiller::new(cut) {
            Ok(f) => f,
            // Short members may fail length validation up front instead.
            Err(_) => return,
        };
        let mut chunk = [0; 128];
        assert!(filler.fill(&mut chunk, 0).is_err());
    }
}
