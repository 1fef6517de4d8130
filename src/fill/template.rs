//! Filler that substitutes `%NAME%` placeholders while streaming.
//!
//! Pages are stored with placeholders (`%TEMP%`, `%TITLE%`, ...) and the
//! live values are spliced in chunk by chunk. Because response headers go
//! out before the first body byte, the substituted length is computed in
//! a pre-pass over the source, and the streaming pass is written so the
//! two can never disagree.

use crate::{
    errors::FillError,
    fill::{FillStep, Filler},
};
use memchr::memchr;

/// Placeholder delimiter. A placeholder is `MARKER name MARKER` with no
/// intervening marker bytes.
pub const MARKER: u8 = b'%';

/// Streams a source page with `%NAME%` placeholders substituted.
///
/// * A placeholder whose name has a registered replacement becomes that
///   replacement text.
/// * A placeholder with no registered replacement is removed entirely.
/// * A marker with no closing marker after it is ordinary content and is
///   emitted verbatim, so a page can end with a literal `%`.
///
/// A replacement is never split across chunks: if it does not fit in the
/// remaining chunk space, the filler returns what it has so far, or
/// [`FillStep::Retry`] when the chunk is empty.
///
/// # Examples
/// ```
/// use thermoweb::fill::{Filler, TemplateFiller};
///
/// let mut filler = TemplateFiller::new(
///     b"temperature: %TEMP% C",
///     vec![("TEMP", "21.50".to_string())],
/// );
///
/// assert_eq!(filler.len(), "temperature: 21.50 C".len());
/// ```
pub struct TemplateFiller {
    source: &'static [u8],
    replacements: Vec<(&'static str, String)>,

    // Source bytes consumed minus body bytes produced, so the source
    // cursor is always `index + offset`.
    offset: isize,
    len: usize,
}

impl TemplateFiller {
    /// Creates a filler over `source` with the given replacements.
    pub fn new(source: &'static [u8], replacements: Vec<(&'static str, String)>) -> Self {
        let len = substituted_len(source, &replacements);

        Self {
            source,
            replacements,
            offset: 0,
            len,
        }
    }
}

/// Computes the exact body length `source` will substitute to.
///
/// This walks placeholders with the same scanner the streaming pass
/// uses, so the declared `content-length` and the produced byte count
/// always match.
pub fn substituted_len(source: &[u8], replacements: &[(&'static str, String)]) -> usize {
    let mut len = source.len() as isize;
    let mut pos = 0;

    while let Some((start, end)) = next_placeholder(source, pos) {
        let span = (end - start + 1) as isize;
        let name = &source[start + 1..end];

        len += match lookup(replacements, name) {
            Some(replacement) => replacement.len() as isize - span,
            None => -span,
        };
        pos = end + 1;
    }

    len as usize
}

// Finds the next complete `%name%` starting at or after `from`, returning
// the indices of both marker bytes.
#[inline]
fn next_placeholder(source: &[u8], from: usize) -> Option<(usize, usize)> {
    let start = from + memchr(MARKER, &source[from..])?;
    let end = start + 1 + memchr(MARKER, &source[start + 1..])?;

    Some((start, end))
}

#[inline]
fn lookup<'a>(replacements: &'a [(&'static str, String)], name: &[u8]) -> Option<&'a [u8]> {
    replacements
        .iter()
        .find(|(key, _)| key.as_bytes() == name)
        .map(|(_, value)| value.as_bytes())
}

impl Filler for TemplateFiller {
    fn fill(&mut self, chunk: &mut [u8], index: usize) -> Result<FillStep, FillError> {
        let mut pos = (index as isize + self.offset) as usize;
        let mut written = 0;

        debug_assert!(pos <= self.source.len());

        while written < chunk.len() {
            let Some((start, end)) = next_placeholder(self.source, pos) else {
                // No complete placeholder left; the tail (including any
                // lone marker) is ordinary content.
                let rest = &self.source[pos..];
                let n = rest.len().min(chunk.len() - written);
                chunk[written..written + n].copy_from_slice(&rest[..n]);

                return Ok(FillStep::Data(written + n));
            };

            // Verbatim bytes up to the placeholder.
            let verbatim = &self.source[pos..start];
            let n = verbatim.len().min(chunk.len() - written);
            chunk[written..written + n].copy_from_slice(&verbatim[..n]);
            written += n;
            pos += n;

            if n < verbatim.len() {
                return Ok(FillStep::Data(written));
            }

            // The whole replacement must fit, or wait for the next chunk.
            let span = (end - start + 1) as isize;
            let replacement =
                lookup(&self.replacements, &self.source[start + 1..end]).unwrap_or(b"");

            if replacement.len() > chunk.len() - written {
                return Ok(match written {
                    0 => FillStep::Retry,
                    _ => FillStep::Data(written),
                });
            }

            chunk[written..written + replacement.len()].copy_from_slice(replacement);
            written += replacement.len();
            self.offset += span - replacement.len() as isize;
            pos = end + 1;
        }

        Ok(FillStep::Data(written))
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

    fn render(source: &'static [u8], replacements: Vec<(&'static str, String)>) -> String {
        let mut filler = TemplateFiller::new(source, replacements);
        let out = drain(&mut filler, 1436, 8 * 1024).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn substitutes_known_names() {
        let cases = [
            (
                &b"A%X%B%Y%C"[..],
                vec![("X", "1".to_string()), ("Y", "22".to_string())],
                "A1B22C",
            ),
            (
                b"temp: %TEMP%, humid: %HUMID%",
                vec![("TEMP", "21.50".to_string()), ("HUMID", "40.20".to_string())],
                "temp: 21.50, humid: 40.20",
            ),
            (b"%X%", vec![("X", "only".to_string())], "only"),
            (b"no placeholders at all", vec![], "no placeholders at all"),
        ];

        for (source, replacements, result) in cases {
            assert_eq!(render(source, replacements), result);
        }
    }

    #[test]
    fn unknown_names_are_removed() {
        assert_eq!(
            render(b"A%X%B%Y%C", vec![("X", "1".to_string())]),
            "A1BC"
        );
        assert_eq!(render(b"start%GONE%end", vec![]), "startend");
        assert_eq!(render(b"%%", vec![]), "");
    }

    #[test]
    fn lone_marker_is_ordinary_content() {
        assert_eq!(render(b"100% done", vec![]), "100% done");
        assert_eq!(render(b"A%XB", vec![("X", "1".to_string())]), "A%XB");
        assert_eq!(render(b"tail%", vec![]), "tail%");
    }

    #[test]
    fn declared_len_matches_output_at_every_capacity() {
        let sources: [(&[u8], Vec<(&'static str, String)>); 5] = [
            (b"A%X%B%Y%C", vec![("X", "a longer value".to_string())]),
            (b"%A%%B%%C%", vec![("B", "mid".to_string())]),
            (b"plain text 100% plain", vec![]),
            (b"%T%", vec![("T", String::new())]),
            (
                b"<title>%TITLE%</title><p>%ERROR%</p>",
                vec![
                    ("TITLE", "404 Not Found".to_string()),
                    ("ERROR", "no such page".to_string()),
                ],
            ),
        ];

        for (source, replacements) in sources {
            let declared = substituted_len(source, &replacements);

            for chunk in 1..=declared.max(1) + 2 {
                let mut filler = TemplateFiller::new(source, replacements.clone());
                let out = drain(&mut filler, chunk, 16 * 1024).unwrap();
                assert_eq!(
                    out.len(),
                    declared,
                    "source {:?} at chunk capacity {}",
                    source,
                    chunk
                );
            }
        }
    }

    #[test]
    fn replacement_is_never_split() {
        let mut filler = TemplateFiller::new(
            b"ab%X%",
            vec![("X", "0123456789".to_string())],
        );
        let mut chunk = [0; 4];

        // Verbatim prefix fits, replacement does not: partial data, no
        // replacement bytes.
        assert_eq!(filler.fill(&mut chunk, 0).unwrap(), FillStep::Data(2));
        assert_eq!(&chunk[..2], b"ab");

        // Nothing but the replacement left, still too big: retry.
        assert_eq!(filler.fill(&mut chunk, 2).unwrap(), FillStep::Retry);

        // A big enough chunk succeeds at the same offset.
        let mut big = [0; 16];
        assert_eq!(filler.fill(&mut big, 2).unwrap(), FillStep::Data(10));
        assert_eq!(&big[..10], b"0123456789");
    }

    #[test]
    fn empty_replacement_makes_progress_in_tiny_chunks() {
        let mut filler = TemplateFiller::new(b"%GONE%ab", vec![]);
        assert_eq!(filler.len(), 2);

        let out = drain(&mut filler, 1, 1).unwrap();
        assert_eq!(out, b"ab");
    }

    #[test]
    fn consecutive_placeholders() {
        assert_eq!(
            render(
                b"%A%%B%%C%",
                vec![
                    ("A", "1".to_string()),
                    ("B", "2".to_string()),
                    ("C", "3".to_string()),
                ],
            ),
            "123"
        );
    }
}
