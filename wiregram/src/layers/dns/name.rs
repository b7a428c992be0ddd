// SPDX-License-Identifier: MIT OR Apache-2.0

//! DNS domain names and the message-wide name compression scheme.
//!
//! A domain name is a sequence of labels terminated by the zero-length
//! root label. On the wire a name may end in a 2-byte *compression
//! pointer* referring back to an earlier occurrence of the same label
//! suffix elsewhere in the message; decoding follows such pointers
//! (backwards only), and encoding maintains a dictionary of every label
//! suffix written so far so later names can point at them.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;

/// The maximum length of a single label, in bytes.
pub const MAX_LABEL_LEN: usize = 63;

/// A compression pointer's 14-bit offset ceiling.
const POINTER_MAX_OFFSET: usize = 0x3FFF;

/// An error building a [`DnsName`] from text or labels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DnsNameError {
    reason: &'static str,
}

impl fmt::Display for DnsNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid domain name: {}", self.reason)
    }
}

impl std::error::Error for DnsNameError {}

/// One label of a domain name: 1 to 63 arbitrary bytes.
///
/// Labels compare and hash case-insensitively (ASCII), matching the
/// equality rule for domain names; the original spelling is preserved for
/// writing.
#[derive(Clone, Debug, Eq)]
pub struct DnsLabel(Box<[u8]>);

impl DnsLabel {
    /// Builds a label, rejecting empty or over-long byte strings.
    pub fn new(bytes: &[u8]) -> Result<Self, DnsNameError> {
        if bytes.is_empty() {
            return Err(DnsNameError {
                reason: "empty label",
            });
        }
        if bytes.len() > MAX_LABEL_LEN {
            return Err(DnsNameError {
                reason: "label longer than 63 bytes",
            });
        }
        Ok(DnsLabel(bytes.into()))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl PartialEq for DnsLabel {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Hash for DnsLabel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.len());
        for &b in self.0.iter() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for DnsLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if b.is_ascii_graphic() && b != b'.' && b != b'\\' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\{b:03}")?;
            }
        }
        Ok(())
    }
}

/// A domain name: an ordered label sequence, the empty sequence being the
/// root.
///
/// Two names are equal iff their label sequences are equal
/// case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DnsName {
    labels: Vec<DnsLabel>,
}

impl DnsName {
    /// The root name (zero labels).
    #[inline]
    pub fn root() -> Self {
        DnsName::default()
    }

    #[inline]
    pub fn from_labels(labels: Vec<DnsLabel>) -> Self {
        DnsName { labels }
    }

    #[inline]
    pub fn labels(&self) -> &[DnsLabel] {
        &self.labels
    }

    #[inline]
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// The wire length of the name when written without compression.
    #[inline]
    pub fn uncompressed_len(&self) -> usize {
        self.labels.iter().map(|l| 1 + l.len()).sum::<usize>() + 1
    }

    /// Decodes a name starting at `offset` within `message` (the whole
    /// DNS message, truncated to the datagram's declared length).
    ///
    /// Returns the name and the number of bytes consumed *at the call
    /// site* - a name ending in a compression pointer consumes exactly 2
    /// bytes for the pointer regardless of how long the referenced suffix
    /// is. Returns `None` on any malformed encoding: a read past the end
    /// of `message`, a label length with exactly one of the top bits set,
    /// or a pointer that does not point strictly backwards (the
    /// strictly-decreasing-offset rule is what bounds the recursion).
    pub fn try_parse(message: &[u8], offset: usize) -> Option<(DnsName, usize)> {
        let mut labels = Vec::new();
        let consumed = Self::read_labels(message, offset, &mut labels)?;
        Some((DnsName { labels }, consumed))
    }

    fn read_labels(message: &[u8], mut offset: usize, labels: &mut Vec<DnsLabel>) -> Option<usize> {
        let start = offset;
        loop {
            let length_byte = *message.get(offset)?;
            match length_byte {
                0 => return Some(offset + 1 - start),
                1..=63 => {
                    let label_bytes =
                        message.get(offset + 1..offset + 1 + length_byte as usize)?;
                    labels.push(DnsLabel(label_bytes.into()));
                    offset += 1 + length_byte as usize;
                }
                _ if length_byte & 0xC0 == 0xC0 => {
                    let second = *message.get(offset + 1)?;
                    let target = (((length_byte & 0x3F) as usize) << 8) | second as usize;
                    if target >= offset {
                        // A pointer must refer strictly backwards;
                        // anything else could loop.
                        return None;
                    }
                    Self::read_labels(message, target, labels)?;
                    return Some(offset + 2 - start);
                }
                // 0x40/0x80 prefixes are reserved label types.
                _ => return None,
            }
        }
    }

    /// The wire length of the name when written at `offset_in_message`
    /// with `compression`, updating the dictionary exactly as
    /// [`write`](DnsName::write) would.
    ///
    /// Measuring and writing must walk the same suffixes in the same
    /// order, or the lengths written into enclosing headers would not
    /// match the bytes.
    pub fn compressed_len(
        &self,
        compression: &mut DnsNameCompression,
        offset_in_message: usize,
    ) -> usize {
        let mut length = 0;
        for i in 0..self.labels.len() {
            let suffix = &self.labels[i..];
            if compression.offset_of(suffix).is_some() {
                return length + 2;
            }
            compression.insert(suffix, offset_in_message + length);
            length += 1 + self.labels[i].len();
        }
        length + 1
    }

    /// Appends the wire encoding of the name.
    ///
    /// `offset_in_message` is the name's starting offset relative to the
    /// start of the DNS message; the compression dictionary records and
    /// resolves suffix offsets in that coordinate space.
    pub(crate) fn write(
        &self,
        bytes: &mut Vec<u8>,
        offset_in_message: usize,
        compression: &mut DnsNameCompression,
    ) {
        let mut written = 0;
        for i in 0..self.labels.len() {
            let suffix = &self.labels[i..];
            if let Some(target) = compression.offset_of(suffix) {
                bytes.push(0xC0 | (target >> 8) as u8);
                bytes.push((target & 0xFF) as u8);
                return;
            }
            compression.insert(suffix, offset_in_message + written);
            let label = &self.labels[i];
            bytes.push(label.len() as u8);
            bytes.extend_from_slice(label.as_bytes());
            written += 1 + label.len();
        }
        bytes.push(0);
    }

    /// Appends the wire encoding of the name without compressing and
    /// without recording suffixes.
    pub(crate) fn write_uncompressed(&self, bytes: &mut Vec<u8>) {
        for label in &self.labels {
            bytes.push(label.len() as u8);
            bytes.extend_from_slice(label.as_bytes());
        }
        bytes.push(0);
    }
}

impl fmt::Display for DnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            label.fmt(f)?;
        }
        Ok(())
    }
}

impl FromStr for DnsName {
    type Err = DnsNameError;

    /// Parses a dotted name; a single trailing dot (explicit root) is
    /// accepted, and `"."` or `""` produce the root name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_suffix('.').unwrap_or(s);
        if s.is_empty() {
            return Ok(DnsName::root());
        }

        let labels = s
            .split('.')
            .map(|part| DnsLabel::new(part.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DnsName { labels })
    }
}

/// The per-message compression mode: compress every name that can be
/// compressed, or write every name in full.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DnsNameCompressionMode {
    #[default]
    All,
    Nothing,
}

/// The back-pointer dictionary of one DNS message being written: maps
/// each label-suffix sequence already on the wire to the message offset
/// where it begins.
///
/// Keys compare by value (case-insensitive label equality over the whole
/// remaining sequence), so `["www","Example","com"]` and
/// `["www","example","com"]` share an entry.
#[derive(Debug)]
pub struct DnsNameCompression {
    mode: DnsNameCompressionMode,
    suffixes: HashMap<Vec<DnsLabel>, usize>,
}

impl DnsNameCompression {
    #[inline]
    pub fn new(mode: DnsNameCompressionMode) -> Self {
        DnsNameCompression {
            mode,
            suffixes: HashMap::new(),
        }
    }

    /// The message offset where `labels` was first written, if it was.
    /// Always `None` in [`DnsNameCompressionMode::Nothing`].
    pub fn offset_of(&self, labels: &[DnsLabel]) -> Option<usize> {
        match self.mode {
            DnsNameCompressionMode::All => self.suffixes.get(labels).copied(),
            DnsNameCompressionMode::Nothing => None,
        }
    }

    /// Records `labels` as written at `offset`. First write wins; offsets
    /// beyond the 14-bit pointer range are not recorded; a no-op in
    /// [`DnsNameCompressionMode::Nothing`].
    pub fn insert(&mut self, labels: &[DnsLabel], offset: usize) {
        if self.mode == DnsNameCompressionMode::Nothing || offset > POINTER_MAX_OFFSET {
            return;
        }
        if let Entry::Vacant(entry) = self.suffixes.entry(labels.to_vec()) {
            entry.insert(offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DnsName {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display_dotted_names() {
        let n = name("www.example.com");
        assert_eq!(n.label_count(), 3);
        assert_eq!(n.to_string(), "www.example.com");
        assert_eq!(name("www.example.com."), n);
        assert_eq!(name(".").label_count(), 0);
        assert!("a..b".parse::<DnsName>().is_err());
    }

    #[test]
    fn names_compare_case_insensitively() {
        assert_eq!(name("WWW.Example.COM"), name("www.example.com"));

        use std::collections::hash_map::DefaultHasher;
        let hash = |n: &DnsName| {
            let mut h = DefaultHasher::new();
            n.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&name("WWW.Example.COM")), hash(&name("www.example.com")));
    }

    #[test]
    fn wire_round_trip_uncompressed() {
        let n = name("mail.example.org");
        let mut bytes = Vec::new();
        n.write_uncompressed(&mut bytes);
        assert_eq!(bytes.len(), n.uncompressed_len());

        let (parsed, consumed) = DnsName::try_parse(&bytes, 0).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, n);
    }

    #[test]
    fn pointer_splices_referenced_suffix() {
        // "example.com" at offset 0, then "www" + pointer to offset 0.
        let mut message = Vec::new();
        name("example.com").write_uncompressed(&mut message);
        let second_start = message.len();
        message.extend([3, b'w', b'w', b'w', 0xC0, 0x00]);

        let (parsed, consumed) = DnsName::try_parse(&message, second_start).unwrap();
        assert_eq!(parsed, name("www.example.com"));
        // The pointer itself accounts for 2 bytes at the call site.
        assert_eq!(consumed, 4 + 2);
    }

    #[test]
    fn forward_or_self_pointer_fails() {
        // Pointer at offset 0 referring to offset 0 (self) and to a
        // forward offset.
        assert!(DnsName::try_parse(&[0xC0, 0x00], 0).is_none());
        assert!(DnsName::try_parse(&[0xC0, 0x05, 0, 0, 0, 0], 0).is_none());
    }

    #[test]
    fn reserved_label_prefixes_fail() {
        assert!(DnsName::try_parse(&[0x40, 0x00], 0).is_none());
        assert!(DnsName::try_parse(&[0x80, 0x00], 0).is_none());
    }

    #[test]
    fn truncated_label_fails() {
        let bytes = [5, b'h', b'i'];
        assert!(DnsName::try_parse(&bytes, 0).is_none());
    }

    #[test]
    fn compression_shares_suffixes() {
        let mut compression = DnsNameCompression::new(DnsNameCompressionMode::All);
        let mut bytes = Vec::new();

        name("www.example.com").write(&mut bytes, 0, &mut compression);
        let first_len = bytes.len();
        assert_eq!(first_len, 17);

        let offset = bytes.len();
        name("ftp.example.com").write(&mut bytes, offset, &mut compression);
        // "ftp" literal (4 bytes) + pointer to "example.com" at offset 4.
        assert_eq!(&bytes[first_len..], &[3, b'f', b't', b'p', 0xC0, 0x04]);

        let (parsed, _) = DnsName::try_parse(&bytes, first_len).unwrap();
        assert_eq!(parsed, name("ftp.example.com"));

        // A full repeat collapses to a single pointer.
        let offset = bytes.len();
        name("WWW.EXAMPLE.COM").write(&mut bytes, offset, &mut compression);
        assert_eq!(&bytes[offset..], &[0xC0, 0x00]);
    }

    #[test]
    fn measuring_matches_writing() {
        for (first, second) in [
            ("www.example.com", "ftp.example.com"),
            ("a.b.c.d", "b.c.d"),
            ("x.y", "x.y"),
            ("deep.example.net", "other.example.org"),
        ] {
            let mut measure = DnsNameCompression::new(DnsNameCompressionMode::All);
            let len_1 = name(first).compressed_len(&mut measure, 0);
            let len_2 = name(second).compressed_len(&mut measure, len_1);

            let mut write = DnsNameCompression::new(DnsNameCompressionMode::All);
            let mut bytes = Vec::new();
            name(first).write(&mut bytes, 0, &mut write);
            assert_eq!(bytes.len(), len_1);
            name(second).write(&mut bytes, len_1, &mut write);
            assert_eq!(bytes.len(), len_1 + len_2);
        }
    }

    #[test]
    fn nothing_mode_never_compresses() {
        let mut compression = DnsNameCompression::new(DnsNameCompressionMode::Nothing);
        let mut bytes = Vec::new();
        name("www.example.com").write(&mut bytes, 0, &mut compression);
        name("www.example.com").write(&mut bytes, 17, &mut compression);
        assert_eq!(bytes.len(), 34);
        assert_eq!(&bytes[..17], &bytes[17..]);
    }
}
