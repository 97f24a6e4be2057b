//! Key derivation and the positional XOR keystream.
//!
//! A 7-byte key is derived from a byte string by running CRC-32 over its
//! even-indexed and odd-indexed bytes separately. Each file gets its own key,
//! derived from the archive key string followed by the upper-cased file name
//! and the upper-cased names of its ancestors, innermost first.
//!
//! ```rust
//! use dxarc_archive::key::{ArchiveKey, KeyStringBuffer};
//!
//! let mut source = KeyStringBuffer::new(b"secret");
//! source.push(b"FILE.TXT");
//! source.push(b"DATA");
//! assert_eq!(source.as_bytes(), b"secretFILE.TXTDATA");
//!
//! let key = source.derive();
//! let mut data = *b"hello";
//! key.apply(&mut data, 5);
//! key.apply(&mut data, 5);
//! assert_eq!(&data, b"hello");
//! ```

use dxarc_core::crc::Crc32;

/// Length of a derived key.
pub const KEY_BYTES: usize = 7;

/// Longest key string taken from the user.
pub const KEY_STRING_MAX: usize = 63;

/// Key string used when none is given, and appended to short sources.
pub const DEFAULT_KEY_STRING: &[u8] = b"DXBDXARC\0";

/// Size of the per-file key source buffer, including the reserved marker.
pub const KEY_SOURCE_CAPACITY: usize = 2048;

/// Bytes of the source buffer reserved for the trailing marker.
const KEY_SOURCE_MARKER: usize = 8;

/// Truncate a user key string, substituting the default when absent.
pub fn normalize_key_string(key: Option<&[u8]>) -> Vec<u8> {
    match key {
        Some(key) => key[..key.len().min(KEY_STRING_MAX)].to_vec(),
        None => DEFAULT_KEY_STRING.to_vec(),
    }
}

/// A derived 7-byte XOR key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveKey([u8; KEY_BYTES]);

impl ArchiveKey {
    /// Derive a key from `source`.
    ///
    /// Sources shorter than four bytes are extended with the default key
    /// string first.
    pub fn create(source: &[u8]) -> Self {
        let extended;
        let source = if source.len() < 4 {
            extended = [source, DEFAULT_KEY_STRING].concat();
            &extended[..]
        } else {
            source
        };

        let mut even = Crc32::new();
        let mut odd = Crc32::new();
        for pair in source.chunks(2) {
            even.update(&pair[..1]);
            if let Some(b) = pair.get(1) {
                odd.update(std::slice::from_ref(b));
            }
        }
        let even = even.finalize().to_le_bytes();
        let odd = odd.finalize().to_le_bytes();

        Self([even[0], even[1], even[2], even[3], odd[0], odd[1], odd[2]])
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// The raw key bytes.
    pub fn bytes(&self) -> &[u8; KEY_BYTES] {
        &self.0
    }

    /// XOR `data` with the keystream starting at absolute `position`.
    ///
    /// Applying the same key at the same position twice restores the input.
    pub fn apply(&self, data: &mut [u8], position: u64) {
        let mut index = (position % KEY_BYTES as u64) as usize;
        for byte in data {
            *byte ^= self.0[index];
            index += 1;
            if index == KEY_BYTES {
                index = 0;
            }
        }
    }
}

impl std::fmt::Debug for ArchiveKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ArchiveKey({:02x?})", self.0)
    }
}

/// XOR `data` with `key` at `position`, or leave it untouched when unkeyed.
pub fn apply_keystream(data: &mut [u8], position: u64, key: Option<&ArchiveKey>) {
    if let Some(key) = key {
        key.apply(data, position);
    }
}

/// Per-file key source: key string, file name, then ancestor names.
#[derive(Debug, Clone)]
pub struct KeyStringBuffer {
    bytes: Vec<u8>,
}

impl KeyStringBuffer {
    /// Start a source with the (already normalized) key string.
    pub fn new(key_string: &[u8]) -> Self {
        let mut buffer = Self {
            bytes: Vec::with_capacity(KEY_SOURCE_CAPACITY),
        };
        buffer.push(key_string);
        buffer
    }

    /// Usable length of the source.
    pub const fn limit() -> usize {
        KEY_SOURCE_CAPACITY - KEY_SOURCE_MARKER
    }

    /// Append an upper-cased name, truncating at the buffer limit.
    pub fn push(&mut self, name: &[u8]) -> &mut Self {
        let room = Self::limit() - self.bytes.len();
        self.bytes.extend_from_slice(&name[..name.len().min(room)]);
        self
    }

    /// The accumulated source bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Derive the key for this source.
    pub fn derive(&self) -> ArchiveKey {
        ArchiveKey::create(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_crc(source: &[u8]) -> [u8; KEY_BYTES] {
        let even: Vec<u8> = source.iter().step_by(2).copied().collect();
        let odd: Vec<u8> = source.iter().skip(1).step_by(2).copied().collect();
        let a = Crc32::compute(&even).to_le_bytes();
        let b = Crc32::compute(&odd).to_le_bytes();
        [a[0], a[1], a[2], a[3], b[0], b[1], b[2]]
    }

    #[test]
    fn test_create_splits_even_and_odd_bytes() {
        let key = ArchiveKey::create(b"DXBDXARC\0");
        assert_eq!(key.bytes(), &split_crc(b"DXBDXARC\0"));

        let odd_length = ArchiveKey::create(b"abcde");
        assert_eq!(odd_length.bytes(), &split_crc(b"abcde"));
    }

    #[test]
    fn test_short_source_gets_default_suffix() {
        assert_eq!(
            ArchiveKey::create(b"ab"),
            ArchiveKey::create(b"abDXBDXARC\0")
        );
        assert_eq!(ArchiveKey::create(b""), ArchiveKey::create(DEFAULT_KEY_STRING));
    }

    #[test]
    fn test_derivation_is_pure() {
        let build = || {
            let mut source = KeyStringBuffer::new(b"key");
            source.push(b"FILE.TXT").push(b"B").push(b"A");
            source.derive()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_keystream_is_positional() {
        let key = ArchiveKey::create(b"position");
        let plain: Vec<u8> = (0..100).collect();

        let mut whole = plain.clone();
        key.apply(&mut whole, 1000);

        let mut split = plain.clone();
        let (head, tail) = split.split_at_mut(37);
        key.apply(tail, 1037);
        key.apply(head, 1000);
        assert_eq!(split, whole);

        key.apply(&mut whole, 1000);
        assert_eq!(whole, plain);
    }

    #[test]
    fn test_keystream_cycles_every_seven_bytes() {
        let key = ArchiveKey::from_bytes([1, 2, 3, 4, 5, 6, 7]);
        let mut data = [0u8; 9];
        key.apply(&mut data, 5);
        assert_eq!(data, [6, 7, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_source_truncated_at_limit() {
        let mut source = KeyStringBuffer::new(&[b'k'; 40]);
        source.push(&[b'N'; 3000]).push(b"IGNORED");
        assert_eq!(source.as_bytes().len(), KeyStringBuffer::limit());
        assert_eq!(KeyStringBuffer::limit(), 2040);
    }

    #[test]
    fn test_normalize_key_string() {
        assert_eq!(normalize_key_string(None), DEFAULT_KEY_STRING);
        assert_eq!(normalize_key_string(Some(&[b'x'; 100])).len(), KEY_STRING_MAX);
        assert_eq!(normalize_key_string(Some(b"pw")), b"pw");
    }
}
