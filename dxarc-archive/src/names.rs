//! Name table entries and code page handling.
//!
//! A name entry is laid out as
//!
//! ```text
//! u16   length in 4-byte units
//! u16   parity (wrapping sum of the upper-cased bytes)
//! [u8]  upper-cased name, NUL padded to 4 * length
//! [u8]  original name, NUL padded to 4 * length
//! ```
//!
//! The upper-cased copy feeds key derivation; the original copy is the
//! path component shown to users.

use crate::table::{read_u16, record};
use dxarc_core::error::{DxArcError, Result};
use encoding_rs::{SHIFT_JIS, UTF_8};
use std::borrow::Cow;
use tracing::warn;

/// Code page identifier for UTF-8.
pub const CODE_PAGE_UTF8: u32 = 65001;

/// Code page identifier for Shift_JIS (CP932).
pub const CODE_PAGE_SHIFT_JIS: u32 = 932;

/// Character encoding of archive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameEncoding {
    /// UTF-8 (code page 65001).
    #[default]
    Utf8,
    /// Shift_JIS (code page 932).
    ShiftJis,
}

impl NameEncoding {
    /// Map a header code page; anything but 932 is treated as UTF-8.
    pub fn from_code_page(code_page: u32) -> Self {
        if code_page == CODE_PAGE_SHIFT_JIS {
            NameEncoding::ShiftJis
        } else {
            NameEncoding::Utf8
        }
    }

    /// Code page written to the header.
    pub fn code_page(self) -> u32 {
        match self {
            NameEncoding::Utf8 => CODE_PAGE_UTF8,
            NameEncoding::ShiftJis => CODE_PAGE_SHIFT_JIS,
        }
    }

    /// The encoding tried when this one fails to decode.
    pub fn fallback(self) -> Self {
        match self {
            NameEncoding::Utf8 => NameEncoding::ShiftJis,
            NameEncoding::ShiftJis => NameEncoding::Utf8,
        }
    }

    fn decode_strict(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        let encoding = match self {
            NameEncoding::Utf8 => UTF_8,
            NameEncoding::ShiftJis => SHIFT_JIS,
        };
        encoding.decode_without_bom_handling_and_without_replacement(bytes)
    }

    /// Decode a name, falling back to the other encoding and finally to a
    /// lossy decode.
    pub fn decode(self, bytes: &[u8]) -> String {
        if let Some(text) = self.decode_strict(bytes) {
            return text.into_owned();
        }
        if let Some(text) = self.fallback().decode_strict(bytes) {
            return text.into_owned();
        }

        warn!("Name {:02x?} is neither UTF-8 nor Shift_JIS", bytes);
        match self {
            NameEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            NameEncoding::ShiftJis => SHIFT_JIS.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }

    /// Encode a name, failing on characters the code page cannot represent.
    pub fn encode(self, name: &str) -> Result<Vec<u8>> {
        match self {
            NameEncoding::Utf8 => Ok(name.as_bytes().to_vec()),
            NameEncoding::ShiftJis => {
                let (bytes, _, unmappable) = SHIFT_JIS.encode(name);
                if unmappable {
                    return Err(DxArcError::encoding_error(format!(
                        "{name:?} cannot be represented in Shift_JIS"
                    )));
                }
                Ok(bytes.into_owned())
            }
        }
    }

    /// Upper-case ASCII letters, leaving multi-byte characters untouched.
    ///
    /// Shift_JIS trail bytes can fall in the ASCII letter range, so they are
    /// skipped after a lead byte.
    pub fn to_upper(self, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len());
        let mut iter = bytes.iter().copied();
        while let Some(b) = iter.next() {
            out.push(b.to_ascii_uppercase());
            if self == NameEncoding::ShiftJis && is_sjis_lead(b) {
                if let Some(trail) = iter.next() {
                    out.push(trail);
                }
            }
        }
        out
    }
}

fn is_sjis_lead(b: u8) -> bool {
    matches!(b, 0x81..=0x9F | 0xE0..=0xFC)
}

/// A name entry borrowed from the name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameEntry<'a> {
    /// Upper-cased name without padding.
    pub upper: &'a [u8],
    /// Original name without padding.
    pub original: &'a [u8],
    /// Stored parity.
    pub parity: u16,
}

impl<'a> NameEntry<'a> {
    /// Parse the entry at `offset` of the name table.
    pub fn parse(table: &'a [u8], offset: u64) -> Result<Self> {
        let prefix = record(table, "name", offset, 4)?;
        let units = read_u16(prefix, 0) as usize;
        let parity = read_u16(prefix, 2);

        let body = record(table, "name", offset + 4, units * 8)?;
        let (upper, original) = body.split_at(units * 4);

        Ok(Self {
            upper: until_nul(upper, offset)?,
            original: until_nul(original, offset)?,
            parity,
        })
    }

    /// Decode the original name.
    pub fn name(&self, encoding: NameEncoding) -> String {
        encoding.decode(self.original)
    }
}

fn until_nul(bytes: &[u8], offset: u64) -> Result<&[u8]> {
    bytes
        .iter()
        .position(|&b| b == 0)
        .map(|end| &bytes[..end])
        .ok_or_else(|| {
            DxArcError::invalid_header(format!(
                "unexpected terminator in name entry at offset {offset}"
            ))
        })
}

/// Wrapping byte sum used as the name parity.
pub fn parity(upper: &[u8]) -> u16 {
    upper
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}

/// Append a name entry for the encoded name `original` to `out`.
pub fn write_name_entry(out: &mut Vec<u8>, original: &[u8], encoding: NameEncoding) -> Result<()> {
    let units = original.len() / 4 + 1;
    let units = u16::try_from(units).map_err(|_| {
        DxArcError::encoding_error(format!("name of {} bytes is too long", original.len()))
    })?;
    let padded = units as usize * 4;
    let upper = encoding.to_upper(original);

    out.extend_from_slice(&units.to_le_bytes());
    out.extend_from_slice(&parity(&upper).to_le_bytes());
    for name in [&upper, original] {
        out.extend_from_slice(name);
        out.resize(out.len() + padded - name.len(), 0);
    }
    Ok(())
}
