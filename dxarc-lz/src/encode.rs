//! LZ compression for DX archives.
//!
//! Matches are found with hash chains over 4-byte prefixes. Every input
//! position is inserted; the search walks at most `search_depth` candidates
//! per position, newest first, and stops early once the longest encodable
//! match is found. Matches may overlap the position being encoded.

use crate::{HEADER_SIZE, MAX_DISTANCE, MAX_MATCH, MIN_MATCH};
use dxarc_core::error::{DxArcError, Result};
use tracing::trace;

/// Default number of hash chain candidates examined per position.
pub const DEFAULT_SEARCH_DEPTH: usize = 64;

/// Size of the hash table (power of 2).
const HASH_BITS: u32 = 16;
const HASH_SIZE: usize = 1 << HASH_BITS;

/// Empty slot in the hash head / chain tables.
const NIL: u32 = u32::MAX;

/// LZ encoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzEncoder {
    search_depth: usize,
}

impl LzEncoder {
    /// Create an encoder with the default search depth.
    pub fn new() -> Self {
        Self {
            search_depth: DEFAULT_SEARCH_DEPTH,
        }
    }

    /// Create an encoder examining up to `depth` candidates per position.
    ///
    /// `usize::MAX` makes the search exhaustive within the window.
    pub fn with_search_depth(depth: usize) -> Self {
        Self {
            search_depth: depth.max(1),
        }
    }

    /// Get the configured search depth.
    pub fn search_depth(&self) -> usize {
        self.search_depth
    }

    /// Compress `input` into a self-describing LZ stream.
    pub fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() > u32::MAX as usize {
            return Err(DxArcError::size_mismatch(
                "LZ input",
                u32::MAX as u64,
                input.len() as u64,
            ));
        }

        let keycode = least_frequent_byte(input);

        let mut out = Vec::with_capacity(input.len() + input.len() / 8 + HEADER_SIZE);
        out.extend_from_slice(&(input.len() as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.push(keycode);

        let mut chains = HashChains::new(input.len());
        let mut pos = 0;

        while pos < input.len() {
            let byte = input[pos];

            if byte == keycode {
                out.push(keycode);
                out.push(keycode);
                chains.insert(input, pos);
                pos += 1;
                continue;
            }

            if let Some((length, distance)) = self.find_match(input, pos, &chains) {
                emit_match(&mut out, keycode, length, distance);
                for p in pos..pos + length {
                    chains.insert(input, p);
                }
                pos += length;
            } else {
                out.push(byte);
                chains.insert(input, pos);
                pos += 1;
            }
        }

        if out.len() > u32::MAX as usize {
            return Err(DxArcError::size_mismatch(
                "LZ output",
                u32::MAX as u64,
                out.len() as u64,
            ));
        }
        let total = out.len() as u32;
        out[4..8].copy_from_slice(&total.to_le_bytes());

        trace!(
            "LZ encoded {} -> {} bytes (keycode {:#04x})",
            input.len(),
            out.len(),
            keycode
        );

        Ok(out)
    }

    /// Find the longest earlier match for `input[pos..]`.
    fn find_match(&self, input: &[u8], pos: usize, chains: &HashChains) -> Option<(usize, usize)> {
        if pos + MIN_MATCH > input.len() {
            return None;
        }

        let max_len = (input.len() - pos).min(MAX_MATCH);
        let mut best_len = MIN_MATCH - 1;
        let mut best_dist = 0;

        let mut candidate = chains.head[hash4(input, pos)];
        let mut depth = 0;

        while candidate != NIL && depth < self.search_depth {
            let cand = candidate as usize;
            let dist = pos - cand;
            if dist > MAX_DISTANCE {
                break;
            }

            // Quick rejection on the byte that would extend the best match.
            if input[cand + best_len] == input[pos + best_len] {
                let len = common_prefix(input, cand, pos, max_len);
                if len > best_len {
                    best_len = len;
                    best_dist = dist;
                    if len == max_len {
                        break;
                    }
                }
            }

            candidate = chains.prev[cand];
            depth += 1;
        }

        (best_len >= MIN_MATCH).then_some((best_len, best_dist))
    }
}

impl Default for LzEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compress `input` with the default encoder settings.
pub fn encode(input: &[u8]) -> Result<Vec<u8>> {
    LzEncoder::new().encode(input)
}

/// Hash chain tables: `head` maps a hash to the newest position, `prev`
/// links each position to the previous one with the same hash.
struct HashChains {
    head: Vec<u32>,
    prev: Vec<u32>,
}

impl HashChains {
    fn new(len: usize) -> Self {
        Self {
            head: vec![NIL; HASH_SIZE],
            prev: vec![NIL; len],
        }
    }

    #[inline]
    fn insert(&mut self, input: &[u8], pos: usize) {
        if pos + MIN_MATCH <= input.len() {
            let h = hash4(input, pos);
            self.prev[pos] = self.head[h];
            self.head[h] = pos as u32;
        }
    }
}

#[inline(always)]
fn hash4(input: &[u8], pos: usize) -> usize {
    let word = u32::from_le_bytes([input[pos], input[pos + 1], input[pos + 2], input[pos + 3]]);
    (word.wrapping_mul(2654435761) >> (32 - HASH_BITS)) as usize
}

#[inline]
fn common_prefix(input: &[u8], a: usize, b: usize, max_len: usize) -> usize {
    input[a..]
        .iter()
        .zip(&input[b..])
        .take(max_len)
        .take_while(|(x, y)| x == y)
        .count()
}

/// Least frequent byte value; ties go to the lowest value.
fn least_frequent_byte(input: &[u8]) -> u8 {
    let mut counts = [0u64; 256];
    for &b in input {
        counts[b as usize] += 1;
    }

    let mut keycode = 0u8;
    let mut lowest = u64::MAX;
    for (value, &count) in counts.iter().enumerate() {
        if count < lowest {
            lowest = count;
            keycode = value as u8;
        }
    }
    keycode
}

fn emit_match(out: &mut Vec<u8>, keycode: u8, length: usize, distance: usize) {
    let conbo = length - MIN_MATCH;
    let index = distance - 1;

    let (size_class, index_bytes) = if index <= 0xFF {
        (0u8, 1)
    } else if index <= 0xFFFF {
        (1u8, 2)
    } else {
        (2u8, 3)
    };

    let mut code = (((conbo & 0x1F) as u8) << 3) | size_class;
    if conbo > 0x1F {
        code |= 0x04;
    }
    // Largest possible code is 0xFE, so the bump cannot overflow.
    if code >= keycode {
        code += 1;
    }

    out.push(keycode);
    out.push(code);
    if conbo > 0x1F {
        out.push((conbo >> 5) as u8);
    }
    out.extend_from_slice(&(index as u32).to_le_bytes()[..index_bytes]);
}
