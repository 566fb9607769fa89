//! Room join codes.
//!
//! A code is five symbols drawn uniformly from an alphabet without the
//! easily confused `I`, `O`, `0` and `1`, so it can be read aloud across
//! a room and typed on a phone. The generator knows nothing about which
//! codes are live; [`generate_unique`] retries against a caller-supplied
//! predicate until it finds a free one.

use std::fmt;

use rand::Rng;

/// Symbols a code may contain.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of symbols in a code.
pub const CODE_LEN: usize = 5;

/// A validated, upper-case room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalizes a client-supplied code: trims whitespace and upper-cases.
    ///
    /// Returns `None` unless the result is exactly [`CODE_LEN`] symbols
    /// from [`ALPHABET`]; such input can never name a live room.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        let valid = normalized.len() == CODE_LEN
            && normalized.bytes().all(|b| ALPHABET.contains(&b));
        valid.then_some(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Draws one code uniformly at random. No uniqueness check.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    let code = (0..CODE_LEN)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect();
    RoomCode(code)
}

/// Draws codes until `is_taken` rejects none.
///
/// With 32^5 (about 33.5 million) possible codes the loop almost always
/// runs once.
pub fn generate_unique<R, F>(rng: &mut R, mut is_taken: F) -> RoomCode
where
    R: Rng + ?Sized,
    F: FnMut(&RoomCode) -> bool,
{
    loop {
        let code = generate(rng);
        if !is_taken(&code) {
            return code;
        }
        tracing::debug!(%code, "room code collision, retrying");
    }
}
