//! Short random preset identifiers.

use rand::Rng;

/// Default identifier length, in base-36 characters.
pub const DEFAULT_ID_LENGTH: usize = 10;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a random lowercase base-36 id of `len` characters.
///
/// Ids are not globally unique, only collision-negligible for the sizes a
/// preset list reaches. A zero length is bumped to one character.
#[must_use]
pub fn cheap_random_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len.max(1))
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}
