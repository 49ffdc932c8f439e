//! The SHA-1 hashing scheme.
//!
//! Hashes look like `$sha1$48000$mHh0IIOQ$YS/Lw0PKCThSEBBYqP37zXySQ3cC`:
//! the `$sha1$` prefix, a rounds count, a salt of up to 64 characters
//! and a 28-character sum. The key is an iterated HMAC-SHA-1 keyed by
//! the password.

use hmac::{Mac, SimpleHmac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::cryptoutil::permute;
use crate::encoding::HASH64;
use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::unmarshal::unmarshal;

pub const PREFIX: &str = "$sha1$";

pub const MAX_SALT_LENGTH: usize = 64;
pub const DEFAULT_SALT_LENGTH: usize = 8;

pub const MIN_ROUNDS: u32 = 1;
/// A placeholder rounds count asking for a randomized count near the
/// random hint.
pub const RANDOM_ROUNDS: u32 = u32::MAX;
pub const DEFAULT_ROUNDS: u32 = RANDOM_ROUNDS;

const SUM_LENGTH: usize = 28;
const RANDOM_HINT: u32 = 24680;

const PERM_FINAL: [u8; 21] = [
    2, 1, 0, 5, 4, 3, 8, 7, 6, 11, 10, 9, 14, 13, 12, 17, 16, 15, 0, 19, 18,
];

// SimpleHmac keeps the key across finalize_reset, so the mac is built
// once and re-used for every iteration.
type HmacSha1 = SimpleHmac<Sha1>;

fn rand_rounds() -> u32 {
    RANDOM_HINT - (OsRng.next_u32() % (RANDOM_HINT / 4))
}

/// Derives a SHA-1 key from the password, salt and rounds count.
pub fn key(password: &[u8], salt: &[u8], mut rounds: u32) -> Result<Vec<u8>> {
    if salt.len() > MAX_SALT_LENGTH {
        return Err(Error::SaltLength(salt.len()));
    }
    if let Some(i) = HASH64.index_any_invalid(salt) {
        return Err(Error::SaltChar(salt[i] as char));
    }
    if rounds == RANDOM_ROUNDS {
        rounds = rand_rounds();
    }
    if rounds < MIN_ROUNDS {
        return Err(Error::Rounds(rounds));
    }
    let mut mac =
        HmacSha1::new_from_slice(password).map_err(|e| Error::KeyDerivation(e.to_string()))?;
    mac.update(salt);
    mac.update(PREFIX.as_bytes());
    mac.update(rounds.to_string().as_bytes());
    let mut b = mac.finalize_reset().into_bytes();
    for _ in 1..rounds {
        mac.update(&b);
        b = mac.finalize_reset().into_bytes();
    }
    Ok(permute(&b, &PERM_FINAL))
}

#[derive(Default)]
struct Scheme {
    prefix: String,
    rounds: u32,
    salt: Vec<u8>,
    sum: [u8; SUM_LENGTH],
}

impl Record for Scheme {
    fn describe(b: &mut SchemaBuilder<Self>) {
        b.text(
            "prefix",
            "",
            |s| Ok(s.prefix.clone()),
            |s, text| {
                if text != PREFIX {
                    return Err(format!("unsupported prefix {:?}", text));
                }
                s.prefix = PREFIX.to_string();
                Ok(())
            },
            |s| s.prefix.is_empty(),
        );
        b.uint32("rounds", "", |s| s.rounds, |s, v| s.rounds = v);
        b.bytes("salt", "", |s| &s.salt, |s| &mut s.salt);
        b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
    }
}

fn sum_of(password: &[u8], salt: &[u8], rounds: u32) -> Result<[u8; SUM_LENGTH]> {
    let derived = key(password, salt, rounds)?;
    let mut sum = [0u8; SUM_LENGTH];
    HASH64.encode_le(&derived, &mut sum);
    Ok(sum)
}

/// Returns the SHA-1 hash of the password with a random salt and the
/// given rounds count.
pub fn new_hash(password: &str, mut rounds: u32) -> Result<String> {
    if rounds == RANDOM_ROUNDS {
        rounds = rand_rounds();
    }
    let salt = HASH64.rand(DEFAULT_SALT_LENGTH);
    let sum = sum_of(password.as_bytes(), &salt, rounds)?;
    marshal(&Scheme {
        prefix: PREFIX.to_string(),
        rounds,
        salt,
        sum,
    })
}

/// Returns the salt and rounds count of a SHA-1 hash.
pub fn params(hash: &str) -> Result<(Vec<u8>, u32)> {
    let scheme: Scheme = unmarshal(hash)?;
    Ok((scheme.salt, scheme.rounds))
}

/// Compares the SHA-1 hash with a new hash derived from the password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let scheme: Scheme = unmarshal(hash)?;
    let sum = sum_of(password.as_bytes(), &scheme.salt, scheme.rounds)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "$sha1$48000$mHh0IIOQ$YS/Lw0PKCThSEBBYqP37zXySQ3cC";

    #[test]
    fn checks_known_hashes() {
        assert_eq!(check(HASH, "password"), Ok(()));
        assert_eq!(check(HASH, "test"), Err(Error::PasswordMismatch));
    }

    #[test]
    fn extracts_params() {
        let (salt, rounds) = params(HASH).unwrap();
        assert_eq!(salt, b"mHh0IIOQ");
        assert_eq!(rounds, 48000);
    }

    #[test]
    fn new_hashes_verify() {
        let hash = new_hash("password", 100).unwrap();
        assert!(hash.starts_with("$sha1$100$"));
        assert_eq!(check(&hash, "password"), Ok(()));
        assert_eq!(check(&hash, "test"), Err(Error::PasswordMismatch));
    }

    #[test]
    fn random_rounds_stay_near_the_hint() {
        let hash = new_hash("password", RANDOM_ROUNDS).unwrap();
        let (_, rounds) = params(&hash).unwrap();
        assert!((RANDOM_HINT - RANDOM_HINT / 4..=RANDOM_HINT).contains(&rounds));
        assert_eq!(check(&hash, "password"), Ok(()));
    }

    #[test]
    fn rejects_bad_params() {
        assert_eq!(new_hash("pw", 0), Err(Error::Rounds(0)));
        assert_eq!(key(b"pw", &[b'a'; 65], 100), Err(Error::SaltLength(65)));
    }
}
