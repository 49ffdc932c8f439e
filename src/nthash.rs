//! The NT Hash hashing scheme.
//!
//! Hashes look like `$3$$8846f7eaee8fb117ad06bdd830b7586c`: the `$3$`
//! prefix, an empty fragment and a 32-character hexadecimal MD4 sum of
//! the UTF-16LE encoded password.

use md4::{Digest, Md4};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::unmarshal::unmarshal;

pub const PREFIX: &str = "$3$";

pub const MAX_PASSWORD_LENGTH: usize = 256;

const SUM_LENGTH: usize = 32;

/// Derives an NT Hash key from the UTF-16LE encoded password.
pub fn key(password: &[u8]) -> Result<Vec<u8>> {
    if password.len() % 2 != 0 || password.len() > MAX_PASSWORD_LENGTH {
        return Err(Error::PasswordLength(password.len()));
    }
    Ok(Md4::digest(password).to_vec())
}

/// Encodes the password as UTF-16LE for [`key`].
pub fn encode_password(password: &str) -> Vec<u8> {
    password
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

#[derive(Default)]
struct Scheme {
    prefix: String,
    empty: [u8; 0],
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
        b.byte_array("empty", "", |s| &s.empty, |s| &mut s.empty);
        b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
    }
}

fn sum_of(password: &str) -> Result<[u8; SUM_LENGTH]> {
    let derived = key(&encode_password(password))?;
    let mut sum = [0u8; SUM_LENGTH];
    hex::encode_to_slice(&derived, &mut sum).map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(sum)
}

/// Returns the NT Hash hash of the password.
pub fn new_hash(password: &str) -> Result<String> {
    let sum = sum_of(password)?;
    marshal(&Scheme {
        prefix: PREFIX.to_string(),
        empty: [],
        sum,
    })
}

/// Compares the NT Hash hash with a new hash derived from the
/// password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let scheme: Scheme = unmarshal(hash)?;
    let sum = sum_of(password)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "$3$$8846f7eaee8fb117ad06bdd830b7586c";

    #[test]
    fn checks_known_hashes() {
        assert_eq!(check(HASH, "password"), Ok(()));
        assert_eq!(check(HASH, "test"), Err(Error::PasswordMismatch));
    }

    #[test]
    fn new_hashes_match_the_known_form() {
        assert_eq!(new_hash("password").unwrap(), HASH);
    }

    #[test]
    fn rejects_odd_password_encodings() {
        assert_eq!(key(b"abc"), Err(Error::PasswordLength(3)));
        assert_eq!(key(&[0u8; 258]), Err(Error::PasswordLength(258)));
    }

    #[test]
    fn encodes_passwords_as_utf16le() {
        assert_eq!(encode_password("ab"), [b'a', 0, b'b', 0]);
    }
}
