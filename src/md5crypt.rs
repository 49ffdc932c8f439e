//! The MD5 hashing scheme.
//!
//! Hashes look like `$1$ip0xp41O$7DHwMihQRmDjn2tiJ17mw.`: the `$1$`
//! prefix, a salt of up to 8 characters and a 22-character sum.

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

use crate::cryptoutil::permute;
use crate::encoding::HASH64;
use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::unmarshal::unmarshal;

pub const PREFIX: &str = "$1$";

pub const MAX_SALT_LENGTH: usize = 8;
pub const DEFAULT_SALT_LENGTH: usize = MAX_SALT_LENGTH;

const SUM_LENGTH: usize = 22;
const ROUNDS: usize = 1000;

const PERM_FINAL: [u8; 16] = [12, 6, 0, 13, 7, 1, 14, 8, 2, 15, 9, 3, 5, 10, 4, 11];

/// Derives an MD5 key from the password and salt.
pub fn key(password: &[u8], salt: &[u8]) -> Result<Vec<u8>> {
    if salt.len() > MAX_SALT_LENGTH {
        return Err(Error::SaltLength(salt.len()));
    }
    if let Some(i) = HASH64.index_any_invalid(salt) {
        return Err(Error::SaltChar(salt[i] as char));
    }
    Ok(encrypt(password, salt))
}

fn encrypt(password: &[u8], salt: &[u8]) -> Vec<u8> {
    let size = Md5::output_size();
    let mut h = Md5::new();
    h.update(password);
    h.update(PREFIX);
    h.update(salt);
    let d: [u8; 16] = Md5::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(password)
        .finalize()
        .into();
    let mut i = password.len();
    while i > 0 {
        h.update(&d[..i.min(size)]);
        i = i.saturating_sub(size);
    }
    let mut i = password.len();
    while i > 0 {
        if i & 1 != 0 {
            h.update([0]);
        } else {
            h.update(&password[..1]);
        }
        i >>= 1;
    }
    let mut d: [u8; 16] = h.finalize().into();
    for i in 0..ROUNDS {
        let mut h = Md5::new();
        if i & 1 != 0 {
            h.update(password);
        } else {
            h.update(d);
        }
        if i % 3 != 0 {
            h.update(salt);
        }
        if i % 7 != 0 {
            h.update(password);
        }
        if i & 1 != 0 {
            h.update(d);
        } else {
            h.update(password);
        }
        d = h.finalize().into();
    }
    permute(&d, &PERM_FINAL)
}

#[derive(Default)]
struct Scheme {
    prefix: String,
    salt: Vec<u8>,
    sum: Vec<u8>,
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
        b.bytes("salt", "", |s| &s.salt, |s| &mut s.salt);
        b.bytes("sum", "length:22", |s| &s.sum, |s| &mut s.sum);
    }
}

fn sum_of(password: &[u8], salt: &[u8]) -> Result<[u8; SUM_LENGTH]> {
    let derived = key(password, salt)?;
    let mut sum = [0u8; SUM_LENGTH];
    HASH64.encode_le(&derived, &mut sum);
    Ok(sum)
}

/// Returns the MD5 hash of the password with a random salt.
pub fn new_hash(password: &str) -> Result<String> {
    let salt = HASH64.rand(DEFAULT_SALT_LENGTH);
    let sum = sum_of(password.as_bytes(), &salt)?;
    marshal(&Scheme {
        prefix: PREFIX.to_string(),
        salt,
        sum: sum.to_vec(),
    })
}

/// Returns the salt of an MD5 hash.
pub fn salt(hash: &str) -> Result<Vec<u8>> {
    let scheme: Scheme = unmarshal(hash)?;
    Ok(scheme.salt)
}

/// Compares the MD5 hash with a new hash derived from the password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let scheme: Scheme = unmarshal(hash)?;
    let sum = sum_of(password.as_bytes(), &scheme.salt)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}
