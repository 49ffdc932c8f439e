//! The Argon2 hashing scheme.
//!
//! Hashes look like
//! `$argon2id$v=19$m=512,t=3,p=1$qXMlAYBABLl$/OuG+qcZ1ntdTRfhUGFVp2YMcTPJ7aH3e4j7KIEnRho`:
//! a variant prefix, an optional version parameter, a group of memory,
//! time and thread parameters and base64-encoded salt and sum.

use subtle::ConstantTimeEq;

use crate::cryptoutil::rand_bytes;
use crate::encoding::{Alphabet, BASE64};
use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::unmarshal::unmarshal;

pub const PREFIX_2D: &str = "$argon2d$";
pub const PREFIX_2I: &str = "$argon2i$";
pub const PREFIX_2ID: &str = "$argon2id$";

pub const MIN_SALT_LENGTH: usize = 11;
pub const DEFAULT_SALT_LENGTH: usize = MIN_SALT_LENGTH;

pub const MIN_TIME: u32 = 1;
pub const DEFAULT_TIME: u32 = 3;

pub const MIN_MEMORY: u32 = 8;
pub const DEFAULT_MEMORY: u32 = 1 << 12;

pub const MIN_THREADS: u8 = 1;
pub const DEFAULT_THREADS: u8 = MIN_THREADS;

pub const VERSION_10: u8 = 0x10;
pub const VERSION_13: u8 = 0x13;

const KEY_LENGTH: usize = 32;

/// Derives an Argon2 key from the password, salt, memory and time
/// costs and thread count under the given variant prefix and version.
pub fn key(
    password: &[u8],
    salt: &[u8],
    memory: u32,
    time: u32,
    threads: u8,
    prefix: &str,
    version: u8,
) -> Result<Vec<u8>> {
    let algorithm = match prefix {
        PREFIX_2D => ::argon2::Algorithm::Argon2d,
        PREFIX_2I => ::argon2::Algorithm::Argon2i,
        PREFIX_2ID => ::argon2::Algorithm::Argon2id,
        _ => return Err(Error::Prefix(prefix.to_string())),
    };
    let version = match version {
        VERSION_10 => ::argon2::Version::V0x10,
        VERSION_13 => ::argon2::Version::V0x13,
        v => return Err(Error::Version(v as u32)),
    };
    if salt.len() < MIN_SALT_LENGTH {
        return Err(Error::SaltLength(salt.len()));
    }
    if let Some(i) = BASE64.index_any_invalid(salt) {
        return Err(Error::SaltChar(salt[i] as char));
    }
    let dec_salt = BASE64.decode_be(salt);
    if memory < MIN_MEMORY {
        return Err(Error::Memory(memory));
    }
    if time < MIN_TIME {
        return Err(Error::Time(time));
    }
    if threads < MIN_THREADS {
        return Err(Error::Threads(threads as u32));
    }
    let params = ::argon2::Params::new(memory, time, threads as u32, Some(KEY_LENGTH))
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    let ctx = ::argon2::Argon2::new(algorithm, version, params);
    let mut out = vec![0u8; KEY_LENGTH];
    ctx.hash_password_into(password, &dec_salt, &mut out)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    Ok(out)
}

#[derive(Default)]
struct Scheme {
    prefix: String,
    version: u8,
    memory: u32,
    time: u32,
    threads: u8,
    salt: Vec<u8>,
    sum: Vec<u8>,
}

impl Record for Scheme {
    fn describe(b: &mut SchemaBuilder<Self>) {
        b.text(
            "prefix",
            "",
            |s| Ok(s.prefix.clone()),
            |s, text| match text {
                PREFIX_2D | PREFIX_2I | PREFIX_2ID => {
                    s.prefix = text.to_string();
                    Ok(())
                }
                _ => Err(format!("unsupported prefix {:?}", text)),
            },
            |s| s.prefix.is_empty(),
        );
        b.uint8(
            "version",
            "param:v,omitempty",
            |s| s.version,
            |s, v| s.version = v,
        );
        b.uint32("memory", "param:m,group", |s| s.memory, |s, v| s.memory = v);
        b.uint32("time", "param:t,group", |s| s.time, |s, v| s.time = v);
        b.uint8(
            "threads",
            "param:p,group",
            |s| s.threads,
            |s, v| s.threads = v,
        );
        b.bytes("salt", "enc:base64", |s| &s.salt, |s| &mut s.salt);
        b.bytes("sum", "enc:base64", |s| &s.sum, |s| &mut s.sum);
    }
}

fn sum_of(password: &[u8], scheme: &Scheme) -> Result<Vec<u8>> {
    let derived = key(
        password,
        &scheme.salt,
        scheme.memory,
        scheme.time,
        scheme.threads,
        &scheme.prefix,
        scheme.version,
    )?;
    let mut sum = vec![0u8; Alphabet::encoded_len(derived.len())];
    BASE64.encode_be(&derived, &mut sum);
    Ok(sum)
}

/// Returns the Argon2id hash of the password with a random salt and
/// the given memory and time costs.
pub fn new_hash(password: &str, memory: u32, time: u32) -> Result<String> {
    let raw = rand_bytes(Alphabet::decoded_len(DEFAULT_SALT_LENGTH));
    let mut salt = vec![0u8; DEFAULT_SALT_LENGTH];
    BASE64.encode_be(&raw, &mut salt);
    let mut scheme = Scheme {
        prefix: PREFIX_2ID.to_string(),
        version: VERSION_13,
        memory,
        time,
        threads: DEFAULT_THREADS,
        salt,
        sum: Vec::new(),
    };
    scheme.sum = sum_of(password.as_bytes(), &scheme)?;
    marshal(&scheme)
}

/// Returns the salt, memory and time costs, thread count, variant
/// prefix and version of an Argon2 hash.
pub fn params(hash: &str) -> Result<(Vec<u8>, u32, u32, u8, String, u8)> {
    let mut scheme: Scheme = unmarshal(hash)?;
    if scheme.version == 0 {
        scheme.version = VERSION_10;
    }
    Ok((
        scheme.salt,
        scheme.memory,
        scheme.time,
        scheme.threads,
        scheme.prefix,
        scheme.version,
    ))
}

/// Compares the Argon2 hash with a new hash derived from the password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let mut scheme: Scheme = unmarshal(hash)?;
    if scheme.version == 0 {
        scheme.version = VERSION_10;
    }
    let sum = sum_of(password.as_bytes(), &scheme)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str =
        "$argon2id$v=19$m=512,t=3,p=1$qXMlAYBABLl$/OuG+qcZ1ntdTRfhUGFVp2YMcTPJ7aH3e4j7KIEnRho";

    #[test]
    fn checks_known_hashes() {
        assert_eq!(check(HASH, "password"), Ok(()));
        assert_eq!(check(HASH, "test"), Err(Error::PasswordMismatch));
    }

    #[test]
    fn extracts_params() {
        let (salt, memory, time, threads, prefix, version) = params(HASH).unwrap();
        assert_eq!(salt, b"qXMlAYBABLl");
        assert_eq!(memory, 512);
        assert_eq!(time, 3);
        assert_eq!(threads, 1);
        assert_eq!(prefix, PREFIX_2ID);
        assert_eq!(version, VERSION_13);
    }

    #[test]
    fn new_hashes_verify() {
        let hash = new_hash("password", MIN_MEMORY, MIN_TIME).unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=8,t=1,p=1$"));
        assert_eq!(check(&hash, "password"), Ok(()));
        assert_eq!(check(&hash, "test"), Err(Error::PasswordMismatch));
    }

    #[test]
    fn rejects_bad_params() {
        assert_eq!(new_hash("pw", 7, 1), Err(Error::Memory(7)));
        assert_eq!(new_hash("pw", 8, 0), Err(Error::Time(0)));
        assert_eq!(
            key(b"pw", b"0123456789", 8, 1, 1, PREFIX_2ID, VERSION_13),
            Err(Error::SaltLength(10))
        );
        assert_eq!(
            key(b"pw", b"qXMlAYBABLl", 8, 1, 1, PREFIX_2ID, 0x12),
            Err(Error::Version(0x12))
        );
    }
}
