//! The bcrypt hashing scheme.
//!
//! Hashes look like `$2b$10$UVjcf7m8L91VOpIRwEprguF4o9Inqj7aNhqvSzUElX4GWGyIkYLuG`:
//! a version prefix, a two-digit cost and a single 53-character
//! fragment holding the 22-character salt and 31-character sum.
//!
//! The key derivation reproduces the quirks of the original crypt(3)
//! implementations: `$2b$` truncates passwords longer than 72 bytes,
//! older versions replace passwords of 254 bytes or more with 72 zero
//! digits, and every version except `$2$` appends a null terminator to
//! the key.

use blowfish::Blowfish;
use subtle::ConstantTimeEq;

use crate::cryptoutil::rand_bytes;
use crate::encoding::{Alphabet, BCRYPT64, HASH64};
use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::unmarshal::unmarshal;

/// The prefix of the original bcrypt version.
pub const PREFIX_2: &str = "$2$";
/// The prefix of the version requiring a null-terminated UTF-8 password.
pub const PREFIX_2A: &str = "$2a$";
/// The prefix of the version fixing the unsigned char length bug.
pub const PREFIX_2B: &str = "$2b$";

pub const SALT_LENGTH: usize = 22;

pub const MIN_COST: u8 = 4;
pub const MAX_COST: u8 = 31;
pub const DEFAULT_COST: u8 = 12;

const SUM_LENGTH: usize = 31;

/// Derives a bcrypt key from the password, salt and cost under the
/// given version prefix.
pub fn key(password: &[u8], salt: &[u8], cost: u8, prefix: &str) -> Result<Vec<u8>> {
    match prefix {
        PREFIX_2 | PREFIX_2A | PREFIX_2B => {}
        _ => return Err(Error::Prefix(prefix.to_string())),
    }
    let mut password = password;
    let zeros;
    if prefix == PREFIX_2B && password.len() > 72 {
        password = &password[..72];
    } else if password.len() >= 254 {
        zeros = vec![b'0'; 72];
        password = &zeros;
    }
    if salt.len() != SALT_LENGTH {
        return Err(Error::SaltLength(salt.len()));
    }
    if let Some(i) = HASH64.index_any_invalid(salt) {
        return Err(Error::SaltChar(salt[i] as char));
    }
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return Err(Error::Cost(cost));
    }
    let dec_salt = BCRYPT64.decode_be(salt);
    Ok(encrypt(password, &dec_salt, cost, prefix))
}

fn encrypt(password: &[u8], salt: &[u8], cost: u8, prefix: &str) -> Vec<u8> {
    let mut key = password.to_vec();
    if prefix != PREFIX_2 {
        key.push(0);
    }
    let mut state = Blowfish::bc_init_state();
    state.salted_expand_key(salt, &key);
    for _ in 0..1u64 << cost {
        state.bc_expand_key(&key);
        state.bc_expand_key(salt);
    }
    // "OrpheanBeholderScryDoubt"
    let mut ctext: [u32; 6] = [
        0x4F727068, 0x65616E42, 0x65686F6C, 0x64657253, 0x63727944, 0x6F756274,
    ];
    for i in (0..6).step_by(2) {
        for _ in 0..64 {
            let [l, r] = state.bc_encrypt([ctext[i], ctext[i + 1]]);
            ctext[i] = l;
            ctext[i + 1] = r;
        }
    }
    let mut out = Vec::with_capacity(24);
    for w in ctext {
        out.extend_from_slice(&w.to_be_bytes());
    }
    out.truncate(23);
    out
}

#[derive(Default)]
struct Scheme {
    prefix: String,
    cost: u8,
    salt: Vec<u8>,
    sum: [u8; SUM_LENGTH],
}

impl Record for Scheme {
    fn describe(b: &mut SchemaBuilder<Self>) {
        b.text(
            "prefix",
            "",
            |s| Ok(s.prefix.clone()),
            |s, text| match text {
                PREFIX_2 | PREFIX_2A | PREFIX_2B => {
                    s.prefix = text.to_string();
                    Ok(())
                }
                _ => Err(format!("unsupported prefix {:?}", text)),
            },
            |s| s.prefix.is_empty(),
        );
        b.text(
            "cost",
            "length:2",
            |s| Ok(format!("{:02}", s.cost)),
            |s, text| {
                s.cost = text
                    .parse()
                    .map_err(|_| format!("invalid cost {:?}", text))?;
                Ok(())
            },
            |s| s.cost == 0,
        );
        b.bytes("salt", "length:22,inline", |s| &s.salt, |s| &mut s.salt);
        b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
    }
}

fn sum_of(password: &[u8], salt: &[u8], cost: u8, prefix: &str) -> Result<[u8; SUM_LENGTH]> {
    let derived = key(password, salt, cost, prefix)?;
    let mut sum = [0u8; SUM_LENGTH];
    BCRYPT64.encode_be(&derived, &mut sum);
    Ok(sum)
}

/// Returns the bcrypt hash of the password with a random salt at the
/// given cost.
pub fn new_hash(password: &str, cost: u8) -> Result<String> {
    let raw = rand_bytes(Alphabet::decoded_len(SALT_LENGTH));
    let mut salt = vec![0u8; SALT_LENGTH];
    BCRYPT64.encode_be(&raw, &mut salt);
    let sum = sum_of(password.as_bytes(), &salt, cost, PREFIX_2B)?;
    marshal(&Scheme {
        prefix: PREFIX_2B.to_string(),
        cost,
        salt,
        sum,
    })
}

/// Returns the salt, cost and version prefix of a bcrypt hash.
pub fn params(hash: &str) -> Result<(Vec<u8>, u8, String)> {
    let scheme: Scheme = unmarshal(hash)?;
    Ok((scheme.salt, scheme.cost, scheme.prefix))
}

/// Compares the bcrypt hash with a new hash derived from the password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let scheme: Scheme = unmarshal(hash)?;
    let sum = sum_of(password.as_bytes(), &scheme.salt, scheme.cost, &scheme.prefix)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}
