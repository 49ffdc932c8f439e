//! The Sun MD5 hashing scheme.
//!
//! Hashes look like `$md5,rounds=5000$ReCRHeOH$$WOV3YlBRWykkmQDJc.uia/`:
//! the `$md5,` or `$md5$` prefix, a rounds parameter, an optional salt,
//! an optional empty separator fragment and a 22-character sum. The
//! marshalled salt portion of the hash is itself an input to the key
//! derivation, so both prefixes and the separator presence produce
//! distinct keys.

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

use crate::cryptoutil::permute;
use crate::encoding::HASH64;
use crate::error::{Error, Result};
use crate::marshal::marshal;
use crate::schema::{Record, SchemaBuilder};
use crate::unmarshal::unmarshal;

/// The prefix normally used when the hash has a non-zero rounds count.
pub const PREFIX_NONZERO_ROUNDS: &str = "$md5,";
/// The prefix normally used when the hash has a zero rounds count.
pub const PREFIX_ZERO_ROUNDS: &str = "$md5$";

pub const MAX_PASSWORD_LENGTH: usize = 255;

pub const MAX_SALT_LENGTH: usize = 8;
pub const DEFAULT_SALT_LENGTH: usize = MAX_SALT_LENGTH;

/// The rounds count always added on top of the stored one.
pub const BASIC_ROUNDS: u32 = 4096;
pub const MAX_ROUNDS: u32 = u32::MAX - BASIC_ROUNDS;
pub const DEFAULT_ROUNDS: u32 = 0;

const SUM_LENGTH: usize = 22;

const PERM_FINAL: [u8; 16] = [12, 6, 0, 13, 7, 1, 14, 8, 2, 15, 9, 3, 5, 10, 4, 11];

// Public domain quotation courtesy of Project Gutenberg.
// Hamlet III.ii - 1517 bytes, including the null symbol.
const PHRASE: &str = concat!(
    "To be, or not to be,--that is the question:--\n",
    "Whether 'tis nobler in the mind to suffer\n",
    "The slings and arrows of outrageous fortune\n",
    "Or to take arms against a sea of troubles,\n",
    "And by opposing end them?--To die,--to sleep,--\n",
    "No more; and by a sleep to say we end\n",
    "The heartache, and the thousand natural shocks\n",
    "That flesh is heir to,--'tis a consummation\n",
    "Devoutly to be wish'd. To die,--to sleep;--\n",
    "To sleep! perchance to dream:--ay, there's the rub;\n",
    "For in that sleep of death what dreams may come,\n",
    "When we have shuffled off this mortal coil,\n",
    "Must give us pause: there's the respect\n",
    "That makes calamity of so long life;\n",
    "For who would bear the whips and scorns of time,\n",
    "The oppressor's wrong, the proud man's contumely,\n",
    "The pangs of despis'd love, the law's delay,\n",
    "The insolence of office, and the spurns\n",
    "That patient merit of the unworthy takes,\n",
    "When he himself might his quietus make\n",
    "With a bare bodkin? who would these fardels bear,\n",
    "To grunt and sweat under a weary life,\n",
    "But that the dread of something after death,--\n",
    "The undiscover'd country, from whose bourn\n",
    "No traveller returns,--puzzles the will,\n",
    "And makes us rather bear those ills we have\n",
    "Than fly to others that we know not of?\n",
    "Thus conscience does make cowards of us all;\n",
    "And thus the native hue of resolution\n",
    "Is sicklied o'er with the pale cast of thought;\n",
    "And enterprises of great pith and moment,\n",
    "With this regard, their currents turn awry,\n",
    "And lose the name of action.--Soft you now!\n",
    "The fair Ophelia!--Nymph, in thy orisons\n",
    "Be all my sins remember'd.\n\0",
);

#[derive(Default)]
struct SaltScheme {
    prefix: String,
    rounds: u32,
    salt: Vec<u8>,
    separator: Option<String>,
}

impl Record for SaltScheme {
    fn describe(b: &mut SchemaBuilder<Self>) {
        b.text(
            "prefix",
            "",
            |s| Ok(s.prefix.clone()),
            |s, text| match text {
                PREFIX_NONZERO_ROUNDS | PREFIX_ZERO_ROUNDS => {
                    s.prefix = text.to_string();
                    Ok(())
                }
                _ => Err(format!("unsupported prefix {:?}", text)),
            },
            |s| s.prefix.is_empty(),
        );
        b.uint32("rounds", "param:rounds", |s| s.rounds, |s, v| s.rounds = v);
        b.bytes("salt", "omitempty", |s| &s.salt, |s| &mut s.salt);
        b.text(
            "separator",
            "length:0,omitempty",
            |s| Ok(s.separator.clone().unwrap_or_default()),
            |s, text| {
                s.separator = Some(text.to_string());
                Ok(())
            },
            |s| s.separator.is_none(),
        );
    }
}

#[derive(Default)]
struct Scheme {
    base: SaltScheme,
    sum: [u8; SUM_LENGTH],
}

impl Record for Scheme {
    fn describe(b: &mut SchemaBuilder<Self>) {
        b.embed(|s| &s.base, |s| &mut s.base);
        b.byte_array("sum", "", |s| &s.sum, |s| &mut s.sum);
    }
}

fn bit(digest: &[u8; 16], off: u32) -> u32 {
    let off = off % 128;
    ((digest[(off / 8) as usize] >> (off % 8)) & 1) as u32
}

/// Derives a Sun MD5 key from the password, salt and rounds count
/// under the given prefix. When `salt_separator` is false the hashed
/// salt string has no trailing separator, matching hashes produced
/// without the empty fragment before the sum.
pub fn key(
    password: &[u8],
    salt: &[u8],
    rounds: u32,
    prefix: &str,
    salt_separator: bool,
) -> Result<Vec<u8>> {
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(Error::PasswordLength(password.len()));
    }
    if salt.len() > MAX_SALT_LENGTH {
        return Err(Error::SaltLength(salt.len()));
    }
    if let Some(i) = HASH64.index_any_invalid(salt) {
        return Err(Error::SaltChar(salt[i] as char));
    }
    if rounds > MAX_ROUNDS {
        return Err(Error::Rounds(rounds));
    }
    match prefix {
        PREFIX_NONZERO_ROUNDS | PREFIX_ZERO_ROUNDS => {}
        _ => return Err(Error::Prefix(prefix.to_string())),
    }
    let salt_string = marshal(&SaltScheme {
        prefix: prefix.to_string(),
        rounds,
        salt: salt.to_vec(),
        separator: salt_separator.then(String::new),
    })?;
    let rounds = rounds + BASIC_ROUNDS;
    let mut digest: [u8; 16] = Md5::new()
        .chain_update(password)
        .chain_update(salt_string.as_bytes())
        .finalize()
        .into();
    for i in 0..rounds {
        let mut h = Md5::new();
        h.update(digest);
        let mut ind7 = [0u8; 16];
        for j in 0..16 {
            let off = (j + 3) % 16;
            let ind4 = (digest[j] >> (digest[off] % 5)) & 0x0F;
            let sh7 = (digest[off] >> (digest[j] % 8)) & 0x01;
            ind7[j] = (digest[ind4 as usize] >> sh7) & 0x7F;
        }
        let mut ind_a = 0u32;
        let mut ind_b = 0u32;
        for j in 0..8 {
            ind_a |= bit(&digest, ind7[j] as u32) << j;
            ind_b |= bit(&digest, ind7[j + 8] as u32) << j;
        }
        ind_a = (ind_a >> bit(&digest, i)) & 0x7F;
        ind_b = (ind_b >> bit(&digest, i.wrapping_add(64))) & 0x7F;
        if bit(&digest, ind_a) ^ bit(&digest, ind_b) == 1 {
            h.update(PHRASE.as_bytes());
        }
        h.update(i.to_string().as_bytes());
        digest = h.finalize().into();
    }
    Ok(permute(&digest, &PERM_FINAL))
}

fn sum_of(password: &[u8], base: &SaltScheme) -> Result<[u8; SUM_LENGTH]> {
    let derived = key(
        password,
        &base.salt,
        base.rounds,
        &base.prefix,
        base.separator.is_some(),
    )?;
    let mut sum = [0u8; SUM_LENGTH];
    HASH64.encode_le(&derived, &mut sum);
    Ok(sum)
}

/// Returns the Sun MD5 hash of the password with a random salt and the
/// given rounds count.
pub fn new_hash(password: &str, rounds: u32) -> Result<String> {
    let mut base = SaltScheme {
        prefix: String::new(),
        rounds,
        salt: HASH64.rand(DEFAULT_SALT_LENGTH),
        separator: None,
    };
    if rounds == 0 {
        base.prefix = PREFIX_ZERO_ROUNDS.to_string();
    } else {
        base.prefix = PREFIX_NONZERO_ROUNDS.to_string();
        base.separator = Some(String::new());
    }
    let sum = sum_of(password.as_bytes(), &base)?;
    marshal(&Scheme { base, sum })
}

/// Returns the salt, rounds count, prefix and salt separator presence
/// of a Sun MD5 hash.
pub fn params(hash: &str) -> Result<(Vec<u8>, u32, String, bool)> {
    let scheme: Scheme = unmarshal(hash)?;
    Ok((
        scheme.base.salt,
        scheme.base.rounds,
        scheme.base.prefix,
        scheme.base.separator.is_some(),
    ))
}

/// Compares the Sun MD5 hash with a new hash derived from the
/// password.
pub fn check(hash: &str, password: &str) -> Result<()> {
    let scheme: Scheme = unmarshal(hash)?;
    let sum = sum_of(password.as_bytes(), &scheme.base)?;
    if sum.ct_eq(&scheme.sum).unwrap_u8() == 0 {
        return Err(Error::PasswordMismatch);
    }
    Ok(())
}
