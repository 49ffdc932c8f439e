//! # crypt3
//!
//! A crypt(3) password hashing library built around a generic codec for
//! the crypt(3) hash string format.
//!
//! ## Supported schemes
//!
//! | Scheme | Prefix | Module |
//! |---|---|---|
//! | Argon2 | `$argon2d$`, `$argon2i$`, `$argon2id$` | [`argon2`] |
//! | bcrypt | `$2$`, `$2a$`, `$2b$` | [`bcrypt`] |
//! | DES | none | [`des`] |
//! | DES Extended (BSDi) | `_` | [`desext`] |
//! | MD5 | `$1$` | [`md5crypt`] |
//! | NT Hash | `$3$` | [`nthash`] |
//! | SHA-1 | `$sha1$` | [`sha1crypt`] |
//! | SHA-256 | `$5$` | [`sha256crypt`] |
//! | SHA-512 | `$6$` | [`sha512crypt`] |
//! | Sun MD5 | `$md5$`, `$md5,` | [`sunmd5`] |
//!
//! ## Verifying passwords
//!
//! The crate-level [`check`] dispatches on the hash prefix and verifies
//! the password against any supported scheme:
//!
//! ```rust
//! use crypt3::{check, Error};
//!
//! assert_eq!(check("$3$$8846f7eaee8fb117ad06bdd830b7586c", "password"), Ok(()));
//! assert_eq!(
//!     check("$3$$8846f7eaee8fb117ad06bdd830b7586c", "test"),
//!     Err(Error::PasswordMismatch)
//! );
//! ```
//!
//! A [`Registry`] restricted to hand-picked schemes can be built with
//! [`Registry::register`].
//!
//! ## The hash string codec
//!
//! Hash strings are composed of `$`-separated fragments after an
//! optional prefix, with `key=value` parameters and `,`-joined parameter
//! groups. [`marshal`] and [`unmarshal`] convert between hash strings
//! and any type describing its fields via [`Record`]:
//!
//! ```rust
//! use crypt3::{marshal, unmarshal, Record, SchemaBuilder};
//!
//! #[derive(Default)]
//! struct Entry {
//!     prefix: String,
//!     rounds: u32,
//!     salt: Vec<u8>,
//!     sum: Vec<u8>,
//! }
//!
//! impl Record for Entry {
//!     fn describe(b: &mut SchemaBuilder<Self>) {
//!         b.text(
//!             "prefix",
//!             "",
//!             |e| Ok(e.prefix.clone()),
//!             |e, text| {
//!                 e.prefix = text.to_string();
//!                 Ok(())
//!             },
//!             |e| e.prefix.is_empty(),
//!         );
//!         b.uint32("rounds", "param:rounds,omitempty", |e| e.rounds, |e, v| e.rounds = v);
//!         b.bytes("salt", "", |e| &e.salt, |e| &mut e.salt);
//!         b.bytes("sum", "", |e| &e.sum, |e| &mut e.sum);
//!     }
//! }
//!
//! let entry: Entry = unmarshal("$5$rounds=505000$somesalt$somesum").unwrap();
//! assert_eq!(entry.rounds, 505000);
//! assert_eq!(entry.salt, b"somesalt");
//! assert_eq!(marshal(&entry).unwrap(), "$5$rounds=505000$somesalt$somesum");
//! ```
//!
//! Compiled schemas are cached per type, so repeated conversions do not
//! pay the field-description cost again.

mod cryptoutil;
mod descrypt;
mod lex;
mod sha2crypt;

pub mod argon2;
pub mod bcrypt;
pub mod des;
pub mod desext;
pub mod encoding;
pub mod error;
pub mod marshal;
pub mod md5crypt;
pub mod nthash;
pub mod parse;
pub mod registry;
pub mod schema;
pub mod sha1crypt;
pub mod sha256crypt;
pub mod sha512crypt;
pub mod sunmd5;
pub mod unmarshal;

pub use error::{Error, Result};
pub use marshal::marshal;
pub use registry::{check, CheckFn, Registry};
pub use schema::{FieldValue, Record, SchemaBuilder};
pub use unmarshal::{unmarshal, unmarshal_into};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_scheme() {
        for hash in [
            "eNBO0nZMf3rWM",
            "_6C/.yaiu.qYIjNR7X.s",
            "$1$ip0xp41O$7DHwMihQRmDjn2tiJ17mw.",
            "$3$$8846f7eaee8fb117ad06bdd830b7586c",
            "$sha1$48000$mHh0IIOQ$YS/Lw0PKCThSEBBYqP37zXySQ3cC",
            "$md5,rounds=5000$ReCRHeOH$$WOV3YlBRWykkmQDJc.uia/",
        ] {
            assert_eq!(check(hash, "password"), Ok(()), "{}", hash);
            assert_eq!(check(hash, "test"), Err(Error::PasswordMismatch), "{}", hash);
        }
    }

    #[test]
    fn unknown_prefixes_are_rejected() {
        assert_eq!(check("$unknown$a$b", "pw"), Err(Error::UnknownHash));
    }
}
