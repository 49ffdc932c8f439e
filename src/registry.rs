//! Prefix-based dispatch of hash verification.

use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// A scheme's verification entry point.
pub type CheckFn = fn(&str, &str) -> Result<()>;

/// Maps hash prefixes to scheme check functions.
///
/// [`Registry::default`] registers every scheme in the crate; an empty
/// registry can be populated selectively with [`Registry::register`].
pub struct Registry {
    hashes: IndexMap<&'static str, CheckFn>,
}

impl Registry {
    /// Creates a registry with no schemes registered.
    #[must_use]
    pub fn new() -> Self {
        Registry {
            hashes: IndexMap::new(),
        }
    }

    /// Registers a check function for a hash prefix, replacing any
    /// previous registration.
    pub fn register(&mut self, prefix: &'static str, check: CheckFn) {
        self.hashes.insert(prefix, check);
    }

    /// Compares the hash with a new hash derived from the password,
    /// dispatching on the hash prefix.
    pub fn check(&self, hash: &str, password: &str) -> Result<()> {
        let prefix = extract_prefix(hash)?;
        match self.hashes.get(prefix) {
            Some(check) => check(hash, password),
            None => Err(Error::UnknownHash),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut r = Registry::new();
        r.register(crate::des::PREFIX, crate::des::check);
        r.register(crate::desext::PREFIX, crate::desext::check);
        r.register(crate::md5crypt::PREFIX, crate::md5crypt::check);
        r.register(crate::sha1crypt::PREFIX, crate::sha1crypt::check);
        r.register(crate::sha256crypt::PREFIX, crate::sha256crypt::check);
        r.register(crate::sha512crypt::PREFIX, crate::sha512crypt::check);
        r.register(crate::bcrypt::PREFIX_2, crate::bcrypt::check);
        r.register(crate::bcrypt::PREFIX_2A, crate::bcrypt::check);
        r.register(crate::bcrypt::PREFIX_2B, crate::bcrypt::check);
        r.register(crate::argon2::PREFIX_2D, crate::argon2::check);
        r.register(crate::argon2::PREFIX_2I, crate::argon2::check);
        r.register(crate::argon2::PREFIX_2ID, crate::argon2::check);
        r.register(crate::nthash::PREFIX, crate::nthash::check);
        r.register(crate::sunmd5::PREFIX_NONZERO_ROUNDS, crate::sunmd5::check);
        r.register(crate::sunmd5::PREFIX_ZERO_ROUNDS, crate::sunmd5::check);
        r
    }
}

/// Extracts the dispatch prefix of a hash string: `$<id>$`, `$<id>,`,
/// `_`, or the empty prefix of a bare DES hash.
fn extract_prefix(hash: &str) -> Result<&str> {
    if let Some(rest) = hash.strip_prefix('$') {
        return match rest.find(['$', ',']) {
            Some(0) | None => Err(Error::UnknownHash),
            Some(i) => Ok(&hash[..i + 2]),
        };
    }
    if hash.starts_with('_') {
        return Ok("_");
    }
    Ok("")
}

/// Compares the hash with a new hash derived from the password using the
/// default registry with every scheme registered.
pub fn check(hash: &str, password: &str) -> Result<()> {
    static DEFAULT: OnceLock<Registry> = OnceLock::new();
    DEFAULT.get_or_init(Registry::default).check(hash, password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_prefixes() {
        assert_eq!(extract_prefix("$1$ab$cd").unwrap(), "$1$");
        assert_eq!(extract_prefix("$md5,rounds=5$x").unwrap(), "$md5,");
        assert_eq!(extract_prefix("_abcd").unwrap(), "_");
        assert_eq!(extract_prefix("abcd").unwrap(), "");
        assert_eq!(extract_prefix("$$x").unwrap_err(), Error::UnknownHash);
        assert_eq!(extract_prefix("$1abc").unwrap_err(), Error::UnknownHash);
    }

    #[test]
    fn dispatches_by_prefix() {
        fn ok(_: &str, _: &str) -> Result<()> {
            Ok(())
        }
        let mut r = Registry::new();
        r.register("$x$", ok);
        assert_eq!(r.check("$x$a$b", "pw"), Ok(()));
        assert_eq!(r.check("$y$a$b", "pw").unwrap_err(), Error::UnknownHash);
    }
}
