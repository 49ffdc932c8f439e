//! Error types for hash encoding, decoding and verification.

use thiserror::Error;

/// A specialized `Result` type for crypt(3) operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while marshaling, unmarshaling or checking
/// crypt(3) hashes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The hash string does not match the crypt(3) grammar.
    #[error("syntax error at {offset}: {msg}")]
    Syntax { offset: usize, msg: String },

    /// A scheme declared an invalid field tag.
    #[error("invalid tag {tag:?} of field {field} in {type_name}")]
    Schema {
        type_name: &'static str,
        field: &'static str,
        tag: &'static str,
    },

    /// Two fields at the same embedding depth declared the same parameter.
    #[error("param tags {tag1:?} of field {field1} and {tag2:?} of field {field2} conflict in {type_name}")]
    ParamConflict {
        type_name: &'static str,
        field1: &'static str,
        tag1: &'static str,
        field2: &'static str,
        tag2: &'static str,
    },

    /// A hash string could not be bound to a scheme field.
    #[error("hash: cannot unmarshal {value} into field {field} of {type_name} at {offset}: {msg}", field = .field.unwrap_or("?"))]
    Unmarshal {
        value: &'static str,
        type_name: &'static str,
        field: Option<&'static str>,
        offset: usize,
        msg: String,
    },

    /// A scheme field could not be rendered into a hash string.
    #[error("hash: cannot marshal field {field} of {type_name}: {msg}")]
    Marshal {
        type_name: &'static str,
        field: &'static str,
        msg: String,
    },

    /// A salt has an unsupported length.
    #[error("invalid salt length {0}")]
    SaltLength(usize),

    /// A salt contains a character outside the scheme's alphabet.
    #[error("invalid character '{0}' in salt")]
    SaltChar(char),

    /// A round count is outside the scheme's supported range.
    #[error("invalid round count {0}")]
    Rounds(u32),

    /// A bcrypt cost is outside the supported range.
    #[error("invalid cost {0}")]
    Cost(u8),

    /// A password has an unsupported length.
    #[error("invalid password length {0}")]
    PasswordLength(usize),

    /// An Argon2 memory cost below the supported minimum.
    #[error("invalid memory cost {0}")]
    Memory(u32),

    /// An Argon2 time cost below the supported minimum.
    #[error("invalid time cost {0}")]
    Time(u32),

    /// An Argon2 thread count below the supported minimum.
    #[error("invalid thread count {0}")]
    Threads(u32),

    /// A hash prefix not supported by the scheme.
    #[error("unsupported prefix {0:?}")]
    Prefix(String),

    /// An Argon2 version not supported by the scheme.
    #[error("unsupported version 0x{0:x}")]
    Version(u32),

    /// Key derivation failed in an underlying primitive.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// No registered scheme matches the hash prefix.
    #[error("unknown hash")]
    UnknownHash,

    /// The hash does not match the password.
    #[error("hash and password mismatch")]
    PasswordMismatch,
}

impl Error {
    pub(crate) fn syntax(offset: usize, msg: impl Into<String>) -> Self {
        Error::Syntax {
            offset,
            msg: msg.into(),
        }
    }
}
