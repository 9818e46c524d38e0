use std::fmt::Display;

/// Errors that can occur while encoding or decoding values.
///
/// The first group describes malformed or unsupported data. The second group
/// ([`CodecError::AlreadyBaked`], [`CodecError::CountMismatch`],
/// [`CodecError::OrdinalOutOfRange`]) describes protocol misuse; see
/// [`CodecError::is_misuse`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input ended before the value was complete.
    #[error("unexpected end of data (needed {needed} bytes, {remaining} remaining)")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A string field did not hold valid UTF-8.
    #[error("invalid utf-8 in string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A char field held a UTF-16 surrogate.
    #[error("invalid char code unit 0x{0:04x}")]
    InvalidChar(u16),

    /// A string does not fit the 16-bit length prefix.
    #[error("string too long ({len} bytes, max {max})")]
    StringTooLong { len: usize, max: usize },

    /// A collection or buffer does not fit the 32-bit length prefix.
    #[error("length {0} does not fit in a u32 prefix")]
    LengthOverflow(usize),

    /// The value has no representation in this format.
    #[error("unsupported value: {0}")]
    UnsupportedValue(&'static str),

    /// Error raised by a `Serialize`/`Deserialize` implementation.
    #[error("{0}")]
    Message(String),

    /// The writer was written to or baked after it was baked.
    #[error("writer already baked")]
    AlreadyBaked,

    /// A collection wrote a different number of elements than it declared.
    #[error("collection declared {declared} elements but wrote {actual}")]
    CountMismatch { declared: u32, actual: u32 },

    /// An enum ordinal has no matching variant on this side.
    #[error("enum ordinal {ordinal} out of range ({variants} variants)")]
    OrdinalOutOfRange { ordinal: u32, variants: usize },
}

impl CodecError {
    /// True for errors caused by using the codec incorrectly rather than by
    /// malformed input.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            CodecError::AlreadyBaked
                | CodecError::CountMismatch { .. }
                | CodecError::OrdinalOutOfRange { .. }
        )
    }
}

impl serde::ser::Error for CodecError {
    fn custom<T: Display>(msg: T) -> Self {
        CodecError::Message(msg.to_string())
    }
}

impl serde::de::Error for CodecError {
    fn custom<T: Display>(msg: T) -> Self {
        CodecError::Message(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
