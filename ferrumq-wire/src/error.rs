//! Errors raised while encoding or decoding wire data

/// Errors produced by the wire codec.
///
/// Decoding errors (`UnexpectedEof`, `InvalidUtf8`, `UnknownFieldTag`,
/// `NonZeroWeight`, `UnknownMethod`) mean the payload violated the framing
/// grammar; encoding errors (`ShortStringTooLong`, `LengthOverflow`) mean a
/// caller-supplied value cannot be represented without truncation, which is
/// never done silently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Ran past the end of the payload
    #[error("unexpected end of payload")]
    UnexpectedEof,

    /// A short string must fit a one-octet length prefix
    #[error("short string exceeds 255 octets (got {0})")]
    ShortStringTooLong(usize),

    /// A length-prefixed value outgrew its four-octet prefix
    #[error("{0} exceeds the u32 length prefix")]
    LengthOverflow(&'static str),

    /// Short strings are required to be UTF-8
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// Field tag not in either the RabbitMQ or the strict 0-9-1 tag set
    #[error("unknown field type tag 0x{0:02x}")]
    UnknownFieldTag(u8),

    /// The (class-id, method-id) pair is absent from the registry
    #[error("unknown method {class_id}.{method_id}")]
    UnknownMethod {
        /// Class id of the offending method frame
        class_id: u16,
        /// Method id of the offending method frame
        method_id: u16,
    },

    /// Content header weight is reserved and must be zero
    #[error("content header weight must be zero (got {0})")]
    NonZeroWeight(u16),
}

impl Error {
    /// Whether this error was raised while encoding caller-supplied data,
    /// as opposed to decoding peer data.
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            Error::ShortStringTooLong(_) | Error::LengthOverflow(_)
        )
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
