//! Error types for the translation layer.
//!
//! Every failure is local to one translation call and is returned to the caller;
//! nothing here is retried or treated as fatal.

/// Translation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No recognizable content, or a required field is missing.
    #[error("malformed inbound payload: {0}")]
    MalformedInbound(String),

    /// Choice token does not match the token grammar.
    #[error("cannot decode choice token: {0}")]
    Decoding(String),

    /// Intent or parameter cannot be escaped into a choice token.
    #[error("cannot encode choice: {0}")]
    Encoding(String),

    /// Zero or more than one top-level response shape.
    #[error("invalid response shape: {0}")]
    InvalidResponseShape(String),

    #[error("unsupported attachment type: {0}")]
    UnsupportedAttachmentType(String),

    /// The connector has no wire form for a shape that was constructed.
    #[error("connector {connector} cannot express {shape}")]
    UnsupportedShape { connector: String, shape: String },

    #[error("malformed {connector} wire format: {reason}")]
    MalformedWireFormat { connector: String, reason: String },

    /// Encoded choice token exceeds the connector's declared maximum (bytes).
    #[error("choice token is {len} bytes, connector limit is {max}")]
    TokenTooLong { len: usize, max: usize },
}

impl Error {
    pub(crate) fn unsupported(connector: &str, shape: impl Into<String>) -> Self {
        Self::UnsupportedShape {
            connector: connector.to_string(),
            shape: shape.into(),
        }
    }

    pub(crate) fn wire(connector: &str, reason: impl Into<String>) -> Self {
        Self::MalformedWireFormat {
            connector: connector.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
