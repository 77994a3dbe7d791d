use thiserror::Error;

/// Error taxonomy for one metric query.
///
/// Every variant converts into the caller-visible message via `Display`;
/// nothing here is fatal to the process. A `Bus` error leaves the shared
/// connection state untouched, so the next query may re-attempt the exchange.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid parameters: {0}")]
    Parameter(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    NotFound(String),
    #[error("unexpected reply: {0}")]
    Protocol(String),
    #[error("{name}: {message}")]
    Bus { name: String, message: String },
    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported value type: {0}")]
    UnsupportedType(String),
}

impl AgentError {
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn bus(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bus {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn unsupported_type(signature: impl Into<String>) -> Self {
        Self::UnsupportedType(signature.into())
    }
}
