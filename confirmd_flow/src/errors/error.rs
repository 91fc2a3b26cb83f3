use std::fmt;

pub mod prelude {
    pub use super::{err_msg, FlowError, FlowErrorKind, FlowResult};
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum FlowErrorKind {
    // Common
    #[error("Object is in invalid state for requested operation")]
    InvalidState,
    #[error("Invalid JSON string")]
    InvalidJson,
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Invalid input parameter")]
    InvalidInput,
    #[error("Object not ready for specified action")]
    NotReady,
    #[error("Could not parse a value")]
    ParsingError,
    #[error("Unknown Error")]
    UnknownError,

    // Backend surface
    #[error("Message failed in post")]
    PostFailed,
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,

    // Issuance
    #[error("Credential offer failed after maximum attempts")]
    IssuanceExhausted,
    #[error("No issuance confirmation arrived within the bound")]
    IssuanceTimeout,

    // Event channel
    #[error("Event channel is closed")]
    ChannelClosed,
}

#[derive(thiserror::Error)]
pub struct FlowError {
    msg: String,
    kind: FlowErrorKind,
}

fn format_error(err: &FlowError, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Error: {}", err.msg())?;
    writeln!(f, "Kind: {}", err.kind())
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_error(self, f)
    }
}

impl fmt::Debug for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_error(self, f)
    }
}

impl FlowError {
    pub fn from_msg<D>(kind: FlowErrorKind, msg: D) -> Self
    where
        D: fmt::Display,
    {
        Self {
            msg: msg.to_string(),
            kind,
        }
    }

    pub fn kind(&self) -> FlowErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }
}

pub fn err_msg<D>(kind: FlowErrorKind, msg: D) -> FlowError
where
    D: fmt::Display,
{
    FlowError::from_msg(kind, msg)
}

pub type FlowResult<T> = Result<T, FlowError>;
