use super::error::{FlowError, FlowErrorKind};

impl From<reqwest::Error> for FlowError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() || err.is_connect() {
            FlowErrorKind::PostFailed
        } else if err.is_decode() {
            FlowErrorKind::InvalidHttpResponse
        } else {
            FlowErrorKind::PostFailed
        };
        FlowError::from_msg(kind, err)
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::from_msg(FlowErrorKind::InvalidJson, err)
    }
}

impl From<url::ParseError> for FlowError {
    fn from(err: url::ParseError) -> Self {
        FlowError::from_msg(FlowErrorKind::InvalidUrl, err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FlowError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FlowError::from_msg(FlowErrorKind::ChannelClosed, err)
    }
}
