use thiserror::Error;

/// Shown for failures where no response was received.
pub const UNREACHABLE_MESSAGE: &str = "could not reach server";
pub const MALFORMED_RESPONSE_MESSAGE: &str = "Invalid response format from server";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    #[error("server responded with status {status}{}", detail_suffix(.detail))]
    Remote { status: u16, detail: Option<String> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Message for inline display. Server-supplied detail wins; `fallback`
    /// covers remote failures that arrived without one.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Remote {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ApiError::Remote { detail: None, .. } => fallback.to_string(),
            ApiError::Transport(_) => UNREACHABLE_MESSAGE.to_string(),
            ApiError::Decode(_) => MALFORMED_RESPONSE_MESSAGE.to_string(),
            ApiError::InvalidInput(message) => message.clone(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeLabelError {
    #[error("time label is empty")]
    Empty,
    #[error("time label is not of the form '<hour> AM|PM': {0}")]
    Malformed(String),
    #[error("time label has no AM/PM marker: {0}")]
    MissingMeridiem(String),
    #[error("hour out of range: {0}")]
    InvalidHour(u32),
}
