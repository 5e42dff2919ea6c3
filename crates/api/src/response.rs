//! Uniform response envelope.
//!
//! Every response, success or failure, is `{ "code", "message", "data" }`.
//! `code` is `0` on success; failures use the codes in [`crate::error::codes`].

use serde::Serialize;

use crate::error::codes;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: codes::SUCCESS,
            message: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload.
    pub fn done() -> Self {
        Self {
            code: codes::SUCCESS,
            message: "ok".to_string(),
            data: None,
        }
    }
}
