//! Task outcome: message plus optional error.
//!
//! The message is for humans and logs. Success is exactly "no error"; a
//! message next to an error never means the task succeeded.

use super::errors::GatewayError;
use super::request::TaskResponse;

#[derive(Debug)]
pub struct TaskOutcome {
    pub message: String,
    pub error: Option<GatewayError>,
}

impl TaskOutcome {
    /// 成功した outcome
    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: None,
        }
    }

    /// 失敗した outcome。message は説明用
    pub fn failed(message: impl Into<String>, error: GatewayError) -> Self {
        Self {
            message: message.into(),
            error: Some(error),
        }
    }

    /// error がなければ成功
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Boundary shape: `{message}` on success, the error otherwise.
    pub fn into_result(self) -> Result<TaskResponse, GatewayError> {
        match self.error {
            None => Ok(TaskResponse {
                message: self.message,
            }),
            Some(err) => Err(err),
        }
    }
}
