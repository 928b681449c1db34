//! JSON bodies and error-to-status mapping

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};

use crate::errors::SandboxError;

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Body returned by a successful create
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedBody {
    pub message: String,
    pub name: String,
    pub port: u16,
    pub volume: String,
}

impl ResponseError for SandboxError {
    fn status_code(&self) -> StatusCode {
        match self {
            SandboxError::ContainerNotFound(_) | SandboxError::FileNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            SandboxError::NameInUse(_) => StatusCode::CONFLICT,
            SandboxError::InvalidFileName(_)
            | SandboxError::MissingFile(_)
            | SandboxError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::new(self.to_string()))
    }
}

/// Error response with a context prefix, keeping the error's status
pub fn error_with_context(context: &str, err: &SandboxError) -> HttpResponse {
    HttpResponse::build(err.status_code()).json(ErrorBody::new(format!("{}: {}", context, err)))
}
