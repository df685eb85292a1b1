//! HTTP client for a running BirdTag server.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::exit_codes::{DATA_ERROR, NETWORK_ERROR, USAGE_ERROR};

/// Client-side failures, classified for exit codes.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid server URL '{0}'")]
    InvalidServerUrl(String),

    #[error("Server unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("Server rejected request ({status} {code}): {message}")]
    Rejected {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Unexpected server response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidServerUrl(_) => USAGE_ERROR,
            Self::Unreachable(_) => NETWORK_ERROR,
            Self::Rejected { status, .. } if status.is_server_error() => NETWORK_ERROR,
            Self::Rejected { .. } | Self::InvalidResponse(_) => DATA_ERROR,
        }
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(server: &str) -> Result<Self, ClientError> {
        let base = server.trim_end_matches('/').to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::InvalidServerUrl(server.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(ClientError::Unreachable)?;
        Ok(Self { http, base })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// POST a JSON body and decode the JSON answer.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ClientError> {
        debug!(path, "POST");
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(ClientError::Unreachable)?;
        decode(response).await
    }

    /// Upload a file as multipart form data with a `user_id` field.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file: &Path,
        data: Vec<u8>,
        user_id: &str,
    ) -> Result<T, ClientError> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let form = Form::new()
            .text("user_id", user_id.to_string())
            .part("file", part);

        debug!(path, file = %file.display(), "Multipart upload");
        let response = self
            .http
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::Unreachable)?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await.map_err(ClientError::Unreachable)?;

    if !status.is_success() {
        let error: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        return Err(ClientError::Rejected {
            status,
            code: error["code"].as_str().unwrap_or("UNKNOWN").to_string(),
            message: error["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned()),
        });
    }

    serde_json::from_slice(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url_must_be_http() {
        assert!(ApiClient::new("localhost:3000").is_err());
        let client = ApiClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.url("/query"), "http://localhost:3000/query");
    }

    #[test]
    fn test_rejections_map_to_exit_codes() {
        let rejected = |status| ClientError::Rejected {
            status,
            code: "X".into(),
            message: "x".into(),
        };
        assert_eq!(rejected(StatusCode::BAD_REQUEST).exit_code(), DATA_ERROR);
        assert_eq!(rejected(StatusCode::SERVICE_UNAVAILABLE).exit_code(), NETWORK_ERROR);
    }
}
