//! Uploader posting requests to an HTTP upload gateway.
//!
//! The gateway owns the repository protocol. It receives
//! `POST {gateway_url}/uploads` with a JSON body and answers
//! `{ "filename": "..." }`, or an error status with `{ "error": "..." }`.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::uploader::{UploadFailure, UploadFailureKind, UploadRequest, Uploader};

#[derive(Debug, Serialize)]
struct GatewayUpload<'a> {
    org_id: &'a str,
    media_id: &'a str,
    asset_url: &'a str,
    sha256: Option<&'a str>,
    filename: &'a str,
    wikitext: &'a str,
    categories: &'a BTreeSet<String>,
    licence_templates: &'a BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayAccepted {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct GatewayRejected {
    error: String,
}

#[derive(Clone, Debug)]
pub struct HttpUploadClient {
    http_client: Client,
    gateway_url: String,
    token: Option<String>,
}

impl HttpUploadClient {
    pub fn new(
        gateway_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for upload gateway")?;

        Ok(Self {
            http_client,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

fn failure_kind(status: StatusCode) -> UploadFailureKind {
    match status {
        StatusCode::CONFLICT => UploadFailureKind::Conflict,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UploadFailureKind::Auth,
        StatusCode::TOO_MANY_REQUESTS => UploadFailureKind::Quota,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => UploadFailureKind::BadName,
        _ => UploadFailureKind::Other,
    }
}

#[async_trait]
impl Uploader for HttpUploadClient {
    #[tracing::instrument(skip(self, request), fields(media_id = %request.media.id, filename = %request.filename))]
    async fn upload(&self, request: &UploadRequest) -> Result<String, UploadFailure> {
        let body = GatewayUpload {
            org_id: &request.media.id.org_id,
            media_id: &request.media.id.media_id,
            asset_url: &request.file.asset_url,
            sha256: request.file.sha256.as_deref(),
            filename: &request.filename,
            wikitext: &request.wikitext,
            categories: &request.categories,
            licence_templates: &request.licence_templates,
        };

        let mut builder = self
            .http_client
            .post(format!("{}/uploads", self.gateway_url))
            .json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Upload gateway unreachable");
            UploadFailure::new(UploadFailureKind::Other, format!("Gateway unreachable: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            let accepted: GatewayAccepted = response.json().await.map_err(|e| {
                UploadFailure::new(
                    UploadFailureKind::Other,
                    format!("Unreadable gateway response: {}", e),
                )
            })?;
            return Ok(accepted.filename);
        }

        let message = match response.json::<GatewayRejected>().await {
            Ok(rejected) => rejected.error,
            Err(_) => format!("Gateway returned {}", status),
        };
        Err(UploadFailure::new(failure_kind(status), message))
    }
}
