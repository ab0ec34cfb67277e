//! Request handler
//!
//! Decodes the invocation payload, runs the job and serializes the response
//! envelope. This is the only place an [`ExtractError`] becomes a status code.
//!
//! # Payload
//!
//! ```json
//! {
//!   "sourceUri": "s3://incoming/batch.tar.gz",
//!   "destinationUri": "s3://extracted/batch/",
//!   "sourceRegion": "us-east-1",
//!   "destinationRegion": "eu-west-1"
//! }
//! ```

use crate::error::ExtractError;
use crate::metrics;
use crate::pipeline::{ExtractJob, Extractor};
use lambda_http::{Body, Request, Response};
use serde::Deserialize;
use serde_json::{json, Value};

/// Raw invocation payload; every field is optional until validated
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    #[serde(default)]
    pub source_uri: Option<String>,
    #[serde(default)]
    pub destination_uri: Option<String>,
    #[serde(default)]
    pub source_region: Option<String>,
    #[serde(default)]
    pub destination_region: Option<String>,
}

impl ExtractRequest {
    /// Parse a JSON body; an empty body is an empty request
    pub fn from_body(body: &[u8]) -> Result<Self, ExtractError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ExtractError::InvalidRequest(e.to_string()))
    }

    /// Validate required fields and fill regions from `default_region`
    pub fn into_job(self, default_region: &str) -> Result<ExtractJob, ExtractError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let (Some(source_uri), Some(destination_uri)) =
            (non_empty(self.source_uri), non_empty(self.destination_uri))
        else {
            return Err(ExtractError::InvalidRequest(
                "sourceUri and destinationUri are required".into(),
            ));
        };

        Ok(ExtractJob {
            source_uri,
            destination_uri,
            source_region: non_empty(self.source_region)
                .unwrap_or_else(|| default_region.to_string()),
            destination_region: non_empty(self.destination_region)
                .unwrap_or_else(|| default_region.to_string()),
        })
    }
}

/// Status code and JSON body of a response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: Value,
}

impl ApiResponse {
    fn failure(error: &ExtractError, message: &str) -> Self {
        Self {
            status_code: error.status_code(),
            body: json!({
                "message": message,
                "error": error.to_string(),
                "errorType": error.kind(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Convert into an HTTP response for the Lambda runtime
    pub fn into_http(self) -> Result<Response<Body>, lambda_http::http::Error> {
        Response::builder()
            .status(self.status_code)
            .header("Content-Type", "application/json")
            .body(Body::Text(self.body.to_string()))
    }
}

/// Handles invocations against one [`Extractor`]
pub struct Handler {
    extractor: Extractor,
    default_region: String,
}

impl Handler {
    pub fn new(extractor: Extractor, default_region: impl Into<String>) -> Self {
        Self {
            extractor,
            default_region: default_region.into(),
        }
    }

    /// Handle a raw JSON body
    pub async fn handle_body(&self, body: &[u8]) -> ApiResponse {
        let request = match ExtractRequest::from_body(body) {
            Ok(request) => request,
            Err(e) => return self.reject(&e, "Error parsing request body"),
        };
        self.handle(request).await
    }

    /// Handle a decoded request
    pub async fn handle(&self, request: ExtractRequest) -> ApiResponse {
        let job = match request.into_job(&self.default_region) {
            Ok(job) => job,
            Err(e) => return self.reject(&e, "Missing required parameters"),
        };

        tracing::info!(
            source = %job.source_uri,
            destination = %job.destination_uri,
            source_region = %job.source_region,
            destination_region = %job.destination_region,
            "Processing request"
        );

        match self.extractor.run(&job).await {
            Ok(result) => ApiResponse {
                status_code: 200,
                body: json!({
                    "message": "File processed successfully",
                    "source": job.source_uri,
                    "destination": job.destination_uri,
                    "processedFiles": result.processed_files,
                    "fileType": result.file_type,
                }),
            },
            Err(e) => self.reject(&e, "Error processing request"),
        }
    }

    /// Lambda entry point for API Gateway proxy events
    pub async fn handle_http(&self, request: Request) -> Result<Response<Body>, lambda_http::Error> {
        let response = self.handle_body(request.body().as_ref()).await;
        Ok(response.into_http()?)
    }

    fn reject(&self, error: &ExtractError, message: &str) -> ApiResponse {
        metrics::record_error(error.kind());
        if error.is_client_error() {
            tracing::warn!(error = %error, error_type = error.kind(), "Rejected request");
        } else {
            tracing::error!(error = %error, error_type = error.kind(), "Extraction failed");
        }
        ApiResponse::failure(error, message)
    }
}
