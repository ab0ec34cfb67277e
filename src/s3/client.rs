//! AWS SDK backed object store
//!
//! One SDK client is built per region on first use and cached for the
//! lifetime of the store.

use super::{
    CompletedPart, ObjectBody, ObjectStore, PutObjectResponse, StoreError, UploadPartResponse,
};
use crate::config::S3Config;
use crate::location::Location;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as SdkCompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use dashmap::DashMap;

/// S3 object store
pub struct S3Store {
    sdk_config: SdkConfig,
    endpoint: Option<String>,
    force_path_style: bool,
    clients: DashMap<String, Client>,
}

impl S3Store {
    /// Create a store from a loaded SDK configuration
    pub fn new(sdk_config: SdkConfig, config: &S3Config) -> Self {
        Self {
            sdk_config,
            endpoint: config.endpoint.clone(),
            force_path_style: config.force_path_style,
            clients: DashMap::new(),
        }
    }

    /// Create a store using the default AWS credential and region chain
    pub async fn from_env(config: &S3Config) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(sdk_config, config)
    }

    /// Get (or build) the client for `region`
    pub fn client(&self, region: &str) -> Client {
        if let Some(client) = self.clients.get(region) {
            return client.clone();
        }

        let mut builder = aws_sdk_s3::config::Builder::from(&self.sdk_config)
            .region(Region::new(region.to_string()))
            .force_path_style(self.force_path_style);
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::debug!(region = region, endpoint = ?self.endpoint, "Created S3 client");

        let client = Client::from_conf(builder.build());
        self.clients
            .entry(region.to_string())
            .or_insert(client)
            .clone()
    }

    /// Number of regional clients built so far
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

fn request_error<E>(err: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::RequestError(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl ObjectStore for S3Store {
    #[tracing::instrument(
        name = "s3.get_object",
        skip(self),
        fields(
            s3.bucket = %location.container,
            s3.key = %location.key,
            s3.region = %region,
            s3.content_length = tracing::field::Empty
        ),
        err
    )]
    async fn get_object(
        &self,
        location: &Location,
        region: &str,
    ) -> Result<ObjectBody, StoreError> {
        let output = self
            .client(region)
            .get_object()
            .bucket(&location.container)
            .key(&location.key)
            .send()
            .await
            .map_err(request_error)?;

        let declared_size = output.content_length().unwrap_or_default().max(0) as u64;
        tracing::Span::current().record("s3.content_length", declared_size);

        Ok(ObjectBody {
            reader: Box::pin(output.body.into_async_read()),
            declared_size,
        })
    }

    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, body),
        fields(
            s3.bucket = %location.container,
            s3.key = %location.key,
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_object(
        &self,
        location: &Location,
        region: &str,
        body: Bytes,
    ) -> Result<PutObjectResponse, StoreError> {
        let content_length = body.len() as i64;
        let output = self
            .client(region)
            .put_object()
            .bucket(&location.container)
            .key(&location.key)
            .content_length(content_length)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(request_error)?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(etag) = &etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }

        Ok(PutObjectResponse { etag })
    }

    #[tracing::instrument(
        name = "s3.create_multipart_upload",
        skip(self),
        fields(
            s3.bucket = %location.container,
            s3.key = %location.key,
            s3.upload_id = tracing::field::Empty
        ),
        err
    )]
    async fn create_multipart_upload(
        &self,
        location: &Location,
        region: &str,
    ) -> Result<String, StoreError> {
        let output = self
            .client(region)
            .create_multipart_upload()
            .bucket(&location.container)
            .key(&location.key)
            .send()
            .await
            .map_err(request_error)?;

        let upload_id = output
            .upload_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::ResponseError("missing UploadId".into()))?
            .to_string();
        tracing::Span::current().record("s3.upload_id", upload_id.as_str());

        Ok(upload_id)
    }

    #[tracing::instrument(
        name = "s3.upload_part",
        skip(self, body),
        fields(
            s3.bucket = %location.container,
            s3.upload_id = %upload_id,
            s3.part_number = part_number,
            upload.bytes = body.len()
        ),
        err
    )]
    async fn upload_part(
        &self,
        location: &Location,
        region: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<UploadPartResponse, StoreError> {
        let content_length = body.len() as i64;
        let output = self
            .client(region)
            .upload_part()
            .bucket(&location.container)
            .key(&location.key)
            .upload_id(upload_id)
            .part_number(part_number as i32)
            .content_length(content_length)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(request_error)?;

        Ok(UploadPartResponse {
            etag: output.e_tag().map(str::to_string),
        })
    }

    #[tracing::instrument(
        name = "s3.complete_multipart_upload",
        skip(self, parts),
        fields(
            s3.bucket = %location.container,
            s3.upload_id = %upload_id,
            parts_count = parts.len()
        ),
        err
    )]
    async fn complete_multipart_upload(
        &self,
        location: &Location,
        region: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StoreError> {
        let parts = parts
            .into_iter()
            .map(|part| {
                SdkCompletedPart::builder()
                    .part_number(part.part_number as i32)
                    .e_tag(part.etag)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client(region)
            .complete_multipart_upload()
            .bucket(&location.container)
            .key(&location.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(request_error)?;

        Ok(())
    }

    #[tracing::instrument(
        name = "s3.abort_multipart_upload",
        skip(self),
        fields(
            s3.bucket = %location.container,
            s3.upload_id = %upload_id
        ),
        err
    )]
    async fn abort_multipart_upload(
        &self,
        location: &Location,
        region: &str,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        self.client(region)
            .abort_multipart_upload()
            .bucket(&location.container)
            .key(&location.key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(request_error)?;

        Ok(())
    }
}
