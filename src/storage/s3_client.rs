//! S3-compatible storage client
//!
//! Wraps the AWS SDK for S3-compatible multipart uploads.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use axum::body::Bytes;

use crate::config::StorageConfig;
use crate::error::StorageError;

use super::backend::ObjectBackend;
use super::types::{MultipartUpload, UploadedPart};

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from configuration
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "chunk-relay",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.resolved_region()))
            .credentials_provider(credentials)
            .force_path_style(config.provider.path_style())
            .build();

        let client = Client::from_conf(s3_config);

        // Test connection by checking if bucket exists
        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    DisplayErrorContext(&e)
                );
            }
        }

        Ok(Self { client, bucket })
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

}

#[async_trait]
impl ObjectBackend for S3Client {
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                StorageError::SdkError(format!(
                    "Failed to create multipart upload for {}: {}",
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        response
            .upload_id()
            .map(|id| id.to_string())
            .ok_or_else(|| StorageError::SdkError(format!("No upload id returned for {}", key)))
    }

    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: i32,
        data: Bytes,
    ) -> Result<UploadedPart, StorageError> {
        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                StorageError::SdkError(format!(
                    "Failed to upload part {} of {}: {}",
                    part_number,
                    upload.key,
                    DisplayErrorContext(&e)
                ))
            })?;

        let etag = response.e_tag().ok_or_else(|| {
            StorageError::SdkError(format!("No ETag returned for part {}", part_number))
        })?;

        Ok(UploadedPart {
            part_number,
            etag: etag.to_string(),
        })
    }

    async fn complete_multipart_upload(
        &self,
        upload: &MultipartUpload,
        parts: &[UploadedPart],
    ) -> Result<(), StorageError> {
        let completed_parts: Vec<CompletedPart> = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();

        let multipart = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .multipart_upload(multipart)
            .send()
            .await
            .map_err(|e| {
                StorageError::SdkError(format!(
                    "Failed to complete multipart upload {}: {}",
                    upload.key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }

    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(|e| {
                StorageError::SdkError(format!(
                    "Failed to abort multipart upload {}: {}",
                    upload.key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }

    /// Check if an object exists (HEAD request)
    async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::SdkError(format!(
                "Failed to head object {}: {}",
                key,
                DisplayErrorContext(&e)
            ))),
        }
    }
}
