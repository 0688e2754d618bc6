//! S3 storage wrapper
//!
//! One [`Storage`] handle per bucket. Every coordination channel in the
//! system — input discovery, manifest dispatch, completion markers, result
//! retrieval — goes through these primitives.

use anyhow::{anyhow, Context, Result};
use aws_sdk_s3::{config::Region, primitives::ByteStream, Client};
use std::path::Path;
use tracing::{debug, info, instrument};

pub mod config;

pub use config::StorageConfig;

/// A bucket-scoped S3 client.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

/// One listed object: key plus byte size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

impl Storage {
    pub async fn new(config: StorageConfig, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        debug!(bucket = %bucket, region = %config.region, "Initializing storage client");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        Self { client, bucket }
    }

    /// Build a handle for a sibling bucket sharing this client's connection.
    pub fn for_bucket(&self, bucket: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Fully paginated listing under a prefix. Listings here are unbounded
    /// (a run may cover thousands of lanes), so every page is drained.
    #[instrument(skip(self))]
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.context("Failed to list S3 objects")?;
            for obj in page.contents() {
                if let Some(key) = obj.key() {
                    entries.push(ObjectEntry {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }
        }

        debug!(
            "Listed {} objects under s3://{}/{}",
            entries.len(),
            self.bucket,
            prefix
        );
        Ok(entries)
    }

    /// Byte size of one object via a head request.
    #[instrument(skip(self))]
    pub async fn object_size(&self, key: &str) -> Result<u64> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context(format!("Failed to head s3://{}/{}", self.bucket, key))?;

        Ok(response.content_length().unwrap_or(0).max(0) as u64)
    }

    #[instrument(skip(self, data))]
    pub async fn put_bytes(&self, key: &str, data: Vec<u8>) -> Result<()> {
        debug!(
            "Uploading {} bytes to s3://{}/{}",
            data.len(),
            self.bucket,
            key
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .context(format!("Failed to upload to s3://{}/{}", self.bucket, key))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    /// Upload a zero-byte object (completion markers).
    pub async fn put_empty(&self, key: &str) -> Result<()> {
        self.put_bytes(key, Vec::new()).await
    }

    #[instrument(skip(self))]
    pub async fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .context(format!("Failed to open {} for upload", path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .context(format!("Failed to upload to s3://{}/{}", self.bucket, key))?;

        info!("Uploaded {} to s3://{}/{}", path.display(), self.bucket, key);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context(format!(
                "Failed to download s3://{}/{}",
                self.bucket, key
            ))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!(
            "Downloaded {} bytes from s3://{}/{}",
            data.len(),
            self.bucket,
            key
        );
        Ok(data)
    }

    /// Stream an object to a local file, creating parent directories.
    #[instrument(skip(self))]
    pub async fn download_to_file(&self, key: &str, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create {}", parent.display()))?;
        }

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context(format!(
                "Failed to download s3://{}/{}",
                self.bucket, key
            ))?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(path)
            .await
            .context(format!("Failed to create {}", path.display()))?;

        use tokio::io::AsyncWriteExt;
        while let Some(chunk) = body
            .try_next()
            .await
            .context("Failed to read S3 response body")?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(
            "Downloaded s3://{}/{} to {}",
            self.bucket,
            key,
            path.display()
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("404") {
                    Ok(false)
                } else {
                    Err(anyhow!("Failed to check S3 object existence: {}", e))
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context(format!("Failed to delete s3://{}/{}", self.bucket, key))?;

        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
