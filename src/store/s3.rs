use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;

use super::{ObjectStore, PutOptions, StoreError};

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Client built from the default credential and region chain.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest()).load().await;
        S3Store { client: aws_sdk_s3::Client::new(&shared), bucket: bucket.into() }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StoreError::List {
                bucket: self.bucket.clone(),
                prefix: prefix.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }
        Ok(keys)
    }

    async fn put(&self, key: &str, body: Vec<u8>, opts: PutOptions) -> Result<(), StoreError> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(opts.content_type)
            .body(ByteStream::from(body));
        if opts.public_read {
            req = req.acl(ObjectCannedAcl::PublicRead);
        }
        req.send().await.map_err(|e| StoreError::Put {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            reason: DisplayErrorContext(&e).to_string(),
        })?;
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
