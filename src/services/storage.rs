use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use std::path::Path;

/// Access policy applied to an uploaded object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAccess {
    Private,
    PublicRead,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Every key under `prefix`. Implementations must return the complete listing or an error.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Stores the file at `path` under `key`, streaming it from disk
    async fn upload_file(&self, key: &str, path: &Path, access: ObjectAccess) -> Result<()>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3StorageService {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await?;

            if let Some(contents) = res.contents {
                for object in contents {
                    if let Some(key) = object.key {
                        objects.push(key);
                    }
                }
            }

            if res.is_truncated.unwrap_or(false) {
                continuation_token = res.next_continuation_token;
                if continuation_token.is_none() {
                    return Err(anyhow::anyhow!(
                        "Truncated listing of '{}' without a continuation token",
                        self.bucket
                    ));
                }
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn upload_file(&self, key: &str, path: &Path, access: ObjectAccess) -> Result<()> {
        let body = ByteStream::from_path(path).await?;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);

        if access == ObjectAccess::PublicRead {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        let res = request.send().await;
        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                key,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }
}
