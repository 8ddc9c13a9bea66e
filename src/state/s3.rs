//! S3-based state storage backend.
//!
//! Each tracked object is stored as its own JSON document under
//! `{prefix}resources/{key}.json`, so commits on different keys never
//! contend for the same object.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{LifecycleError, Result, StateError};

use super::store::StateStore;
use super::types::{ResourceState, StateDocument};

/// Key segment under which resource documents are stored.
const RESOURCES_DIR: &str = "resources/";

/// Suffix of every resource document.
const DOCUMENT_SUFFIX: &str = ".json";

/// S3-based state store.
#[derive(Debug)]
pub struct S3StateStore {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Key prefix.
    prefix: String,
}

fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix
        .map(|p| {
            let p = p.trim_matches('/');
            if p.is_empty() {
                String::new()
            } else {
                format!("{p}/")
            }
        })
        .unwrap_or_default()
}

impl S3StateStore {
    /// Creates a new S3 state store.
    ///
    /// # Errors
    ///
    /// Returns an error if the S3 client cannot be initialized.
    pub async fn new(bucket: &str, prefix: Option<&str>, region: Option<&str>) -> Result<Self> {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Ok(Self::with_client(Client::new(&config), bucket, prefix))
    }

    /// Creates a new S3 state store with an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str, prefix: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
        }
    }

    /// Gets the S3 prefix under which every resource document lives.
    fn resources_prefix(&self) -> String {
        format!("{}{RESOURCES_DIR}", self.prefix)
    }

    /// Gets the full S3 key for a durable key.
    fn object_key(&self, key: &str) -> String {
        format!("{}{key}{DOCUMENT_SUFFIX}", self.resources_prefix())
    }

    /// Gets an object from S3.
    async fn get_object(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(response) => {
                let bytes = response.body.collect().await.map_err(|e| {
                    LifecycleError::State(StateError::s3(format!("Failed to read S3 object: {e}")))
                })?;

                let content = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    LifecycleError::State(StateError::Corrupted {
                        message: format!("Invalid UTF-8 in S3 object: {e}"),
                    })
                })?;

                Ok(Some(content))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(LifecycleError::State(StateError::s3(format!(
                        "S3 get error: {service_err}"
                    ))))
                }
            }
        }
    }

    /// Lists every resource document key, following continuation tokens.
    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(self.resources_prefix())
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| LifecycleError::State(StateError::s3(format!("S3 list error: {e}"))))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter(|key| key.ends_with(DOCUMENT_SUFFIX))
                    .map(ToString::to_string),
            );

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl StateStore for S3StateStore {
    async fn load(&self, key: &str) -> Result<Option<ResourceState>> {
        let object_key = self.object_key(key);
        debug!("Loading state from s3://{}/{object_key}", self.bucket);

        match self.get_object(&object_key).await? {
            Some(json) => Ok(Some(StateDocument::parse(&json)?)),
            None => {
                debug!("No state found in S3 for {key}");
                Ok(None)
            }
        }
    }

    async fn commit(&self, state: &ResourceState) -> Result<()> {
        let object_key = self.object_key(&state.key());

        let content = StateDocument::render(state)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(content.into_bytes().into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| LifecycleError::State(StateError::s3(format!("S3 put error: {e}"))))?;

        info!(
            "Committed {} state to s3://{}/{object_key}",
            state.completeness, self.bucket
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let object_key = self.object_key(key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| LifecycleError::State(StateError::s3(format!("S3 delete error: {e}"))))?;

        info!("Removed state s3://{}/{object_key}", self.bucket);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResourceState>> {
        let mut states = Vec::new();

        for object_key in self.list_keys().await? {
            if let Some(json) = self.get_object(&object_key).await? {
                states.push(StateDocument::parse(&json)?);
            }
        }

        Ok(states)
    }

    fn backend_type(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(prefix: Option<&str>) -> S3StateStore {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        S3StateStore::with_client(Client::from_conf(config), "bucket", prefix)
    }

    #[test]
    fn test_object_key_layout() {
        assert_eq!(
            store(Some("/team/state/")).object_key("proj/eu-1/lb-1"),
            "team/state/resources/proj/eu-1/lb-1.json"
        );
        assert_eq!(store(None).object_key("proj/tok-1"), "resources/proj/tok-1.json");
        assert_eq!(store(Some("")).resources_prefix(), "resources/");
    }
}
