use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

pub mod s3;

/// Bucket/key object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream>;
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Object store backed by a map, keyed by `(bucket, key)`.
    #[derive(Default)]
    pub struct MemoryStore {
        objects: Mutex<HashMap<(String, String), Bytes>>,
        gets: Mutex<Vec<(String, String)>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), body.into());
        }

        pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        pub fn keys(&self, bucket: &str) -> Vec<String> {
            let mut keys: Vec<String> = self
                .objects
                .lock()
                .unwrap()
                .keys()
                .filter(|(b, _)| b == bucket)
                .map(|(_, k)| k.clone())
                .collect();
            keys.sort();
            keys
        }

        pub fn gets(&self) -> Vec<(String, String)> {
            self.gets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put(&self, bucket: &str, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
            self.insert(bucket, key, body);
            Ok(())
        }

        async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream> {
            self.gets
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string()));
            let body = self
                .object(bucket, key)
                .ok_or_else(|| anyhow::anyhow!("no such object s3://{}/{}", bucket, key))?;
            Ok(ByteStream::from(body))
        }
    }
}
