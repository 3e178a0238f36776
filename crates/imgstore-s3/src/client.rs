//! Region-aware S3 client cache.
//!
//! Requests go through the client cached for their bucket, or the default
//! client when the bucket has never redirected. A region redirect installs a
//! client for that region and pins the bucket to it for the reader's
//! lifetime. Entries are never evicted.

use std::collections::HashMap;

use aws_config::{Region, SdkConfig};
use parking_lot::RwLock;
use tracing::debug;

/// The clients used to read from one region.
#[derive(Debug, Clone)]
pub(crate) struct RegionClient {
    /// S3 client pinned to the region.
    pub s3: aws_sdk_s3::Client,
    /// KMS client for unwrapping data keys, present when decryption is on.
    pub kms: Option<aws_sdk_kms::Client>,
}

/// Builds [`RegionClient`]s that share everything but the region.
#[derive(Debug)]
pub(crate) struct ClientFactory {
    sdk_config: SdkConfig,
    endpoint: Option<String>,
    path_style: bool,
    decryption: bool,
}

impl ClientFactory {
    pub(crate) fn new(
        sdk_config: SdkConfig,
        endpoint: Option<String>,
        path_style: bool,
        decryption: bool,
    ) -> Self {
        Self {
            sdk_config,
            endpoint,
            path_style,
            decryption,
        }
    }

    pub(crate) fn build(&self, region: Region) -> RegionClient {
        let mut s3_config = aws_sdk_s3::config::Builder::from(&self.sdk_config).region(region.clone());
        if let Some(endpoint) = &self.endpoint {
            s3_config = s3_config
                .endpoint_url(endpoint)
                .force_path_style(self.path_style);
        }

        let kms = self.decryption.then(|| {
            let kms_config = aws_sdk_kms::config::Builder::from(&self.sdk_config)
                .region(region)
                .build();
            aws_sdk_kms::Client::from_conf(kms_config)
        });

        RegionClient {
            s3: aws_sdk_s3::Client::from_conf(s3_config.build()),
            kms,
        }
    }
}

#[derive(Debug, Default)]
struct Clients {
    by_region: HashMap<String, RegionClient>,
    by_bucket: HashMap<String, RegionClient>,
}

/// Bucket → client and region → client maps behind one lock.
#[derive(Debug)]
pub(crate) struct ClientCache {
    factory: ClientFactory,
    default: RegionClient,
    clients: RwLock<Clients>,
}

impl ClientCache {
    /// Create a cache seeded with a client for `default_region`.
    pub(crate) fn new(factory: ClientFactory, default_region: Region) -> Self {
        let default = factory.build(default_region.clone());
        let mut clients = Clients::default();
        clients
            .by_region
            .insert(default_region.to_string(), default.clone());

        Self {
            factory,
            default,
            clients: RwLock::new(clients),
        }
    }

    /// The client pinned to `bucket`, or the default client.
    pub(crate) fn bucket_client(&self, bucket: &str) -> RegionClient {
        self.clients
            .read()
            .by_bucket
            .get(bucket)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    /// Pin `bucket` to a client for `region`, creating the client if needed.
    ///
    /// Re-checks under the write lock so concurrent discoveries of the same
    /// bucket build at most one client.
    pub(crate) fn region_client(&self, bucket: &str, region: &str) -> RegionClient {
        let mut clients = self.clients.write();

        if let Some(client) = clients.by_bucket.get(bucket) {
            return client.clone();
        }

        let client = match clients.by_region.get(region) {
            Some(client) => client.clone(),
            None => {
                debug!(region, "creating regional S3 client");
                let client = self.factory.build(Region::new(region.to_owned()));
                clients.by_region.insert(region.to_owned(), client.clone());
                client
            }
        };

        clients.by_bucket.insert(bucket.to_owned(), client.clone());
        client
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> (usize, usize) {
        let clients = self.clients.read();
        (clients.by_region.len(), clients.by_bucket.len())
    }
}
