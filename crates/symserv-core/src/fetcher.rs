//! Component C: the symbol fetcher.
//!
//! Checks the existence cache first, then probes origins in registry order,
//! short-circuiting on the first presence. A per-probe timeout turns a slow
//! origin into a miss for that origin rather than a fatal error -- one
//! origin's outage must never impair another's availability.

use std::sync::Arc;
use std::time::{Duration, Instant};

use aws_sdk_s3::config::Region;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{error, warn};

use crate::error::SymbolError;
use crate::existence_cache::{Existence, ExistenceCache};
use crate::key::DownloadKey;
use crate::origin::{Access, Origin, OriginRegistry};

pub type ByteStream = std::pin::Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Outcome of a presence probe (cached or live).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Present { origin_index: usize, url: String },
    Absent,
}

#[derive(Clone)]
pub struct SymbolFetcher {
    origins: Arc<OriginRegistry>,
    existence: Arc<ExistenceCache>,
    http: reqwest::Client,
    s3_clients: Vec<Option<aws_sdk_s3::Client>>,
    probe_timeout: Duration,
    signed_url_ttl: Duration,
}

impl SymbolFetcher {
    pub async fn new(
        origins: Arc<OriginRegistry>,
        existence: Arc<ExistenceCache>,
        probe_timeout: Duration,
    ) -> Self {
        let s3_clients = build_s3_clients(&origins).await;
        SymbolFetcher {
            origins,
            existence,
            http: reqwest::Client::new(),
            s3_clients,
            probe_timeout,
            signed_url_ttl: Duration::from_secs(300),
        }
    }

    /// `head(key) -> Present(url) | Absent`, plus how long the (possibly
    /// cached) lookup took.
    pub async fn head(&self, key: &DownloadKey) -> (Presence, Duration) {
        let started = Instant::now();
        if let Some(existence) = self.existence.get(key) {
            return (existence.into(), started.elapsed());
        }
        let presence = self.probe_all(key).await;
        self.record_presence(key, &presence);
        (presence, started.elapsed())
    }

    /// A usable URL for `key`: the direct URL for a public origin, or a
    /// freshly (re-)signed URL for a private one. `None` if absent.
    pub async fn url(&self, key: &DownloadKey) -> (Option<String>, Duration) {
        let started = Instant::now();
        let origin_index = match self.existence.get(key) {
            Some(Existence::Present { origin_index, url, .. }) => {
                match self.origins.get(origin_index) {
                    Some(origin) if origin.access == Access::Public => {
                        return (Some(url), started.elapsed());
                    }
                    Some(_) => origin_index,
                    None => return (None, started.elapsed()),
                }
            }
            Some(Existence::Absent { .. }) => return (None, started.elapsed()),
            None => match self.probe_all(key).await {
                Presence::Present { origin_index, url } => {
                    self.existence.put_present(key.clone(), origin_index, url);
                    origin_index
                }
                Presence::Absent => {
                    self.existence.put_absent(key.clone());
                    return (None, started.elapsed());
                }
            },
        };
        let url = match self.origins.get(origin_index) {
            Some(origin) => self.build_url(origin_index, origin, key).await,
            None => None,
        };
        (url, started.elapsed())
    }

    /// Opens a byte stream from the first origin that has `key`, returning
    /// the resolved URL alongside it for logging/debug purposes.
    pub async fn stream(&self, key: &DownloadKey) -> Result<(String, ByteStream, Duration), SymbolError> {
        let started = Instant::now();
        let (presence, _) = self.head(key).await;
        let (origin_index, url) = match presence {
            Presence::Present { origin_index, url } => (origin_index, url),
            Presence::Absent => return Err(SymbolError::NotFound),
        };
        let origin = self.origins.get(origin_index).ok_or(SymbolError::NotFound)?;
        let body = match origin.access {
            Access::Public => {
                let resp = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| SymbolError::Transient(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(SymbolError::NotFound);
                }
                Box::pin(resp.bytes_stream().map(map_reqwest_err)) as ByteStream
            }
            Access::Private => {
                let client = self
                    .s3_clients
                    .get(origin_index)
                    .and_then(|c| c.as_ref())
                    .ok_or_else(|| SymbolError::Transient("no s3 client for origin".into()))?;
                let bucket = origin
                    .bucket_name()
                    .ok_or_else(|| SymbolError::Transient("origin missing bucket name".into()))?;
                let object = client
                    .get_object()
                    .bucket(bucket)
                    .key(key.relative_path())
                    .send()
                    .await
                    .map_err(|e| SymbolError::Transient(e.to_string()))?;
                Box::pin(futures_util::stream::unfold(object.body, |mut body| async move {
                    body.next().await.map(|r| (map_bytestream_err(r), body))
                })) as ByteStream
            }
        };
        Ok((url, body, started.elapsed()))
    }

    async fn probe_all(&self, key: &DownloadKey) -> Presence {
        for (index, origin) in self.origins.iter() {
            let probe = self.probe_one(index, origin, key);
            match tokio::time::timeout(self.probe_timeout, probe).await {
                Ok(Ok(true)) => {
                    let url = self
                        .build_url(index, origin, key)
                        .await
                        .unwrap_or_else(|| direct_url(origin, key));
                    return Presence::Present {
                        origin_index: index,
                        url,
                    };
                }
                Ok(Ok(false)) => continue,
                Ok(Err(err)) => {
                    error!(origin = %origin.base_url, key = %key, %err, "origin probe errored, treating as miss");
                    continue;
                }
                Err(_) => {
                    warn!(origin = %origin.base_url, key = %key, "origin probe timed out, treating as miss");
                    continue;
                }
            }
        }
        Presence::Absent
    }

    async fn probe_one(
        &self,
        index: usize,
        origin: &Origin,
        key: &DownloadKey,
    ) -> Result<bool, SymbolError> {
        match origin.access {
            Access::Public => {
                let url = direct_url(origin, key);
                let resp = self
                    .http
                    .head(&url)
                    .send()
                    .await
                    .map_err(|e| SymbolError::Transient(e.to_string()))?;
                Ok(resp.status().is_success())
            }
            Access::Private => {
                let client = self
                    .s3_clients
                    .get(index)
                    .and_then(|c| c.as_ref())
                    .ok_or_else(|| SymbolError::Transient("no s3 client for origin".into()))?;
                let bucket = origin
                    .bucket_name()
                    .ok_or_else(|| SymbolError::Transient("origin missing bucket name".into()))?;
                match client
                    .head_object()
                    .bucket(bucket)
                    .key(key.relative_path())
                    .send()
                    .await
                {
                    Ok(_) => Ok(true),
                    Err(err) => {
                        if err
                            .as_service_error()
                            .map(|e| e.is_not_found())
                            .unwrap_or(false)
                        {
                            Ok(false)
                        } else {
                            Err(SymbolError::Transient(err.to_string()))
                        }
                    }
                }
            }
        }
    }

    async fn build_url(&self, index: usize, origin: &Origin, key: &DownloadKey) -> Option<String> {
        match origin.access {
            Access::Public => Some(direct_url(origin, key)),
            Access::Private => {
                let client = self.s3_clients.get(index)?.as_ref()?;
                let bucket = origin.bucket_name()?;
                let presign = aws_sdk_s3::presigning::PresigningConfig::expires_in(self.signed_url_ttl).ok()?;
                let presigned = client
                    .get_object()
                    .bucket(bucket)
                    .key(key.relative_path())
                    .presigned(presign)
                    .await
                    .ok()?;
                Some(presigned.uri().to_string())
            }
        }
    }

    fn record_presence(&self, key: &DownloadKey, presence: &Presence) {
        match presence {
            Presence::Present { origin_index, url } => {
                self.existence
                    .put_present(key.clone(), *origin_index, url.clone());
            }
            Presence::Absent => self.existence.put_absent(key.clone()),
        }
    }
}

impl From<Existence> for Presence {
    fn from(existence: Existence) -> Self {
        match existence {
            Existence::Present { origin_index, url, .. } => Presence::Present { origin_index, url },
            Existence::Absent { .. } => Presence::Absent,
        }
    }
}

fn direct_url(origin: &Origin, key: &DownloadKey) -> String {
    format!("{}/{}", origin.base_url.trim_end_matches('/'), key.relative_path())
}

fn map_reqwest_err(result: Result<Bytes, reqwest::Error>) -> std::io::Result<Bytes> {
    result.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

fn map_bytestream_err(
    result: Result<Bytes, aws_sdk_s3::primitives::ByteStreamError>,
) -> std::io::Result<Bytes> {
    result.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

async fn build_s3_clients(origins: &OriginRegistry) -> Vec<Option<aws_sdk_s3::Client>> {
    let mut clients = Vec::with_capacity(origins.len());
    for (_, origin) in origins.iter() {
        if origin.access != Access::Private {
            clients.push(None);
            continue;
        }
        let mut loader = aws_config::from_env();
        if let Some(region) = &origin.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if let Some(endpoint) = origin.endpoint() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        clients.push(Some(aws_sdk_s3::Client::from_conf(builder.build())));
    }
    clients
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existence_present_maps_to_presence_present() {
        let existence = Existence::Present {
            origin_index: 2,
            url: "https://example.com/x".to_string(),
            probed_at: Instant::now(),
        };
        assert_eq!(
            Presence::from(existence),
            Presence::Present {
                origin_index: 2,
                url: "https://example.com/x".to_string(),
            }
        );
    }

    #[test]
    fn existence_absent_maps_to_presence_absent() {
        let existence = Existence::Absent {
            probed_at: Instant::now(),
        };
        assert_eq!(Presence::from(existence), Presence::Absent);
    }
}
