use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use log::*;
use moka::sync::Cache;
use url::Url;

use crate::config::AuthConfig;

const MAX_KEYS: u64 = 100;
const MAX_JWKS_BYTES: u64 = 512 * 1024;

/// The identity provider's signing keys, by key id.
///
/// Lookups that miss trigger a fetch of the published key set, at most
/// once per `min_refresh` interval across the whole process.
#[derive(Clone)]
pub struct SigningKeys {
    inner: Arc<Inner>,
}

struct Inner {
    cache: Cache<String, Arc<DecodingKey>>,
    source: KeySource,
    last_refresh: Mutex<Option<Instant>>,
    min_refresh: Duration,
}

enum KeySource {
    Remote {
        client: reqwest::Client,
        jwks_uri: Url,
    },
    Fixed,
}

impl SigningKeys {
    pub fn remote(config: &AuthConfig) -> Result<Self> {
        let jwks_uri = config.jwks_uri()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("rustbucks/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build jwks client")?;
        let cache = Cache::builder()
            .max_capacity(MAX_KEYS)
            .time_to_live(Duration::from_secs(config.key_ttl_secs))
            .build();

        Ok(SigningKeys::with_source(
            cache,
            KeySource::Remote { client, jwks_uri },
            Duration::from_secs(config.min_refresh_secs),
        ))
    }

    /// A key set that never changes and is never fetched.
    pub fn fixed<I: IntoIterator<Item = (String, DecodingKey)>>(keys: I) -> Self {
        let cache = Cache::builder().max_capacity(MAX_KEYS).build();
        for (kid, key) in keys {
            cache.insert(kid, Arc::new(key));
        }
        SigningKeys::with_source(cache, KeySource::Fixed, Duration::default())
    }

    fn with_source(
        cache: Cache<String, Arc<DecodingKey>>,
        source: KeySource,
        min_refresh: Duration,
    ) -> Self {
        let inner = Inner {
            cache,
            source,
            last_refresh: Mutex::new(None),
            min_refresh,
        };
        SigningKeys {
            inner: Arc::new(inner),
        }
    }

    pub async fn get(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        if let Some(key) = self.inner.cache.get(kid) {
            return Some(key);
        }

        match self.refresh().await {
            Ok(0) => trace!("No refresh for kid {:?}", kid),
            Ok(n) => debug!("Loaded {} signing keys looking for {:?}", n, kid),
            Err(e) => warn!("Could not refresh signing keys: {:#}", e),
        }

        self.inner.cache.get(kid)
    }

    /// Fills the cache ahead of the first request.
    pub async fn prefetch(&self) -> Result<usize> {
        self.refresh().await
    }

    fn claim_refresh(&self) -> bool {
        let mut last = match self.inner.last_refresh.lock() {
            Ok(last) => last,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.inner.min_refresh => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    async fn refresh(&self) -> Result<usize> {
        let (client, jwks_uri) = match self.inner.source {
            KeySource::Remote {
                ref client,
                ref jwks_uri,
            } => (client, jwks_uri),
            KeySource::Fixed => return Ok(0),
        };

        if !self.claim_refresh() {
            return Ok(0);
        }

        info!("Fetching signing keys from {}", jwks_uri);
        let mut resp = client
            .get(jwks_uri.clone())
            .send()
            .await?
            .error_for_status()?;
        if let Some(len) = resp.content_length() {
            if len > MAX_JWKS_BYTES {
                anyhow::bail!("JWKS response too large: {} bytes", len);
            }
        }
        // Content-Length is absent on chunked responses.
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.context("read JWKS")? {
            if (body.len() + chunk.len()) as u64 > MAX_JWKS_BYTES {
                anyhow::bail!("JWKS response too large: over {} bytes", MAX_JWKS_BYTES);
            }
            body.extend_from_slice(&chunk);
        }
        let jwks: JwkSet = serde_json::from_slice(&body).context("parse JWKS")?;

        let mut loaded = 0;
        for jwk in jwks.keys.iter() {
            let kid = match jwk.common.key_id {
                Some(ref kid) => kid.clone(),
                None => continue,
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    self.inner.cache.insert(kid, Arc::new(key));
                    loaded += 1;
                }
                Err(e) => warn!("Skipping signing key {:?}: {}", kid, e),
            }
        }
        Ok(loaded)
    }
}
