use crate::codec::{decode_json, ValueCodec};
use crate::config::DiscoveryOptions;
use crate::error::{RegistryError, Result};
use crate::metadata;
use crate::service::ServiceRegistration;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use url::Url;

const TOKEN_HEADER: &str = "X-Consul-Token";

/// ServiceDiscovery registers this process with a Consul-compatible registry
/// and reads/writes its key/value store.
///
/// Every method is a single request to the registry. Nothing is retried or cached.
pub struct ServiceDiscovery {
    options: DiscoveryOptions,
    base_url: Url,
    client: reqwest::Client,
}

impl std::fmt::Debug for ServiceDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDiscovery")
            .field("service_id", &self.options.service_id())
            .field("base_url", &self.base_url.as_str())
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

impl ServiceDiscovery {
    /// Validate the options and connect to the registry.
    ///
    /// Fails fast: the registry leader is checked before the client is returned, so an
    /// unreachable registry surfaces here rather than at registration time.
    pub async fn new(options: DiscoveryOptions) -> Result<Self> {
        options.validate()?;
        Self::connect(options).await
    }

    /// Connect for key/value access only.
    ///
    /// The service identity is not checked here; `register` and `deregister`
    /// still reject options without one.
    pub async fn connect_store(options: DiscoveryOptions) -> Result<Self> {
        Self::connect(options).await
    }

    async fn connect(options: DiscoveryOptions) -> Result<Self> {
        let base_url = options.registry_url()?;

        info!("Connecting to registry at {}", base_url);

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RegistryError::Connection(e.to_string()))?;

        let discovery = Self {
            options,
            base_url,
            client,
        };
        discovery.check_leader().await?;

        Ok(discovery)
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    pub fn service_id(&self) -> String {
        self.options.service_id()
    }

    /// The registration body for this instance, with freshly collected metadata.
    ///
    /// Metadata is read on the blocking pool; if that task fails the instance
    /// is registered without metadata.
    pub async fn registration(&self) -> ServiceRegistration {
        let meta = match tokio::task::spawn_blocking(metadata::collect).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Metadata collection failed, registering without it: {}", e);
                BTreeMap::new()
            }
        };
        ServiceRegistration::new(&self.options, meta)
    }

    /// Register this instance together with its HTTP health check.
    ///
    /// Registering again with the same options replaces the earlier entry.
    pub async fn register(&self) -> Result<()> {
        self.options.validate()?;
        let registration = self.registration().await;
        let url = self.endpoint(&["v1", "agent", "service", "register"])?;

        debug!(
            "Registering service {} with check {}",
            registration.id, registration.check.http
        );

        let response = self
            .request(Method::PUT, url)
            .json(&registration)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = failure(response).await;
            return Err(RegistryError::Registration(format!(
                "register {} rejected: HTTP {} - {}",
                registration.id, status, body
            )));
        }

        info!("Service {} registered successfully", registration.id);
        Ok(())
    }

    pub async fn deregister(&self) -> Result<()> {
        self.options.validate()?;
        let service_id = self.service_id();
        let url = self.endpoint(&["v1", "agent", "service", "deregister", &service_id])?;

        info!("Deregistering service {}", service_id);

        let response = self.request(Method::PUT, url).send().await?;

        if !response.status().is_success() {
            let (status, body) = failure(response).await;
            return Err(RegistryError::Registration(format!(
                "deregister {} rejected: HTTP {} - {}",
                service_id, status, body
            )));
        }

        info!("Service {} deregistered successfully", service_id);
        Ok(())
    }

    /// Read a key and decode its value as JSON into `T`.
    pub async fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let bytes = self.get_raw(key).await?;
        decode_json(key, &bytes)
    }

    /// Read the exact bytes stored under a key.
    ///
    /// A missing key and a key holding an empty value are both `NotFound`.
    pub async fn get_raw(&self, key: &str) -> Result<Vec<u8>> {
        let mut url = self.kv_endpoint(key)?;
        url.query_pairs_mut().append_key_only("raw");

        debug!("Getting key {}", key);

        let response = self.request(Method::GET, url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(RegistryError::NotFound(key.to_string())),
            status if !status.is_success() => {
                let (status, body) = failure(response).await;
                return Err(RegistryError::Store(format!(
                    "read {} failed: HTTP {} - {}",
                    key, status, body
                )));
            }
            _ => {}
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(RegistryError::NotFound(key.to_string()));
        }
        Ok(bytes.to_vec())
    }

    /// Write bytes under a key verbatim.
    pub async fn put_value(&self, key: &str, value: &[u8]) -> Result<()> {
        let url = self.kv_endpoint(key)?;

        debug!("Putting {} bytes at key {}", value.len(), key);

        let response = self
            .request(Method::PUT, url)
            .body(value.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = failure(response).await;
            return Err(RegistryError::Store(format!(
                "write {} failed: HTTP {} - {}",
                key, status, body
            )));
        }

        let body = response.text().await?;
        if body.trim() == "false" {
            return Err(RegistryError::Store(format!(
                "write {} was not applied by the registry",
                key
            )));
        }

        Ok(())
    }

    /// Read a key through an explicit codec.
    pub async fn get_as<C: ValueCodec>(&self, key: &str) -> Result<C::Value> {
        let bytes = self.get_raw(key).await?;
        C::decode(key, bytes)
    }

    /// Write a key through an explicit codec.
    pub async fn put_as<C: ValueCodec>(&self, key: &str, value: &C::Value) -> Result<()> {
        let bytes = C::encode(value)?;
        self.put_value(key, &bytes).await
    }

    async fn check_leader(&self) -> Result<()> {
        let url = self.endpoint(&["v1", "status", "leader"])?;

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| RegistryError::Connection(format!("{}: {}", self.base_url, e)))?;

        if !response.status().is_success() {
            return Err(RegistryError::Connection(format!(
                "{} answered HTTP {}",
                self.base_url,
                response.status()
            )));
        }

        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RegistryError::Config(format!("registry address {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn kv_endpoint(&self, key: &str) -> Result<Url> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(RegistryError::Config("key must not be empty".into()));
        }

        let mut segments = vec!["v1", "kv"];
        segments.extend(key.split('/'));
        let mut url = self.endpoint(&segments)?;

        if let Some(dc) = &self.options.datacenter {
            url.query_pairs_mut().append_pair("dc", dc);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.options.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }
}

async fn failure(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    (status, body)
}
