//! Blocking DigitalOcean v2 API client implementing [`SnapshotProvider`].
//!
//! All configuration arrives through [`ApiConfig`] at construction; nothing
//! is read from process-wide state. List endpoints are paged with
//! `page`/`per_page` and followed until `links.pages.next` disappears.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::cell::Cell;
use std::time::Duration;
use tracing::{debug, trace};
use trawler_core::config::ApiConfig;
use trawler_core::model::{Resource, ResourceKind, Snapshot, Volume, parse_created_at};
use trawler_core::provider::SnapshotProvider;
use trawler_core::{ProviderError, TrawlerError};

#[derive(Debug, Deserialize)]
struct ApiSnapshot {
    id: String,
    name: String,
    created_at: String,
    resource_id: String,
    resource_type: String,
    #[serde(default)]
    size_gigabytes: f64,
    #[serde(default)]
    min_disk_size: u64,
}

impl ApiSnapshot {
    fn into_snapshot(self) -> Result<Snapshot, TrawlerError> {
        Ok(Snapshot {
            created_at: parse_created_at(&self.created_at)?,
            id: self.id,
            name: self.name,
            resource_id: self.resource_id,
            resource_type: self.resource_type,
            size_gigabytes: self.size_gigabytes,
            min_disk_size: self.min_disk_size,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiRegion {
    slug: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiDropletSize {
    #[serde(default)]
    disk: u64,
}

#[derive(Debug, Deserialize)]
struct ApiDroplet {
    id: u64,
    name: String,
    region: ApiRegion,
    size: ApiDropletSize,
}

#[derive(Debug, Deserialize)]
struct ApiVolume {
    id: String,
    name: String,
    region: ApiRegion,
    #[serde(default)]
    size_gigabytes: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Pages {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    pages: Option<Pages>,
}

impl Links {
    fn has_next(&self) -> bool {
        self.pages.as_ref().is_some_and(|pages| pages.next.is_some())
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotPage {
    #[serde(default)]
    snapshots: Vec<ApiSnapshot>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct DropletPage {
    #[serde(default)]
    droplets: Vec<ApiDroplet>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct VolumePage {
    #[serde(default)]
    volumes: Vec<ApiVolume>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct VolumeEnvelope {
    volume: ApiVolume,
}

#[derive(Debug, Deserialize)]
struct SnapshotEnvelope {
    snapshot: ApiSnapshot,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Anything carrying a `links` block that can be paged through.
trait Paged: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Links);
}

impl Paged for SnapshotPage {
    type Item = ApiSnapshot;

    fn into_parts(self) -> (Vec<ApiSnapshot>, Links) {
        (self.snapshots, self.links)
    }
}

impl Paged for DropletPage {
    type Item = ApiDroplet;

    fn into_parts(self) -> (Vec<ApiDroplet>, Links) {
        (self.droplets, self.links)
    }
}

impl Paged for VolumePage {
    type Item = ApiVolume;

    fn into_parts(self) -> (Vec<ApiVolume>, Links) {
        (self.volumes, self.links)
    }
}

pub struct DigitalOceanClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
    per_page: u32,
    requests: Cell<usize>,
}

impl DigitalOceanClient {
    /// Build a client from resolved API settings.
    ///
    /// # Errors
    ///
    /// Returns [`TrawlerError::MissingToken`] when `api.token` is unset.
    pub fn new(api: &ApiConfig) -> Result<Self, TrawlerError> {
        let token = api.token.clone().ok_or(TrawlerError::MissingToken)?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(api.timeout_secs))
            .user_agent(concat!("trawler/", env!("CARGO_PKG_VERSION")))
            .build();

        Ok(Self {
            agent,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            token,
            per_page: api.per_page.clamp(1, 200),
            requests: Cell::new(0),
        })
    }

    /// Number of HTTP requests issued so far.
    pub fn request_count(&self) -> usize {
        self.requests.get()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{path}", self.base_url)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.requests.set(self.requests.get() + 1);
        let url = self.url(path);
        trace!(%method, %url, "api request");
        self.agent
            .request(method, &url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/json")
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let mut request = self.request("GET", path);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(map_ureq_error)?;
        response
            .into_json::<T>()
            .map_err(|err| ProviderError::Decode(err.to_string()))
    }

    fn fetch_all<P: Paged>(&self, path: &str) -> Result<Vec<P::Item>, ProviderError> {
        let mut items = Vec::new();
        let mut page = 1_u32;

        loop {
            let batch: P = self.get_json(
                path,
                &[("page", page.to_string()), ("per_page", self.per_page.to_string())],
            )?;
            let (batch, links) = batch.into_parts();
            debug!(%path, page, items = batch.len(), "fetched page");

            let empty = batch.is_empty();
            items.extend(batch);

            if empty || !links.has_next() {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

impl SnapshotProvider for DigitalOceanClient {
    fn list_snapshots(&self, resource_id: Option<&str>) -> Result<Vec<Snapshot>, TrawlerError> {
        self.fetch_all::<SnapshotPage>("snapshots")?
            .into_iter()
            .filter(|snapshot| resource_id.is_none_or(|id| snapshot.resource_id == id))
            .map(ApiSnapshot::into_snapshot)
            .collect()
    }

    fn delete_snapshot(&self, id: &str) -> Result<(), ProviderError> {
        self.request("DELETE", &format!("snapshots/{id}"))
            .call()
            .map(|_| ())
            .map_err(|err| match map_ureq_error(err) {
                ProviderError::NotFound { .. } => ProviderError::snapshot_not_found(id),
                other => other,
            })
    }

    fn create_volume_snapshot(
        &self,
        volume_id: &str,
        name: &str,
    ) -> Result<Snapshot, TrawlerError> {
        let response = self
            .request("POST", &format!("volumes/{volume_id}/snapshots"))
            .send_json(serde_json::json!({ "name": name }))
            .map_err(|err| not_found_as(map_ureq_error(err), "volume", volume_id))?;
        let envelope: SnapshotEnvelope = response
            .into_json()
            .map_err(|err| ProviderError::Decode(err.to_string()))?;
        envelope.snapshot.into_snapshot()
    }

    fn get_volume(&self, volume_id: &str) -> Result<Volume, ProviderError> {
        let envelope: VolumeEnvelope = self
            .get_json(&format!("volumes/{volume_id}"), &[])
            .map_err(|err| not_found_as(err, "volume", volume_id))?;
        Ok(Volume {
            id: envelope.volume.id,
            name: envelope.volume.name,
        })
    }

    fn list_resources(&self) -> Result<Vec<Resource>, ProviderError> {
        let droplets = self.fetch_all::<DropletPage>("droplets")?;
        let volumes = self.fetch_all::<VolumePage>("volumes")?;

        let droplets = droplets.into_iter().map(|droplet| Resource {
            kind: ResourceKind::Droplet,
            id: droplet.id.to_string(),
            name: droplet.name,
            region: droplet.region.name,
            region_slug: droplet.region.slug,
            disk_size_gb: droplet.size.disk,
        });
        let volumes = volumes.into_iter().map(|volume| Resource {
            kind: ResourceKind::Volume,
            id: volume.id,
            name: volume.name,
            region: volume.region.name,
            region_slug: volume.region.slug,
            disk_size_gb: volume.size_gigabytes,
        });
        Ok(droplets.chain(volumes).collect())
    }
}

fn not_found_as(err: ProviderError, kind: &'static str, id: &str) -> ProviderError {
    match err {
        ProviderError::NotFound { .. } => ProviderError::NotFound {
            kind,
            id: id.to_string(),
        },
        other => other,
    }
}

fn map_ureq_error(err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::Status(status, response) => {
            let url = response.get_url().to_string();
            let message = response
                .into_string()
                .ok()
                .and_then(|body| serde_json::from_str::<ApiErrorBody>(&body).ok())
                .map(|body| body.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| format!("request to {url} failed"));
            match status {
                401 | 403 => ProviderError::Unauthorized(message),
                404 => ProviderError::NotFound {
                    kind: "resource",
                    id: url,
                },
                _ => ProviderError::Api { status, message },
            }
        }
        ureq::Error::Transport(transport) => ProviderError::Transport(transport.to_string()),
    }
}
