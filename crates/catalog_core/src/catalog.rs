use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{ModelQuery, VehicleMake, VehicleModel, VehicleType},
    protocol::CatalogEnvelope,
};
use tracing::{debug, warn};
use url::Url;

use crate::{config::CatalogSettings, error::RemoteFetchError};

const VEHICLE_TYPE_VARIABLE: &str = "vehicle type";

/// Read-only lookups against the vehicle catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_vehicle_types(&self) -> Result<Vec<VehicleType>, RemoteFetchError>;
    /// Resolves to an empty list without touching the network when `type_name` is blank.
    async fn fetch_makes(&self, type_name: &str) -> Result<Vec<VehicleMake>, RemoteFetchError>;
    async fn fetch_models(&self, query: &ModelQuery)
        -> Result<Vec<VehicleModel>, RemoteFetchError>;
}

pub struct HttpCatalogClient {
    http: Client,
    base_url: Url,
}

impl HttpCatalogClient {
    pub fn new(settings: &CatalogSettings) -> Result<Self> {
        Self::with_http(Client::new(), &settings.base_url)
    }

    pub fn with_http(http: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid catalog base url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("catalog base url '{base_url}' cannot carry path segments"));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn vehicle_types_url(&self) -> Url {
        self.endpoint(&["getvehiclevariablevalueslist", VEHICLE_TYPE_VARIABLE])
    }

    pub fn makes_url(&self, type_name: &str) -> Url {
        self.endpoint(&["GetMakesForVehicleType", type_name])
    }

    pub fn models_url(&self, query: &ModelQuery) -> Url {
        let make_id = query.make_id.0.to_string();
        let mut segments = vec!["GetModelsForMakeIdYear", "makeId", make_id.as_str()];
        if let Some(year) = query.year.as_deref() {
            segments.extend(["modelyear", year]);
        }
        segments.extend(["vehicleType", query.type_name.as_str()]);
        self.endpoint(&segments)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected cannot-be-a-base urls, so the segment list is always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut().clear().append_pair("format", "json");
        url
    }

    async fn get_results<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, RemoteFetchError> {
        let url_text = url.to_string();
        debug!(url = %url_text, "catalog request");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| RemoteFetchError::transport(&url_text, err))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url_text, %status, "catalog request rejected");
            return Err(RemoteFetchError::status(&url_text, status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| RemoteFetchError::transport(&url_text, err))?;
        let envelope: CatalogEnvelope<T> = serde_json::from_slice(&body)
            .map_err(|err| RemoteFetchError::decode(&url_text, err))?;

        debug!(
            url = %url_text,
            count = envelope.count,
            results = envelope.results.len(),
            "catalog response"
        );
        Ok(envelope.into_results())
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_vehicle_types(&self) -> Result<Vec<VehicleType>, RemoteFetchError> {
        self.get_results(self.vehicle_types_url()).await
    }

    async fn fetch_makes(&self, type_name: &str) -> Result<Vec<VehicleMake>, RemoteFetchError> {
        if type_name.trim().is_empty() {
            debug!("no vehicle type selected; skipping make lookup");
            return Ok(Vec::new());
        }
        self.get_results(self.makes_url(type_name)).await
    }

    async fn fetch_models(
        &self,
        query: &ModelQuery,
    ) -> Result<Vec<VehicleModel>, RemoteFetchError> {
        self.get_results(self.models_url(query)).await
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
