//! Transit API client: builds the JSON:API request URLs sent through
//! `crux_http` and decodes whatever comes back into `data` or an [`ApiError`].
//!
//! Endpoints used:
//! - `/vehicles?page[offset]=..&page[limit]=..[&filter[route]=..][&filter[trips]=..]`
//! - `/vehicles/{id}`
//! - `/routes`, `/routes/{id}`
//! - `/trips?filter[route]=..`, `/trips/{id}`

use crux_http::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};
use url::Url;

use crate::config::{ApiConfig, ConfigError};
use crate::event::{RouteId, TripId, VehicleId};
use crate::ErrorKind;

/// Code reported when a failure carries no HTTP status of its own.
pub const STATUS_CODE_500: u16 = 500;
pub const API_KEY_HEADER: &str = "x-api-key";

/// What the shell hands back for a transit API request.
pub type ApiResponse = crux_http::Result<crux_http::Response<Vec<u8>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("transit API request failed with code {code} ({kind:?})")]
pub struct ApiError {
    pub code: u16,
    pub kind: ErrorKind,
}

impl ApiError {
    #[must_use]
    pub const fn status(code: u16) -> Self {
        Self {
            code,
            kind: ErrorKind::from_status(code),
        }
    }

    #[must_use]
    pub const fn server_error() -> Self {
        Self::status(STATUS_CODE_500)
    }

    #[must_use]
    pub const fn timeout() -> Self {
        Self::without_status(ErrorKind::Timeout)
    }

    /// A failure that never got an HTTP status from the API.
    #[must_use]
    pub const fn without_status(kind: ErrorKind) -> Self {
        Self {
            code: STATUS_CODE_500,
            kind,
        }
    }
}

impl From<&crux_http::Error> for ApiError {
    fn from(e: &crux_http::Error) -> Self {
        match e {
            crux_http::Error::Http(http) => Self::status(u16::from(http.code)),
            crux_http::Error::Timeout => Self::timeout(),
            crux_http::Error::Io(_) => Self::without_status(ErrorKind::Network),
            crux_http::Error::Json(_) => Self::without_status(ErrorKind::Deserialization),
            crux_http::Error::Url(_) => Self::without_status(ErrorKind::Configuration),
        }
    }
}

/// `Ok(None)` is a successful response whose `data` was null or missing.
pub type ApiResult<T> = Result<Option<T>, ApiError>;

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Document<T> {
    #[serde(default)]
    data: Option<T>,
}

// --- Resources ---

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<ResourceIdentifier>,
}

impl Relationship {
    fn id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .map(|d| d.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleAttributes {
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleRelationships {
    #[serde(default)]
    pub route: Option<Relationship>,
    #[serde(default)]
    pub trip: Option<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleResource {
    pub id: String,
    #[serde(default)]
    pub attributes: VehicleAttributes,
    #[serde(default)]
    pub relationships: VehicleRelationships,
}

impl VehicleResource {
    pub fn route_id(&self) -> Option<RouteId> {
        self.relationships
            .route
            .as_ref()
            .and_then(Relationship::id)
            .map(RouteId::new)
    }

    pub fn trip_id(&self) -> Option<TripId> {
        self.relationships
            .trip
            .as_ref()
            .and_then(Relationship::id)
            .map(TripId::new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteAttributes {
    #[serde(default)]
    pub long_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteResource {
    pub id: String,
    #[serde(default)]
    pub attributes: RouteAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TripAttributes {
    #[serde(default)]
    pub headsign: Option<String>,
    #[serde(default)]
    pub block_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripResource {
    pub id: String,
    #[serde(default)]
    pub attributes: TripAttributes,
}

// --- Queries ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleQuery {
    pub offset: usize,
    pub limit: usize,
    pub routes: Vec<RouteId>,
    pub trips: Vec<TripId>,
}

fn csv<T: AsRef<str>>(ids: &[T]) -> String {
    ids.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}

/// URL factory bound to one validated [`ApiConfig`].
#[derive(Debug, Clone)]
pub struct TransitApi {
    base: Url,
    api_key: Option<String>,
}

impl TransitApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            base: config.parsed_base_url()?,
            api_key: config.api_key.clone(),
        })
    }

    /// Sent as [`API_KEY_HEADER`] on every request when configured.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[instrument(level = "debug", skip(self), fields(offset = query.offset, limit = query.limit))]
    pub fn vehicles(&self, query: &VehicleQuery) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["vehicles"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page[offset]", &query.offset.to_string());
            pairs.append_pair("page[limit]", &query.limit.to_string());
            if !query.routes.is_empty() {
                pairs.append_pair("filter[route]", &csv(&query.routes));
            }
            // An empty trip filter makes the API return nothing at all.
            if !query.trips.is_empty() {
                pairs.append_pair("filter[trips]", &csv(&query.trips));
            }
        }
        Ok(url)
    }

    pub fn vehicle(&self, id: &VehicleId) -> Result<Url, ApiError> {
        self.endpoint(&["vehicles", id.as_str()])
    }

    pub fn routes(&self) -> Result<Url, ApiError> {
        self.endpoint(&["routes"])
    }

    pub fn route(&self, id: &RouteId) -> Result<Url, ApiError> {
        self.endpoint(&["routes", id.as_str()])
    }

    #[instrument(level = "debug", skip(self), fields(routes = route_ids.len()))]
    pub fn trips(&self, route_ids: &[RouteId]) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["trips"])?;
        url.query_pairs_mut()
            .append_pair("filter[route]", &csv(route_ids));
        Ok(url)
    }

    pub fn trip(&self, id: &TripId) -> Result<Url, ApiError> {
        self.endpoint(&["trips", id.as_str()])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                warn!(base = %self.base, "base URL cannot have path segments");
                ApiError::without_status(ErrorKind::Configuration)
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Turns a shell response into the API's `data` payload or an error.
pub fn decode<T: DeserializeOwned>(result: ApiResponse) -> ApiResult<T> {
    match result {
        Ok(mut response) if response.status().is_success() => response
            .body_json::<Document<T>>()
            .map(|doc| doc.data)
            .map_err(|e| {
                warn!(error = %e, "undecodable API body");
                ApiError::without_status(ErrorKind::Deserialization)
            }),
        Ok(response) => {
            let status: StatusCode = response.status();
            warn!(status = u16::from(status), "API returned an error status");
            Err(ApiError::status(u16::from(status)))
        }
        Err(e) => {
            warn!(error = %e, "API request failed");
            Err(ApiError::from(&e))
        }
    }
}
