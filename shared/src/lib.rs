#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod capabilities;
pub mod config;
pub mod display;
pub mod event;
pub mod model;

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::display::vehicle_title;
use crate::model::{DetailPhase, FilterOption, FilterSelection, Phase, VehicleDetailState, VehicleRecord};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use event::Event;
pub use model::Model;

pub const GENERIC_ERROR_MESSAGE: &str = "Something wrong, please try again later";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    NotFound,
    RateLimited,
    Server,
    Deserialization,
    Configuration,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Server => "SERVER_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Configuration => "CONFIG_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Configuration => format!("Invalid settings: {}", self.message),
            ErrorKind::Network | ErrorKind::Timeout => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            ErrorKind::NotFound
            | ErrorKind::Server
            | ErrorKind::Deserialization
            | ErrorKind::Unknown => GENERIC_ERROR_MESSAGE.into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        Self::new(e.kind, e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        Self::new(ErrorKind::Configuration, e.to_string())
    }
}

/// Which fetch went wrong, as far as the user needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailure {
    Routes,
    Trips,
    Vehicles,
    Vehicle,
    Route,
    Trip,
    /// Route and trip lookups on the detail screen both failed.
    AdditionalData,
    Generic,
}

impl FetchFailure {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Routes => "Failed to get Routes data",
            Self::Trips => "Failed to get Trips data",
            Self::Vehicles => "Failed to get Vehicles data",
            Self::Vehicle => "Failed to get Vehicle data",
            Self::Route => "Failed to get Route data",
            Self::Trip => "Failed to get Trip data",
            Self::AdditionalData => "Failed to get Additional data",
            Self::Generic => GENERIC_ERROR_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

// --- View ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VehicleCard {
    pub id: String,
    pub title: String,
    pub status_label: String,
    pub status_color: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub last_update: String,
}

impl From<&VehicleRecord> for VehicleCard {
    fn from(v: &VehicleRecord) -> Self {
        Self {
            id: v.id.to_string(),
            title: vehicle_title(&v.label),
            status_label: v.status_label.clone(),
            status_color: v.status_color.clone(),
            latitude: v.position.map(|p| p.lat),
            longitude: v.position.map(|p| p.lon),
            last_update: v.last_update.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapMarker {
    pub id: String,
    pub title: String,
    pub status_label: String,
    pub color: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl MapMarker {
    fn from_record(v: &VehicleRecord) -> Option<Self> {
        let position = v.position?;
        Some(Self {
            id: v.id.to_string(),
            title: vehicle_title(&v.label),
            status_label: v.status_label.clone(),
            color: v.status_color.clone(),
            latitude: position.lat,
            longitude: position.lon,
        })
    }

    fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("title".into(), self.title.clone().into());
        properties.insert("status".into(), self.status_label.clone().into());
        properties.insert("color".into(), self.color.clone().into());
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::Point(vec![
                self.longitude,
                self.latitude,
            ]))),
            id: Some(geojson::feature::Id::String(self.id.clone())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Markers as a GeoJSON `FeatureCollection`, ready to be used as a map source.
#[must_use]
pub fn markers_geojson(markers: &[MapMarker]) -> String {
    GeoJson::from(FeatureCollection {
        bbox: None,
        features: markers.iter().map(MapMarker::to_feature).collect(),
        foreign_members: None,
    })
    .to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterItem {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterSection {
    pub options: Vec<FilterItem>,
    pub active_count: usize,
    pub enabled: bool,
}

impl FilterSection {
    fn build<T>(options: &[FilterOption<T>], selection: &FilterSelection<T>, enabled: bool) -> Self
    where
        T: Clone + Eq + std::hash::Hash + std::fmt::Display,
    {
        Self {
            options: options
                .iter()
                .map(|o| FilterItem {
                    id: o.id.to_string(),
                    name: o.name.clone(),
                    selected: selection.is_pending(&o.id),
                })
                .collect(),
            active_count: selection.confirmed().len(),
            enabled,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VehicleDetailView {
    pub vehicle_id: String,
    pub is_loading: bool,
    pub vehicle: Option<VehicleCard>,
    pub route_name: String,
    pub trip_name: String,
}

impl From<&VehicleDetailState> for VehicleDetailView {
    fn from(d: &VehicleDetailState) -> Self {
        Self {
            vehicle_id: d.vehicle_id.to_string(),
            is_loading: matches!(
                d.phase,
                DetailPhase::LoadingVehicle | DetailPhase::LoadingAdditional
            ),
            vehicle: d.vehicle.as_ref().map(VehicleCard::from),
            route_name: d.route.display_name(),
            trip_name: d.trip.display_name(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub vehicles: Vec<VehicleCard>,
    pub markers: Vec<MapMarker>,
    pub markers_geojson: String,
    pub route_filter: FilterSection,
    pub trip_filter: FilterSection,
    /// Full-screen loading: first page of a query or its prerequisites.
    pub is_fetching: bool,
    /// Footer spinner for load-more.
    pub is_loading_more: bool,
    pub can_load_more: bool,
    pub phase: Phase,
    pub toast: Option<ToastView>,
    pub detail: Option<VehicleDetailView>,
}

pub mod app {
    use super::*;
    use std::collections::VecDeque;
    use tracing::{debug, info, warn};

    use crate::api::{decode, ApiResponse, TransitApi, API_KEY_HEADER};
    use crate::config::ApiConfig;
    use crate::model::{Command, FetchMode};
    use url::Url;

    #[derive(Default)]
    pub struct App;

    impl App {
        /// Executes commands until none are left. Commands that cannot be
        /// sent are failed on the spot, which may yield further commands.
        fn run(commands: Vec<Command>, model: &mut Model, caps: &Capabilities) {
            let mut queue = VecDeque::from(commands);
            while let Some(command) = queue.pop_front() {
                queue.extend(Self::dispatch(command, model, caps));
            }
        }

        fn dispatch(command: Command, model: &mut Model, caps: &Capabilities) -> Vec<Command> {
            if let Command::Notify(failure) = command {
                model.show_failure(failure);
                return Vec::new();
            }

            let api = match TransitApi::new(&model.config) {
                Ok(api) => api,
                Err(e) => {
                    warn!(error = %e, "cannot build transit API client");
                    return Self::fail(
                        command,
                        ApiError::without_status(ErrorKind::Configuration),
                        model,
                    );
                }
            };

            let sent = match &command {
                Command::FetchRoutes { session } => {
                    let session = *session;
                    Self::send(caps, &api, api.routes(), move |result| Event::RoutesFetched {
                        session,
                        result: Box::new(result),
                    })
                }
                Command::FetchTrips { epoch, routes } => {
                    let epoch = *epoch;
                    Self::send(caps, &api, api.trips(routes), move |result| {
                        Event::TripsFetched {
                            epoch,
                            result: Box::new(result),
                        }
                    })
                }
                Command::FetchVehicles { epoch, mode, query } => {
                    let (epoch, mode) = (*epoch, *mode);
                    Self::send(caps, &api, api.vehicles(query), move |result| {
                        Event::VehiclesFetched {
                            epoch,
                            mode,
                            result: Box::new(result),
                        }
                    })
                }
                Command::FetchVehicle { ticket, id } => {
                    let ticket = *ticket;
                    Self::send(caps, &api, api.vehicle(id), move |result| {
                        Event::VehicleDetailFetched {
                            ticket,
                            result: Box::new(result),
                        }
                    })
                }
                Command::FetchRoute { ticket, id } => {
                    let ticket = *ticket;
                    Self::send(caps, &api, api.route(id), move |result| {
                        Event::DetailRouteFetched {
                            ticket,
                            result: Box::new(result),
                        }
                    })
                }
                Command::FetchTrip { ticket, id } => {
                    let ticket = *ticket;
                    Self::send(caps, &api, api.trip(id), move |result| {
                        Event::DetailTripFetched {
                            ticket,
                            result: Box::new(result),
                        }
                    })
                }
                Command::Notify(_) => Ok(()),
            };

            match sent {
                Ok(()) => Vec::new(),
                Err(e) => Self::fail(command, e, model),
            }
        }

        fn send<F>(
            caps: &Capabilities,
            api: &TransitApi,
            url: Result<Url, ApiError>,
            make_event: F,
        ) -> Result<(), ApiError>
        where
            F: FnOnce(ApiResponse) -> Event + Send + 'static,
        {
            let url = url?;
            debug!(url = url.as_str(), "sending request");

            let mut builder = caps.http.get(url.as_str());
            if let Some(key) = api.api_key() {
                builder = builder.header(API_KEY_HEADER, key);
            }
            builder.send(make_event);
            Ok(())
        }

        /// Feeds a failure for `command` back into the model as if the
        /// shell had answered with it.
        fn fail(command: Command, error: ApiError, model: &mut Model) -> Vec<Command> {
            match command {
                Command::FetchRoutes { session } => model.list.routes_loaded(session, Err(error)),
                Command::FetchTrips { epoch, .. } => model.list.trips_loaded(epoch, Err(error)),
                Command::FetchVehicles { epoch, mode, .. } => {
                    model.list.vehicles_loaded(epoch, mode, Err(error))
                }
                Command::FetchVehicle { ticket, .. } => {
                    model.detail_vehicle_loaded(ticket, Err(error))
                }
                Command::FetchRoute { ticket, .. } => model.detail_route_loaded(ticket, Err(error)),
                Command::FetchTrip { ticket, .. } => model.detail_trip_loaded(ticket, Err(error)),
                Command::Notify(_) => Vec::new(),
            }
        }

        /// A new page size restarts a mounted list; other settings apply
        /// from the next request on.
        fn apply_config(model: &mut Model, config: Result<ApiConfig, ConfigError>) -> Vec<Command> {
            match config.and_then(|c| c.validate().map(|()| c)) {
                Ok(config) => {
                    info!(
                        base_url = %config.base_url,
                        page_size = config.page_size,
                        "transit API configured"
                    );
                    let page_size = config.page_size;
                    model.config = config;
                    model.list.resize_pages(page_size)
                }
                Err(e) => {
                    warn!(error = %e, "rejected transit API config");
                    let error = AppError::from(e);
                    model.toast = Some(ToastMessage::error(error.user_facing_message()));
                    Vec::new()
                }
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(
                event = event.name(),
                user = event.is_user_initiated(),
                "update"
            );

            let commands = match event {
                Event::ScreenMounted => {
                    model.detail = None;
                    model.list.mount(model.config.page_size)
                }
                Event::ScreenUnmounted => {
                    model.list.unmount();
                    model.detail = None;
                    Vec::new()
                }
                Event::ConfigUpdated(config) => Self::apply_config(model, Ok(config)),
                Event::ConfigJsonReceived(json) => {
                    Self::apply_config(model, ApiConfig::from_json(&json))
                }

                Event::RoutesSelected(ids) => {
                    model.list.select_routes(ids);
                    Vec::new()
                }
                Event::RouteFilterConfirmed => model.list.confirm_routes(),
                Event::RouteFilterCancelled => model.list.cancel_routes(),
                Event::TripsSelected(ids) => {
                    model.list.select_trips(ids);
                    Vec::new()
                }
                Event::TripFilterConfirmed => model.list.confirm_trips(),
                Event::TripFilterCancelled => model.list.cancel_trips(),

                Event::RefreshRequested => model.list.refresh(),
                Event::EndReached => model.list.load_more(),

                Event::VehicleSelected { id } => model.open_detail(id),
                Event::VehicleDetailClosed => {
                    model.close_detail();
                    Vec::new()
                }

                Event::DismissToast => {
                    model.dismiss_toast();
                    Vec::new()
                }

                Event::RoutesFetched { session, result } => {
                    model.list.routes_loaded(session, decode(*result))
                }
                Event::TripsFetched { epoch, result } => {
                    model.list.trips_loaded(epoch, decode(*result))
                }
                Event::VehiclesFetched {
                    epoch,
                    mode,
                    result,
                } => model.list.vehicles_loaded(epoch, mode, decode(*result)),
                Event::VehicleDetailFetched { ticket, result } => {
                    model.detail_vehicle_loaded(ticket, decode(*result))
                }
                Event::DetailRouteFetched { ticket, result } => {
                    model.detail_route_loaded(ticket, decode(*result))
                }
                Event::DetailTripFetched { ticket, result } => {
                    model.detail_trip_loaded(ticket, decode(*result))
                }
            };

            Self::run(commands, model, caps);
            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            let list = &model.list;
            let markers: Vec<MapMarker> = list
                .vehicles
                .iter()
                .filter_map(MapMarker::from_record)
                .collect();

            ViewModel {
                vehicles: list.vehicles.iter().map(VehicleCard::from).collect(),
                markers_geojson: markers_geojson(&markers),
                markers,
                route_filter: FilterSection::build(
                    &list.filters.route_options,
                    &list.filters.routes,
                    true,
                ),
                trip_filter: FilterSection::build(
                    &list.filters.trip_options,
                    &list.filters.trips,
                    !list.filters.routes.confirmed().is_empty(),
                ),
                is_fetching: matches!(
                    list.phase,
                    Phase::FetchingRoutes
                        | Phase::FetchingTrips
                        | Phase::FetchingVehicles(FetchMode::Replace)
                ),
                is_loading_more: list.phase == Phase::FetchingVehicles(FetchMode::Append),
                can_load_more: list.is_mounted()
                    && !list.phase.is_fetching()
                    && !list.cursor.exhausted,
                phase: list.phase,
                toast: model.toast.as_ref().map(ToastView::from),
                detail: model.detail.as_ref().map(VehicleDetailView::from),
            }
        }
    }
}
