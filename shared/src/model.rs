use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use tracing::{debug, info, warn};

use crate::api::{ApiResult, RouteResource, TripResource, VehicleQuery, VehicleResource};
use crate::config::{ApiConfig, DEFAULT_PAGE_SIZE};
use crate::display::{format_last_update, status_display, VehicleStatus, MISSING_VALUE};
use crate::event::{DetailTicket, QueryEpoch, RouteId, SessionId, TripId, VehicleId};
use crate::{FetchFailure, ToastMessage};

/// Validated lat/lon
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        if !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self { lat, lon })
    }
}

// --- Display records ---

/// One vehicle as the list and the map show it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: VehicleId,
    pub status: VehicleStatus,
    pub status_label: String,
    pub status_color: String,
    pub label: String,
    /// `None` when the API sent no usable coordinates; such vehicles get no marker.
    pub position: Option<LatLon>,
    pub last_update: String,
    pub route_id: Option<RouteId>,
    pub trip_id: Option<TripId>,
}

impl From<&VehicleResource> for VehicleRecord {
    fn from(resource: &VehicleResource) -> Self {
        let attributes = &resource.attributes;
        let status = VehicleStatus::from_api(attributes.current_status.as_deref());
        let display = status_display(&status);
        Self {
            id: VehicleId::new(resource.id.as_str()),
            status_label: display.label.to_string(),
            status_color: display.color.to_string(),
            status,
            label: attributes.label.clone().unwrap_or_default(),
            position: attributes
                .latitude
                .zip(attributes.longitude)
                .and_then(|(lat, lon)| LatLon::new(lat, lon)),
            last_update: format_last_update(attributes.updated_at.as_deref()),
            route_id: resource.route_id(),
            trip_id: resource.trip_id(),
        }
    }
}

// --- Filters ---

/// Confirmed ids drive fetches; pending ids are what the dialog currently
/// shows ticked. Both hold each id at most once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection<T> {
    confirmed: Vec<T>,
    pending: Vec<T>,
}

impl<T> Default for FilterSelection<T> {
    fn default() -> Self {
        Self {
            confirmed: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> FilterSelection<T> {
    pub fn select(&mut self, ids: Vec<T>) {
        let mut seen = HashSet::with_capacity(ids.len());
        self.pending = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
    }

    /// Commits the pending ids. Returns `false` (and changes nothing) when
    /// they hold the same members as the confirmed ones.
    pub fn confirm(&mut self) -> bool {
        if same_members(&self.pending, &self.confirmed) {
            return false;
        }
        self.confirmed = self.pending.clone();
        true
    }

    /// Clears both lists. Returns whether the confirmed ids changed.
    pub fn cancel(&mut self) -> bool {
        let changed = !self.confirmed.is_empty();
        self.clear();
        changed
    }

    pub fn clear(&mut self) {
        self.confirmed.clear();
        self.pending.clear();
    }

    pub fn confirmed(&self) -> &[T] {
        &self.confirmed
    }

    pub fn pending(&self) -> &[T] {
        &self.pending
    }

    pub fn is_pending(&self, id: &T) -> bool {
        self.pending.contains(id)
    }
}

fn same_members<T: Eq + Hash>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption<T> {
    pub id: T,
    pub name: String,
}

impl From<RouteResource> for FilterOption<RouteId> {
    fn from(route: RouteResource) -> Self {
        let name = route
            .attributes
            .long_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| route.id.clone());
        Self {
            id: RouteId::new(route.id),
            name,
        }
    }
}

impl From<TripResource> for FilterOption<TripId> {
    fn from(trip: TripResource) -> Self {
        let headsign = trip.attributes.headsign.as_deref().unwrap_or(MISSING_VALUE);
        let block = trip.attributes.block_id.as_deref().unwrap_or(MISSING_VALUE);
        Self {
            name: format!("{headsign} - {block}"),
            id: TripId::new(trip.id),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub routes: FilterSelection<RouteId>,
    pub trips: FilterSelection<TripId>,
    pub route_options: Vec<FilterOption<RouteId>>,
    pub trip_options: Vec<FilterOption<TripId>>,
}

impl FilterState {
    fn clear_trips(&mut self) {
        self.trips.clear();
        self.trip_options.clear();
    }
}

// --- Pagination ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// Vehicles currently displayed; the next page starts here.
    pub offset: usize,
    pub page_size: usize,
    /// Set once a page comes back short. Only `reset` clears it.
    pub exhausted: bool,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PageCursor {
    #[must_use]
    pub const fn new(page_size: usize) -> Self {
        Self {
            offset: 0,
            page_size,
            exhausted: false,
        }
    }

    pub fn reset(&mut self) {
        self.offset = 0;
        self.exhausted = false;
    }

    pub fn record_page(&mut self, displayed: usize, returned: usize) {
        self.offset = displayed;
        if returned < self.page_size {
            self.exhausted = true;
        }
    }

    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }
}

// --- Orchestrator ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// First page of a query; the list is replaced.
    Replace,
    /// Next page; the list is extended.
    Append,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "mode", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    FetchingRoutes,
    FetchingTrips,
    FetchingVehicles(FetchMode),
    /// The vehicle fetch of this mode failed. A failed `Replace` leaves the
    /// previous query on screen, so the next page request starts over.
    Error(FetchMode),
}

impl Phase {
    #[must_use]
    pub const fn is_fetching(&self) -> bool {
        matches!(
            self,
            Self::FetchingRoutes | Self::FetchingTrips | Self::FetchingVehicles(_)
        )
    }
}

/// Work a transition asks the app to carry out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    FetchRoutes {
        session: SessionId,
    },
    FetchTrips {
        epoch: QueryEpoch,
        routes: Vec<RouteId>,
    },
    FetchVehicles {
        epoch: QueryEpoch,
        mode: FetchMode,
        query: VehicleQuery,
    },
    FetchVehicle {
        ticket: DetailTicket,
        id: VehicleId,
    },
    FetchRoute {
        ticket: DetailTicket,
        id: RouteId,
    },
    FetchTrip {
        ticket: DetailTicket,
        id: TripId,
    },
    Notify(FetchFailure),
}

/// The vehicle list screen: filters, cursor, displayed vehicles and the
/// phase of the fetch pipeline.
///
/// Every transition returns the commands it needs executed. Responses carry
/// the ticket they were issued under and are dropped when it no longer
/// matches: the mount session for the route catalogue, the query epoch for
/// trips and vehicles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VehicleListState {
    pub phase: Phase,
    pub filters: FilterState,
    pub cursor: PageCursor,
    pub vehicles: Vec<VehicleRecord>,
    session: SessionId,
    epoch: QueryEpoch,
    mounted: bool,
    /// Trip options for the confirmed routes have not arrived yet.
    trips_outstanding: bool,
}

impl VehicleListState {
    pub const fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub const fn session(&self) -> SessionId {
        self.session
    }

    pub const fn epoch(&self) -> QueryEpoch {
        self.epoch
    }

    /// Starts a fresh screen: routes first, then the first page of vehicles.
    pub fn mount(&mut self, page_size: usize) -> Vec<Command> {
        let session = self.session.next();
        *self = Self {
            phase: Phase::FetchingRoutes,
            cursor: PageCursor::new(page_size),
            session,
            epoch: self.epoch.next(),
            mounted: true,
            ..Self::default()
        };
        debug!(session = session.0, page_size, "vehicle list mounted");
        vec![Command::FetchRoutes { session }]
    }

    pub fn unmount(&mut self) {
        // Counters survive so late responses from this mount stay stale.
        *self = Self {
            session: self.session,
            epoch: self.epoch,
            ..Self::default()
        };
    }

    pub fn routes_loaded(
        &mut self,
        session: SessionId,
        result: ApiResult<Vec<RouteResource>>,
    ) -> Vec<Command> {
        if !self.mounted || session != self.session {
            debug!(session = session.0, current = self.session.0, "dropping stale route catalogue");
            return Vec::new();
        }

        let mut commands = Vec::new();
        match result {
            Ok(routes) => {
                self.filters.route_options = routes
                    .unwrap_or_default()
                    .into_iter()
                    .map(FilterOption::<RouteId>::from)
                    .collect();
            }
            Err(e) => {
                warn!(code = e.code, kind = ?e.kind, "route catalogue failed");
                commands.push(Command::Notify(FetchFailure::Routes));
            }
        }

        // A refresh or filter change may already have started the vehicle fetch.
        if self.phase == Phase::FetchingRoutes {
            commands.extend(self.begin_vehicle_fetch(FetchMode::Replace));
        }
        commands
    }

    pub fn select_routes(&mut self, ids: Vec<RouteId>) {
        self.filters.routes.select(ids);
    }

    pub fn confirm_routes(&mut self) -> Vec<Command> {
        if !self.mounted {
            return Vec::new();
        }
        if !self.filters.routes.confirm() {
            debug!("route filter unchanged");
            return Vec::new();
        }
        info!(routes = self.filters.routes.confirmed().len(), "route filter committed");
        self.routes_changed()
    }

    pub fn cancel_routes(&mut self) -> Vec<Command> {
        if !self.mounted {
            return Vec::new();
        }
        if !self.filters.routes.cancel() {
            return Vec::new();
        }
        info!("route filter cleared");
        self.routes_changed()
    }

    pub fn select_trips(&mut self, ids: Vec<TripId>) {
        self.filters.trips.select(ids);
    }

    pub fn confirm_trips(&mut self) -> Vec<Command> {
        if !self.mounted {
            return Vec::new();
        }
        if !self.filters.trips.confirm() {
            debug!("trip filter unchanged");
            return Vec::new();
        }
        info!(trips = self.filters.trips.confirmed().len(), "trip filter committed");
        self.restart_query()
    }

    pub fn cancel_trips(&mut self) -> Vec<Command> {
        if !self.mounted {
            return Vec::new();
        }
        if !self.filters.trips.cancel() {
            return Vec::new();
        }
        info!("trip filter cleared");
        self.restart_query()
    }

    pub fn trips_loaded(
        &mut self,
        epoch: QueryEpoch,
        result: ApiResult<Vec<TripResource>>,
    ) -> Vec<Command> {
        if !self.mounted || epoch != self.epoch || self.phase != Phase::FetchingTrips {
            debug!(epoch = epoch.0, current = self.epoch.0, "dropping stale trip list");
            return Vec::new();
        }

        self.trips_outstanding = false;
        let mut commands = Vec::new();
        match result {
            Ok(trips) => {
                self.filters.trip_options = trips
                    .unwrap_or_default()
                    .into_iter()
                    .map(FilterOption::<TripId>::from)
                    .collect();
            }
            Err(e) => {
                warn!(code = e.code, kind = ?e.kind, "trip list failed");
                commands.push(Command::Notify(FetchFailure::Trips));
            }
        }
        commands.extend(self.begin_vehicle_fetch(FetchMode::Replace));
        commands
    }

    pub fn vehicles_loaded(
        &mut self,
        epoch: QueryEpoch,
        mode: FetchMode,
        result: ApiResult<Vec<VehicleResource>>,
    ) -> Vec<Command> {
        if !self.mounted || epoch != self.epoch || self.phase != Phase::FetchingVehicles(mode) {
            debug!(epoch = epoch.0, current = self.epoch.0, ?mode, "dropping stale vehicle page");
            return Vec::new();
        }

        match result {
            Ok(Some(resources)) => {
                let returned = resources.len();
                let records = resources.iter().map(VehicleRecord::from);
                match mode {
                    FetchMode::Replace => self.vehicles = records.collect(),
                    FetchMode::Append => self.vehicles.extend(records),
                }
                self.cursor.record_page(self.vehicles.len(), returned);
                debug!(
                    returned,
                    displayed = self.vehicles.len(),
                    exhausted = self.cursor.exhausted,
                    "vehicle page applied"
                );
                self.phase = Phase::Idle;
                Vec::new()
            }
            Ok(None) => {
                if mode == FetchMode::Replace {
                    self.vehicles.clear();
                }
                self.cursor.offset = self.vehicles.len();
                self.cursor.mark_exhausted();
                self.phase = Phase::Idle;
                Vec::new()
            }
            Err(e) => {
                warn!(code = e.code, kind = ?e.kind, ?mode, "vehicle fetch failed");
                self.phase = Phase::Error(mode);
                vec![Command::Notify(FetchFailure::Vehicles)]
            }
        }
    }

    pub fn load_more(&mut self) -> Vec<Command> {
        if !self.mounted || self.phase.is_fetching() {
            debug!(phase = ?self.phase, "load more ignored while fetching");
            return Vec::new();
        }
        if self.cursor.exhausted {
            debug!(offset = self.cursor.offset, "no more vehicles");
            return Vec::new();
        }
        if self.phase == Phase::Error(FetchMode::Replace) {
            info!("first page failed earlier, fetching it again");
            return self.begin_vehicle_fetch(FetchMode::Replace);
        }
        self.begin_vehicle_fetch(FetchMode::Append)
    }

    /// Applies a new page size. A mounted list starts over from the first
    /// page so the pages of one query all have the same size.
    pub fn resize_pages(&mut self, page_size: usize) -> Vec<Command> {
        if !self.mounted || self.cursor.page_size == page_size {
            return Vec::new();
        }
        info!(from = self.cursor.page_size, to = page_size, "page size changed");
        self.cursor.page_size = page_size;
        self.restart_query()
    }

    /// Back to the first page under the current filters. Anything in flight
    /// is superseded.
    pub fn refresh(&mut self) -> Vec<Command> {
        if !self.mounted {
            return Vec::new();
        }
        info!(superseded = self.phase.is_fetching(), "refresh");
        self.restart_query()
    }

    fn routes_changed(&mut self) -> Vec<Command> {
        self.filters.clear_trips();
        self.trips_outstanding = !self.filters.routes.confirmed().is_empty();
        self.restart_query()
    }

    fn restart_query(&mut self) -> Vec<Command> {
        self.epoch = self.epoch.next();
        self.cursor.reset();
        if self.trips_outstanding {
            self.phase = Phase::FetchingTrips;
            return vec![Command::FetchTrips {
                epoch: self.epoch,
                routes: self.filters.routes.confirmed().to_vec(),
            }];
        }
        self.begin_vehicle_fetch(FetchMode::Replace)
    }

    fn begin_vehicle_fetch(&mut self, mode: FetchMode) -> Vec<Command> {
        self.phase = Phase::FetchingVehicles(mode);
        let offset = match mode {
            FetchMode::Replace => 0,
            FetchMode::Append => self.cursor.offset,
        };
        vec![Command::FetchVehicles {
            epoch: self.epoch,
            mode,
            query: VehicleQuery {
                offset,
                limit: self.cursor.page_size,
                routes: self.filters.routes.confirmed().to_vec(),
                trips: self.filters.trips.confirmed().to_vec(),
            },
        }]
    }
}

// --- Vehicle detail ---

/// Route or trip name shown on the detail screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lookup {
    Pending,
    /// `None` when there was nothing to look up or the API had no data.
    Found(Option<String>),
    Failed,
}

impl Lookup {
    const fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Found(Some(name)) => name.clone(),
            _ => MISSING_VALUE.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailPhase {
    LoadingVehicle,
    LoadingAdditional,
    Ready,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VehicleDetailState {
    pub ticket: DetailTicket,
    pub vehicle_id: VehicleId,
    pub phase: DetailPhase,
    pub vehicle: Option<VehicleRecord>,
    pub route: Lookup,
    pub trip: Lookup,
}

impl VehicleDetailState {
    pub fn open(ticket: DetailTicket, id: VehicleId) -> (Self, Vec<Command>) {
        let state = Self {
            ticket,
            vehicle_id: id.clone(),
            phase: DetailPhase::LoadingVehicle,
            vehicle: None,
            route: Lookup::Pending,
            trip: Lookup::Pending,
        };
        (state, vec![Command::FetchVehicle { ticket, id }])
    }

    pub fn vehicle_loaded(&mut self, result: ApiResult<VehicleResource>) -> Vec<Command> {
        if self.phase != DetailPhase::LoadingVehicle {
            return Vec::new();
        }
        let resource = match result {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                warn!(vehicle = %self.vehicle_id, "vehicle has no data");
                self.phase = DetailPhase::Failed;
                return vec![Command::Notify(FetchFailure::Vehicle)];
            }
            Err(e) => {
                warn!(vehicle = %self.vehicle_id, code = e.code, "vehicle fetch failed");
                self.phase = DetailPhase::Failed;
                return vec![Command::Notify(FetchFailure::Vehicle)];
            }
        };

        let mut commands = Vec::new();
        match resource.route_id() {
            Some(id) => commands.push(Command::FetchRoute {
                ticket: self.ticket,
                id,
            }),
            None => self.route = Lookup::Found(None),
        }
        match resource.trip_id() {
            Some(id) => commands.push(Command::FetchTrip {
                ticket: self.ticket,
                id,
            }),
            None => self.trip = Lookup::Found(None),
        }
        self.vehicle = Some(VehicleRecord::from(&resource));
        self.phase = DetailPhase::LoadingAdditional;
        commands.extend(self.settle());
        commands
    }

    pub fn route_loaded(&mut self, result: ApiResult<RouteResource>) -> Vec<Command> {
        if self.route.is_settled() {
            return Vec::new();
        }
        self.route = match result {
            Ok(route) => Lookup::Found(
                route
                    .and_then(|r| r.attributes.long_name)
                    .filter(|n| !n.is_empty()),
            ),
            Err(e) => {
                warn!(code = e.code, "detail route fetch failed");
                Lookup::Failed
            }
        };
        self.settle()
    }

    pub fn trip_loaded(&mut self, result: ApiResult<TripResource>) -> Vec<Command> {
        if self.trip.is_settled() {
            return Vec::new();
        }
        self.trip = match result {
            Ok(trip) => Lookup::Found(
                trip.and_then(|t| t.attributes.headsign)
                    .filter(|n| !n.is_empty()),
            ),
            Err(e) => {
                warn!(code = e.code, "detail trip fetch failed");
                Lookup::Failed
            }
        };
        self.settle()
    }

    fn settle(&mut self) -> Vec<Command> {
        if self.phase != DetailPhase::LoadingAdditional
            || !self.route.is_settled()
            || !self.trip.is_settled()
        {
            return Vec::new();
        }
        self.phase = DetailPhase::Ready;
        let failure = match (&self.route, &self.trip) {
            (Lookup::Failed, Lookup::Failed) => Some(FetchFailure::AdditionalData),
            (Lookup::Failed, _) => Some(FetchFailure::Route),
            (_, Lookup::Failed) => Some(FetchFailure::Trip),
            _ => None,
        };
        failure.map(Command::Notify).into_iter().collect()
    }
}

// --- Model ---

#[derive(Debug, Default)]
pub struct Model {
    pub config: ApiConfig,
    pub list: VehicleListState,
    pub detail: Option<VehicleDetailState>,
    pub toast: Option<ToastMessage>,
    detail_ticket: DetailTicket,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_detail(&mut self, id: VehicleId) -> Vec<Command> {
        self.detail_ticket = self.detail_ticket.next();
        let (detail, commands) = VehicleDetailState::open(self.detail_ticket, id);
        self.detail = Some(detail);
        commands
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    pub fn detail_vehicle_loaded(
        &mut self,
        ticket: DetailTicket,
        result: ApiResult<VehicleResource>,
    ) -> Vec<Command> {
        self.current_detail(ticket)
            .map(|d| d.vehicle_loaded(result))
            .unwrap_or_default()
    }

    pub fn detail_route_loaded(
        &mut self,
        ticket: DetailTicket,
        result: ApiResult<RouteResource>,
    ) -> Vec<Command> {
        self.current_detail(ticket)
            .map(|d| d.route_loaded(result))
            .unwrap_or_default()
    }

    pub fn detail_trip_loaded(
        &mut self,
        ticket: DetailTicket,
        result: ApiResult<TripResource>,
    ) -> Vec<Command> {
        self.current_detail(ticket)
            .map(|d| d.trip_loaded(result))
            .unwrap_or_default()
    }

    fn current_detail(&mut self, ticket: DetailTicket) -> Option<&mut VehicleDetailState> {
        let detail = self.detail.as_mut().filter(|d| d.ticket == ticket);
        if detail.is_none() {
            debug!(ticket = ticket.0, "dropping stale detail response");
        }
        detail
    }

    pub fn show_failure(&mut self, failure: FetchFailure) {
        self.toast = Some(ToastMessage::error(failure.message()));
    }

    pub fn dismiss_toast(&mut self) {
        self.toast = None;
    }
}
