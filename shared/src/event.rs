use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::ApiResponse;
use crate::config::ApiConfig;
use crate::model::FetchMode;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(VehicleId);
typed_id!(RouteId);
typed_id!(TripId);

// --- Request tickets ---

/// Identifies one mount of the vehicle list screen. Route catalogue
/// responses from an earlier mount are discarded.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Identifies one query configuration (filters + refresh). Trip and vehicle
/// responses issued under an older epoch are stale.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QueryEpoch(pub u64);

/// Identifies one opening of the vehicle detail screen.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DetailTicket(pub u64);

macro_rules! next_ticket {
    ($name:ident) => {
        impl $name {
            #[must_use]
            pub const fn next(self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }
    };
}

next_ticket!(SessionId);
next_ticket!(QueryEpoch);
next_ticket!(DetailTicket);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle & configuration
    ScreenMounted,
    ScreenUnmounted,
    ConfigUpdated(ApiConfig),
    ConfigJsonReceived(String),

    // Route filter dialog
    RoutesSelected(Vec<RouteId>),
    RouteFilterConfirmed,
    RouteFilterCancelled,

    // Trip filter dialog
    TripsSelected(Vec<TripId>),
    TripFilterConfirmed,
    TripFilterCancelled,

    // List
    RefreshRequested,
    EndReached,

    // Detail
    VehicleSelected {
        id: VehicleId,
    },
    VehicleDetailClosed,

    DismissToast,

    // Capability responses (boxed to keep enum size small)
    #[serde(skip)]
    RoutesFetched {
        session: SessionId,
        result: Box<ApiResponse>,
    },
    #[serde(skip)]
    TripsFetched {
        epoch: QueryEpoch,
        result: Box<ApiResponse>,
    },
    #[serde(skip)]
    VehiclesFetched {
        epoch: QueryEpoch,
        mode: FetchMode,
        result: Box<ApiResponse>,
    },
    #[serde(skip)]
    VehicleDetailFetched {
        ticket: DetailTicket,
        result: Box<ApiResponse>,
    },
    #[serde(skip)]
    DetailRouteFetched {
        ticket: DetailTicket,
        result: Box<ApiResponse>,
    },
    #[serde(skip)]
    DetailTripFetched {
        ticket: DetailTicket,
        result: Box<ApiResponse>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ScreenMounted => "screen_mounted",
            Self::ScreenUnmounted => "screen_unmounted",
            Self::ConfigUpdated(_) => "config_updated",
            Self::ConfigJsonReceived(_) => "config_json_received",
            Self::RoutesSelected(_) => "routes_selected",
            Self::RouteFilterConfirmed => "route_filter_confirmed",
            Self::RouteFilterCancelled => "route_filter_cancelled",
            Self::TripsSelected(_) => "trips_selected",
            Self::TripFilterConfirmed => "trip_filter_confirmed",
            Self::TripFilterCancelled => "trip_filter_cancelled",
            Self::RefreshRequested => "refresh_requested",
            Self::EndReached => "end_reached",
            Self::VehicleSelected { .. } => "vehicle_selected",
            Self::VehicleDetailClosed => "vehicle_detail_closed",
            Self::DismissToast => "dismiss_toast",
            Self::RoutesFetched { .. } => "routes_fetched",
            Self::TripsFetched { .. } => "trips_fetched",
            Self::VehiclesFetched { .. } => "vehicles_fetched",
            Self::VehicleDetailFetched { .. } => "vehicle_detail_fetched",
            Self::DetailRouteFetched { .. } => "detail_route_fetched",
            Self::DetailTripFetched { .. } => "detail_trip_fetched",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::RoutesSelected(_)
                | Self::RouteFilterConfirmed
                | Self::RouteFilterCancelled
                | Self::TripsSelected(_)
                | Self::TripFilterConfirmed
                | Self::TripFilterCancelled
                | Self::RefreshRequested
                | Self::EndReached
                | Self::VehicleSelected { .. }
                | Self::VehicleDetailClosed
                | Self::DismissToast
        )
    }
}
