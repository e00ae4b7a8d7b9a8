use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const STATUS_STOPPED_LABEL: &str = "Stopped";
pub const STATUS_IN_TRANSIT_LABEL: &str = "In Transit";
pub const STATUS_INCOMING_LABEL: &str = "Incoming";
pub const STATUS_BREAK_LABEL: &str = "Break";

pub const STATUS_STOPPED_COLOR: &str = "#D32F2F";
pub const STATUS_IN_TRANSIT_COLOR: &str = "#388E3C";
pub const STATUS_INCOMING_COLOR: &str = "#F57C00";
pub const STATUS_BREAK_COLOR: &str = "#616161";

pub const LAST_UPDATE_FORMAT: &str = "%d/%m/%Y";
pub const MISSING_VALUE: &str = "-";

/// Vehicle movement relative to its next stop, as reported in
/// `attributes.current_status`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VehicleStatus {
    StoppedAt,
    InTransitTo,
    IncomingAt,
    #[default]
    Unknown,
}

impl VehicleStatus {
    #[must_use]
    pub fn from_api(raw: Option<&str>) -> Self {
        match raw {
            Some("STOPPED_AT") => Self::StoppedAt,
            Some("IN_TRANSIT_TO") => Self::InTransitTo,
            Some("INCOMING_AT") => Self::IncomingAt,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(status_display(self).label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub label: &'static str,
    pub color: &'static str,
}

/// Label and badge background for a status. Anything the API does not
/// document falls back to "Break".
#[must_use]
pub const fn status_display(status: &VehicleStatus) -> StatusDisplay {
    match status {
        VehicleStatus::StoppedAt => StatusDisplay {
            label: STATUS_STOPPED_LABEL,
            color: STATUS_STOPPED_COLOR,
        },
        VehicleStatus::InTransitTo => StatusDisplay {
            label: STATUS_IN_TRANSIT_LABEL,
            color: STATUS_IN_TRANSIT_COLOR,
        },
        VehicleStatus::IncomingAt => StatusDisplay {
            label: STATUS_INCOMING_LABEL,
            color: STATUS_INCOMING_COLOR,
        },
        VehicleStatus::Unknown => StatusDisplay {
            label: STATUS_BREAK_LABEL,
            color: STATUS_BREAK_COLOR,
        },
    }
}

/// `2024-03-05T14:02:11-05:00` becomes `05/03/2024`, in the timestamp's own
/// offset. Unparseable input renders as `-`.
#[must_use]
pub fn format_last_update(raw: Option<&str>) -> String {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|ts| ts.format(LAST_UPDATE_FORMAT).to_string())
        .unwrap_or_else(|| MISSING_VALUE.to_string())
}

#[must_use]
pub fn vehicle_title(label: &str) -> String {
    if label.trim().is_empty() {
        format!("Bus {MISSING_VALUE}")
    } else {
        format!("Bus {}", label.trim().to_uppercase())
    }
}
