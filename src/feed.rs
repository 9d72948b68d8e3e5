//! Decoded representation of a GTFS-realtime feed.
//!
//! Every optional field is `None` when the field was not emitted on the
//! wire; a wire-present zero decodes to `Some(0)`. The whole tree derives
//! [`serde::Serialize`] so the HTTP layer can render it as JSON directly.

use serde::Serialize;

/// Root of every decode: header plus entities in arrival order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FeedMessage {
    pub header: FeedHeader,
    pub entities: Vec<FeedEntity>,
    /// Number of entities replaced by a parse-error marker.
    pub parse_errors: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FeedHeader {
    pub gtfs_realtime_version: Option<String>,
    pub incrementality: Option<i32>,
    pub timestamp: Option<u64>,
}

/// One unit of real-time information.
///
/// `content` is `None` for an entity that carried neither a trip update nor
/// a vehicle position (e.g. a bare deletion).
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FeedEntity {
    pub id: String,
    pub is_deleted: Option<bool>,
    pub content: Option<EntityContent>,
}

/// What an entity carries: at most one of these, never a mix.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityContent {
    TripUpdate(TripUpdate),
    VehiclePosition(VehiclePosition),
    /// The entity's byte range failed to decode; the message is the
    /// diagnostic from the failed parse.
    ParseError(String),
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TripDescriptor {
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub direction_id: Option<u32>,
    pub start_time: Option<String>,
    pub start_date: Option<String>,
    pub schedule_relationship: Option<i32>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct VehicleDescriptor {
    pub id: Option<String>,
    pub label: Option<String>,
    pub license_plate: Option<String>,
}

/// Raw position sample. Units and ranges are the vendor's business; the
/// decoder does not validate lat/long bounds.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Position {
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
    pub bearing: Option<f32>,
    pub odometer: Option<f64>,
    pub speed: Option<f32>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct VehiclePosition {
    pub trip: Option<TripDescriptor>,
    pub vehicle: Option<VehicleDescriptor>,
    pub position: Option<Position>,
    pub current_stop_sequence: Option<u32>,
    pub stop_id: Option<String>,
    pub current_status: Option<i32>,
    pub congestion_level: Option<i32>,
    pub occupancy_status: Option<i32>,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TripUpdate {
    pub trip: Option<TripDescriptor>,
    pub vehicle: Option<VehicleDescriptor>,
    pub stop_time_updates: Vec<StopTimeUpdate>,
    pub timestamp: Option<u64>,
    pub delay: Option<i32>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct StopTimeUpdate {
    pub stop_sequence: Option<u32>,
    pub arrival: Option<StopTimeEvent>,
    pub departure: Option<StopTimeEvent>,
    pub stop_id: Option<String>,
    pub schedule_relationship: Option<i32>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct StopTimeEvent {
    pub delay: Option<i32>,
    pub time: Option<u64>,
    pub uncertainty: Option<i32>,
}

impl FeedEntity {
    pub fn trip_update(&self) -> Option<&TripUpdate> {
        match &self.content {
            Some(EntityContent::TripUpdate(update)) => Some(update),
            _ => None,
        }
    }

    pub fn vehicle_position(&self) -> Option<&VehiclePosition> {
        match &self.content {
            Some(EntityContent::VehiclePosition(vehicle)) => Some(vehicle),
            _ => None,
        }
    }

    pub fn parse_error(&self) -> Option<&str> {
        match &self.content {
            Some(EntityContent::ParseError(message)) => Some(message),
            _ => None,
        }
    }
}
