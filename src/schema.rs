//! Field-number layouts for the messages whose numbering varies by vendor.
//!
//! Most message types in the wild follow the published GTFS-realtime
//! numbering, but at least one deployment emits a renumbered vehicle
//! position. The mapping is therefore data handed to the parser, not a
//! branch inside it: a new vendor quirk means a new [`FeedSchema`] value.
//!
//! When onboarding a feed, run the diagnostic introspector against live
//! vendor bytes before trusting either layout (see `inspect` in the CLI).

/// Field numbers for the vehicle-position message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehiclePositionLayout {
    pub trip: u64,
    pub vehicle: u64,
    pub position: u64,
    pub current_stop_sequence: u64,
    pub stop_id: u64,
    pub current_status: u64,
    pub congestion_level: u64,
    pub occupancy_status: u64,
    pub timestamp: u64,
}

impl VehiclePositionLayout {
    /// Numbering as transcribed from the published transit-feed spec.
    pub const PUBLISHED: Self = Self {
        trip: 1,
        vehicle: 2,
        position: 3,
        current_stop_sequence: 4,
        stop_id: 5,
        current_status: 6,
        timestamp: 7,
        congestion_level: 8,
        occupancy_status: 9,
    };

    /// Numbering confirmed by byte-walking the live vendor payload. Note
    /// trip=1 / position=2 / timestamp=5 / vehicle=8.
    pub const OBSERVED: Self = Self {
        trip: 1,
        position: 2,
        current_stop_sequence: 3,
        current_status: 4,
        timestamp: 5,
        congestion_level: 6,
        stop_id: 7,
        vehicle: 8,
        occupancy_status: 9,
    };
}

/// Per-deployment schema selection.
///
/// Only the vehicle-position layout has been seen to vary so far; the other
/// message types decode with the published numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSchema {
    pub vehicle_position: VehiclePositionLayout,
}

impl FeedSchema {
    pub const PUBLISHED: Self = Self {
        vehicle_position: VehiclePositionLayout::PUBLISHED,
    };

    pub const OBSERVED: Self = Self {
        vehicle_position: VehiclePositionLayout::OBSERVED,
    };
}

impl Default for FeedSchema {
    /// The observed layout is the default: it is what the production vendor
    /// actually emits, the published transcription notwithstanding.
    fn default() -> Self {
        Self::OBSERVED
    }
}
