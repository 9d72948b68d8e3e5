//! Per-decode summary records for feed quality tracking.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::{EntityContent, FeedMessage};

/// One row of observability data about a decoded feed.
///
/// Field-presence counts make vendor regressions visible over time (e.g. a
/// feed that silently stops emitting bearings).
#[derive(Debug, Default, Serialize)]
pub struct FeedSummary {
    pub timestamp: DateTime<Utc>,
    pub feed_timestamp: Option<u64>,
    pub total_entities: usize,

    // entity content
    pub vehicles: usize,
    pub trip_updates: usize,
    pub deleted: usize,
    pub parse_errors: u32,

    // vehicle fields
    pub with_trip: usize,
    pub with_vehicle_descriptor: usize,
    pub with_position: usize,
    pub with_bearing: usize,
    pub with_speed: usize,
    pub with_odometer: usize,
    pub with_stop_id: usize,
    pub with_timestamp: usize,

    // trip update fields
    pub stop_time_updates: usize,
    pub with_delay: usize,
}

impl FeedSummary {
    pub fn from_feed(feed: &FeedMessage) -> Self {
        let mut s = FeedSummary {
            timestamp: Utc::now(),
            feed_timestamp: feed.header.timestamp,
            total_entities: feed.entities.len(),
            parse_errors: feed.parse_errors,
            ..Default::default()
        };

        for entity in &feed.entities {
            if entity.is_deleted == Some(true) {
                s.deleted += 1;
            }

            match &entity.content {
                Some(EntityContent::VehiclePosition(v)) => {
                    s.vehicles += 1;

                    if v.trip.is_some() {
                        s.with_trip += 1;
                    }

                    if v.vehicle.is_some() {
                        s.with_vehicle_descriptor += 1;
                    }

                    if let Some(pos) = &v.position {
                        s.with_position += 1;

                        if pos.bearing.is_some() {
                            s.with_bearing += 1;
                        }

                        if pos.speed.is_some() {
                            s.with_speed += 1;
                        }

                        if pos.odometer.is_some() {
                            s.with_odometer += 1;
                        }
                    }

                    if v.stop_id.is_some() {
                        s.with_stop_id += 1;
                    }

                    if v.timestamp.is_some() {
                        s.with_timestamp += 1;
                    }
                }
                Some(EntityContent::TripUpdate(t)) => {
                    s.trip_updates += 1;
                    s.stop_time_updates += t.stop_time_updates.len();

                    if t.delay.is_some() {
                        s.with_delay += 1;
                    }
                }
                Some(EntityContent::ParseError(_)) | None => {}
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn bearing_pct(&self) -> f64 {
        Self::pct(self.with_bearing, self.vehicles)
    }
}
