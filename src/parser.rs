//! Hand-rolled protobuf parsers for the GTFS-RT feed message family.
//!
//! Each message shape gets one bounded loop: read a tag, dispatch on field
//! number, validate the wire type, and either decode into the target slot
//! or skip. Unknown field numbers and wire-type mismatches are always
//! skipped, never misinterpreted, so new upstream fields cannot abort a
//! parse.
//!
//! Entities are decoded one isolated byte range at a time: a failure inside
//! one entity becomes an [`EntityContent::ParseError`] marker in that slot
//! while the rest of the feed decodes normally. Only framing and header
//! failures abort the whole decode.

use thiserror::Error;
use tracing::warn;

use crate::feed::{
    EntityContent, FeedEntity, FeedHeader, FeedMessage, Position, StopTimeEvent, StopTimeUpdate,
    TripDescriptor, TripUpdate, VehicleDescriptor, VehiclePosition,
};
use crate::schema::{FeedSchema, VehiclePositionLayout};
use crate::wire::{ByteReader, Tag, WireError, WireType};

/// Top-level feed message field numbers.
const FEED_HEADER: u64 = 1;
const FEED_ENTITY: u64 = 2;

/// Failures that abort a whole feed decode.
///
/// Per-entity failures never surface here; they become parse-error markers
/// inside the returned [`FeedMessage`].
#[derive(Debug, Error)]
pub enum FeedError {
    /// A top-level tag or an entity's own length prefix was malformed.
    #[error(
        "feed framing error at byte {offset}: {source} (input {input_len} bytes, starts {preview})"
    )]
    Framing {
        offset: usize,
        input_len: usize,
        preview: String,
        source: WireError,
    },

    /// The feed header's byte range failed to decode.
    #[error("feed header failed to decode: {source} (input {input_len} bytes, starts {preview})")]
    Header {
        input_len: usize,
        preview: String,
        source: WireError,
    },
}

/// Short hex rendering of the start of a buffer, for failure diagnostics.
pub fn hex_preview(bytes: &[u8]) -> String {
    let shown = bytes.len().min(16);
    let hex: Vec<String> = bytes[..shown].iter().map(|b| format!("{b:02x}")).collect();
    if bytes.len() > shown {
        format!("[{} ..]", hex.join(" "))
    } else {
        format!("[{}]", hex.join(" "))
    }
}

impl FeedHeader {
    const GTFS_REALTIME_VERSION: u64 = 1;
    const INCREMENTALITY: u64 = 2;
    const TIMESTAMP: u64 = 3;
}

impl FeedEntity {
    const ID: u64 = 1;
    const IS_DELETED: u64 = 2;
    const TRIP_UPDATE: u64 = 3;
    const VEHICLE: u64 = 4;
}

impl TripDescriptor {
    const TRIP_ID: u64 = 1;
    const START_TIME: u64 = 2;
    const START_DATE: u64 = 3;
    const SCHEDULE_RELATIONSHIP: u64 = 4;
    const ROUTE_ID: u64 = 5;
    const DIRECTION_ID: u64 = 6;
}

impl VehicleDescriptor {
    const ID: u64 = 1;
    const LABEL: u64 = 2;
    const LICENSE_PLATE: u64 = 3;
}

impl Position {
    const LATITUDE: u64 = 1;
    const LONGITUDE: u64 = 2;
    const BEARING: u64 = 3;
    const ODOMETER: u64 = 4;
    const SPEED: u64 = 5;
}

impl TripUpdate {
    const TRIP: u64 = 1;
    const STOP_TIME_UPDATE: u64 = 2;
    const VEHICLE: u64 = 3;
    const TIMESTAMP: u64 = 4;
    const DELAY: u64 = 5;
}

impl StopTimeUpdate {
    const STOP_SEQUENCE: u64 = 1;
    const ARRIVAL: u64 = 2;
    const DEPARTURE: u64 = 3;
    const STOP_ID: u64 = 4;
    const SCHEDULE_RELATIONSHIP: u64 = 5;
}

impl StopTimeEvent {
    const DELAY: u64 = 1;
    const TIME: u64 = 2;
    const UNCERTAINTY: u64 = 3;
}

/// Decodes one serialized feed message.
///
/// # Errors
///
/// Returns [`FeedError`] only for framing or header failures; a corrupt
/// entity is reported inside the result instead, as a parse-error marker in
/// its slot plus an incremented `parse_errors` counter.
pub fn parse_feed(bytes: &[u8], schema: FeedSchema) -> Result<FeedMessage, FeedError> {
    let framing = |offset: usize, source: WireError| FeedError::Framing {
        offset,
        input_len: bytes.len(),
        preview: hex_preview(bytes),
        source,
    };

    let mut reader = ByteReader::new(bytes);
    let mut feed = FeedMessage::default();

    while !reader.is_exhausted() {
        let offset = reader.position();
        let tag = reader.read_tag().map_err(|err| framing(offset, err))?;
        match tag.field {
            FEED_HEADER if tag.wire == WireType::LengthDelimited => {
                let sub = reader.sub_reader().map_err(|err| framing(offset, err))?;
                feed.header = parse_header(sub).map_err(|source| FeedError::Header {
                    input_len: bytes.len(),
                    preview: hex_preview(bytes),
                    source,
                })?;
            }
            FEED_ENTITY if tag.wire == WireType::LengthDelimited => {
                // The entity's own length prefix must be sound before
                // isolation starts; a lie here desynchronizes the rest of
                // the stream and is fatal.
                let sub = reader.sub_reader().map_err(|err| framing(offset, err))?;
                match parse_entity(sub, schema) {
                    Ok(entity) => feed.entities.push(entity),
                    Err(err) => {
                        warn!(offset, error = %err, "entity failed to decode, continuing");
                        feed.parse_errors += 1;
                        feed.entities.push(FeedEntity {
                            id: String::new(),
                            is_deleted: None,
                            content: Some(EntityContent::ParseError(err.to_string())),
                        });
                    }
                }
            }
            _ => reader.skip(tag.wire).map_err(|err| framing(offset, err))?,
        }
    }

    Ok(feed)
}

fn parse_header(mut reader: ByteReader) -> Result<FeedHeader, WireError> {
    let mut header = FeedHeader::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            FeedHeader::GTFS_REALTIME_VERSION => {
                set_if(
                    &mut header.gtfs_realtime_version,
                    string_field(&mut reader, tag)?,
                );
            }
            FeedHeader::INCREMENTALITY => {
                set_if(&mut header.incrementality, enum_field(&mut reader, tag)?);
            }
            FeedHeader::TIMESTAMP => {
                set_if(&mut header.timestamp, varint_field(&mut reader, tag)?);
            }
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(header)
}

fn parse_entity(mut reader: ByteReader, schema: FeedSchema) -> Result<FeedEntity, WireError> {
    let mut entity = FeedEntity::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            FeedEntity::ID => {
                if let Some(id) = string_field(&mut reader, tag)? {
                    entity.id = id;
                }
            }
            FeedEntity::IS_DELETED => {
                set_if(
                    &mut entity.is_deleted,
                    varint_field(&mut reader, tag)?.map(|v| v != 0),
                );
            }
            FeedEntity::TRIP_UPDATE => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    entity.content = Some(EntityContent::TripUpdate(parse_trip_update(sub)?));
                }
            }
            FeedEntity::VEHICLE => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    entity.content = Some(EntityContent::VehiclePosition(parse_vehicle_position(
                        sub,
                        schema.vehicle_position,
                    )?));
                }
            }
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(entity)
}

fn parse_trip_descriptor(mut reader: ByteReader) -> Result<TripDescriptor, WireError> {
    let mut trip = TripDescriptor::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            TripDescriptor::TRIP_ID => {
                set_if(&mut trip.trip_id, string_field(&mut reader, tag)?);
            }
            TripDescriptor::START_TIME => {
                set_if(&mut trip.start_time, string_field(&mut reader, tag)?);
            }
            TripDescriptor::START_DATE => {
                set_if(&mut trip.start_date, string_field(&mut reader, tag)?);
            }
            TripDescriptor::SCHEDULE_RELATIONSHIP => {
                set_if(
                    &mut trip.schedule_relationship,
                    enum_field(&mut reader, tag)?,
                );
            }
            TripDescriptor::ROUTE_ID => {
                set_if(&mut trip.route_id, string_field(&mut reader, tag)?);
            }
            TripDescriptor::DIRECTION_ID => {
                set_if(
                    &mut trip.direction_id,
                    varint_field(&mut reader, tag)?.map(|v| v as u32),
                );
            }
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(trip)
}

fn parse_vehicle_descriptor(mut reader: ByteReader) -> Result<VehicleDescriptor, WireError> {
    let mut vehicle = VehicleDescriptor::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            VehicleDescriptor::ID => set_if(&mut vehicle.id, string_field(&mut reader, tag)?),
            VehicleDescriptor::LABEL => set_if(&mut vehicle.label, string_field(&mut reader, tag)?),
            VehicleDescriptor::LICENSE_PLATE => {
                set_if(&mut vehicle.license_plate, string_field(&mut reader, tag)?);
            }
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(vehicle)
}

fn parse_position(mut reader: ByteReader) -> Result<Position, WireError> {
    let mut position = Position::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            Position::LATITUDE => set_if(&mut position.latitude, float32_field(&mut reader, tag)?),
            Position::LONGITUDE => {
                set_if(&mut position.longitude, float32_field(&mut reader, tag)?);
            }
            Position::BEARING => set_if(&mut position.bearing, float32_field(&mut reader, tag)?),
            Position::ODOMETER => set_if(&mut position.odometer, float64_field(&mut reader, tag)?),
            Position::SPEED => set_if(&mut position.speed, float32_field(&mut reader, tag)?),
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(position)
}

fn parse_vehicle_position(
    mut reader: ByteReader,
    layout: VehiclePositionLayout,
) -> Result<VehiclePosition, WireError> {
    let mut vp = VehiclePosition::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            n if n == layout.trip => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    vp.trip = Some(parse_trip_descriptor(sub)?);
                }
            }
            n if n == layout.vehicle => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    vp.vehicle = Some(parse_vehicle_descriptor(sub)?);
                }
            }
            n if n == layout.position => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    vp.position = Some(parse_position(sub)?);
                }
            }
            n if n == layout.current_stop_sequence => {
                set_if(
                    &mut vp.current_stop_sequence,
                    varint_field(&mut reader, tag)?.map(|v| v as u32),
                );
            }
            n if n == layout.stop_id => {
                set_if(&mut vp.stop_id, string_field(&mut reader, tag)?);
            }
            n if n == layout.current_status => {
                set_if(&mut vp.current_status, enum_field(&mut reader, tag)?);
            }
            n if n == layout.congestion_level => {
                set_if(&mut vp.congestion_level, enum_field(&mut reader, tag)?);
            }
            n if n == layout.occupancy_status => {
                set_if(&mut vp.occupancy_status, enum_field(&mut reader, tag)?);
            }
            n if n == layout.timestamp => {
                set_if(&mut vp.timestamp, varint_field(&mut reader, tag)?);
            }
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(vp)
}

fn parse_trip_update(mut reader: ByteReader) -> Result<TripUpdate, WireError> {
    let mut update = TripUpdate::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            TripUpdate::TRIP => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    update.trip = Some(parse_trip_descriptor(sub)?);
                }
            }
            TripUpdate::STOP_TIME_UPDATE => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    update.stop_time_updates.push(parse_stop_time_update(sub)?);
                }
            }
            TripUpdate::VEHICLE => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    update.vehicle = Some(parse_vehicle_descriptor(sub)?);
                }
            }
            TripUpdate::TIMESTAMP => {
                set_if(&mut update.timestamp, varint_field(&mut reader, tag)?);
            }
            TripUpdate::DELAY => {
                set_if(&mut update.delay, sint32_field(&mut reader, tag)?);
            }
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(update)
}

fn parse_stop_time_update(mut reader: ByteReader) -> Result<StopTimeUpdate, WireError> {
    let mut stu = StopTimeUpdate::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            StopTimeUpdate::STOP_SEQUENCE => {
                set_if(
                    &mut stu.stop_sequence,
                    varint_field(&mut reader, tag)?.map(|v| v as u32),
                );
            }
            StopTimeUpdate::ARRIVAL => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    stu.arrival = Some(parse_stop_time_event(sub)?);
                }
            }
            StopTimeUpdate::DEPARTURE => {
                if let Some(sub) = message_field(&mut reader, tag)? {
                    stu.departure = Some(parse_stop_time_event(sub)?);
                }
            }
            StopTimeUpdate::STOP_ID => {
                set_if(&mut stu.stop_id, string_field(&mut reader, tag)?);
            }
            StopTimeUpdate::SCHEDULE_RELATIONSHIP => {
                set_if(
                    &mut stu.schedule_relationship,
                    enum_field(&mut reader, tag)?,
                );
            }
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(stu)
}

fn parse_stop_time_event(mut reader: ByteReader) -> Result<StopTimeEvent, WireError> {
    let mut event = StopTimeEvent::default();
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.field {
            StopTimeEvent::DELAY => set_if(&mut event.delay, sint32_field(&mut reader, tag)?),
            StopTimeEvent::TIME => set_if(&mut event.time, varint_field(&mut reader, tag)?),
            StopTimeEvent::UNCERTAINTY => {
                set_if(&mut event.uncertainty, sint32_field(&mut reader, tag)?);
            }
            _ => reader.skip(tag.wire)?,
        }
    }
    Ok(event)
}

/// Last-occurrence-wins assignment: overwrite only when the field was
/// actually read, not when it was skipped for a wire-type mismatch.
fn set_if<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

// Wire-type-validated field reads. Each returns `None`, with the value
// skipped, when the wire type does not match the field's expected encoding.

fn varint_field(reader: &mut ByteReader, tag: Tag) -> Result<Option<u64>, WireError> {
    match tag.wire {
        WireType::Varint => reader.read_varint().map(Some),
        other => reader.skip(other).map(|_| None),
    }
}

fn sint32_field(reader: &mut ByteReader, tag: Tag) -> Result<Option<i32>, WireError> {
    match tag.wire {
        WireType::Varint => reader.read_signed_varint32().map(Some),
        other => reader.skip(other).map(|_| None),
    }
}

fn enum_field(reader: &mut ByteReader, tag: Tag) -> Result<Option<i32>, WireError> {
    sint32_field(reader, tag)
}

fn float32_field(reader: &mut ByteReader, tag: Tag) -> Result<Option<f32>, WireError> {
    match tag.wire {
        WireType::Fixed32 => reader.read_float32().map(Some),
        other => reader.skip(other).map(|_| None),
    }
}

fn float64_field(reader: &mut ByteReader, tag: Tag) -> Result<Option<f64>, WireError> {
    match tag.wire {
        WireType::Fixed64 => reader.read_float64().map(Some),
        other => reader.skip(other).map(|_| None),
    }
}

fn string_field(reader: &mut ByteReader, tag: Tag) -> Result<Option<String>, WireError> {
    match tag.wire {
        WireType::LengthDelimited => {
            let bytes = reader.read_length_delimited()?;
            // The live feed has been seen to emit non-UTF-8 labels; replace
            // rather than reject.
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
        other => reader.skip(other).map(|_| None),
    }
}

fn message_field(reader: &mut ByteReader, tag: Tag) -> Result<Option<ByteReader>, WireError> {
    match tag.wire {
        WireType::LengthDelimited => reader.sub_reader().map(Some),
        other => reader.skip(other).map(|_| None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_varint;

    fn tag_bytes(field: u64, wire: u64) -> Vec<u8> {
        encode_varint((field << 3) | wire)
    }

    fn varint_field_bytes(field: u64, value: u64) -> Vec<u8> {
        let mut buf = tag_bytes(field, 0);
        buf.extend(encode_varint(value));
        buf
    }

    fn len_field_bytes(field: u64, body: &[u8]) -> Vec<u8> {
        let mut buf = tag_bytes(field, 2);
        buf.extend(encode_varint(body.len() as u64));
        buf.extend(body);
        buf
    }

    fn string_field_bytes(field: u64, value: &str) -> Vec<u8> {
        len_field_bytes(field, value.as_bytes())
    }

    fn f32_field_bytes(field: u64, value: f32) -> Vec<u8> {
        let mut buf = tag_bytes(field, 5);
        buf.extend(value.to_le_bytes());
        buf
    }

    fn f64_field_bytes(field: u64, value: f64) -> Vec<u8> {
        let mut buf = tag_bytes(field, 1);
        buf.extend(value.to_le_bytes());
        buf
    }

    /// A vehicle-position entity in the observed vendor layout.
    fn vehicle_entity_bytes(id: &str, lat: f32, lon: f32) -> Vec<u8> {
        let mut position = f32_field_bytes(1, lat);
        position.extend(f32_field_bytes(2, lon));

        let mut vp = len_field_bytes(2, &position); // position at field 2 (observed)
        vp.extend(varint_field_bytes(5, 1_700_000_000)); // timestamp at field 5

        let mut entity = string_field_bytes(1, id);
        entity.extend(len_field_bytes(4, &vp));
        entity
    }

    fn feed_bytes(entities: &[Vec<u8>]) -> Vec<u8> {
        let mut header = string_field_bytes(1, "2.0");
        header.extend(varint_field_bytes(3, 1_700_000_000));

        let mut feed = len_field_bytes(1, &header);
        for entity in entities {
            feed.extend(len_field_bytes(2, entity));
        }
        feed
    }

    #[test]
    fn test_parse_empty_bytes_returns_default_feed() {
        let feed = parse_feed(&[], FeedSchema::OBSERVED).unwrap();
        assert_eq!(feed.header, FeedHeader::default());
        assert!(feed.entities.is_empty());
        assert_eq!(feed.parse_errors, 0);
    }

    #[test]
    fn test_trip_descriptor_trip_id() {
        // Tag 0x0a = field 1, wire type 2; length 3; payload "abc".
        let reader = ByteReader::new(&[0x0a, 0x03, b'a', b'b', b'c']);
        let trip = parse_trip_descriptor(reader).unwrap();
        assert_eq!(trip.trip_id.as_deref(), Some("abc"));
        assert_eq!(trip.route_id, None);
    }

    #[test]
    fn test_position_floats() {
        let mut buf = f32_field_bytes(1, 51.05);
        buf.extend(f32_field_bytes(2, -0.12));
        buf.extend(f64_field_bytes(4, 120_350.5));
        let position = parse_position(ByteReader::new(&buf)).unwrap();
        assert!((position.latitude.unwrap() - 51.05).abs() < f32::EPSILON);
        assert!((position.longitude.unwrap() + 0.12).abs() < f32::EPSILON);
        assert_eq!(position.odometer, Some(120_350.5));
        assert_eq!(position.bearing, None);
        assert_eq!(position.speed, None);
    }

    #[test]
    fn test_header_absent_fields_stay_absent() {
        let header_body = string_field_bytes(1, "2.0");
        let feed_buf = len_field_bytes(1, &header_body);
        let feed = parse_feed(&feed_buf, FeedSchema::OBSERVED).unwrap();
        assert_eq!(feed.header.gtfs_realtime_version.as_deref(), Some("2.0"));
        assert_eq!(feed.header.timestamp, None);
        assert_eq!(feed.header.incrementality, None);
    }

    #[test]
    fn test_header_wire_zero_is_some_zero() {
        let header_body = varint_field_bytes(3, 0);
        let feed_buf = len_field_bytes(1, &header_body);
        let feed = parse_feed(&feed_buf, FeedSchema::OBSERVED).unwrap();
        assert_eq!(feed.header.timestamp, Some(0));
    }

    #[test]
    fn test_full_feed_decodes_in_order() {
        let buf = feed_bytes(&[
            vehicle_entity_bytes("v1", 51.05, -0.12),
            vehicle_entity_bytes("v2", 51.10, -0.15),
        ]);
        let feed = parse_feed(&buf, FeedSchema::OBSERVED).unwrap();
        assert_eq!(feed.entities.len(), 2);
        assert_eq!(feed.entities[0].id, "v1");
        assert_eq!(feed.entities[1].id, "v2");
        let vp = feed.entities[0].vehicle_position().unwrap();
        assert!((vp.position.as_ref().unwrap().latitude.unwrap() - 51.05).abs() < f32::EPSILON);
        assert_eq!(vp.timestamp, Some(1_700_000_000));
        assert_eq!(feed.parse_errors, 0);
    }

    #[test]
    fn test_one_corrupt_entity_does_not_discard_the_feed() {
        // The middle entity's inner vehicle field declares 2 more bytes than
        // its body holds; the entity's own framing is intact.
        let good_vp = {
            let mut vp = len_field_bytes(2, &f32_field_bytes(1, 51.0));
            vp.extend(varint_field_bytes(5, 100));
            vp
        };
        let mut corrupt = string_field_bytes(1, "v-bad");
        corrupt.extend(tag_bytes(4, 2));
        corrupt.extend(encode_varint(good_vp.len() as u64 + 2));
        corrupt.extend(&good_vp);

        let buf = feed_bytes(&[
            vehicle_entity_bytes("v1", 51.05, -0.12),
            corrupt,
            vehicle_entity_bytes("v3", 51.20, -0.18),
        ]);

        let feed = parse_feed(&buf, FeedSchema::OBSERVED).unwrap();
        assert_eq!(feed.entities.len(), 3);
        assert_eq!(feed.parse_errors, 1);
        assert_eq!(feed.entities[0].id, "v1");
        assert!(feed.entities[0].vehicle_position().is_some());
        assert!(feed.entities[1].parse_error().is_some());
        assert_eq!(feed.entities[2].id, "v3");
        assert!(feed.entities[2].vehicle_position().is_some());
    }

    #[test]
    fn test_entity_framing_failure_is_fatal() {
        // Top-level entity field declaring more bytes than the buffer holds.
        let mut buf = tag_bytes(2, 2);
        buf.extend(encode_varint(100));
        buf.extend([0x0a, 0x01, b'x']);
        let err = parse_feed(&buf, FeedSchema::OBSERVED).unwrap_err();
        assert!(matches!(err, FeedError::Framing { .. }));
        let message = err.to_string();
        assert!(message.contains("starts ["), "{message}");
    }

    #[test]
    fn test_header_failure_is_fatal() {
        // Header whose inner version field is truncated.
        let header_body = [0x0a, 0x05, b'2'];
        let mut buf = tag_bytes(1, 2);
        buf.extend(encode_varint(header_body.len() as u64));
        buf.extend(header_body);
        let err = parse_feed(&buf, FeedSchema::OBSERVED).unwrap_err();
        assert!(matches!(err, FeedError::Header { .. }));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut buf = varint_field_bytes(99, 12345);
        buf.extend(f32_field_bytes(98, 1.0));
        buf.extend(f64_field_bytes(97, 2.0));
        buf.extend(len_field_bytes(96, b"opaque"));
        buf.extend(string_field_bytes(1, "trip-7"));
        let trip = parse_trip_descriptor(ByteReader::new(&buf)).unwrap();
        assert_eq!(trip.trip_id.as_deref(), Some("trip-7"));
    }

    #[test]
    fn test_wire_type_mismatch_skips_instead_of_misreading() {
        // trip_id arrives as a varint; it must be skipped, and the following
        // correctly-typed route_id must still decode.
        let mut buf = varint_field_bytes(TripDescriptor::TRIP_ID, 42);
        buf.extend(string_field_bytes(TripDescriptor::ROUTE_ID, "12A"));
        let trip = parse_trip_descriptor(ByteReader::new(&buf)).unwrap();
        assert_eq!(trip.trip_id, None);
        assert_eq!(trip.route_id.as_deref(), Some("12A"));
    }

    #[test]
    fn test_scalar_repeat_is_last_occurrence_wins() {
        let mut buf = string_field_bytes(TripDescriptor::TRIP_ID, "first");
        buf.extend(string_field_bytes(TripDescriptor::TRIP_ID, "second"));
        let trip = parse_trip_descriptor(ByteReader::new(&buf)).unwrap();
        assert_eq!(trip.trip_id.as_deref(), Some("second"));
    }

    #[test]
    fn test_trip_update_stop_times_keep_arrival_order() {
        let stu = |seq: u64, delay: i64| {
            let mut body = varint_field_bytes(1, seq);
            let event = varint_field_bytes(1, delay as u64);
            body.extend(len_field_bytes(2, &event));
            body
        };
        let mut buf = len_field_bytes(TripUpdate::STOP_TIME_UPDATE, &stu(3, 60));
        buf.extend(len_field_bytes(TripUpdate::STOP_TIME_UPDATE, &stu(4, -30)));
        buf.extend(varint_field_bytes(TripUpdate::DELAY, (-45i32) as u32 as u64));

        let update = parse_trip_update(ByteReader::new(&buf)).unwrap();
        assert_eq!(update.stop_time_updates.len(), 2);
        assert_eq!(update.stop_time_updates[0].stop_sequence, Some(3));
        assert_eq!(update.stop_time_updates[1].stop_sequence, Some(4));
        assert_eq!(
            update.stop_time_updates[0].arrival.as_ref().unwrap().delay,
            Some(60)
        );
        assert_eq!(update.stop_time_updates[1].arrival.as_ref().unwrap().delay, Some(-30));
        assert_eq!(update.delay, Some(-45));
    }

    #[test]
    fn test_signed_delay_is_twos_complement_not_zigzag() {
        // -30 encoded as a plain ten-byte varint, the vendor's encoding.
        let event_body = varint_field_bytes(1, (-30i64) as u64);
        let event = parse_stop_time_event(ByteReader::new(&event_body)).unwrap();
        assert_eq!(event.delay, Some(-30));
    }

    #[test]
    fn test_entity_content_is_single_valued() {
        // Both a trip update and a vehicle position on the wire: the last
        // one stands, matching protobuf merge semantics for a oneof.
        let trip_update = len_field_bytes(1, &string_field_bytes(1, "t1"));
        let mut entity = string_field_bytes(1, "e1");
        entity.extend(len_field_bytes(3, &trip_update));
        entity.extend(len_field_bytes(4, &varint_field_bytes(5, 9)));

        let parsed = parse_entity(ByteReader::new(&entity), FeedSchema::OBSERVED).unwrap();
        assert!(parsed.trip_update().is_none());
        assert!(parsed.vehicle_position().is_some());
    }

    #[test]
    fn test_schema_variant_changes_field_meaning() {
        // Timestamp at field 5 per the observed layout.
        let vp_body = varint_field_bytes(5, 1_700_000_123);

        let observed =
            parse_vehicle_position(ByteReader::new(&vp_body), VehiclePositionLayout::OBSERVED)
                .unwrap();
        assert_eq!(observed.timestamp, Some(1_700_000_123));

        // Under the published layout field 5 is stop_id (length-delimited),
        // so a varint there is a wire-type mismatch and gets skipped.
        let published =
            parse_vehicle_position(ByteReader::new(&vp_body), VehiclePositionLayout::PUBLISHED)
                .unwrap();
        assert_eq!(published.timestamp, None);
        assert_eq!(published.stop_id, None);
    }

    #[test]
    fn test_entity_marker_message_mentions_underrun() {
        let mut corrupt = string_field_bytes(1, "e1");
        corrupt.extend(tag_bytes(4, 2));
        corrupt.extend(encode_varint(50)); // declares 50 bytes, none follow
        let buf = feed_bytes(&[corrupt]);

        let feed = parse_feed(&buf, FeedSchema::OBSERVED).unwrap();
        assert_eq!(feed.parse_errors, 1);
        let message = feed.entities[0].parse_error().unwrap();
        assert!(message.contains("underrun"), "{message}");
    }

    #[test]
    fn test_hex_preview_truncates() {
        assert_eq!(hex_preview(&[0x0a, 0xff]), "[0a ff]");
        let long: Vec<u8> = (0u8..32).collect();
        let preview = hex_preview(&long);
        assert!(preview.ends_with("..]"), "{preview}");
    }
}
