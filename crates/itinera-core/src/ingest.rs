use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SessionError;
use crate::error::ValidationError;
use crate::state::Connection;
use crate::state::ConnectionId;
use crate::state::LatLng;
use crate::state::Stop;
use crate::state::StopId;
use crate::store::ItineraryStore;

pub const LOCATION_FUNCTION: &str = "location";
pub const LINE_FUNCTION: &str = "line";

/// One item from the model stream, already split out of its transport.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    FunctionCall { name: String, args: Value },
    Text(String),
}

impl StreamEvent {
    pub fn call(name: impl Into<String>, args: Value) -> Self {
        Self::FunctionCall {
            name: name.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Stop(StopId),
    Connection(ConnectionId),
    Text(String),
    Ignored,
    Rejected(ValidationError),
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Stop(_) | Self::Connection(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    pub stops: usize,
    pub connections: usize,
    pub rejected: usize,
}

/// Per-submission consumer of model events.
///
/// The store is only cleared once the first event of a submission is
/// accepted, so a submission that yields nothing leaves the previous
/// results in place.
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    generation: u64,
    open: bool,
    summary: IngestSummary,
    transcript: String,
}

impl Ingestor {
    pub fn begin(&mut self, generation: u64) {
        self.generation = generation;
        self.open = true;
        self.summary = IngestSummary::default();
        self.transcript.clear();
    }

    /// Stops forwarding anything further for the current generation.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn accepts(&self, generation: u64) -> bool {
        self.open && self.generation == generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn summary(&self) -> IngestSummary {
        self.summary
    }

    pub fn accepted(&self) -> usize {
        self.summary.stops + self.summary.connections
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn ingest(&mut self, store: &mut ItineraryStore, event: StreamEvent) -> IngestOutcome {
        let outcome = match event {
            StreamEvent::Text(fragment) => {
                self.transcript.push_str(&fragment);
                return IngestOutcome::Text(fragment);
            }
            StreamEvent::FunctionCall { name, args } => match name.as_str() {
                LOCATION_FUNCTION => parse_stop(args).and_then(|stop| {
                    self.claim_store(store);
                    store.add_stop(stop).map(IngestOutcome::Stop)
                }),
                LINE_FUNCTION => parse_connection(args).and_then(|conn| {
                    self.claim_store(store);
                    store.add_connection(conn).map(IngestOutcome::Connection)
                }),
                other => {
                    tracing::debug!(function = other, "ignoring unknown function call");
                    return IngestOutcome::Ignored;
                }
            },
        };

        match outcome {
            Ok(IngestOutcome::Stop(id)) => {
                self.summary.stops += 1;
                IngestOutcome::Stop(id)
            }
            Ok(IngestOutcome::Connection(id)) => {
                self.summary.connections += 1;
                IngestOutcome::Connection(id)
            }
            Ok(other) => other,
            Err(err) => {
                tracing::warn!(
                    generation = self.generation,
                    error = %err,
                    "skipping invalid event"
                );
                self.summary.rejected += 1;
                IngestOutcome::Rejected(err)
            }
        }
    }

    /// Result of a stream that ended on its own.
    pub fn finish(&mut self) -> Result<IngestSummary, SessionError> {
        self.close();
        if self.accepted() == 0 {
            return Err(SessionError::NoResults);
        }
        Ok(self.summary)
    }

    fn claim_store(&self, store: &mut ItineraryStore) {
        if self.accepted() == 0 {
            store.clear();
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct LocationArgs {
    name: Option<String>,
    description: Option<String>,
    lat: Option<Coordinate>,
    lng: Option<Coordinate>,
    time: Option<Value>,
    duration: Option<Value>,
    sequence: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PointArgs {
    lat: Option<Coordinate>,
    lng: Option<Coordinate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineArgs {
    name: Option<String>,
    start: Option<PointArgs>,
    end: Option<PointArgs>,
    transport: Option<Value>,
    #[serde(alias = "travel_time")]
    travel_time: Option<Value>,
}

pub fn parse_stop(args: Value) -> Result<Stop, ValidationError> {
    let args: LocationArgs =
        serde_json::from_value(args).map_err(|err| ValidationError::Malformed(err.to_string()))?;

    let name = args
        .name
        .map(|name| name.trim().to_string())
        .ok_or(ValidationError::MissingField("name"))?;
    if name.is_empty() {
        return Err(ValidationError::EmptyField("name"));
    }
    let description = args
        .description
        .map(|text| text.trim().to_string())
        .ok_or(ValidationError::MissingField("description"))?;
    let lat = coordinate(args.lat, "lat")?;
    let lng = coordinate(args.lng, "lng")?;

    Ok(Stop {
        name,
        description,
        position: LatLng::new(lat, lng),
        time: text_field(args.time).map(|time| normalize_time(&time)),
        duration: text_field(args.duration),
        sequence: args.sequence.as_ref().and_then(positive_integer),
    })
}

pub fn parse_connection(args: Value) -> Result<Connection, ValidationError> {
    let args: LineArgs =
        serde_json::from_value(args).map_err(|err| ValidationError::Malformed(err.to_string()))?;

    let start = point(args.start, "start")?;
    let end = point(args.end, "end")?;

    Ok(Connection {
        name: args.name.map(|name| name.trim().to_string()).unwrap_or_default(),
        start,
        end,
        transport: text_field(args.transport),
        travel_time: text_field(args.travel_time),
    })
}

fn point(args: Option<PointArgs>, field: &'static str) -> Result<LatLng, ValidationError> {
    let args = args.ok_or(ValidationError::MissingField(field))?;
    let (lat_field, lng_field) = match field {
        "start" => ("start.lat", "start.lng"),
        _ => ("end.lat", "end.lng"),
    };
    Ok(LatLng::new(
        coordinate(args.lat, lat_field)?,
        coordinate(args.lng, lng_field)?,
    ))
}

fn coordinate(value: Option<Coordinate>, field: &'static str) -> Result<f64, ValidationError> {
    let parsed = match value.ok_or(ValidationError::MissingField(field))? {
        Coordinate::Number(number) => number,
        Coordinate::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::NonFinite(field))?,
    };
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ValidationError::NonFinite(field))
    }
}

fn text_field(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn positive_integer(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number >= 1.0 && number.fract() == 0.0 && number <= f64::from(u32::MAX) {
        Some(number as u32)
    } else {
        None
    }
}

fn short_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d):([0-5]\d)$").expect("static time pattern"))
}

/// `9:30` becomes `09:30` so string order matches clock order.
pub fn normalize_time(time: &str) -> String {
    let time = time.trim();
    match short_time_pattern().captures(time) {
        Some(caps) => format!("0{}:{}", &caps[1], &caps[2]),
        None => time.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn location(name: &str, time: &str, sequence: u32) -> StreamEvent {
        StreamEvent::call(
            LOCATION_FUNCTION,
            json!({
                "name": name,
                "description": format!("{name} description"),
                "lat": 48.86,
                "lng": 2.33,
                "time": time,
                "sequence": sequence,
            }),
        )
    }

    #[test]
    fn parses_full_location_payload() {
        let stop = parse_stop(json!({
            "name": " Louvre ",
            "description": "Museum",
            "lat": "48.8606",
            "lng": 2.3376,
            "time": "9:30",
            "duration": "2 hours",
            "sequence": 3,
        }))
        .expect("valid payload");

        assert_eq!(stop.name, "Louvre");
        assert_eq!(stop.position, LatLng::new(48.8606, 2.3376));
        assert_eq!(stop.time.as_deref(), Some("09:30"));
        assert_eq!(stop.duration.as_deref(), Some("2 hours"));
        assert_eq!(stop.sequence, Some(3));
    }

    #[test]
    fn missing_lat_is_a_validation_error() {
        let err = parse_stop(json!({"name": "x", "description": "y", "lng": 1.0}))
            .expect_err("missing lat");
        assert_eq!(err, ValidationError::MissingField("lat"));
    }

    #[test]
    fn missing_description_is_a_validation_error() {
        let err = parse_stop(json!({"name": "x", "lat": 1.0, "lng": 1.0}))
            .expect_err("missing description");
        assert_eq!(err, ValidationError::MissingField("description"));
    }

    #[test]
    fn non_numeric_coordinate_is_rejected() {
        let err = parse_stop(json!({"name": "x", "description": "", "lat": "north", "lng": 1.0}))
            .expect_err("bad lat");
        assert_eq!(err, ValidationError::NonFinite("lat"));
    }

    #[test]
    fn non_positive_or_fractional_sequence_counts_as_absent() {
        for sequence in [json!(0), json!(-2), json!(1.5), json!("soon")] {
            let stop = parse_stop(json!({
                "name": "x", "description": "", "lat": 0.0, "lng": 0.0, "sequence": sequence,
            }))
            .expect("valid payload");
            assert_eq!(stop.sequence, None);
        }
    }

    #[test]
    fn blank_time_counts_as_absent() {
        let stop = parse_stop(json!({
            "name": "x", "description": "", "lat": 0.0, "lng": 0.0, "time": "  ",
        }))
        .expect("valid payload");
        assert_eq!(stop.time, None);
    }

    #[test]
    fn parses_line_with_camel_case_travel_time() {
        let conn = parse_connection(json!({
            "name": "Cafe A to Museum B",
            "start": {"lat": 1.0, "lng": 2.0},
            "end": {"lat": 3.0, "lng": 4.0},
            "transport": "walking",
            "travelTime": "15 minutes",
        }))
        .expect("valid line");

        assert_eq!(conn.transport.as_deref(), Some("walking"));
        assert_eq!(conn.travel_time.as_deref(), Some("15 minutes"));
        assert_eq!(conn.end, LatLng::new(3.0, 4.0));
    }

    #[test]
    fn line_without_end_is_rejected() {
        let err = parse_connection(json!({"name": "x", "start": {"lat": 1.0, "lng": 2.0}}))
            .expect_err("missing end");
        assert_eq!(err, ValidationError::MissingField("end"));
    }

    #[test]
    fn malformed_event_is_skipped_and_stream_continues() {
        let mut store = ItineraryStore::default();
        let mut ingestor = Ingestor::default();
        ingestor.begin(1);

        let bad = StreamEvent::call(LOCATION_FUNCTION, json!({"name": "Bad", "description": "", "lng": 1.0}));
        assert!(matches!(
            ingestor.ingest(&mut store, bad),
            IngestOutcome::Rejected(ValidationError::MissingField("lat"))
        ));
        assert!(ingestor.ingest(&mut store, location("Good", "09:00", 1)).is_accepted());

        assert_eq!(store.stop_count(), 1);
        assert_eq!(store.stops()[0].name, "Good");
        let summary = ingestor.finish().expect("one accepted event");
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.stops, 1);
    }

    #[test]
    fn stream_without_results_fails_with_no_results() {
        let mut store = ItineraryStore::default();
        let mut ingestor = Ingestor::default();
        ingestor.begin(1);
        ingestor.ingest(&mut store, StreamEvent::Text("Here is your plan".to_string()));
        ingestor.ingest(&mut store, StreamEvent::call("weather", json!({})));

        assert_eq!(ingestor.finish(), Err(SessionError::NoResults));
        assert!(store.is_empty());
        assert_eq!(ingestor.transcript(), "Here is your plan");
    }

    #[test]
    fn first_accepted_event_replaces_previous_results() {
        let mut store = ItineraryStore::default();
        let mut ingestor = Ingestor::default();
        ingestor.begin(1);
        ingestor.ingest(&mut store, location("Old", "09:00", 1));

        ingestor.begin(2);
        let bad = StreamEvent::call(LOCATION_FUNCTION, json!({}));
        ingestor.ingest(&mut store, bad);
        assert_eq!(store.stops()[0].name, "Old");

        ingestor.ingest(&mut store, location("New", "10:00", 1));
        let names: Vec<&str> = store.stops().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["New"]);
    }

    #[test]
    fn closed_ingestor_rejects_its_generation() {
        let mut ingestor = Ingestor::default();
        ingestor.begin(4);
        assert!(ingestor.accepts(4));
        assert!(!ingestor.accepts(3));
        ingestor.close();
        assert!(!ingestor.accepts(4));
    }

    #[test]
    fn normalizes_single_digit_hours() {
        assert_eq!(normalize_time("7:05"), "07:05");
        assert_eq!(normalize_time("14:00"), "14:00");
        assert_eq!(normalize_time("noon"), "noon");
    }
}
