use std::collections::VecDeque;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::config::Config;
use crate::error::ErrorKind;
use crate::error::SessionError;
use crate::ingest::Ingestor;
use crate::selection::Selection;
use crate::store::ItineraryStore;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub usize);

/// A point of interest. Identity is the name; the producer gives no stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub name: String,
    pub description: String,
    pub position: LatLng,
    /// Visiting time as `HH:MM`. Stops without one stay off the timeline.
    pub time: Option<String>,
    pub duration: Option<String>,
    pub sequence: Option<u32>,
}

impl Stop {
    pub fn new(name: impl Into<String>, description: impl Into<String>, position: LatLng) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            position,
            time: None,
            duration: None,
            sequence: None,
        }
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// A route between two points. Linked to stops only through its name.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub name: String,
    pub start: LatLng,
    pub end: LatLng,
    pub transport: Option<String>,
    pub travel_time: Option<String>,
}

impl Connection {
    pub fn new(name: impl Into<String>, start: LatLng, end: LatLng) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            transport: None,
            travel_time: None,
        }
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    pub fn with_travel_time(mut self, travel_time: impl Into<String>) -> Self {
        self.travel_time = Some(travel_time.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Extent {
    fn around(point: LatLng) -> Self {
        Self {
            south: point.lat,
            west: point.lng,
            north: point.lat,
            east: point.lng,
        }
    }

    pub fn contains(&self, point: LatLng) -> bool {
        (self.south..=self.north).contains(&point.lat)
            && (self.west..=self.east).contains(&point.lng)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

/// Minimal box over every point seen this session. Only ever grows until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    extent: Option<Extent>,
}

impl Bounds {
    /// Returns true when the point fell outside the previous extent.
    pub fn extend(&mut self, point: LatLng) -> bool {
        match self.extent.as_mut() {
            None => {
                self.extent = Some(Extent::around(point));
                true
            }
            Some(extent) if extent.contains(point) => false,
            Some(extent) => {
                extent.south = extent.south.min(point.lat);
                extent.north = extent.north.max(point.lat);
                extent.west = extent.west.min(point.lng);
                extent.east = extent.east.max(point.lng);
                true
            }
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    pub fn is_empty(&self) -> bool {
        self.extent.is_none()
    }

    pub fn clear(&mut self) {
        self.extent = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Streaming,
    Ready,
    Failed,
}

impl SessionPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Streaming => "Generating",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelinePanel {
    Hidden,
    Shown,
}

impl TimelinePanel {
    pub fn toggled(self) -> Self {
        match self {
            Self::Hidden => Self::Shown,
            Self::Shown => Self::Hidden,
        }
    }

    pub fn is_shown(self) -> bool {
        self == Self::Shown
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedError {
    pub kind: ErrorKind,
    pub message: Arc<str>,
    pub generation: u64,
}

impl DisplayedError {
    pub fn new(kind: ErrorKind, message: impl Into<Arc<str>>, generation: u64) -> Self {
        Self {
            kind,
            message: message.into(),
            generation,
        }
    }

    pub fn from_session(err: &SessionError, generation: u64) -> Self {
        Self::new(err.kind(), err.to_string(), generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Session,
    Ingest,
    Model,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub seq: u64,
    pub level: LogLevel,
    pub ts_ms: Option<i64>,
    pub source: LogSource,
    pub message: String,
    pub generation: u64,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        source: LogSource,
        message: impl Into<String>,
        generation: u64,
    ) -> Self {
        Self {
            seq: 0,
            level,
            ts_ms: Some(chrono::Utc::now().timestamp_millis()),
            source,
            message: message.into(),
            generation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn append(&mut self, mut entry: LogEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.next_seq = 1;
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.buf.iter()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.buf.back()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Everything one front-end session owns. Mutated only through `reduce`.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub store: ItineraryStore,
    pub selection: Selection,
    pub ingest: Ingestor,
    /// Bumped on every submission and restart; stream actions carrying an
    /// older value are dropped.
    pub generation: u64,
    pub phase: SessionPhase,
    pub prompt: Option<Arc<str>>,
    pub loading: bool,
    pub error: Option<DisplayedError>,
    pub timeline: TimelinePanel,
    /// Bumped each time the timeline panel finishes settling, so the map
    /// refits to its new size.
    pub layout_epoch: u64,
    pub logs: LogBuffer,
    pub config: Config,
}

impl SessionState {
    pub fn new(config: Config) -> Self {
        Self {
            store: ItineraryStore::default(),
            selection: Selection::default(),
            ingest: Ingestor::default(),
            generation: 0,
            phase: SessionPhase::Idle,
            prompt: None,
            loading: false,
            error: None,
            timeline: if config.view.show_timeline {
                TimelinePanel::Shown
            } else {
                TimelinePanel::Hidden
            },
            layout_epoch: 0,
            logs: LogBuffer::new(config.view.log_capacity),
            config,
        }
    }

    pub fn selected_stop(&self) -> Option<(StopId, &Stop)> {
        let index = self.selection.current(self.store.stop_count())?;
        let id = StopId(index);
        self.store.stop(id).map(|stop| (id, stop))
    }

    pub fn log(&mut self, level: LogLevel, source: LogSource, message: impl Into<String>) {
        let generation = self.generation;
        self.logs
            .append(LogEntry::new(level, source, message, generation));
    }
}
