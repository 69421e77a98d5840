use std::cmp::Ordering;

use crate::error::ValidationError;
use crate::state::Bounds;
use crate::state::Connection;
use crate::state::ConnectionId;
use crate::state::LatLng;
use crate::state::Stop;
use crate::state::StopId;

/// Stops in arrival order, the time-ordered itinerary subset, and connections.
#[derive(Debug, Clone, Default)]
pub struct ItineraryStore {
    stops: Vec<Stop>,
    itinerary: Vec<StopId>,
    connections: Vec<Connection>,
    bounds: Bounds,
    epoch: u64,
}

impl ItineraryStore {
    pub fn add_stop(&mut self, stop: Stop) -> Result<StopId, ValidationError> {
        if stop.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        check_position(stop.position, "lat", "lng")?;

        let id = StopId(self.stops.len());
        self.bounds.extend(stop.position);
        if stop.time.is_some() {
            self.itinerary.push(id);
        }
        self.stops.push(stop);
        Ok(id)
    }

    pub fn add_connection(
        &mut self,
        connection: Connection,
    ) -> Result<ConnectionId, ValidationError> {
        check_position(connection.start, "start.lat", "start.lng")?;
        check_position(connection.end, "end.lat", "end.lng")?;

        let id = ConnectionId(self.connections.len());
        self.bounds.extend(connection.start);
        self.bounds.extend(connection.end);
        self.connections.push(connection);
        Ok(id)
    }

    pub fn sort_itinerary(&mut self) {
        let Self {
            stops, itinerary, ..
        } = self;
        itinerary.sort_by(|a, b| itinerary_order(&stops[a.0], &stops[b.0]));
    }

    pub fn clear(&mut self) {
        self.stops.clear();
        self.itinerary.clear();
        self.connections.clear();
        self.bounds.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// First connection whose name mentions either stop. Several matches
    /// are possible; the earliest one wins.
    pub fn find_connection_between(&self, a: &Stop, b: &Stop) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|conn| conn.name.contains(a.name.as_str()) || conn.name.contains(b.name.as_str()))
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.get(id.0)
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn itinerary(&self) -> impl Iterator<Item = &Stop> + '_ {
        self.itinerary.iter().filter_map(|id| self.stops.get(id.0))
    }

    pub fn itinerary_ids(&self) -> &[StopId] {
        &self.itinerary
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Arrival-order index of the first stop with this name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.stops.iter().position(|stop| stop.name == name)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty() && self.connections.is_empty()
    }

    /// Incremented by every `clear`, so renderers can tell a rebuilt store
    /// from one that only grew.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

fn check_position(
    position: LatLng,
    lat_field: &'static str,
    lng_field: &'static str,
) -> Result<(), ValidationError> {
    if position.is_finite() {
        return Ok(());
    }
    let field = if position.lat.is_finite() { lng_field } else { lat_field };
    Err(ValidationError::NonFinite(field))
}

/// Sequence ascending with missing last, then time ascending with missing
/// last. Name and description settle the rest so the result depends only on
/// the set of stops.
pub fn itinerary_order(a: &Stop, b: &Stop) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}

fn sort_key(stop: &Stop) -> (bool, u32, bool, &str, &str, &str) {
    (
        stop.sequence.is_none(),
        stop.sequence.unwrap_or(0),
        stop.time.is_none(),
        stop.time.as_deref().unwrap_or(""),
        stop.name.as_str(),
        stop.description.as_str(),
    )
}
