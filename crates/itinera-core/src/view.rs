//! Derives what every surface should show from a session and pushes the
//! difference to the surfaces.
//!
//! [`project`] is pure. [`ViewSynchronizer`] remembers what it already
//! applied, so calling [`ViewSynchronizer::sync`] twice with the same
//! projection touches nothing the second time.

use std::sync::Arc;

use crate::state::Bounds;
use crate::state::Connection;
use crate::state::Extent;
use crate::state::LatLng;
use crate::state::SessionState;
use crate::state::StopId;
use crate::state::TimelinePanel;
use crate::store::ItineraryStore;

/// The four map operations the core relies on.
pub trait MapSurface {
    type Handle: Copy + Eq + std::fmt::Debug;

    fn place_marker(&mut self, at: LatLng, label: &str) -> Self::Handle;
    fn draw_line(&mut self, start: LatLng, end: LatLng, label: Option<&str>) -> Self::Handle;
    fn fit_bounds(&mut self, extent: Extent);
    fn pan_to(&mut self, at: LatLng);
    fn attach_overlay(&mut self, at: LatLng, title: &str, body: &str) -> Self::Handle;
    fn detach(&mut self, handle: Self::Handle);
}

/// Card carousel and timeline panel.
pub trait PanelSurface {
    fn replace_cards(&mut self, cards: &[CardView]);
    fn activate_card(&mut self, index: Option<usize>);
    fn replace_timeline(&mut self, rows: &[TimelineRow]);
    fn highlight_row(&mut self, index: Option<usize>);
    fn set_timeline_visible(&mut self, visible: bool);
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerView {
    pub stop: StopId,
    pub position: LatLng,
    pub label: Arc<str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteView {
    pub start: LatLng,
    pub end: LatLng,
    pub label: Option<Arc<str>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupView {
    pub stop: StopId,
    pub position: LatLng,
    pub title: Arc<str>,
    pub body: Arc<str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub title: Arc<str>,
    pub time: Option<Arc<str>>,
    pub duration: Option<Arc<str>>,
    pub description: Arc<str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimelineRow {
    Stop {
        name: Arc<str>,
        time: Option<Arc<str>>,
        duration: Option<Arc<str>>,
    },
    Transport {
        label: Arc<str>,
    },
}

impl TimelineRow {
    pub fn stop_name(&self) -> Option<&str> {
        match self {
            Self::Stop { name, .. } => Some(name),
            Self::Transport { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewProjection {
    /// Changes whenever the store was cleared.
    pub store_epoch: u64,
    pub markers: Vec<MarkerView>,
    pub routes: Vec<RouteView>,
    pub popup: Option<PopupView>,
    pub cards: Vec<CardView>,
    pub active_card: Option<usize>,
    pub timeline: Vec<TimelineRow>,
    pub highlighted_row: Option<usize>,
    pub bounds: Bounds,
    pub focus: Option<LatLng>,
    pub timeline_panel: TimelinePanel,
    pub layout_epoch: u64,
}

pub fn project(state: &SessionState) -> ViewProjection {
    let store = &state.store;
    let selected = state.selected_stop();

    let markers = store
        .stops()
        .iter()
        .enumerate()
        .map(|(idx, stop)| MarkerView {
            stop: StopId(idx),
            position: stop.position,
            label: stop.name.as_str().into(),
        })
        .collect();

    let routes = store
        .connections()
        .iter()
        .map(|conn| RouteView {
            start: conn.start,
            end: conn.end,
            label: transport_label(conn).map(Into::into),
        })
        .collect();

    let cards = store
        .stops()
        .iter()
        .map(|stop| CardView {
            title: stop.name.as_str().into(),
            time: stop.time.as_deref().map(Into::into),
            duration: stop.duration.as_deref().map(Into::into),
            description: stop.description.as_str().into(),
        })
        .collect();

    let timeline = timeline_rows(store);
    let highlighted_row = selected.and_then(|(_, stop)| {
        timeline
            .iter()
            .position(|row| row.stop_name() == Some(stop.name.as_str()))
    });

    ViewProjection {
        store_epoch: store.epoch(),
        markers,
        routes,
        popup: selected.map(|(id, stop)| PopupView {
            stop: id,
            position: stop.position,
            title: stop.name.as_str().into(),
            body: stop.description.as_str().into(),
        }),
        cards,
        active_card: selected.map(|(id, _)| id.0),
        timeline,
        highlighted_row,
        bounds: store.bounds(),
        focus: selected.map(|(_, stop)| stop.position),
        timeline_panel: state.timeline,
        layout_epoch: state.layout_epoch,
    }
}

/// Itinerary stops in order, with a transport row between two stops when a
/// matching connection says how to travel.
pub fn timeline_rows(store: &ItineraryStore) -> Vec<TimelineRow> {
    let stops: Vec<_> = store.itinerary().collect();
    let mut rows = Vec::with_capacity(stops.len() * 2);
    for (idx, stop) in stops.iter().enumerate() {
        if idx > 0 {
            let label = store
                .find_connection_between(stops[idx - 1], stop)
                .and_then(transport_label);
            if let Some(label) = label {
                rows.push(TimelineRow::Transport {
                    label: label.into(),
                });
            }
        }
        rows.push(TimelineRow::Stop {
            name: stop.name.as_str().into(),
            time: stop.time.as_deref().map(Into::into),
            duration: stop.duration.as_deref().map(Into::into),
        });
    }
    rows
}

/// `"walking, 15 minutes"`, or whichever half is known.
pub fn transport_label(conn: &Connection) -> Option<String> {
    let parts: Vec<&str> = [conn.transport.as_deref(), conn.travel_time.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[derive(Debug)]
pub struct ViewSynchronizer<H> {
    store_epoch: Option<u64>,
    markers: Vec<H>,
    routes: Vec<H>,
    popup: Option<(StopId, H)>,
    fitted: Option<Extent>,
    focused: Option<(StopId, LatLng)>,
    layout_epoch: u64,
    cards: Option<Vec<CardView>>,
    active_card: Option<Option<usize>>,
    timeline: Option<Vec<TimelineRow>>,
    highlighted_row: Option<Option<usize>>,
    timeline_visible: Option<bool>,
}

impl<H> Default for ViewSynchronizer<H> {
    fn default() -> Self {
        Self {
            store_epoch: None,
            markers: Vec::new(),
            routes: Vec::new(),
            popup: None,
            fitted: None,
            focused: None,
            layout_epoch: 0,
            cards: None,
            active_card: None,
            timeline: None,
            highlighted_row: None,
            timeline_visible: None,
        }
    }
}

impl<H: Copy + Eq + std::fmt::Debug> ViewSynchronizer<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync<M, P>(&mut self, view: &ViewProjection, map: &mut M, panels: &mut P)
    where
        M: MapSurface<Handle = H>,
        P: PanelSurface,
    {
        if self.store_epoch != Some(view.store_epoch) {
            self.detach_all(map);
            self.store_epoch = Some(view.store_epoch);
        }

        for marker in view.markers.iter().skip(self.markers.len()) {
            let handle = map.place_marker(marker.position, &marker.label);
            self.markers.push(handle);
        }
        for route in view.routes.iter().skip(self.routes.len()) {
            let handle = map.draw_line(route.start, route.end, route.label.as_deref());
            self.routes.push(handle);
        }

        let wanted_popup = view.popup.as_ref().map(|popup| popup.stop);
        if self.popup.map(|(stop, _)| stop) != wanted_popup {
            if let Some((_, handle)) = self.popup.take() {
                map.detach(handle);
            }
            if let Some(popup) = view.popup.as_ref() {
                let handle = map.attach_overlay(popup.position, &popup.title, &popup.body);
                self.popup = Some((popup.stop, handle));
            }
        }

        let extent = view.bounds.extent();
        let refit = extent != self.fitted || view.layout_epoch != self.layout_epoch;
        if refit {
            if let Some(extent) = extent {
                map.fit_bounds(extent);
            }
            self.fitted = extent;
            self.layout_epoch = view.layout_epoch;
        }

        let wanted_focus = view.popup.as_ref().map(|popup| (popup.stop, popup.position));
        if let Some((stop, position)) = wanted_focus {
            if refit || self.focused != Some((stop, position)) {
                map.pan_to(position);
            }
        }
        self.focused = wanted_focus;

        if self.cards.as_deref() != Some(view.cards.as_slice()) {
            panels.replace_cards(&view.cards);
            self.cards = Some(view.cards.clone());
            self.active_card = None;
        }
        if self.active_card != Some(view.active_card) {
            panels.activate_card(view.active_card);
            self.active_card = Some(view.active_card);
        }

        if self.timeline.as_deref() != Some(view.timeline.as_slice()) {
            panels.replace_timeline(&view.timeline);
            self.timeline = Some(view.timeline.clone());
            self.highlighted_row = None;
        }
        if self.highlighted_row != Some(view.highlighted_row) {
            panels.highlight_row(view.highlighted_row);
            self.highlighted_row = Some(view.highlighted_row);
        }

        let visible = view.timeline_panel.is_shown();
        if self.timeline_visible != Some(visible) {
            panels.set_timeline_visible(visible);
            self.timeline_visible = Some(visible);
        }
    }

    fn detach_all<M: MapSurface<Handle = H>>(&mut self, map: &mut M) {
        if let Some((_, handle)) = self.popup.take() {
            map.detach(handle);
        }
        for handle in self.markers.drain(..).chain(self.routes.drain(..)) {
            map.detach(handle);
        }
        self.fitted = None;
        self.focused = None;
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;
    use crate::state::Stop;

    #[derive(Debug, Default)]
    struct RecordingMap {
        next: u32,
        live: Vec<(u32, &'static str)>,
        fits: usize,
        pans: Vec<LatLng>,
    }

    impl MapSurface for RecordingMap {
        type Handle = u32;

        fn place_marker(&mut self, _at: LatLng, _label: &str) -> u32 {
            self.next += 1;
            self.live.push((self.next, "marker"));
            self.next
        }

        fn draw_line(&mut self, _start: LatLng, _end: LatLng, _label: Option<&str>) -> u32 {
            self.next += 1;
            self.live.push((self.next, "line"));
            self.next
        }

        fn fit_bounds(&mut self, _extent: Extent) {
            self.fits += 1;
        }

        fn pan_to(&mut self, at: LatLng) {
            self.pans.push(at);
        }

        fn attach_overlay(&mut self, _at: LatLng, _title: &str, _body: &str) -> u32 {
            self.next += 1;
            self.live.push((self.next, "popup"));
            self.next
        }

        fn detach(&mut self, handle: u32) {
            self.live.retain(|(live, _)| *live != handle);
        }
    }

    impl RecordingMap {
        fn count(&self, kind: &str) -> usize {
            self.live.iter().filter(|(_, k)| *k == kind).count()
        }
    }

    #[derive(Debug, Default)]
    struct RecordingPanels {
        cards: usize,
        active: Option<usize>,
        rows: usize,
        highlighted: Option<usize>,
        calls: usize,
    }

    impl PanelSurface for RecordingPanels {
        fn replace_cards(&mut self, cards: &[CardView]) {
            self.cards = cards.len();
            self.calls += 1;
        }

        fn activate_card(&mut self, index: Option<usize>) {
            self.active = index;
            self.calls += 1;
        }

        fn replace_timeline(&mut self, rows: &[TimelineRow]) {
            self.rows = rows.len();
            self.calls += 1;
        }

        fn highlight_row(&mut self, index: Option<usize>) {
            self.highlighted = index;
            self.calls += 1;
        }

        fn set_timeline_visible(&mut self, _visible: bool) {
            self.calls += 1;
        }
    }

    fn session_with_stops() -> SessionState {
        let mut state = SessionState::new(Config::default());
        state
            .store
            .add_stop(Stop::new("A", "first", LatLng::new(1.0, 1.0)).with_time("09:00"))
            .expect("valid");
        state
            .store
            .add_stop(Stop::new("B", "second", LatLng::new(2.0, 2.0)))
            .expect("valid");
        state
    }

    #[test]
    fn second_sync_with_same_projection_is_a_noop() {
        let state = session_with_stops();
        let view = project(&state);
        let mut sync = ViewSynchronizer::new();
        let mut map = RecordingMap::default();
        let mut panels = RecordingPanels::default();

        sync.sync(&view, &mut map, &mut panels);
        let (handles, fits, pans, calls) = (map.next, map.fits, map.pans.len(), panels.calls);
        sync.sync(&view, &mut map, &mut panels);

        assert_eq!(map.next, handles);
        assert_eq!(map.fits, fits);
        assert_eq!(map.pans.len(), pans);
        assert_eq!(panels.calls, calls);
    }

    #[test]
    fn one_marker_per_stop_and_a_single_popup() {
        let mut state = session_with_stops();
        let mut sync = ViewSynchronizer::new();
        let mut map = RecordingMap::default();
        let mut panels = RecordingPanels::default();

        sync.sync(&project(&state), &mut map, &mut panels);
        state.selection.select(1, state.store.stop_count());
        sync.sync(&project(&state), &mut map, &mut panels);

        assert_eq!(map.count("marker"), 2);
        assert_eq!(map.count("popup"), 1);
        assert_eq!(panels.cards, 2);
        assert_eq!(panels.active, Some(1));
        assert_eq!(map.pans.last(), Some(&LatLng::new(2.0, 2.0)));
    }

    #[test]
    fn untimed_selection_highlights_no_row() {
        let mut state = session_with_stops();
        state.selection.select(1, 2);
        let view = project(&state);
        assert_eq!(view.timeline.len(), 1);
        assert_eq!(view.highlighted_row, None);
        assert_eq!(view.active_card, Some(1));
    }

    #[test]
    fn cleared_store_detaches_every_map_object() {
        let mut state = session_with_stops();
        let mut sync = ViewSynchronizer::new();
        let mut map = RecordingMap::default();
        let mut panels = RecordingPanels::default();
        sync.sync(&project(&state), &mut map, &mut panels);

        state.store.clear();
        state.selection.reset();
        sync.sync(&project(&state), &mut map, &mut panels);

        assert!(map.live.is_empty());
        assert_eq!(sync.marker_count(), 0);
        assert_eq!(panels.cards, 0);
        assert_eq!(panels.rows, 0);
        assert_eq!(panels.active, None);
        assert_eq!(panels.highlighted, None);
    }

    #[test]
    fn growing_bounds_triggers_refit() {
        let mut state = session_with_stops();
        let mut sync = ViewSynchronizer::new();
        let mut map = RecordingMap::default();
        let mut panels = RecordingPanels::default();
        sync.sync(&project(&state), &mut map, &mut panels);
        assert_eq!(map.fits, 1);

        state
            .store
            .add_stop(Stop::new("inside", "", LatLng::new(1.5, 1.5)))
            .expect("valid");
        sync.sync(&project(&state), &mut map, &mut panels);
        assert_eq!(map.fits, 1);

        state
            .store
            .add_connection(Connection::new("out", LatLng::new(1.0, 1.0), LatLng::new(5.0, 5.0)))
            .expect("valid");
        sync.sync(&project(&state), &mut map, &mut panels);
        assert_eq!(map.fits, 2);
        assert_eq!(map.count("line"), 1);
    }

    #[test]
    fn settled_layout_refits_without_new_points() {
        let mut state = session_with_stops();
        let mut sync = ViewSynchronizer::new();
        let mut map = RecordingMap::default();
        let mut panels = RecordingPanels::default();
        sync.sync(&project(&state), &mut map, &mut panels);

        state.layout_epoch += 1;
        sync.sync(&project(&state), &mut map, &mut panels);
        assert_eq!(map.fits, 2);
    }

    #[test]
    fn transport_label_joins_known_parts() {
        let at = LatLng::new(0.0, 0.0);
        let both = Connection::new("x", at, at)
            .with_transport("walking")
            .with_travel_time("15 minutes");
        let only_time = Connection::new("x", at, at).with_travel_time("5 min");
        assert_eq!(transport_label(&both).as_deref(), Some("walking, 15 minutes"));
        assert_eq!(transport_label(&only_time).as_deref(), Some("5 min"));
        assert_eq!(transport_label(&Connection::new("x", at, at)), None);
    }
}
