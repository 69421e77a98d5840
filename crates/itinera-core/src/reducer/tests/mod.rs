use pretty_assertions::assert_eq;
use serde_json::json;

pub(super) use super::reduce;
pub(super) use super::SessionEffect;
pub(super) use crate::actions::SessionAction;
pub(super) use crate::actions::StreamAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::config::Config;
pub(super) use crate::error::ErrorKind;
pub(super) use crate::ingest::StreamEvent;
pub(super) use crate::state::LogSource;
pub(super) use crate::state::SessionPhase;
pub(super) use crate::state::SessionState;
pub(super) use crate::state::TimelinePanel;
pub(super) use crate::view::project;
pub(super) use crate::view::TimelineRow;


fn state() -> SessionState {
    SessionState::new(Config::default())
}

fn location(name: &str, time: Option<&str>, sequence: Option<u32>) -> StreamEvent {
    let mut args = json!({
        "name": name,
        "description": format!("About {name}"),
        "lat": 48.85 + name.len() as f64 * 0.001,
        "lng": 2.35,
    });
    if let Some(time) = time {
        args["time"] = json!(time);
    }
    if let Some(sequence) = sequence {
        args["sequence"] = json!(sequence);
    }
    StreamEvent::call("location", args)
}

fn line(name: &str, transport: Option<&str>, travel_time: Option<&str>) -> StreamEvent {
    let mut args = json!({
        "name": name,
        "start": {"lat": 48.85, "lng": 2.35},
        "end": {"lat": 48.86, "lng": 2.33},
    });
    if let Some(transport) = transport {
        args["transport"] = json!(transport);
    }
    if let Some(travel_time) = travel_time {
        args["travelTime"] = json!(travel_time);
    }
    StreamEvent::call("line", args)
}

fn user(state: &mut SessionState, action: UserAction) -> Vec<SessionEffect> {
    reduce(state, SessionAction::User(action))
}

/// Submits a prompt and returns the generation the stream must use.
fn submit(state: &mut SessionState, prompt: &str) -> u64 {
    let effects = user(state, UserAction::SubmitPrompt(prompt.to_string()));
    match effects.first() {
        Some(SessionEffect::StartStream { generation, .. }) => *generation,
        other => panic!("expected StartStream, got {other:?}"),
    }
}

fn feed(state: &mut SessionState, generation: u64, event: StreamEvent) -> Vec<SessionEffect> {
    reduce(
        state,
        SessionAction::Stream(StreamAction::Event { generation, event }),
    )
}

fn finish(state: &mut SessionState, generation: u64) -> Vec<SessionEffect> {
    reduce(
        state,
        SessionAction::Stream(StreamAction::Finished { generation }),
    )
}

fn run_stream(state: &mut SessionState, prompt: &str, events: Vec<StreamEvent>) -> u64 {
    let generation = submit(state, prompt);
    for event in events {
        feed(state, generation, event);
    }
    finish(state, generation);
    generation
}

fn stop_names(state: &SessionState) -> Vec<String> {
    state
        .store
        .stops()
        .iter()
        .map(|stop| stop.name.clone())
        .collect()
}

fn itinerary_names(state: &SessionState) -> Vec<String> {
    state
        .store
        .itinerary()
        .map(|stop| stop.name.clone())
        .collect()
}

fn assert_single_active(state: &SessionState) {
    let view = project(state);
    let selected = state.selection.current(state.store.stop_count());
    assert_eq!(view.active_card, selected);
    assert_eq!(view.popup.as_ref().map(|popup| popup.stop.0), selected);
    if let Some(row) = view.highlighted_row {
        let selected_name = state.selected_stop().map(|(_, stop)| stop.name.as_str());
        assert_eq!(view.timeline[row].stop_name(), selected_name);
    }
}
