use std::time::Duration;

use super::actions::SessionAction;
use super::actions::StreamAction;
use super::actions::UserAction;
use super::error::ErrorKind;
use super::error::SessionError;
use super::export::render_itinerary_text;
use super::export::EXPORT_FILE_NAME;
use super::ingest::IngestOutcome;
use super::state::DisplayedError;
use super::state::LogLevel;
use super::state::LogSource;
use super::state::SessionPhase;
use super::state::SessionState;
use super::view::timeline_rows;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Re-project the session and sync every surface.
    Render,
    StartStream {
        generation: u64,
        prompt: String,
    },
    /// Dispatch `UserAction::TimelineSettled` after the delay.
    ScheduleSettle {
        delay: Duration,
    },
    WriteExport {
        file_name: &'static str,
        contents: String,
    },
}

pub fn reduce(state: &mut SessionState, action: SessionAction) -> Vec<SessionEffect> {
    match action {
        SessionAction::User(user) => reduce_user(state, user),
        SessionAction::Stream(stream) => reduce_stream(state, stream),
    }
}

fn reduce_user(state: &mut SessionState, action: UserAction) -> Vec<SessionEffect> {
    match action {
        UserAction::SubmitPrompt(text) => {
            let prompt = text.trim();
            if prompt.is_empty() {
                return Vec::new();
            }

            state.generation += 1;
            let generation = state.generation;
            state.ingest.begin(generation);
            state.prompt = Some(prompt.into());
            state.loading = true;
            state.phase = SessionPhase::Streaming;
            state.error = None;
            tracing::info!(generation, "prompt submitted");
            state.log(LogLevel::Info, LogSource::Session, format!("> {prompt}"));

            vec![
                SessionEffect::StartStream {
                    generation,
                    prompt: prompt.to_string(),
                },
                SessionEffect::Render,
            ]
        }
        UserAction::Select(index) => {
            state.selection.select(index, state.store.stop_count());
            vec![SessionEffect::Render]
        }
        UserAction::SelectTimelineRow(row) => {
            let rows = timeline_rows(&state.store);
            let target = rows
                .get(row)
                .and_then(|row| row.stop_name())
                .and_then(|name| state.store.position_of(name));
            if let Some(index) = target {
                state.selection.select(index, state.store.stop_count());
            }
            vec![SessionEffect::Render]
        }
        UserAction::Next => {
            state.selection.next(state.store.stop_count());
            vec![SessionEffect::Render]
        }
        UserAction::Prev => {
            state.selection.prev(state.store.stop_count());
            vec![SessionEffect::Render]
        }
        UserAction::Restart => {
            state.generation += 1;
            state.ingest.begin(state.generation);
            state.ingest.close();
            state.store.clear();
            state.selection.reset();
            state.prompt = None;
            state.loading = false;
            state.phase = SessionPhase::Idle;
            state.error = None;
            state.logs.clear();
            tracing::info!(generation = state.generation, "session restarted");
            state.log(LogLevel::Info, LogSource::Session, "session restarted");
            vec![SessionEffect::Render]
        }
        UserAction::ToggleTimeline => {
            state.timeline = state.timeline.toggled();
            vec![
                SessionEffect::Render,
                SessionEffect::ScheduleSettle {
                    delay: Duration::from_millis(state.config.view.timeline_settle_ms),
                },
            ]
        }
        UserAction::TimelineSettled => {
            state.layout_epoch += 1;
            vec![SessionEffect::Render]
        }
        UserAction::Export => {
            if state.store.itinerary().next().is_none() {
                state.error = Some(DisplayedError::new(
                    ErrorKind::Export,
                    "nothing to export yet",
                    state.generation,
                ));
                return vec![SessionEffect::Render];
            }
            let contents = render_itinerary_text(&state.store, state.prompt.as_deref());
            vec![SessionEffect::WriteExport {
                file_name: EXPORT_FILE_NAME,
                contents,
            }]
        }
        UserAction::DismissError => {
            state.error = None;
            vec![SessionEffect::Render]
        }
    }
}

fn reduce_stream(state: &mut SessionState, action: StreamAction) -> Vec<SessionEffect> {
    let generation = action.generation();
    if generation != state.generation || !state.ingest.accepts(generation) {
        tracing::debug!(
            generation,
            current = state.generation,
            "dropping stream action from a stale generation"
        );
        return Vec::new();
    }

    match action {
        StreamAction::Event { event, .. } => {
            let outcome = state.ingest.ingest(&mut state.store, event);
            match outcome {
                IngestOutcome::Stop(_) | IngestOutcome::Connection(_) => {
                    if state.ingest.accepted() == 1 {
                        // First result of this submission replaced the old store.
                        state.selection.reset();
                    }
                    if matches!(outcome, IngestOutcome::Stop(_)) {
                        state.store.sort_itinerary();
                    }
                    state.selection.clamp(state.store.stop_count());
                    vec![SessionEffect::Render]
                }
                IngestOutcome::Text(fragment) => {
                    let fragment = fragment.trim();
                    if !fragment.is_empty() {
                        state.log(LogLevel::Info, LogSource::Model, fragment);
                    }
                    vec![SessionEffect::Render]
                }
                IngestOutcome::Ignored => Vec::new(),
                IngestOutcome::Rejected(err) => {
                    state.log(
                        LogLevel::Warn,
                        LogSource::Ingest,
                        format!("skipped invalid event: {err}"),
                    );
                    Vec::new()
                }
            }
        }
        StreamAction::Meta { message, .. } => {
            if !message.trim().is_empty() {
                state.log(LogLevel::Debug, LogSource::Model, message);
            }
            Vec::new()
        }
        StreamAction::Finished { .. } => {
            state.loading = false;
            match state.ingest.finish() {
                Ok(summary) => {
                    state.store.sort_itinerary();
                    state.selection.clamp(state.store.stop_count());
                    state.phase = SessionPhase::Ready;
                    tracing::info!(
                        generation,
                        stops = summary.stops,
                        connections = summary.connections,
                        rejected = summary.rejected,
                        "stream finished"
                    );
                    state.log(
                        LogLevel::Info,
                        LogSource::Session,
                        format!(
                            "{} stops, {} routes ({} skipped)",
                            summary.stops, summary.connections, summary.rejected
                        ),
                    );
                }
                Err(err) => fail_session(state, err),
            }
            vec![SessionEffect::Render]
        }
        StreamAction::Failed { message, .. } => {
            state.loading = false;
            let partial = state.ingest.accepted() > 0;
            state.ingest.close();
            if partial {
                state.store.sort_itinerary();
                state.selection.clamp(state.store.stop_count());
            }
            fail_session(state, SessionError::upstream(message));
            vec![SessionEffect::Render]
        }
    }
}

fn fail_session(state: &mut SessionState, err: SessionError) {
    tracing::warn!(generation = state.generation, error = %err, "submission failed");
    state.log(LogLevel::Error, LogSource::Session, err.to_string());
    state.error = Some(DisplayedError::from_session(&err, state.generation));
    state.phase = SessionPhase::Failed;
}

#[cfg(test)]
mod tests;
