use std::collections::BTreeMap;
use std::io;
use std::ops::Range;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseButton, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Points};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;

use itinera_core::actions::{SessionAction, StreamAction, UserAction};
use itinera_core::error::ErrorKind;
use itinera_core::export::render_itinerary_text;
use itinera_core::reducer::{reduce, SessionEffect};
use itinera_core::state::{DisplayedError, Extent, LatLng, LogLevel, LogSource, SessionState};
use itinera_core::view::{
    project, CardView, MapSurface, PanelSurface, TimelineRow, ViewSynchronizer,
};
use itinera_exec::ItineraryModel;

use crate::session;

const CARD_WIDTH: u16 = 30;
const CARD_HEIGHT: u16 = 7;
const TIMELINE_WIDTH: u16 = 34;
const POPUP_WIDTH: u16 = 36;
const POPUP_HEIGHT: u16 = 5;
/// Smallest span shown on the map, in degrees.
const MIN_SPAN: f64 = 0.01;
const FIT_PADDING: f64 = 0.15;

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            LeaveAlternateScreen,
            DisableMouseCapture,
            crossterm::cursor::Show
        );
    }
}

pub fn run(
    mut state: SessionState,
    model: Box<dyn ItineraryModel>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        crossterm::cursor::Hide
    )?;
    let _guard = TuiGuard; // Ensures terminal is restored on exit or panic

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    run_app(&mut terminal, &mut state, model.as_ref()).map_err(|e| e.into())
}

enum UiEvent {
    Stream(StreamAction),
    TimelineSettled,
}

impl From<StreamAction> for UiEvent {
    fn from(action: StreamAction) -> Self {
        Self::Stream(action)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MapItem {
    Marker {
        at: LatLng,
        label: String,
    },
    Route {
        start: LatLng,
        end: LatLng,
        label: Option<String>,
    },
    Overlay {
        at: LatLng,
        title: String,
        body: String,
    },
}

/// Map drawn on a braille canvas. Items live until detached.
#[derive(Debug, Default)]
struct TerminalMap {
    next_handle: u32,
    items: BTreeMap<u32, MapItem>,
    viewport: Option<Extent>,
}

impl TerminalMap {
    fn insert(&mut self, item: MapItem) -> u32 {
        self.next_handle += 1;
        self.items.insert(self.next_handle, item);
        self.next_handle
    }

    fn overlay(&self) -> Option<(&LatLng, &str, &str)> {
        self.items.values().find_map(|item| match item {
            MapItem::Overlay { at, title, body } => Some((at, title.as_str(), body.as_str())),
            _ => None,
        })
    }
}

fn padded(extent: Extent) -> Extent {
    let center = extent.center();
    let half_lat = (extent.north - extent.south).max(MIN_SPAN) * (0.5 + FIT_PADDING);
    let half_lng = (extent.east - extent.west).max(MIN_SPAN) * (0.5 + FIT_PADDING);
    Extent {
        south: center.lat - half_lat,
        west: center.lng - half_lng,
        north: center.lat + half_lat,
        east: center.lng + half_lng,
    }
}

fn recentered(extent: Extent, at: LatLng) -> Extent {
    let half_lat = (extent.north - extent.south) / 2.0;
    let half_lng = (extent.east - extent.west) / 2.0;
    Extent {
        south: at.lat - half_lat,
        west: at.lng - half_lng,
        north: at.lat + half_lat,
        east: at.lng + half_lng,
    }
}

impl MapSurface for TerminalMap {
    type Handle = u32;

    fn place_marker(&mut self, at: LatLng, label: &str) -> u32 {
        self.insert(MapItem::Marker {
            at,
            label: label.to_string(),
        })
    }

    fn draw_line(&mut self, start: LatLng, end: LatLng, label: Option<&str>) -> u32 {
        self.insert(MapItem::Route {
            start,
            end,
            label: label.map(str::to_string),
        })
    }

    fn fit_bounds(&mut self, extent: Extent) {
        self.viewport = Some(padded(extent));
    }

    fn pan_to(&mut self, at: LatLng) {
        let base = self.viewport.unwrap_or_else(|| {
            padded(Extent {
                south: at.lat,
                west: at.lng,
                north: at.lat,
                east: at.lng,
            })
        });
        self.viewport = Some(recentered(base, at));
    }

    fn attach_overlay(&mut self, at: LatLng, title: &str, body: &str) -> u32 {
        self.insert(MapItem::Overlay {
            at,
            title: title.to_string(),
            body: body.to_string(),
        })
    }

    fn detach(&mut self, handle: u32) {
        self.items.remove(&handle);
    }
}

#[derive(Debug, Default)]
struct TerminalPanels {
    cards: Vec<CardView>,
    active_card: Option<usize>,
    timeline: Vec<TimelineRow>,
    highlighted_row: Option<usize>,
    timeline_visible: bool,
}

impl PanelSurface for TerminalPanels {
    fn replace_cards(&mut self, cards: &[CardView]) {
        self.cards = cards.to_vec();
    }

    fn activate_card(&mut self, index: Option<usize>) {
        self.active_card = index;
    }

    fn replace_timeline(&mut self, rows: &[TimelineRow]) {
        self.timeline = rows.to_vec();
    }

    fn highlight_row(&mut self, index: Option<usize>) {
        self.highlighted_row = index;
    }

    fn set_timeline_visible(&mut self, visible: bool) {
        self.timeline_visible = visible;
    }
}

#[derive(Default)]
struct Surfaces {
    map: TerminalMap,
    panels: TerminalPanels,
    sync: ViewSynchronizer<u32>,
}

impl Surfaces {
    fn render(&mut self, state: &SessionState) {
        let view = project(state);
        self.sync.sync(&view, &mut self.map, &mut self.panels);
    }
}

struct AppLayout {
    header: Rect,
    map: Rect,
    timeline: Option<Rect>,
    cards: Rect,
    input: Rect,
    status: Rect,
}

fn app_layout(area: Rect, timeline_visible: bool) -> AppLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(CARD_HEIGHT),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);

    let (map, timeline) = if timeline_visible {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(TIMELINE_WIDTH)])
            .split(rows[1]);
        (cols[0], Some(cols[1]))
    } else {
        (rows[1], None)
    };

    AppLayout {
        header: rows[0],
        map,
        timeline,
        cards: rows[2],
        input: rows[3],
        status: rows[4],
    }
}

fn hit(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.x + area.width && row >= area.y && row < area.y + area.height
}

fn card_capacity(area: Rect) -> usize {
    usize::from((area.width / CARD_WIDTH).max(1))
}

/// Cards shown in the carousel, keeping the active one in view.
fn card_window(count: usize, active: Option<usize>, capacity: usize) -> Range<usize> {
    if count == 0 || capacity == 0 {
        return 0..0;
    }
    let capacity = capacity.min(count);
    let active = active.unwrap_or(0).min(count - 1);
    let start = active.saturating_sub(capacity / 2).min(count - capacity);
    start..start + capacity
}

fn card_at(area: Rect, window: Range<usize>, column: u16, row: u16) -> Option<usize> {
    if !hit(area, column, row) {
        return None;
    }
    let index = window.start + usize::from((column - area.x) / CARD_WIDTH);
    (index < window.end).then_some(index)
}

fn timeline_offset(len: usize, highlighted: Option<usize>, visible_rows: usize) -> usize {
    if visible_rows == 0 || len <= visible_rows {
        return 0;
    }
    highlighted
        .unwrap_or(0)
        .saturating_sub(visible_rows / 2)
        .min(len - visible_rows)
}

fn timeline_row_at(area: Rect, panels: &TerminalPanels, column: u16, row: u16) -> Option<usize> {
    let inner = Block::default().borders(Borders::ALL).inner(area);
    if !hit(inner, column, row) {
        return None;
    }
    let offset = timeline_offset(
        panels.timeline.len(),
        panels.highlighted_row,
        usize::from(inner.height),
    );
    let index = offset + usize::from(row - inner.y);
    (index < panels.timeline.len()).then_some(index)
}

fn user(state: &mut SessionState, action: UserAction) -> Vec<SessionEffect> {
    reduce(state, SessionAction::User(action))
}

enum KeyHandlerResult {
    Continue(Vec<SessionEffect>),
    Exit,
}

fn copy_itinerary(state: &mut SessionState) {
    let text = render_itinerary_text(&state.store, state.prompt.as_deref());
    let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
    match copied {
        Ok(()) => state.log(
            LogLevel::Info,
            LogSource::Session,
            "itinerary copied to clipboard",
        ),
        Err(err) => state.log(
            LogLevel::Warn,
            LogSource::Session,
            format!("clipboard unavailable: {err}"),
        ),
    }
}

fn handle_key_event(
    key: event::KeyEvent,
    state: &mut SessionState,
    input: &mut String,
) -> KeyHandlerResult {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => KeyHandlerResult::Exit,
            KeyCode::Char('t') => {
                KeyHandlerResult::Continue(user(state, UserAction::ToggleTimeline))
            }
            KeyCode::Char('r') => {
                input.clear();
                KeyHandlerResult::Continue(user(state, UserAction::Restart))
            }
            KeyCode::Char('e') => KeyHandlerResult::Continue(user(state, UserAction::Export)),
            KeyCode::Char('y') => {
                copy_itinerary(state);
                KeyHandlerResult::Continue(vec![SessionEffect::Render])
            }
            _ => KeyHandlerResult::Continue(Vec::new()),
        };
    }

    match key.code {
        KeyCode::Esc if state.error.is_some() => {
            KeyHandlerResult::Continue(user(state, UserAction::DismissError))
        }
        KeyCode::Esc => KeyHandlerResult::Exit,
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
            input.push('\n');
            KeyHandlerResult::Continue(Vec::new())
        }
        KeyCode::Enter => {
            let prompt = std::mem::take(input);
            KeyHandlerResult::Continue(user(state, UserAction::SubmitPrompt(prompt)))
        }
        KeyCode::Backspace => {
            input.pop();
            KeyHandlerResult::Continue(Vec::new())
        }
        KeyCode::Left => KeyHandlerResult::Continue(user(state, UserAction::Prev)),
        KeyCode::Right => KeyHandlerResult::Continue(user(state, UserAction::Next)),
        KeyCode::Char(c) => {
            input.push(c);
            KeyHandlerResult::Continue(Vec::new())
        }
        _ => KeyHandlerResult::Continue(Vec::new()),
    }
}

fn handle_mouse_event<B: Backend>(
    mouse: event::MouseEvent,
    state: &mut SessionState,
    surfaces: &Surfaces,
    terminal: &Terminal<B>,
) -> io::Result<Vec<SessionEffect>> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let size = terminal.size()?;
            let layout = app_layout(
                Rect::new(0, 0, size.width, size.height),
                surfaces.panels.timeline_visible,
            );
            let panels = &surfaces.panels;
            let window = card_window(
                panels.cards.len(),
                panels.active_card,
                card_capacity(layout.cards),
            );
            if let Some(index) = card_at(layout.cards, window, mouse.column, mouse.row) {
                return Ok(user(state, UserAction::Select(index)));
            }
            if let Some(area) = layout.timeline {
                if let Some(row) = timeline_row_at(area, panels, mouse.column, mouse.row) {
                    return Ok(user(state, UserAction::SelectTimelineRow(row)));
                }
            }
            Ok(Vec::new())
        }
        MouseEventKind::ScrollDown => Ok(user(state, UserAction::Next)),
        MouseEventKind::ScrollUp => Ok(user(state, UserAction::Prev)),
        _ => Ok(Vec::new()),
    }
}

fn apply_effects(
    effects: Vec<SessionEffect>,
    state: &mut SessionState,
    surfaces: &mut Surfaces,
    model: &dyn ItineraryModel,
    tx: &mpsc::Sender<UiEvent>,
) {
    let mut render = false;
    for effect in effects {
        match effect {
            SessionEffect::Render => render = true,
            SessionEffect::StartStream { generation, prompt } => {
                // Detached: a restart bumps the generation and the reducer
                // drops whatever this stream still sends.
                session::start_stream(
                    model,
                    generation,
                    &prompt,
                    state.config.model.model.as_deref(),
                    tx.clone(),
                );
            }
            SessionEffect::ScheduleSettle { delay } => {
                let tx = tx.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    let _ = tx.send(UiEvent::TimelineSettled);
                });
            }
            SessionEffect::WriteExport {
                file_name,
                contents,
            } => {
                match session::write_export(&state.config, file_name, &contents) {
                    Ok(path) => state.log(
                        LogLevel::Info,
                        LogSource::Session,
                        format!("exported to {}", path.display()),
                    ),
                    Err(err) => {
                        tracing::warn!(error = %err, "export failed");
                        state.error = Some(DisplayedError::new(
                            ErrorKind::Export,
                            format!("export failed: {err}"),
                            state.generation,
                        ));
                    }
                }
                render = true;
            }
        }
    }
    if render {
        surfaces.render(state);
    }
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut SessionState,
    model: &dyn ItineraryModel,
) -> io::Result<()> {
    let (tx, rx) = mpsc::channel::<UiEvent>();
    let mut surfaces = Surfaces::default();
    let mut input = String::new();
    surfaces.render(state);

    loop {
        let mut effects = Vec::new();
        while let Ok(event) = rx.try_recv() {
            let action = match event {
                UiEvent::Stream(action) => SessionAction::Stream(action),
                UiEvent::TimelineSettled => SessionAction::User(UserAction::TimelineSettled),
            };
            effects.extend(reduce(state, action));
        }
        apply_effects(effects, state, &mut surfaces, model, &tx);

        terminal.draw(|f| ui(f, state, &surfaces, &input))?;

        if event::poll(Duration::from_millis(16))? {
            let effects = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match handle_key_event(key, state, &mut input) {
                        KeyHandlerResult::Continue(effects) => effects,
                        KeyHandlerResult::Exit => return Ok(()),
                    }
                }
                Event::Mouse(mouse) => handle_mouse_event(mouse, state, &surfaces, terminal)?,
                Event::Resize(_, _) => vec![SessionEffect::Render],
                _ => Vec::new(),
            };
            apply_effects(effects, state, &mut surfaces, model, &tx);
        }
    }
}

fn get_spinner() -> &'static str {
    let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    frames[(millis / 100) as usize % frames.len()]
}

fn ui(f: &mut ratatui::Frame, state: &SessionState, surfaces: &Surfaces, input: &str) {
    let layout = app_layout(f.area(), surfaces.panels.timeline_visible);

    render_header(f, layout.header, state);
    render_map(f, layout.map, &surfaces.map);
    if let Some(area) = layout.timeline {
        render_timeline(f, area, &surfaces.panels);
    }
    render_cards(f, layout.cards, &surfaces.panels);

    let prompt = Paragraph::new(format!("{input}▏"))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Where to? (Enter to plan) "),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(prompt, layout.input);

    render_status(f, layout.status, state);
}

fn render_header(f: &mut ratatui::Frame, area: Rect, state: &SessionState) {
    let mut spans = vec![
        Span::styled(
            " itinera ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(state.phase.label(), Style::default().fg(Color::Gray)),
    ];
    if state.loading {
        spans.push(Span::raw(format!(" {}", get_spinner())));
    }
    if let Some(prompt) = state.prompt.as_deref() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            prompt.to_string(),
            Style::default().add_modifier(Modifier::ITALIC),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_map(f: &mut ratatui::Frame, area: Rect, map: &TerminalMap) {
    let block = Block::default().borders(Borders::ALL).title(" Map ");
    let Some(viewport) = map.viewport else {
        let hint = Paragraph::new("Describe a day trip below and press Enter.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(hint, area);
        return;
    };

    let canvas = Canvas::default()
        .block(block)
        .marker(symbols::Marker::Braille)
        .x_bounds([viewport.west, viewport.east])
        .y_bounds([viewport.south, viewport.north])
        .paint(|ctx| {
            for item in map.items.values() {
                if let MapItem::Route { start, end, label } = item {
                    ctx.draw(&CanvasLine::new(
                        start.lng,
                        start.lat,
                        end.lng,
                        end.lat,
                        Color::Blue,
                    ));
                    if let Some(label) = label {
                        ctx.print(
                            (start.lng + end.lng) / 2.0,
                            (start.lat + end.lat) / 2.0,
                            Span::styled(label.clone(), Style::default().fg(Color::DarkGray)),
                        );
                    }
                }
            }
            ctx.layer();
            for item in map.items.values() {
                if let MapItem::Marker { at, label } = item {
                    ctx.draw(&Points {
                        coords: &[(at.lng, at.lat)],
                        color: Color::Red,
                    });
                    ctx.print(
                        at.lng,
                        at.lat,
                        Span::styled(format!(" {label}"), Style::default().fg(Color::White)),
                    );
                }
            }
            if let Some((at, title, _)) = map.overlay() {
                ctx.print(
                    at.lng,
                    at.lat,
                    Span::styled(
                        format!("▶ {title}"),
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    ),
                );
            }
        });
    f.render_widget(canvas, area);

    if let Some((_, title, body)) = map.overlay() {
        let width = POPUP_WIDTH.min(area.width.saturating_sub(2));
        let popup = Rect::new(
            area.x + area.width.saturating_sub(width + 1),
            area.y + 1,
            width,
            POPUP_HEIGHT.min(area.height.saturating_sub(2)),
        );
        let widget = Paragraph::new(body.to_string())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(format!(" {title} ")),
            );
        f.render_widget(Clear, popup);
        f.render_widget(widget, popup);
    }
}

fn render_timeline(f: &mut ratatui::Frame, area: Rect, panels: &TerminalPanels) {
    let block = Block::default().borders(Borders::ALL).title(" Timeline ");
    let visible = usize::from(block.inner(area).height);
    let offset = timeline_offset(panels.timeline.len(), panels.highlighted_row, visible);

    let lines: Vec<Line> = panels
        .timeline
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible)
        .map(|(idx, row)| {
            let line = match row {
                TimelineRow::Stop {
                    name,
                    time,
                    duration,
                } => {
                    let mut spans = vec![
                        Span::styled(
                            format!("{:<6}", time.as_deref().unwrap_or("")),
                            Style::default().fg(Color::Cyan),
                        ),
                        Span::raw(name.to_string()),
                    ];
                    if let Some(duration) = duration.as_deref() {
                        spans.push(Span::styled(
                            format!(" ({duration})"),
                            Style::default().fg(Color::DarkGray),
                        ));
                    }
                    Line::from(spans)
                }
                TimelineRow::Transport { label } => Line::from(Span::styled(
                    format!("  ↓ {label}"),
                    Style::default().fg(Color::DarkGray),
                )),
            };
            if panels.highlighted_row == Some(idx) {
                line.patch_style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                line
            }
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_cards(f: &mut ratatui::Frame, area: Rect, panels: &TerminalPanels) {
    let window = card_window(panels.cards.len(), panels.active_card, card_capacity(area));
    if window.is_empty() {
        let empty = Block::default().borders(Borders::ALL).title(" Stops ");
        f.render_widget(empty, area);
        return;
    }

    let count = panels.cards.len();
    for (slot, index) in window.enumerate() {
        let x = area.x + CARD_WIDTH * slot as u16;
        let width = CARD_WIDTH.min(area.x + area.width - x);
        let card_area = Rect::new(x, area.y, width, area.height);
        let card = &panels.cards[index];
        let active = panels.active_card == Some(index);

        let border = if active {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let mut lines = Vec::new();
        let schedule: Vec<&str> = [card.time.as_deref(), card.duration.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !schedule.is_empty() {
            lines.push(Line::from(Span::styled(
                schedule.join(" · "),
                Style::default().fg(Color::Cyan),
            )));
        }
        lines.push(Line::from(card.description.to_string()));

        let widget = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(format!(" {}/{} {} ", index + 1, count, card.title)),
            );
        f.render_widget(widget, card_area);
    }
}

fn render_status(f: &mut ratatui::Frame, area: Rect, state: &SessionState) {
    let message = match state.error.as_ref() {
        Some(error) => Span::styled(
            format!("{}: {} (Esc to dismiss)", error.kind.label(), error.message),
            Style::default().fg(Color::Red),
        ),
        None => Span::styled(
            state
                .logs
                .last()
                .map(|entry| entry.message.clone())
                .unwrap_or_default(),
            Style::default().fg(Color::DarkGray),
        ),
    };
    let hints = Span::styled(
        "  ←/→ stops · ^T timeline · ^E export · ^Y copy · ^R restart · Esc quit",
        Style::default().fg(Color::DarkGray),
    );
    f.render_widget(Paragraph::new(Line::from(vec![message, hints])), area);
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyEvent;
    use itinera_core::config::Config;
    use itinera_core::ingest::StreamEvent;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn populated_state() -> SessionState {
        let mut state = SessionState::new(Config::default());
        user(&mut state, UserAction::SubmitPrompt("Paris".to_string()));
        let generation = state.generation;
        let events = [
            json!({"name": "Cafe A", "description": "Coffee", "lat": 48.85, "lng": 2.35, "time": "09:00", "sequence": 1}),
            json!({"name": "Museum B", "description": "Art", "lat": 48.86, "lng": 2.33, "time": "11:00", "sequence": 2}),
        ];
        for args in events {
            reduce(
                &mut state,
                SessionAction::Stream(StreamAction::Event {
                    generation,
                    event: StreamEvent::call("location", args),
                }),
            );
        }
        reduce(
            &mut state,
            SessionAction::Stream(StreamAction::Finished { generation }),
        );
        state
    }

    #[test]
    fn card_window_keeps_active_card_visible() {
        assert_eq!(card_window(0, None, 3), 0..0);
        assert_eq!(card_window(2, Some(1), 3), 0..2);
        assert_eq!(card_window(10, Some(0), 3), 0..3);
        assert_eq!(card_window(10, Some(5), 3), 4..7);
        assert_eq!(card_window(10, Some(9), 3), 7..10);
    }

    #[test]
    fn card_clicks_map_to_store_indices() {
        let area = Rect::new(0, 10, 90, CARD_HEIGHT);
        assert_eq!(card_at(area, 4..7, 0, 11), Some(4));
        assert_eq!(card_at(area, 4..7, 65, 11), Some(6));
        assert_eq!(card_at(area, 4..6, 65, 11), None);
        assert_eq!(card_at(area, 4..7, 5, 2), None);
    }

    #[test]
    fn timeline_clicks_skip_the_border() {
        let panels = TerminalPanels {
            timeline: vec![
                TimelineRow::Transport {
                    label: "walking".into(),
                };
                3
            ],
            ..TerminalPanels::default()
        };
        let area = Rect::new(50, 1, TIMELINE_WIDTH, 10);
        assert_eq!(timeline_row_at(area, &panels, 55, 1), None);
        assert_eq!(timeline_row_at(area, &panels, 55, 2), Some(0));
        assert_eq!(timeline_row_at(area, &panels, 55, 4), Some(2));
        assert_eq!(timeline_row_at(area, &panels, 55, 5), None);
    }

    #[test]
    fn fit_then_pan_keeps_the_span() {
        let mut map = TerminalMap::default();
        map.fit_bounds(Extent {
            south: 48.85,
            west: 2.33,
            north: 48.86,
            east: 2.35,
        });
        let fitted = map.viewport.expect("viewport");
        assert!(fitted.contains(LatLng::new(48.85, 2.33)));
        assert!(fitted.contains(LatLng::new(48.86, 2.35)));

        map.pan_to(LatLng::new(48.90, 2.40));
        let panned = map.viewport.expect("viewport");
        let center = panned.center();
        assert!((center.lat - 48.90).abs() < 1e-9);
        assert!((center.lng - 2.40).abs() < 1e-9);
        assert!(((panned.north - panned.south) - (fitted.north - fitted.south)).abs() < 1e-9);
    }

    #[test]
    fn synchronizer_drives_the_terminal_surfaces() {
        let mut state = populated_state();
        let mut surfaces = Surfaces::default();
        surfaces.render(&state);

        let markers = surfaces
            .map
            .items
            .values()
            .filter(|item| matches!(item, MapItem::Marker { .. }))
            .count();
        assert_eq!(markers, 2);
        assert_eq!(surfaces.panels.cards.len(), 2);
        assert_eq!(surfaces.panels.active_card, Some(0));
        assert_eq!(surfaces.map.overlay().map(|(_, title, _)| title), Some("Cafe A"));

        user(&mut state, UserAction::Next);
        surfaces.render(&state);
        assert_eq!(surfaces.panels.active_card, Some(1));
        assert_eq!(surfaces.panels.highlighted_row, Some(1));
        assert_eq!(surfaces.map.overlay().map(|(_, title, _)| title), Some("Museum B"));

        user(&mut state, UserAction::Restart);
        surfaces.render(&state);
        assert!(surfaces.map.items.is_empty());
        assert!(surfaces.panels.cards.is_empty());
    }

    #[test]
    fn enter_submits_and_clears_the_input() {
        let mut state = SessionState::new(Config::default());
        let mut input = "Lyon".to_string();
        let KeyHandlerResult::Continue(effects) =
            handle_key_event(key(KeyCode::Enter), &mut state, &mut input)
        else {
            panic!("enter should not exit");
        };
        assert!(input.is_empty());
        assert!(matches!(
            effects.first(),
            Some(SessionEffect::StartStream { prompt, .. }) if prompt == "Lyon"
        ));
    }

    #[test]
    fn shift_enter_adds_a_newline() {
        let mut state = SessionState::new(Config::default());
        let mut input = "Lyon".to_string();
        handle_key_event(
            KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT),
            &mut state,
            &mut input,
        );
        assert_eq!(input, "Lyon\n");
        assert_eq!(state.generation, 0);
    }

    #[test]
    fn escape_dismisses_an_error_before_quitting() {
        let mut state = SessionState::new(Config::default());
        let mut input = String::new();
        user(&mut state, UserAction::Export);
        assert!(state.error.is_some());

        assert!(matches!(
            handle_key_event(key(KeyCode::Esc), &mut state, &mut input),
            KeyHandlerResult::Continue(_)
        ));
        assert!(state.error.is_none());
        assert!(matches!(
            handle_key_event(key(KeyCode::Esc), &mut state, &mut input),
            KeyHandlerResult::Exit
        ));
    }
}
