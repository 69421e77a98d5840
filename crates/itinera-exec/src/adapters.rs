use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use crate::contracts::parse_line;
use crate::contracts::ModelEvent;
use crate::contracts::ModelRequest;

/// Receives model events on the adapter's background thread.
pub type EventSink = Box<dyn Fn(ModelEvent) + Send + 'static>;

/// A source of streamed itinerary events. Implementations return at once and
/// deliver events from a background thread, ending with `Done` or `Failed`.
pub trait ItineraryModel {
    fn name(&self) -> &'static str;

    fn stream(&self, request: ModelRequest, sink: EventSink) -> thread::JoinHandle<()>;
}

/// Runs an external program that reads a `ModelRequest` as JSON on stdin and
/// answers with JSON lines on stdout.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ItineraryModel for CommandModel {
    fn name(&self) -> &'static str {
        "command"
    }

    fn stream(&self, request: ModelRequest, sink: EventSink) -> thread::JoinHandle<()> {
        let program = self.program.clone();
        let args = self.args.clone();
        thread::spawn(move || {
            let payload = match serde_json::to_string(&request) {
                Ok(payload) => payload,
                Err(err) => {
                    sink(ModelEvent::Failed(format!("could not encode request: {err}")));
                    return;
                }
            };
            let mut cmd = Command::new(&program);
            cmd.args(&args);
            stream_json_lines(cmd, &program, &payload, &sink);
        })
    }
}

fn stream_json_lines<F>(mut cmd: Command, program: &str, payload: &str, callback: &F)
where
    F: Fn(ModelEvent),
{
    let spawn = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawn {
        Ok(child) => child,
        Err(err) => {
            tracing::warn!(program, error = %err, "model program failed to start");
            callback(ModelEvent::Failed(format!("failed to start {program}: {err}")));
            return;
        }
    };
    tracing::debug!(program, pid = child.id(), "model program started");

    let stdin_handle = child.stdin.take().map(|mut stdin| {
        let payload = format!("{payload}\n");
        thread::spawn(move || {
            // The program may exit without reading its input.
            if let Err(err) = stdin.write_all(payload.as_bytes()) {
                tracing::debug!(error = %err, "model program closed stdin early");
            }
        })
    });

    let stderr_handle = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut stderr_text = String::new();
            let _ = stderr.read_to_string(&mut stderr_text);
            stderr_text
        })
    });

    let mut reported = None;
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(program, error = %err, "failed to read model output");
                    break;
                }
            }
            // Undecodable bytes still yield a line, which parses as `Meta`.
            let line = String::from_utf8_lossy(&raw);
            let Some(event) = parse_line(&strip_ansi_sequences(line.trim_end_matches('\n')))
            else {
                continue;
            };
            if let ModelEvent::Failed(message) = event {
                reported = Some(message);
                break;
            }
            callback(event);
        }
    }

    if reported.is_some() {
        let _ = child.kill();
    }
    let status = child.wait().ok();
    if let Some(handle) = stdin_handle {
        let _ = handle.join();
    }
    let stderr_text = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
        .trim()
        .to_string();

    if let Some(message) = reported {
        callback(ModelEvent::Failed(message));
        return;
    }
    if !status.is_some_and(|s| s.success()) {
        let msg = if stderr_text.is_empty() {
            format!("{program} exited with a non-zero status")
        } else {
            format!("{program}: {stderr_text}")
        };
        tracing::warn!(program, "{msg}");
        callback(ModelEvent::Failed(msg));
        return;
    }
    if !stderr_text.is_empty() {
        callback(ModelEvent::Meta(stderr_text));
    }
    callback(ModelEvent::Done);
}

fn strip_ansi_sequences(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                let _ = chars.next();
                for n in chars.by_ref() {
                    if ('@'..='~').contains(&n) {
                        break;
                    }
                }
            }
            continue;
        }
        if c == '\r' {
            continue;
        }
        out.push(c);
    }
    out
}
