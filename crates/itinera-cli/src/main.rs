mod config;
mod session;
mod ui;

use std::env;
use std::path::Path;
use std::path::PathBuf;

use itinera_core::export::render_itinerary_text;
use itinera_core::export::EXPORT_FILE_NAME;
use itinera_core::state::SessionState;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("itinera {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "plan" => {
            let opts = parse_options(args.collect::<Vec<_>>(), true)?;
            run_plan(opts)
        }
        "tui" => {
            let opts = parse_options(args.collect::<Vec<_>>(), false)?;
            run_tui(opts)
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct Options {
    prompt: Option<String>,
    replay: Option<PathBuf>,
    config: Option<PathBuf>,
    export: bool,
}

fn parse_options(
    args: Vec<String>,
    wants_prompt: bool,
) -> Result<Options, Box<dyn std::error::Error>> {
    let mut opts = Options::default();
    let mut words = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--replay" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--replay requires a file".into());
                };
                opts.replay = Some(PathBuf::from(value));
                i += 2;
            }
            "--config" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--config requires a path".into());
                };
                opts.config = Some(PathBuf::from(value));
                i += 2;
            }
            "--export" if wants_prompt => {
                opts.export = true;
                i += 1;
            }
            other if other.starts_with("--") => {
                return Err(format!("unsupported argument: {other}").into());
            }
            word if wants_prompt => {
                words.push(word.to_string());
                i += 1;
            }
            other => {
                return Err(format!("unsupported argument: {other}").into());
            }
        }
    }
    if wants_prompt {
        let prompt = words.join(" ");
        if prompt.trim().is_empty() {
            return Err("plan requires a prompt".into());
        }
        opts.prompt = Some(prompt);
    }
    Ok(opts)
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("itinera");
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("itinera.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|err| format!("failed to open log file '{}': {err}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();
    Ok(())
}

fn run_plan(opts: Options) -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let config = config::load_config(opts.config.as_deref())?;
    let model = session::model_from_config(&config, opts.replay.as_deref())?;
    let prompt = opts.prompt.unwrap_or_default();
    let mut state = SessionState::new(config);

    let planned = session::plan_once(&mut state, model.as_ref(), &prompt);

    let transcript = state.ingest.transcript().trim();
    if !transcript.is_empty() {
        eprintln!("{transcript}");
    }
    if let Some(text) = plan_output(&state, planned.is_ok()) {
        print!("{text}");
        if opts.export {
            let path = session::write_export(&state.config, EXPORT_FILE_NAME, &text)?;
            eprintln!("> exported to {}", display_path(&path));
        }
    }
    planned
}

/// A failed submission still prints the stops it accepted.
fn plan_output(state: &SessionState, succeeded: bool) -> Option<String> {
    if !succeeded && state.store.itinerary().next().is_none() {
        return None;
    }
    Some(render_itinerary_text(&state.store, state.prompt.as_deref()))
}

fn run_tui(opts: Options) -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let config = config::load_config(opts.config.as_deref())?;
    let model = session::model_from_config(&config, opts.replay.as_deref())?;
    ui::run(SessionState::new(config), model)
}

fn display_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn print_help() {
    println!("itinera {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  itinera plan PROMPT... [--replay FILE] [--export] [--config PATH]");
    println!("  itinera tui [--replay FILE] [--config PATH]");
    println!("  itinera --help");
    println!("  itinera --version");
}
