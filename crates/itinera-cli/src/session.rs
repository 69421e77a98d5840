use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use itinera_core::actions::SessionAction;
use itinera_core::actions::StreamAction;
use itinera_core::actions::UserAction;
use itinera_core::config::Config;
use itinera_core::config::ModelProvider;
use itinera_core::ingest::StreamEvent;
use itinera_core::reducer::reduce;
use itinera_core::reducer::SessionEffect;
use itinera_core::state::SessionState;
use itinera_exec::build_request;
use itinera_exec::CommandModel;
use itinera_exec::ItineraryModel;
use itinera_exec::ModelEvent;
use itinera_exec::ScriptedModel;

/// `--replay` wins over the configured provider.
pub fn model_from_config(
    config: &Config,
    replay: Option<&Path>,
) -> Result<Box<dyn ItineraryModel>, Box<dyn std::error::Error>> {
    if let Some(path) = replay {
        return Ok(Box::new(ScriptedModel::load(path)?));
    }
    match config.model.provider {
        ModelProvider::Scripted => {
            let Some(path) = config.model.script.as_deref() else {
                return Err("model.provider = \"scripted\" requires model.script".into());
            };
            Ok(Box::new(ScriptedModel::load(path)?))
        }
        ModelProvider::Command => {
            let Some(program) = config.model.program.as_deref() else {
                return Err(
                    "no model program configured; set model.program or pass --replay FILE".into(),
                );
            };
            Ok(Box::new(CommandModel::new(program, config.model.args.clone())))
        }
    }
}

pub fn stream_action(generation: u64, event: ModelEvent) -> StreamAction {
    match event {
        ModelEvent::FunctionCall { name, args } => StreamAction::Event {
            generation,
            event: StreamEvent::FunctionCall { name, args },
        },
        ModelEvent::Text(text) => StreamAction::Event {
            generation,
            event: StreamEvent::Text(text),
        },
        ModelEvent::Meta(message) => StreamAction::Meta {
            generation,
            message,
        },
        ModelEvent::Done => StreamAction::Finished { generation },
        ModelEvent::Failed(message) => StreamAction::Failed {
            generation,
            message,
        },
    }
}

/// Starts the model on its own thread; every event reaches `tx` tagged with
/// `generation`.
pub fn start_stream<T>(
    model: &dyn ItineraryModel,
    generation: u64,
    prompt: &str,
    model_name: Option<&str>,
    tx: mpsc::Sender<T>,
) -> thread::JoinHandle<()>
where
    T: From<StreamAction> + Send + 'static,
{
    tracing::info!(generation, model = model.name(), "starting model stream");
    let request = build_request(prompt, model_name);
    model.stream(
        request,
        Box::new(move |event| {
            let _ = tx.send(T::from(stream_action(generation, event)));
        }),
    )
}

pub fn export_path(config: &Config, file_name: &str) -> PathBuf {
    config
        .export
        .directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(file_name)
}

pub fn write_export(config: &Config, file_name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = export_path(config, file_name);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "itinerary exported");
    Ok(path)
}

/// Runs one submission to completion without a terminal UI.
pub fn plan_once(
    state: &mut SessionState,
    model: &dyn ItineraryModel,
    prompt: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let effects = reduce(
        state,
        SessionAction::User(UserAction::SubmitPrompt(prompt.to_string())),
    );
    let Some((generation, prompt)) = effects.into_iter().find_map(|effect| match effect {
        SessionEffect::StartStream { generation, prompt } => Some((generation, prompt)),
        _ => None,
    }) else {
        return Err("prompt is empty".into());
    };

    let (tx, rx) = mpsc::channel::<StreamAction>();
    let handle = start_stream(
        model,
        generation,
        &prompt,
        state.config.model.model.as_deref(),
        tx,
    );
    for action in rx {
        let terminal = matches!(
            action,
            StreamAction::Finished { .. } | StreamAction::Failed { .. }
        );
        reduce(state, SessionAction::Stream(action));
        if terminal {
            break;
        }
    }
    let _ = handle.join();

    if state.loading {
        return Err("model stream ended without finishing".into());
    }
    match state.error.as_ref() {
        Some(error) => Err(error.message.to_string().into()),
        None => Ok(()),
    }
}
