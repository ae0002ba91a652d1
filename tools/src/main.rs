//! survey-runner: headless driver for one survey page visit.
//!
//! Usage:
//!   survey-runner --query "?condition=3" --session session.json --db local.db
//!   survey-runner --config survey.json --db local.db --list-failed
//!
//! Reads newline-delimited JSON commands from stdin and answers each with
//! the session's current state:
//!   {"type": "get_state"}
//!   {"type": "input", "change": {"input": "choose", "question": "q06_attraktiv", "value": "5"}}
//!   {"type": "submit"}
//!   {"type": "unload"}
//!   {"type": "quit"}

use anyhow::Result;
use std::env;
use std::io::{self, BufRead, Write};
use survey_core::{
    clock::SystemClock,
    config::SurveyConfig,
    delivery::{DeliverySink, UreqTransport},
    event::FormInput,
    session::{SubmitOutcome, SurveySession},
    storage::{KeyValueStorage, MemoryStorage},
    store::LocalStore,
};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Input { change: FormInput },
    Submit,
    Unload,
    Quit,
}

type Sink = DeliverySink<UreqTransport, LocalStore>;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = match arg_value(&args, "--config") {
        Some(path) => SurveyConfig::load(path)?,
        None => SurveyConfig::default(),
    };
    if let Some(db) = arg_value(&args, "--db") {
        config.local_store_path = db.to_string();
    }
    let query = arg_value(&args, "--query").unwrap_or_default();

    let store = LocalStore::open(&config.local_store_path)?;
    store.migrate()?;

    if args.iter().any(|a| a == "--list-failed") {
        return list_failed(&store);
    }

    let session_storage = match arg_value(&args, "--session") {
        Some(path) => load_session_storage(path)?,
        None => MemoryStorage::new(),
    };

    let questionnaire = config.questionnaire()?;
    let mut sink: Sink = DeliverySink::new(
        UreqTransport::new(config.connect_timeout_ms, config.request_timeout_ms),
        config.endpoint_url.clone(),
        store,
    );
    let mut session = SurveySession::start(
        config,
        questionnaire,
        Box::new(session_storage),
        query,
        SystemClock,
    );

    run_ipc_loop(&mut session, &mut sink)
}

fn run_ipc_loop(session: &mut SurveySession<SystemClock>, sink: &mut Sink) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    writeln!(stdout, "{}", serde_json::to_string(&session.view())?)?;
    stdout.flush()?;

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            session.unload();
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => {
                session.unload();
                break;
            }
            IpcCommand::GetState => {
                writeln!(stdout, "{}", serde_json::to_string(&session.view())?)?;
            }
            IpcCommand::Unload => {
                session.unload();
                writeln!(stdout, "{}", serde_json::to_string(&session.view())?)?;
            }
            IpcCommand::Input { change } => match session.dispatch(change) {
                Ok(_) => writeln!(stdout, "{}", serde_json::to_string(&session.view())?)?,
                Err(e) => writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?,
            },
            IpcCommand::Submit => {
                let outcome = match session.submit(sink) {
                    Ok(o) => o,
                    Err(e) => {
                        writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                        stdout.flush()?;
                        continue;
                    }
                };
                let redirected = matches!(outcome, SubmitOutcome::Redirected { .. });
                let reply = serde_json::json!({ "submit": outcome, "state": session.view() });
                writeln!(stdout, "{reply}")?;
                if redirected {
                    stdout.flush()?;
                    break;
                }
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn list_failed(store: &LocalStore) -> Result<()> {
    let failed = store.failed_submissions()?;
    if failed.is_empty() {
        println!("No failed submissions stored.");
        return Ok(());
    }
    println!("=== FAILED SUBMISSIONS ({}) ===", failed.len());
    for f in &failed {
        println!("{}\t{}\t{}", f.key, f.session_id, f.payload);
    }
    Ok(())
}

/// A JSON object of session keys. Non-string values (e.g. an inline
/// `experimentData` object) are stored as their JSON text.
fn load_session_storage(path: &str) -> Result<MemoryStorage> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)?;
    let mut storage = MemoryStorage::new();
    for (key, value) in entries {
        let text = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        storage.set(&key, &text)?;
    }
    Ok(storage)
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
