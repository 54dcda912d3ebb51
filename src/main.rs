mod browser;
mod config;
mod context;
mod dispatcher;
mod error;
mod gemini;
mod generator;
mod observer;
mod orchestrator;
mod poll;
mod surface;
#[cfg(test)]
mod testing;
mod transcript;
mod types;

use anyhow::{Context, Result};
use browser::ChatBrowser;
use config::{Config, TranscriptConfig};
use dispatcher::MessageDispatcher;
use gemini::GeminiGenerator;
use observer::MessageObserver;
use orchestrator::{Orchestrator, RunParams, RunSummary};
use poll::PollPolicy;
use std::env;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use transcript::TranscriptStore;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "chatpilot.toml";

#[derive(Debug, Default)]
struct RunArgs {
    config: Option<PathBuf>,
    character_id: Option<String>,
    chat_id: Option<String>,
    turns: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatpilot=info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut args: Vec<String> = env::args().collect();
    let _bin = args.remove(0);
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    match args[0].as_str() {
        "run" => run_conversation(&args[1..]).await,
        "render" => run_render(&args[1..]),
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            Err(anyhow::anyhow!("unknown command: {other}"))
        }
    }
}

fn parse_run_args(args: &[String]) -> Result<Option<RunArgs>> {
    let mut parsed = RunArgs::default();
    let mut i = 0;
    while i < args.len() {
        let value = || {
            args.get(i + 1)
                .cloned()
                .with_context(|| format!("{} requires a value", args[i]))
        };
        match args[i].as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value()?)),
            "--character" => parsed.character_id = Some(value()?),
            "--chat" => parsed.chat_id = Some(value()?),
            "--turns" => parsed.turns = Some(value()?),
            "--help" | "-h" => {
                print_run_usage();
                return Ok(None);
            }
            other => return Err(anyhow::anyhow!("unknown run argument: {other}")),
        }
        i += 2;
    }
    Ok(Some(parsed))
}

fn parse_turns(raw: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid number of messages: {raw:?}"))
}

/// Reads one answer after printing `label`. Runs on the blocking pool so the
/// CDP handler keeps going while the operator types.
async fn prompt_from<R>(reader: R, label: &'static str) -> Result<String>
where
    R: BufRead + Send + 'static,
{
    tokio::task::spawn_blocking(move || read_answer(reader, label))
        .await
        .context("prompt task failed")?
}

fn read_answer(mut reader: impl BufRead, label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .with_context(|| format!("failed to read {label}"))?;
    Ok(line.trim().to_string())
}

async fn prompt(label: &'static str) -> Result<String> {
    prompt_from(io::BufReader::new(io::stdin()), label).await
}

async fn run_conversation(args: &[String]) -> Result<()> {
    let Some(args) = parse_run_args(args)? else {
        return Ok(());
    };
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = Config::load(&config_path)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping run");
            ctrl_c.cancel();
        }
    });

    let summary = with_transcript(&config.transcript, |store| {
        converse(&config, args, store, cancel)
    })
    .await?;
    tracing::info!(
        turns = summary.turns_completed,
        last = summary.last_partner_message.text_or_empty(),
        "conversation finished"
    );
    Ok(())
}

/// Starts a fresh transcript, runs `run` against it and renders the readable
/// log afterwards, whether or not `run` succeeded.
async fn with_transcript<T, F, Fut>(paths: &TranscriptConfig, run: F) -> Result<T>
where
    F: FnOnce(TranscriptStore) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let store = TranscriptStore::create(&paths.json_path)?;
    remove_stale(&paths.text_path)?;

    let outcome = run(store.clone()).await;

    let rendered = transcript::render_to_file(&store, &paths.text_path);
    match &rendered {
        Ok(count) => tracing::info!(
            entries = count,
            path = %paths.text_path.display(),
            "transcript rendered"
        ),
        Err(err) => tracing::error!(error = %err, "failed to render transcript"),
    }

    let value = outcome?;
    rendered?;
    Ok(value)
}

async fn converse(
    config: &Config,
    args: RunArgs,
    store: TranscriptStore,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let browser = Arc::new(ChatBrowser::launch(config, cancel.clone()).await?);
    browser
        .goto(&config.chat.login_link)
        .await
        .context("failed to open login page")?;

    let character_id = match args.character_id {
        Some(id) => id,
        None => prompt("Character id").await?,
    };
    let chat_id = match args.chat_id {
        Some(id) => id,
        None => prompt("Chat id").await?,
    };
    let turns = match args.turns {
        Some(raw) => parse_turns(&raw)?,
        None => parse_turns(&prompt("Number of messages").await?)?,
    };

    let partner_profile = browser
        .partner_profile(&character_id)
        .await
        .with_context(|| format!("failed to read profile for character {character_id}"))?;
    tracing::info!(profile = %partner_profile, "partner profile loaded");

    browser
        .open_chat(&chat_id)
        .await
        .with_context(|| format!("failed to open chat {chat_id}"))?;

    let observer = MessageObserver::new(
        browser.clone(),
        store.clone(),
        PollPolicy::every(config.timing.poll_interval())
            .with_deadline(config.timing.observe_deadline()),
        cancel.clone(),
    );
    let dispatcher = MessageDispatcher::new(browser.clone(), store.clone(), config.timing.settle());
    let generator = Box::new(GeminiGenerator::new(config.gemini.clone()));
    let params = RunParams {
        opener: config.chat.start_message.clone(),
        turns,
        user_profile: config.user_profile.clone(),
        partner_profile,
    };

    let mut orchestrator = Orchestrator::new(observer, dispatcher, generator, params);
    let outcome = orchestrator.run().await;
    tracing::info!(
        state = %orchestrator.state(),
        turns = orchestrator.turns_completed(),
        history = orchestrator.context().len(),
        transcript = %store.path().display(),
        "run ended"
    );
    outcome.context("conversation run failed")
}

fn run_render(args: &[String]) -> Result<()> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG);
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let value = args.get(i + 1).context("--config requires a value")?;
                config_path = PathBuf::from(value);
                i += 2;
            }
            other => return Err(anyhow::anyhow!("unknown render argument: {other}")),
        }
    }

    let config = Config::load(&config_path)?;
    let store = TranscriptStore::open(&config.transcript.json_path);
    let count = transcript::render_to_file(&store, &config.transcript.text_path)?;
    println!(
        "rendered {count} entries to {}",
        config.transcript.text_path.display()
    );
    Ok(())
}

fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

fn print_usage() {
    eprintln!("chatpilot usage:\n  chatpilot run [options]\n  chatpilot render [--config <path>]");
}

fn print_run_usage() {
    eprintln!(
        "chatpilot run options:\n  --config <path>\n  --character <id>\n  --chat <id>\n  --turns <n>"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn run_args_are_parsed() {
        let args = parse_run_args(&strings(&[
            "--character",
            "abc",
            "--chat",
            "def",
            "--turns",
            "4",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(args.character_id.as_deref(), Some("abc"));
        assert_eq!(args.chat_id.as_deref(), Some("def"));
        assert_eq!(args.turns.as_deref(), Some("4"));
        assert!(args.config.is_none());
    }

    #[test]
    fn run_args_reject_unknown_and_dangling() {
        assert!(parse_run_args(&strings(&["--bogus"])).is_err());
        assert!(parse_run_args(&strings(&["--chat"])).is_err());
        assert!(parse_run_args(&strings(&["--help"])).unwrap().is_none());
    }

    #[test]
    fn turns_must_be_a_non_negative_integer() {
        assert_eq!(parse_turns(" 3\n").unwrap(), 3);
        assert_eq!(parse_turns("0").unwrap(), 0);
        assert!(parse_turns("three").is_err());
        assert!(parse_turns("-1").is_err());
    }

    fn transcript_paths(dir: &Path) -> TranscriptConfig {
        TranscriptConfig {
            json_path: dir.join("logs.json"),
            text_path: dir.join("logs.logs"),
        }
    }

    #[tokio::test]
    async fn failed_run_still_clears_old_logs_and_renders() {
        let dir = tempfile::tempdir().unwrap();
        let paths = transcript_paths(dir.path());
        std::fs::write(&paths.json_path, r#"[{"origin":"user","text":"old run","occurred_at":"2025-01-01T10:00:00+00:00"}]"#).unwrap();
        std::fs::write(&paths.text_path, "old rendering").unwrap();

        let result: Result<()> = with_transcript(&paths, |store| async move {
            store
                .append(transcript::TranscriptEntry::user(Some("Hi".into()), false))
                .unwrap();
            Err(anyhow::anyhow!("profile heading never appeared"))
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("profile heading"));
        let entries = TranscriptStore::open(&paths.json_path).entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text.as_deref(), Some("Hi"));

        let rendered = std::fs::read_to_string(&paths.text_path).unwrap();
        assert!(rendered.starts_with("🤖 User: Hi "));
        assert!(!rendered.contains("old"));
    }

    #[tokio::test]
    async fn failure_before_any_entry_leaves_empty_logs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = transcript_paths(dir.path());
        std::fs::write(&paths.text_path, "old rendering").unwrap();

        let result: Result<()> = with_transcript(&paths, |_store| async {
            Err(anyhow::anyhow!("browser failed to launch"))
        })
        .await;

        assert!(result.is_err());
        assert!(TranscriptStore::open(&paths.json_path).entries().is_empty());
        assert_eq!(std::fs::read_to_string(&paths.text_path).unwrap(), "");
    }

    #[tokio::test]
    async fn successful_run_returns_value_and_renders() {
        let dir = tempfile::tempdir().unwrap();
        let paths = transcript_paths(dir.path());

        let turns = with_transcript(&paths, |store| async move {
            store
                .append(transcript::TranscriptEntry::user(None, true))
                .unwrap();
            Ok(3u32)
        })
        .await
        .unwrap();

        assert_eq!(turns, 3);
        let rendered = std::fs::read_to_string(&paths.text_path).unwrap();
        assert!(rendered.contains("*No text* ⭐"));
    }

    #[tokio::test]
    async fn prompt_reads_off_the_runtime_thread() {
        let answer = prompt_from(io::Cursor::new(b"  b951fec7 \nrest\n".to_vec()), "Character id")
            .await
            .unwrap();
        assert_eq!(answer, "b951fec7");

        let empty = prompt_from(io::Cursor::new(Vec::new()), "Chat id").await.unwrap();
        assert_eq!(empty, "");
    }

    #[test]
    fn remove_stale_ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.logs");
        remove_stale(&path).unwrap();
        std::fs::write(&path, "old").unwrap();
        remove_stale(&path).unwrap();
        assert!(!path.exists());
    }
}
