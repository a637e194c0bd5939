//! desk-runner: headless runner for the scam report desk.
//!
//! Reads one JSON command per line on stdin and writes every outbound chat
//! operation as a JSON line on stdout. Lookups use the demo collaborators.
//!
//! Usage:
//!   desk-runner --config config/desk.example.json
//!   desk-runner --db scamdesk.db --admin 900
//!
//! Input lines:
//!   {"type":"event","envelope":{"chat_id":1,"sender":{"user_id":1},"event":{"type":"start"}}}
//!   {"type":"sweep"}
//!   {"type":"rebuild_stats"}
//!   {"type":"stats"}
//!   {"type":"quit"}

use anyhow::Result;
use async_trait::async_trait;
use scamdesk_core::{
    clock::SystemClock,
    config::DeskConfig,
    engine::{Collaborators, DeskEngine},
    error::{DeskError, DeskResult},
    store::DeskStore,
    transport::{OutboundMessage, Transport},
    types::{ChatId, FileRef, MessageId},
    workflow::Envelope,
};
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Event { envelope: Envelope },
    Sweep,
    RebuildStats,
    Stats,
    Quit,
}

/// Prints every chat operation as a JSON line.
#[derive(Default)]
struct ConsoleTransport {
    next_id: AtomicI64,
}

impl ConsoleTransport {
    fn emit(&self, build: impl FnOnce(MessageId) -> serde_json::Value) -> DeskResult<MessageId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", build(id))
            .and_then(|_| stdout.flush())
            .map_err(|e| DeskError::Transport(e.to_string()))?;
        Ok(id)
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_text(&self, chat_id: ChatId, message: &OutboundMessage) -> DeskResult<MessageId> {
        self.emit(|message_id| {
            serde_json::json!({
                "op": "send", "chat_id": chat_id, "message_id": message_id, "message": message,
            })
        })
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutboundMessage,
    ) -> DeskResult<()> {
        self.emit(|_| {
            serde_json::json!({
                "op": "edit", "chat_id": chat_id, "message_id": message_id, "message": message,
            })
        })?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> DeskResult<()> {
        self.emit(|_| {
            serde_json::json!({ "op": "delete", "chat_id": chat_id, "message_id": message_id })
        })?;
        Ok(())
    }

    async fn send_album(
        &self,
        chat_id: ChatId,
        files: &[FileRef],
        caption: Option<&str>,
    ) -> DeskResult<Vec<MessageId>> {
        let id = self.emit(|message_id| {
            serde_json::json!({
                "op": "album", "chat_id": chat_id, "message_id": message_id,
                "files": files, "caption": caption,
            })
        })?;
        Ok(vec![id])
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = match arg_value(&args, "--config") {
        Some(path) => DeskConfig::load(path)?,
        None => {
            let mut config = DeskConfig::default();
            config.apply_env_overrides()?;
            config
        }
    };
    if let Some(db) = arg_value(&args, "--db") {
        config.db_path = db.to_string();
    }
    if let Some(admin) = arg_value(&args, "--admin") {
        config.admin_user_ids.push(admin.parse()?);
    }
    config.validate()?;

    log::info!(
        "desk-runner: db={} admins={:?} grace_days={}",
        config.db_path,
        config.admin_user_ids,
        config.archive.grace_days
    );

    let store = if config.db_path == ":memory:" {
        DeskStore::in_memory()?
    } else {
        DeskStore::open(&config.db_path)?
    };
    store.migrate()?;

    let transport: Arc<dyn Transport> = Arc::new(ConsoleTransport::default());
    let collaborators = Collaborators::demo(&config.demo, transport);
    let archive_config = config.archive.clone();
    let engine = DeskEngine::build(config, store, Arc::new(SystemClock), collaborators);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let archiver = Arc::new(engine.archiver());
    let archiver_task = archiver.clone().spawn(&archive_config, shutdown_rx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let cmd: IpcCommand = match serde_json::from_str(&line) {
            Ok(c) => c,
            Err(e) => {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
                continue;
            }
        };
        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Event { envelope } => engine.handle(envelope).await?,
            IpcCommand::Sweep => {
                let summary = archiver.sweep().await?;
                println!(
                    "{}",
                    serde_json::json!({
                        "sweep": {
                            "examined": summary.examined,
                            "archived": summary.archived,
                            "notify_failures": summary.notify_failures,
                            "errors": summary.errors,
                        }
                    })
                );
            }
            IpcCommand::RebuildStats => {
                let rebuilt = engine.aggregator().rebuild_all_profile_stats()?;
                println!("{}", serde_json::json!({ "rebuilt_profiles": rebuilt }));
            }
            IpcCommand::Stats => {
                let stats = engine.store().system_stats(chrono::Utc::now())?;
                println!("{}", serde_json::json!({ "stats": stats }));
            }
        }
    }

    let _ = shutdown_tx.send(true);
    archiver_task.await?;
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
