//! Forwards the audit trail and warnings to an operator chat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::bot::engine::{html_escape, Reply};
use crate::bot::telegram::Outbox;

/// Telegram rejects messages longer than 4096 characters.
const MAX_LOG_CHARS: usize = 4000;

/// Flush the batch early once it holds this many lines.
const MAX_BATCH: usize = 50;

tokio::task_local! {
    /// Set while the forwarder task runs. Events raised by the outbox itself
    /// (a failed send logs a warning) stay out of the channel.
    static FORWARDING: bool;
}

/// Log message with priority.
#[derive(Debug, PartialEq)]
enum LogMessage {
    /// WARN/ERROR - send immediately
    Urgent(String),
    /// Audit records - batch and send periodically
    Audit(String),
}

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogMessage>,
}

/// Stops the forwarder after delivering what is already queued.
pub struct LogFlushHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LogFlushHandle {
    pub async fn shutdown(self) {
        // The task may already be gone if the layer was dropped.
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            eprintln!("Log forwarder ended abnormally: {e}");
        }
    }
}

impl TelegramLogLayer {
    /// Must be called inside a tokio runtime.
    pub fn new(outbox: Arc<dyn Outbox>, chat_id: i64) -> (Self, LogFlushHandle) {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogMessage>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(FORWARDING.scope(true, async move {
            let outbox = outbox.as_ref();
            let mut audit_buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(Duration::from_secs(5));

            loop {
                tokio::select! {
                    msg = rx.recv() => {
                        match msg {
                            Some(msg) => forward(outbox, chat_id, msg, &mut audit_buffer).await,
                            None => {
                                flush_buffer(outbox, chat_id, &mut audit_buffer).await;
                                break;
                            }
                        }
                    }
                    Ok(()) = &mut shutdown_rx => {
                        while let Ok(msg) = rx.try_recv() {
                            forward(outbox, chat_id, msg, &mut audit_buffer).await;
                        }
                        flush_buffer(outbox, chat_id, &mut audit_buffer).await;
                        break;
                    }
                    _ = interval.tick() => {
                        flush_buffer(outbox, chat_id, &mut audit_buffer).await;
                    }
                }
            }
        }));

        (Self { tx }, LogFlushHandle { shutdown: shutdown_tx, task })
    }
}

async fn forward(outbox: &dyn Outbox, chat_id: i64, msg: LogMessage, audit_buffer: &mut Vec<String>) {
    match msg {
        LogMessage::Urgent(text) => send_log(outbox, chat_id, &text).await,
        LogMessage::Audit(text) => {
            audit_buffer.push(text);
            if audit_buffer.len() >= MAX_BATCH {
                flush_buffer(outbox, chat_id, audit_buffer).await;
            }
        }
    }
}

async fn send_log(outbox: &dyn Outbox, chat_id: i64, text: &str) {
    let text = if text.chars().count() > MAX_LOG_CHARS {
        let truncated: String = text.chars().take(MAX_LOG_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    };
    if let Err(e) = outbox.send(chat_id, &Reply::text(html_escape(&text))).await {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

async fn flush_buffer(outbox: &dyn Outbox, chat_id: i64, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let combined = buffer.join("\n");
    buffer.clear();
    send_log(outbox, chat_id, &combined).await;
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // Structured audit fields are already inside the message JSON.
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

fn classify(level: Level, target: &str, message: String) -> Option<LogMessage> {
    match level {
        Level::ERROR => Some(LogMessage::Urgent(format!("❌ {message}"))),
        Level::WARN => Some(LogMessage::Urgent(format!("⚠️ {message}"))),
        Level::INFO if target == "audit" => Some(LogMessage::Audit(message)),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if level > Level::INFO || FORWARDING.try_with(|f| *f).unwrap_or(false) {
            return;
        }

        let mut visitor = MessageVisitor { message: String::new() };
        event.record(&mut visitor);

        if let Some(msg) = classify(level, metadata.target(), visitor.message)
            && self.tx.send(msg).is_err()
        {
            eprintln!("Log channel closed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::telegram::RecordingOutbox;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::{info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    /// Fails every send and warns about it, like `TelegramClient` does.
    #[derive(Default)]
    struct WarningOutbox {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Outbox for WarningOutbox {
        async fn send(&self, _chat_id: i64, _reply: &Reply) -> Result<Option<i64>, String> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            warn!("Failed to send message: chat unreachable");
            Err("chat unreachable".into())
        }
    }

    #[tokio::test]
    async fn test_failed_forward_is_not_forwarded_again() {
        let outbox = Arc::new(WarningOutbox::default());
        let (layer, handle) = TelegramLogLayer::new(outbox.clone(), -100);
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));

        warn!("disk almost full");
        handle.shutdown().await;

        assert_eq!(outbox.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_delivers_pending_audit() {
        let outbox = Arc::new(RecordingOutbox::new());
        let (layer, handle) = TelegramLogLayer::new(outbox.clone(), -100);
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));

        info!(target: "audit", "buy_phone success");
        info!(target: "audit", "connect_account success");
        handle.shutdown().await;

        let sent = outbox.sent().await;
        assert!(sent.iter().all(|(chat_id, _)| *chat_id == -100));
        let delivered: Vec<&str> = sent.iter().flat_map(|(_, reply)| reply.text.lines()).collect();
        assert_eq!(delivered, vec!["buy_phone success", "connect_account success"]);
    }

    #[test]
    fn test_classify_routes_by_level_and_target() {
        assert_eq!(classify(Level::ERROR, "x", "boom".into()), Some(LogMessage::Urgent("❌ boom".into())));
        assert_eq!(classify(Level::WARN, "x", "hm".into()), Some(LogMessage::Urgent("⚠️ hm".into())));
        assert_eq!(classify(Level::INFO, "audit", "rec".into()), Some(LogMessage::Audit("rec".into())));
        assert_eq!(classify(Level::INFO, "servicebot", "chatter".into()), None);
    }

    #[tokio::test]
    async fn test_long_logs_are_truncated_and_escaped() {
        let outbox = RecordingOutbox::new();
        let text = format!("<{}", "x".repeat(5000));
        send_log(&outbox, -100, &text).await;

        let sent = outbox.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, -100);
        assert!(sent[0].1.text.starts_with("&lt;x"));
        assert!(sent[0].1.text.ends_with("..."));
    }

    #[tokio::test]
    async fn test_flush_joins_and_clears() {
        let outbox = RecordingOutbox::new();
        let mut buffer = vec!["a".to_string(), "b".to_string()];
        flush_buffer(&outbox, 1, &mut buffer).await;
        flush_buffer(&outbox, 1, &mut buffer).await;

        let sent = outbox.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.text, "a\nb");
        assert!(buffer.is_empty());
    }
}
