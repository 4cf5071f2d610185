//! Service bot - menus, ledger and provider orders.

pub mod audit;
pub mod command;
pub mod engine;
pub mod keyboard;
pub mod ledger;
pub mod providers;
pub mod telegram;

pub use audit::{AuditLog, AuditRecord, Status};
pub use command::{Incoming, Input};
pub use engine::{BotSettings, Reply, ServiceBot};
pub use keyboard::{Action, Button, Keyboard};
pub use ledger::{Ledger, LedgerError};
pub use providers::{Providers, ProviderError};
pub use telegram::{ConsoleOutbox, Outbox, RecordingOutbox, TelegramClient};

#[cfg(test)]
mod tests;
