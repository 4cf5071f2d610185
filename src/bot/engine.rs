//! Service bot engine - routes user actions to handlers.
//!
//! Paid handlers run: debit → provider call → audit → reply. A provider
//! failure after the debit refunds the charge before replying.

use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, warn};

use crate::bot::audit::{AuditLog, Status};
use crate::bot::command::Incoming;
use crate::bot::keyboard::{admin_menu, main_menu, Action, Keyboard};
use crate::bot::ledger::{Ledger, LedgerError};
use crate::bot::providers::{ProviderError, Providers};
use crate::config::Config;

/// Recent records shown on the admin report.
const REPORT_RECENT: usize = 5;

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://\S+\.\S+$").unwrap());

/// Prices and provider parameters used by the handlers.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub admin_id: i64,
    pub phone_price: f64,
    pub followers_price: f64,
    pub followers_quantity: u32,
    pub followers_service: String,
    pub sms_country: String,
    pub sms_service: String,
    pub connect_credit: f64,
    pub journal_capacity: usize,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            admin_id: 0,
            phone_price: 5.0,
            followers_price: 10.0,
            followers_quantity: 1000,
            followers_service: "1".to_string(),
            sms_country: "73".to_string(),
            sms_service: "tg".to_string(),
            connect_credit: 100.0,
            journal_capacity: 500,
        }
    }
}

impl BotSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            admin_id: config.admin_id,
            phone_price: config.phone_price,
            followers_price: config.followers_price,
            followers_quantity: config.followers_quantity,
            followers_service: config.followers_service.clone(),
            sms_country: config.sms_country.clone(),
            sms_service: config.sms_service.clone(),
            connect_credit: config.connect_credit,
            journal_capacity: config.journal_capacity,
        }
    }

    /// Price of `quantity` followers, pro rata to the configured bundle, in whole cents.
    pub fn followers_cost(&self, quantity: u32) -> f64 {
        let raw = self.followers_price * quantity as f64 / self.followers_quantity as f64;
        (raw * 100.0).round() / 100.0
    }
}

/// Text and optional keyboard sent back to the user. Text is HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: None }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self { text: text.into(), keyboard: Some(keyboard) }
    }
}

/// Escape user-controlled text for Telegram's HTML parse mode.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

fn money(amount: f64) -> String {
    format!("R$ {amount:.2}")
}

/// The bot: settings, ledger, audit journal and provider handles.
pub struct ServiceBot {
    settings: BotSettings,
    ledger: Arc<Ledger>,
    audit: Arc<AuditLog>,
    providers: Providers,
}

impl ServiceBot {
    pub fn new(settings: BotSettings, providers: Providers) -> Self {
        let audit = Arc::new(AuditLog::new(settings.journal_capacity));
        Self { settings, ledger: Arc::new(Ledger::new()), audit, providers }
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.settings.admin_id
    }

    /// Route one inbound event to its handler.
    pub async fn dispatch(&self, incoming: &Incoming) -> Reply {
        let request = incoming.input.parse();
        let (user_id, username) = (incoming.user_id, incoming.username.as_str());

        let Some(action) = request.action else {
            info!("❓ Unrecognised input from {username} ({user_id})");
            return Reply::with_keyboard("I didn't get that. Pick an option:", main_menu());
        };

        if action.is_admin_only() && !self.is_admin(user_id) {
            warn!("⛔ {username} ({user_id}) tried admin action {}", action.as_str());
            self.audit.record(user_id, username, action.as_str(), 0.0, Status::Rejected, "not an admin");
            return Reply::with_keyboard("⛔ This option is for administrators only.", main_menu());
        }

        match action {
            Action::Start => self.handle_start(incoming.chat_id, user_id, username).await,
            Action::BuyFollowers => self.handle_buy_followers(user_id, username, &request.args).await,
            Action::BuyPhone => self.handle_buy_phone(user_id, username).await,
            Action::ConnectAccount => self.handle_connect_account(user_id, username).await,
            Action::CheckBalance => self.handle_check_balance(user_id, username).await,
            Action::AdminReports => self.handle_admin_reports(),
            Action::AdminUsers => self.handle_admin_users(),
        }
    }

    pub async fn handle_start(&self, chat_id: i64, user_id: i64, username: &str) -> Reply {
        info!("👋 /start from {username} ({user_id}) in chat {chat_id}");
        self.audit.record(user_id, username, "start", 0.0, Status::Success, "Started the bot");

        if self.is_admin(user_id) {
            Reply::with_keyboard("🔐 <b>Admin Panel</b>\n\nWelcome, Admin!", admin_menu())
        } else {
            Reply::with_keyboard(
                format!(
                    "👋 Hello, {}!\n\n🤖 <b>Automated Services Bot</b>\n\nChoose an option:",
                    html_escape(username)
                ),
                main_menu(),
            )
        }
    }

    /// Take `price` from the user, or build the reply explaining why not.
    fn charge(&self, user_id: i64, username: &str, operation: &str, price: f64) -> Result<f64, Reply> {
        match self.ledger.debit(user_id, price) {
            Ok(remaining) => {
                info!("💸 Debited {} from {username} ({user_id}), {} left", money(price), money(remaining));
                Ok(remaining)
            }
            Err(LedgerError::InsufficientFunds { needed, available }) => {
                info!("Insufficient balance for {username} ({user_id})");
                self.audit.record(user_id, username, operation, price, Status::Rejected, "insufficient funds");
                Err(Reply::with_keyboard(
                    format!(
                        "⚠️ <b>Insufficient Balance</b>\n\nRequired: {}\nYour balance: {}",
                        money(needed),
                        money(available)
                    ),
                    main_menu(),
                ))
            }
            Err(e) => {
                warn!("Debit failed for {username} ({user_id}): {e}");
                self.audit.record(user_id, username, operation, price, Status::Error, e.to_string());
                Err(Reply::text(format!("❌ Error: {}", html_escape(&e.to_string()))))
            }
        }
    }

    /// Give back a charge whose provider call failed.
    fn refund(&self, user_id: i64, username: &str, operation: &str, price: f64, error: &ProviderError) -> Reply {
        warn!("{operation} failed for {username} ({user_id}): {error}");
        match self.ledger.credit(user_id, price) {
            Ok(balance) => {
                self.audit.record(user_id, username, operation, price, Status::Refunded, error.to_string());
                Reply::with_keyboard(
                    format!(
                        "❌ Error: {}\n\n↩️ Your {} were refunded. Balance: {}",
                        html_escape(&error.to_string()),
                        money(price),
                        money(balance)
                    ),
                    main_menu(),
                )
            }
            Err(e) => {
                self.audit.record(
                    user_id,
                    username,
                    operation,
                    price,
                    Status::Error,
                    format!("{error}; refund failed: {e}"),
                );
                Reply::text(format!("❌ Error: {}", html_escape(&error.to_string())))
            }
        }
    }

    pub async fn handle_buy_followers(&self, user_id: i64, username: &str, args: &[String]) -> Reply {
        let usage = format!(
            "🧾 <b>Buy Followers</b>\n\nSend <code>/followers &lt;profile link&gt; [quantity]</code>\n\
             {} followers cost {}.",
            self.settings.followers_quantity,
            money(self.settings.followers_price)
        );

        let Some(link) = args.first() else {
            return Reply::text(usage);
        };
        if !LINK_PATTERN.is_match(link) {
            return Reply::text(format!("⚠️ That doesn't look like a profile link.\n\n{usage}"));
        }
        let quantity = match args.get(1).map(|q| q.parse::<u32>()) {
            None => self.settings.followers_quantity,
            Some(Ok(q)) if q > 0 => q,
            Some(_) => return Reply::text(format!("⚠️ Quantity must be a positive whole number.\n\n{usage}")),
        };

        let price = self.settings.followers_cost(quantity);
        if let Err(reply) = self.charge(user_id, username, "buy_followers", price) {
            return reply;
        }

        match self
            .providers
            .followers
            .buy_followers(&self.settings.followers_service, quantity, link)
            .await
        {
            Ok(order) => {
                let detail = serde_json::to_string(&order).unwrap_or_else(|_| order.order_id.clone());
                self.audit.record(user_id, username, "buy_followers", price, Status::Success, detail);
                Reply::with_keyboard(
                    format!(
                        "✅ <b>Order Placed!</b>\n\n🧾 Order: <code>{}</code>\n👥 Quantity: {}\n🔗 {}\n💰 Paid: {}",
                        html_escape(&order.order_id),
                        order.quantity,
                        html_escape(&order.link),
                        money(price)
                    ),
                    main_menu(),
                )
            }
            Err(e) => self.refund(user_id, username, "buy_followers", price, &e),
        }
    }

    pub async fn handle_buy_phone(&self, user_id: i64, username: &str) -> Reply {
        let price = self.settings.phone_price;
        if let Err(reply) = self.charge(user_id, username, "buy_phone", price) {
            return reply;
        }

        match self
            .providers
            .phones
            .buy_number(&self.settings.sms_country, &self.settings.sms_service)
            .await
        {
            Ok(activation) => {
                let detail = serde_json::to_string(&activation).unwrap_or_else(|_| activation.activation_id.clone());
                self.audit.record(user_id, username, "buy_phone", price, Status::Success, detail);
                Reply::with_keyboard(
                    format!(
                        "✅ <b>Number Purchased!</b>\n\n📱 Number: <code>{}</code>\n💰 Paid: {}",
                        html_escape(&activation.phone_number),
                        money(price)
                    ),
                    main_menu(),
                )
            }
            Err(e) => self.refund(user_id, username, "buy_phone", price, &e),
        }
    }

    pub async fn handle_connect_account(&self, user_id: i64, username: &str) -> Reply {
        let link = match self.providers.accounts.connect_link(user_id).await {
            Ok(link) => link,
            Err(e) => {
                warn!("Pluggy error for {username} ({user_id}): {e}");
                self.audit.record(user_id, username, "connect_pluggy", 0.0, Status::Error, e.to_string());
                return Reply::with_keyboard(format!("❌ Error: {}", html_escape(&e.to_string())), main_menu());
            }
        };

        let credit = self.settings.connect_credit;
        if let Err(e) = self.ledger.set_balance(user_id, credit) {
            warn!("Could not credit {username} ({user_id}): {e}");
            self.audit.record(user_id, username, "connect_pluggy", credit, Status::Error, e.to_string());
            return Reply::text(format!("❌ Error: {}", html_escape(&e.to_string())));
        }

        info!("💳 Account connected for {username} ({user_id}), balance: {}", money(credit));
        self.audit.record(user_id, username, "connect_pluggy", 0.0, Status::Success, "Connected account");
        Reply::with_keyboard(
            format!(
                "💳 <b>Account Connected!</b>\n\n🔗 <a href=\"{}\">Open Pluggy Connect</a>\n💰 Balance: {}",
                html_escape(&link.url),
                money(credit)
            ),
            main_menu(),
        )
    }

    pub async fn handle_check_balance(&self, user_id: i64, username: &str) -> Reply {
        let balance = self.ledger.get_balance(user_id);
        info!("💰 Balance for {username} ({user_id}): {}", money(balance));
        Reply::with_keyboard(format!("💰 <b>Your Balance</b>\n\n{}", money(balance)), main_menu())
    }

    pub fn handle_admin_reports(&self) -> Reply {
        let summary = self.audit.summary();
        let mut text = format!(
            "📊 <b>Reports</b>\n\nOperations: {}\nRevenue: {}\n",
            summary.total,
            money(summary.revenue)
        );
        for ((operation, status), count) in &summary.counts {
            let _ = write!(text, "\n• {} / {status}: {count}", html_escape(operation));
        }

        let recent = self.audit.recent(REPORT_RECENT);
        if !recent.is_empty() {
            text.push_str("\n\n<b>Latest</b>");
            for entry in recent {
                let _ = write!(
                    text,
                    "\n{} {} {} {} ({})",
                    entry.timestamp.format("%H:%M:%S"),
                    html_escape(&entry.username),
                    html_escape(&entry.operation),
                    money(entry.amount),
                    entry.status
                );
            }
        }

        Reply::with_keyboard(text, admin_menu())
    }

    pub fn handle_admin_users(&self) -> Reply {
        let balances = self.ledger.snapshot();
        if balances.is_empty() {
            return Reply::with_keyboard("👥 <b>Users</b>\n\nNo balances yet.", admin_menu());
        }

        let mut text = format!("👥 <b>Users</b> ({})\n", balances.len());
        for (user_id, balance) in balances {
            let _ = write!(text, "\n• {user_id}: {}", money(balance));
        }
        Reply::with_keyboard(text, admin_menu())
    }
}
