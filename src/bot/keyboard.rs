//! Inline keyboards and the actions their buttons carry.

use serde::Serialize;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Something a user can ask the bot to do, by button or by command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    BuyFollowers,
    BuyPhone,
    ConnectAccount,
    CheckBalance,
    AdminReports,
    AdminUsers,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Start,
        Action::BuyFollowers,
        Action::BuyPhone,
        Action::ConnectAccount,
        Action::CheckBalance,
        Action::AdminReports,
        Action::AdminUsers,
    ];

    /// The callback id sent back by the platform when the button is pressed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::BuyFollowers => "buy_followers",
            Action::BuyPhone => "buy_phone",
            Action::ConnectAccount => "connect_pluggy",
            Action::CheckBalance => "check_balance",
            Action::AdminReports => "admin_reports",
            Action::AdminUsers => "admin_users",
        }
    }

    pub fn from_callback(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == data)
    }

    /// Slash command that triggers the same action.
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "/start" | "/menu" => Some(Action::Start),
            "/followers" => Some(Action::BuyFollowers),
            "/phone" => Some(Action::BuyPhone),
            "/connect" => Some(Action::ConnectAccount),
            "/balance" => Some(Action::CheckBalance),
            "/reports" => Some(Action::AdminReports),
            "/users" => Some(Action::AdminUsers),
            _ => None,
        }
    }

    pub fn is_admin_only(&self) -> bool {
        matches!(self, Action::AdminReports | Action::AdminUsers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self { label: label.into(), action }
    }
}

/// Rows of buttons shown under a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

#[derive(Serialize)]
struct WireKeyboard<'a> {
    inline_keyboard: Vec<Vec<WireButton<'a>>>,
}

#[derive(Serialize)]
struct WireButton<'a> {
    text: &'a str,
    callback_data: &'static str,
}

impl Keyboard {
    /// One button per row.
    pub fn column(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    /// Bot API `reply_markup` JSON.
    pub fn to_wire(&self) -> String {
        let wire = WireKeyboard {
            inline_keyboard: self
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| WireButton { text: &b.label, callback_data: b.action.as_str() })
                        .collect()
                })
                .collect(),
        };
        serde_json::to_string(&wire).unwrap_or_else(|_| r#"{"inline_keyboard":[]}"#.to_string())
    }

    pub fn to_markup(&self) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(self.rows.iter().map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.action.as_str()))
                .collect::<Vec<_>>()
        }))
    }
}

pub fn main_menu() -> Keyboard {
    Keyboard::column([
        Button::new("🧾 Buy Followers", Action::BuyFollowers),
        Button::new("📱 Buy Virtual Number", Action::BuyPhone),
        Button::new("💳 Connect Financial Account", Action::ConnectAccount),
        Button::new("💰 Check Balance", Action::CheckBalance),
    ])
}

pub fn admin_menu() -> Keyboard {
    Keyboard::column([
        Button::new("📊 Reports", Action::AdminReports),
        Button::new("👥 Users", Action::AdminUsers),
        Button::new("🔙 Main Menu", Action::Start),
    ])
}
