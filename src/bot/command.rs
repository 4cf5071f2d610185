//! Inbound events as the messaging platform hands them to us.

use crate::bot::keyboard::Action;

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A text message, e.g. `/followers https://instagram.com/me 500`.
    Text(String),
    /// The `callback_data` of a pressed inline button.
    Callback(String),
}

/// One event from one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: String,
    pub input: Input,
}

impl Incoming {
    pub fn text(chat_id: i64, user_id: i64, username: impl Into<String>, text: impl Into<String>) -> Self {
        Self { chat_id, user_id, username: username.into(), input: Input::Text(text.into()) }
    }

    pub fn callback(chat_id: i64, user_id: i64, username: impl Into<String>, data: impl Into<String>) -> Self {
        Self { chat_id, user_id, username: username.into(), input: Input::Callback(data.into()) }
    }

    /// Parse a console line: `<user_id> <username> <text | cb:<callback_data>>`.
    ///
    /// The chat is the user's private chat, so `chat_id == user_id`.
    pub fn from_console_line(line: &str) -> Result<Self, String> {
        let mut parts = line.trim().splitn(3, char::is_whitespace);
        let user_id = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or("missing user id")?
            .parse::<i64>()
            .map_err(|e| format!("bad user id: {e}"))?;
        let username = parts.next().filter(|s| !s.is_empty()).ok_or("missing username")?;
        let rest = parts.next().map(str::trim).filter(|s| !s.is_empty()).ok_or("missing input")?;

        Ok(match rest.strip_prefix("cb:") {
            Some(data) => Self::callback(user_id, user_id, username, data),
            None => Self::text(user_id, user_id, username, rest),
        })
    }
}

/// An input resolved to an action and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// `None` when the input matched nothing we know.
    pub action: Option<Action>,
    pub args: Vec<String>,
}

impl Input {
    pub fn parse(&self) -> Request {
        match self {
            Input::Callback(data) => Request { action: Action::from_callback(data.trim()), args: Vec::new() },
            Input::Text(text) => {
                let mut words = text.split_whitespace();
                let Some(head) = words.next() else {
                    return Request { action: None, args: Vec::new() };
                };
                // Group chats append the bot's name: /start@my_bot
                let command = head.split('@').next().unwrap_or(head).to_lowercase();
                Request {
                    action: Action::from_command(&command),
                    args: words.map(str::to_string).collect(),
                }
            }
        }
    }
}
