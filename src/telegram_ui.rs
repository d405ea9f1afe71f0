//! Telegram UI Components
//!
//! - Button action tokens (encode/decode)
//! - Screen descriptors and inline keyboard rendering
//! - MarkdownV2 escaping

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::navigation::NavigationError;

/// Telegram rejects callback data longer than this (bytes)
pub const CALLBACK_DATA_LIMIT: usize = 64;

/// Telegram message text limit (characters)
pub const MESSAGE_LIMIT: usize = 4096;

/// User buttons per keyboard row
pub const USER_GRID_COLUMNS: usize = 2;

const SEPARATOR: char = ':';

// ============ Button Actions ============

/// How a user is referenced inside a button token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    /// By username (normal case)
    Name(String),
    /// By position in the inbound's user list, when the name doesn't fit
    Index(usize),
}

/// Button action types for callbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    ViewUsers { inbound_id: i64 },
    UserDetails { inbound_id: i64, user: UserRef },
    BackToInbounds,
}

impl ButtonAction {
    /// Action for a user button, falling back to a positional reference
    /// when the username would overflow the callback data limit
    pub fn for_user(inbound_id: i64, index: usize, username: &str) -> Self {
        let by_name = Self::UserDetails {
            inbound_id,
            user: UserRef::Name(username.to_string()),
        };
        if !username.is_empty() && by_name.encode().len() <= CALLBACK_DATA_LIMIT {
            by_name
        } else {
            Self::UserDetails {
                inbound_id,
                user: UserRef::Index(index),
            }
        }
    }

    /// Encode action as callback data string
    pub fn encode(&self) -> String {
        match self {
            Self::ViewUsers { inbound_id } => format!("view_users:{}", inbound_id),
            Self::UserDetails {
                inbound_id,
                user: UserRef::Name(name),
            } => format!("user_details:{}:{}", inbound_id, name),
            Self::UserDetails {
                inbound_id,
                user: UserRef::Index(index),
            } => format!("user_at:{}:{}", inbound_id, index),
            Self::BackToInbounds => "back_to_inbounds".to_string(),
        }
    }

    /// Decode callback data string to action.
    ///
    /// The username is always the last field and the inbound id is numeric,
    /// so only the first two separators are significant: a username
    /// containing `:` decodes intact.
    pub fn decode(data: &str) -> Result<Self, NavigationError> {
        let unrecognized = || NavigationError::UnrecognizedAction(data.to_string());

        let mut parts = data.splitn(3, SEPARATOR);
        let action = parts.next().unwrap_or_default();
        let first = parts.next();
        let rest = parts.next();

        match (action, first, rest) {
            ("back_to_inbounds", None, None) => Ok(Self::BackToInbounds),
            ("view_users", Some(id), None) => Ok(Self::ViewUsers {
                inbound_id: id.parse().map_err(|_| unrecognized())?,
            }),
            ("user_details", Some(id), Some(name)) if !name.is_empty() => Ok(Self::UserDetails {
                inbound_id: id.parse().map_err(|_| unrecognized())?,
                user: UserRef::Name(name.to_string()),
            }),
            ("user_at", Some(id), Some(index)) => Ok(Self::UserDetails {
                inbound_id: id.parse().map_err(|_| unrecognized())?,
                user: UserRef::Index(index.parse().map_err(|_| unrecognized())?),
            }),
            _ => Err(unrecognized()),
        }
    }

    /// Screen this action navigates to
    pub fn target(&self) -> ScreenState {
        match self {
            Self::ViewUsers { inbound_id } => ScreenState::UserList {
                inbound_id: *inbound_id,
            },
            Self::UserDetails { inbound_id, user } => ScreenState::UserDetail {
                inbound_id: *inbound_id,
                user: user.clone(),
            },
            Self::BackToInbounds => ScreenState::InboundList,
        }
    }
}

/// Navigation screens; rebuilt from a button token on every click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenState {
    InboundList,
    UserList { inbound_id: i64 },
    UserDetail { inbound_id: i64, user: UserRef },
}

// ============ Screens ============

/// A single inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: ButtonAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Rendered screen: MarkdownV2 text plus button rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub rows: Vec<Vec<Button>>,
}

impl Screen {
    /// Text-only screen (no keyboard)
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.rows.push(row);
        }
        self
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Vec<Button>>) -> Self {
        for row in rows {
            self = self.with_row(row);
        }
        self
    }

    /// All buttons, row by row
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    pub fn has_buttons(&self) -> bool {
        self.rows.iter().any(|r| !r.is_empty())
    }

    /// Build the inline keyboard, if the screen has any buttons
    pub fn keyboard(&self) -> Option<InlineKeyboardMarkup> {
        if !self.has_buttons() {
            return None;
        }

        let rows: Vec<Vec<InlineKeyboardButton>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.action.encode()))
                    .collect()
            })
            .collect();

        Some(InlineKeyboardMarkup::new(rows))
    }
}

/// Pack items into rows of `columns`, left to right; the last row may be short
pub fn grid<T>(items: Vec<T>, columns: usize) -> Vec<Vec<T>> {
    let columns = columns.max(1);
    let mut rows = Vec::with_capacity(items.len().div_ceil(columns));
    let mut row = Vec::with_capacity(columns);

    for item in items {
        row.push(item);
        if row.len() == columns {
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(columns)));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }
    rows
}

// ============ Escaping ============

/// Characters that must be backslash-escaped in MarkdownV2 text
pub const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// MarkdownV2 escape for Telegram
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inverse of [`escape_markdown`]
pub fn unescape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}
