//! s-ui Panel Bot
//!
//! Telegram front end for the s-ui proxy panel API.
//!
//! # Features
//!
//! - **Panel client**: status check and inbound listing over HTTP+JSON
//! - **Inline navigation**: inbounds → users → user details, with all state
//!   carried in button callback data (no server-side sessions)
//! - **MarkdownV2 rendering**: every panel-supplied field escaped
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► Dispatcher ──► Command / ButtonAction
//!                                   │
//!                                   ├── PanelClient (GET /apiv2/*)
//!                                   └── NavigationController ──► Screen
//!                                                                 │
//!                                       text + InlineKeyboard ◄───┘
//! ```

pub mod config;
pub mod navigation;
pub mod panel;
pub mod telegram;
pub mod telegram_ui;


pub use config::{Config, ConfigError};
pub use navigation::{NavigationController, NavigationError};
pub use panel::{Inbound, PanelClient, PanelError};
pub use telegram_ui::{ButtonAction, Screen, ScreenState, UserRef};
