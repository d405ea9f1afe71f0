//! Inline-menu navigation
//!
//! Stateless: every screen is rebuilt from the clicked button's action plus
//! freshly fetched inbounds. Nothing is kept between clicks, so a button may
//! point at an inbound or user that no longer exists; that lookup miss is an
//! explicit branch here rather than a fallthrough.
//!
//! ```text
//! /list_inbounds ──► InboundList ──view_users:{id}──► UserList{id}
//!                        ▲                               │   ▲
//!                        └──────back_to_inbounds─────────┘   │
//!                                                 user_details:{id}:{name}
//!                                                            │   │ view_users:{id}
//!                                                            ▼   │
//!                                                      UserDetail{id, name}
//! ```

use crate::panel::{Inbound, PanelError};
use crate::telegram_ui::{
    escape_markdown, grid, Button, ButtonAction, Screen, ScreenState, UserRef, MESSAGE_LIMIT,
    USER_GRID_COLUMNS,
};

/// Users shown inline per inbound on the list screen
const USER_PREVIEW_COUNT: usize = 3;

/// Room kept free under the message limit for the truncation footer
const LIST_FOOTER_RESERVE: usize = 200;

/// Navigation failures surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    /// Button refers to data the panel no longer has
    #[error("Stale reference: {0}")]
    StaleReference(String),

    /// Button token this version doesn't understand
    #[error("Unrecognized action: {0}")]
    UnrecognizedAction(String),
}

/// Maps (screen, fresh data) to the next rendered screen
pub struct NavigationController;

impl NavigationController {
    /// Render the target screen from a fetch result
    pub fn navigate(state: &ScreenState, fetched: Result<Vec<Inbound>, PanelError>) -> Screen {
        match fetched {
            Ok(inbounds) => Self::render(state, &inbounds),
            Err(e) => Self::panel_error(&e),
        }
    }

    /// Render the target screen from already-fetched inbounds
    pub fn render(state: &ScreenState, inbounds: &[Inbound]) -> Screen {
        match state {
            ScreenState::InboundList => Self::inbound_list(inbounds),
            ScreenState::UserList { inbound_id } => Self::user_list(inbounds, *inbound_id),
            ScreenState::UserDetail { inbound_id, user } => {
                Self::user_detail(inbounds, *inbound_id, user)
            }
        }
    }

    /// Top-level list: one block and one button per inbound
    pub fn inbound_list(inbounds: &[Inbound]) -> Screen {
        if inbounds.is_empty() {
            return Screen::text(escape_markdown("No inbounds found on your panel."));
        }

        let mut text = String::from("*Available Inbounds & Users:*\n\n");
        let mut shown = 0;
        for inbound in inbounds {
            let block = inbound_block(inbound);
            if text.chars().count() + block.chars().count() > MESSAGE_LIMIT - LIST_FOOTER_RESERVE {
                break;
            }
            text.push_str(&block);
            shown += 1;
        }
        if shown < inbounds.len() {
            text.push_str(&escape_markdown(&format!(
                "...and {} more. Use the buttons below to browse all inbounds.",
                inbounds.len() - shown
            )));
        }

        let rows = inbounds.iter().map(|inbound| {
            vec![Button::new(
                format!("{} (ID {})", inbound.name(), inbound.id),
                ButtonAction::ViewUsers {
                    inbound_id: inbound.id,
                },
            )]
        });

        Screen::text(text.trim_end().to_string()).with_rows(rows)
    }

    /// Users of one inbound, packed two per row, plus a back button
    pub fn user_list(inbounds: &[Inbound], inbound_id: i64) -> Screen {
        let inbound = match find_inbound(inbounds, inbound_id) {
            Ok(inbound) => inbound,
            Err(e) => return Self::stale(&e),
        };

        let back = vec![Button::new("⬅️ Back to inbounds", ButtonAction::BackToInbounds)];

        if inbound.users.is_empty() {
            return Screen::text(escape_markdown(&format!(
                "No users found in {}.",
                inbound.name()
            )))
            .with_row(back);
        }

        let buttons: Vec<Button> = inbound
            .users
            .iter()
            .enumerate()
            .map(|(index, username)| {
                Button::new(
                    format!("👤 {}", username),
                    ButtonAction::for_user(inbound.id, index, username),
                )
            })
            .collect();

        let text = format!(
            "*Users in {}:*\n{}",
            escape_markdown(inbound.name()),
            escape_markdown(&format!("{} user(s). Tap one for details.", inbound.users.len()))
        );

        Screen::text(text)
            .with_rows(grid(buttons, USER_GRID_COLUMNS))
            .with_row(back)
    }

    /// Terminal screen for one user
    pub fn user_detail(inbounds: &[Inbound], inbound_id: i64, user: &UserRef) -> Screen {
        let inbound = match find_inbound(inbounds, inbound_id) {
            Ok(inbound) => inbound,
            Err(e) => return Self::stale(&e),
        };

        let back = vec![Button::new(
            "⬅️ Back to users",
            ButtonAction::ViewUsers {
                inbound_id: inbound.id,
            },
        )];

        let username = match find_user(inbound, user) {
            Ok(username) => username,
            Err(_) => {
                return Screen::text(escape_markdown(&format!(
                    "Couldn't find that user in {}. It may have been removed.",
                    inbound.name()
                )))
                .with_row(back);
            }
        };

        let text = format!(
            "*User details*\n\n*User:* `{}`\n*Inbound:* {} \\(ID `{}`\\)\n*Protocol:* {}\n\n{}",
            escape_markdown(username),
            escape_markdown(inbound.name()),
            inbound.id,
            escape_markdown(inbound.protocol.as_deref().unwrap_or("N/A")),
            escape_markdown(&format!(
                "✅ Selected user {} in {}.",
                username,
                inbound.name()
            )),
        );

        Screen::text(text).with_row(back)
    }

    /// Result of the `/test_sui` connection check
    pub fn status_report(result: &Result<(), PanelError>) -> Screen {
        let message = match result {
            Ok(()) => "✅ s-ui panel connection successful!".to_string(),
            Err(PanelError::Api(msg)) => format!("❌ s-ui API returned failure: {}", msg),
            Err(PanelError::Http(code)) => {
                format!("❌ Failed to connect. HTTP Status Code: {}", code)
            }
            Err(PanelError::Transport(e)) => format!("❌ Connection error: {}", e),
            Err(PanelError::Decode(e)) => format!("❌ Invalid response from panel: {}", e),
        };
        Screen::text(escape_markdown(&message))
    }

    /// Panel failure while navigating; no buttons
    pub fn panel_error(err: &PanelError) -> Screen {
        Screen::text(escape_markdown(&format!("❌ Error: {}", err)))
    }

    /// Button token we can't parse (e.g. from an older bot version)
    pub fn unrecognized(err: &NavigationError) -> Screen {
        tracing::debug!("Rendering unrecognized action screen: {}", err);
        Screen::text(escape_markdown(
            "⚠️ That button is no longer supported. Use /list_inbounds to start over.",
        ))
    }

    fn stale(err: &NavigationError) -> Screen {
        tracing::debug!("Lookup miss: {}", err);
        Screen::text(escape_markdown(
            "❌ Couldn't find that inbound. It may have been removed; use /list_inbounds to refresh.",
        ))
    }
}

/// One inbound's block on the list screen
fn inbound_block(inbound: &Inbound) -> String {
    let port = inbound
        .port
        .map(|p| p.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut block = format!(
        "• *Name:* `{}`  *ID:* `{}`\n  *Protocol:* {} \\| *Port:* {}\n",
        escape_markdown(inbound.name()),
        inbound.id,
        escape_markdown(inbound.protocol.as_deref().unwrap_or("N/A")),
        escape_markdown(&port),
    );

    let count = inbound.users.len();
    if count > 0 {
        let preview = inbound
            .users
            .iter()
            .take(USER_PREVIEW_COUNT)
            .map(|u| escape_markdown(u))
            .collect::<Vec<_>>()
            .join(", ");
        let more = if count > USER_PREVIEW_COUNT { "\\.\\.\\." } else { "" };
        block.push_str(&format!("  *Users \\({}\\):* `{}`{}\n", count, preview, more));
    } else {
        block.push_str("  *Users:* None\n");
    }

    block.push('\n');
    block
}

fn find_inbound(inbounds: &[Inbound], inbound_id: i64) -> Result<&Inbound, NavigationError> {
    inbounds
        .iter()
        .find(|i| i.id == inbound_id)
        .ok_or_else(|| NavigationError::StaleReference(format!("inbound {}", inbound_id)))
}

fn find_user<'a>(inbound: &'a Inbound, user: &UserRef) -> Result<&'a str, NavigationError> {
    let found = match user {
        UserRef::Name(name) => inbound.users.iter().find(|u| *u == name),
        UserRef::Index(index) => inbound.users.get(*index),
    };
    found
        .map(String::as_str)
        .ok_or_else(|| NavigationError::StaleReference(format!("user {:?} in inbound {}", user, inbound.id)))
}
