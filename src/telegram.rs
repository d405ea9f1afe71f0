//! Telegram Bot front end for the s-ui panel
//!
//! Commands are answered with freshly fetched panel data; inline buttons
//! carry their whole navigation state in the callback data, so the bot keeps
//! no per-chat session.
//!
//! Uses explicit Dispatcher pattern for reliable message polling.

use anyhow::Result;
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{BotCommand, MessageId, ParseMode, Update},
    ApiError, RequestError,
};

use crate::config::Config;
use crate::navigation::NavigationController;
use crate::panel::PanelClient;
use crate::telegram_ui::{escape_markdown, ButtonAction, Screen, ScreenState};

/// Bot commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    TestSui,
    ListInbounds,
    Unknown(String),
}

impl Command {
    /// Parse a `/command[@botname] [args]` message.
    ///
    /// `None` for plain text and for commands addressed to another bot
    /// (an `@suffix` that isn't `bot_username`).
    pub fn parse(text: &str, bot_username: &str) -> Option<Self> {
        let text = text.trim();
        let first = text.split_whitespace().next()?;
        let body = first.strip_prefix('/')?;
        let (name, addressee) = match body.split_once('@') {
            Some((name, addressee)) => (name, Some(addressee)),
            None => (body, None),
        };

        if let Some(addressee) = addressee {
            if !addressee.eq_ignore_ascii_case(bot_username) {
                return None;
            }
        }

        let name = name.to_lowercase();

        Some(match name.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "test_sui" => Self::TestSui,
            "list_inbounds" => Self::ListInbounds,
            _ => Self::Unknown(name),
        })
    }

    /// Commands registered in the Telegram command menu
    pub fn menu() -> Vec<BotCommand> {
        vec![
            BotCommand::new("start", "Show what this bot can do"),
            BotCommand::new("list_inbounds", "Browse inbounds and their users"),
            BotCommand::new("test_sui", "Check the s-ui panel connection"),
            BotCommand::new("help", "Show help"),
        ]
    }
}

/// Greeting for /start and /help (MarkdownV2)
pub fn welcome_text(first_name: Option<&str>) -> String {
    let greeting = match first_name {
        Some(name) if !name.trim().is_empty() => format!("👋 Hello {}!", name.trim()),
        _ => "👋 Hello!".to_string(),
    };

    escape_markdown(&format!(
        "{}\n\n\
        I am ready to manage your s-ui panel.\n\
        ➡️ Use /list_inbounds to see your available inbounds and users.\n\
        ➡️ Use /test_sui to check the connection status.",
        greeting
    ))
}

/// Shared handler state
pub struct BotData {
    config: Arc<Config>,
    panel: PanelClient,
    /// Our @username (without the @), for group-chat command suffixes
    bot_username: String,
}

impl BotData {
    pub fn new(config: Arc<Config>, panel: PanelClient, bot_username: String) -> Self {
        Self {
            config,
            panel,
            bot_username,
        }
    }

    fn is_allowed(&self, user_id: i64) -> bool {
        self.config.is_allowed(user_id)
    }
}

/// Run Telegram bot with explicit Dispatcher for reliable polling
pub async fn run_telegram_bot(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let panel = PanelClient::from_config(&config)?;

    tracing::info!("===========================================");
    tracing::info!("  s-ui Panel Bot - Starting...");
    tracing::info!("===========================================");
    tracing::info!("Panel URL: {}", panel.base_url());
    tracing::info!(
        "Allowed users: {}",
        if config.allowed_users.is_empty() {
            "ALL".to_string()
        } else {
            format!("{:?}", config.allowed_users)
        }
    );
    tracing::info!("Panel request timeout: {:?}", config.request_timeout);

    let bot = Bot::new(config.telegram_bot_token.clone());

    // Verify bot token by calling getMe
    tracing::info!("Verifying bot token...");
    let bot_username = match bot.get_me().await {
        Ok(me) => {
            tracing::info!(
                "Bot authenticated: @{} (ID: {})",
                me.username.as_deref().unwrap_or("unknown"),
                me.id
            );
            me.username.clone().unwrap_or_default()
        }
        Err(e) => {
            tracing::error!("Failed to authenticate bot: {}", e);
            anyhow::bail!("Bot authentication failed: {}", e);
        }
    };

    // Delete any existing webhook to ensure polling works
    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!("Failed to delete webhook: {} (continuing anyway)", e);
    }

    if let Err(e) = bot.set_my_commands(Command::menu()).await {
        tracing::warn!("Failed to register command menu: {}", e);
    }

    let handler_data = Arc::new(BotData::new(Arc::clone(&config), panel, bot_username));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    tracing::info!("Starting dispatcher with long polling...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![handler_data])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in update handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("Dispatcher stopped");
    Ok(())
}

/// Message handler endpoint for the dispatcher
async fn message_handler(bot: Bot, msg: Message, data: Arc<BotData>) -> ResponseResult<()> {
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    let text_preview = msg
        .text()
        .unwrap_or("<non-text>")
        .chars()
        .take(50)
        .collect::<String>();

    tracing::info!(
        ">>> Message received: user={}, chat={}, text={:?}",
        user_id,
        msg.chat.id.0,
        text_preview
    );

    if let Err(e) = handle_message(&bot, &msg, &data, user_id).await {
        tracing::error!("Error handling message: {}", e);
    }

    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, data: &BotData, user_id: i64) -> Result<()> {
    let chat_id = msg.chat.id;

    if !data.is_allowed(user_id) {
        tracing::warn!("Unauthorized user: {}", user_id);
        bot.send_message(chat_id, "Unauthorized.").await?;
        return Ok(());
    }

    let Some(command) = msg
        .text()
        .and_then(|text| Command::parse(text, &data.bot_username))
    else {
        tracing::debug!("Ignoring message in chat {} (not a command for us)", chat_id);
        return Ok(());
    };

    let first_name = msg.from.as_ref().map(|u| u.first_name.as_str());
    handle_command(bot, chat_id, data, command, first_name).await
}

async fn handle_command(
    bot: &Bot,
    chat_id: ChatId,
    data: &BotData,
    command: Command,
    first_name: Option<&str>,
) -> Result<()> {
    match command {
        Command::Start | Command::Help => {
            bot.send_message(chat_id, welcome_text(first_name))
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
        }

        Command::TestSui => {
            let placeholder = bot
                .send_message(chat_id, "Connecting to s-ui panel, please wait...")
                .await?;

            let result = data.panel.check_status().await;
            match &result {
                Ok(()) => tracing::info!("Panel status check succeeded"),
                Err(e) => tracing::warn!("Panel status check failed: {}", e),
            }

            let screen = NavigationController::status_report(&result);
            show_screen(bot, chat_id, Some(placeholder.id), &screen).await?;
        }

        Command::ListInbounds => {
            let placeholder = bot
                .send_message(chat_id, "Fetching inbounds from your panel...")
                .await?;

            let screen = NavigationController::navigate(
                &ScreenState::InboundList,
                data.panel.list_inbounds().await,
            );
            show_screen(bot, chat_id, Some(placeholder.id), &screen).await?;
        }

        Command::Unknown(name) => {
            tracing::debug!("Unknown command: /{}", name);
            bot.send_message(chat_id, "Unknown command. Use /help to see what I can do.")
                .await?;
        }
    }

    Ok(())
}

/// Callback query handler for inline keyboard buttons
pub(crate) async fn callback_handler(
    bot: Bot,
    query: CallbackQuery,
    data: Arc<BotData>,
) -> ResponseResult<()> {
    let user_id = query.from.id.0 as i64;

    if !data.is_allowed(user_id) {
        bot.answer_callback_query(&query.id)
            .text("Unauthorized")
            .await?;
        return Ok(());
    }

    let callback_data = match &query.data {
        Some(d) => d.clone(),
        None => {
            bot.answer_callback_query(&query.id).await?;
            return Ok(());
        }
    };

    tracing::info!("Callback query: user={}, data={}", user_id, callback_data);

    let target = query.message.as_ref().map(|m| (m.chat().id, m.id()));

    let screen = match ButtonAction::decode(&callback_data) {
        Ok(action) => {
            // Acknowledge before the (possibly slow) panel round trip.
            // Telegram rejects stale queries (e.g. after downtime); still render.
            if let Err(e) = bot.answer_callback_query(&query.id).await {
                tracing::warn!("Failed to answer callback {}: {}", callback_data, e);
            }

            NavigationController::navigate(&action.target(), data.panel.list_inbounds().await)
        }
        Err(e) => {
            tracing::warn!("{}", e);
            if let Err(ack_err) = bot
                .answer_callback_query(&query.id)
                .text("Unrecognized action")
                .await
            {
                tracing::warn!("Failed to answer callback {}: {}", callback_data, ack_err);
            }
            NavigationController::unrecognized(&e)
        }
    };

    let Some((chat_id, message_id)) = target else {
        tracing::debug!("Callback without an accessible message, nothing to update");
        return Ok(());
    };

    if let Err(e) = show_screen(&bot, chat_id, Some(message_id), &screen).await {
        tracing::error!("Failed to render screen for callback {}: {}", callback_data, e);
    }

    Ok(())
}

/// Put a screen in the chat, replacing `message_id` in place when given.
/// Falls back to a new message if the edit is rejected.
async fn show_screen(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    screen: &Screen,
) -> Result<()> {
    if let Some(message_id) = message_id {
        let mut req = bot
            .edit_message_text(chat_id, message_id, screen.text.clone())
            .parse_mode(ParseMode::MarkdownV2);
        if let Some(keyboard) = screen.keyboard() {
            req = req.reply_markup(keyboard);
        }

        match req.await {
            Ok(_) => return Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => return Ok(()),
            Err(e) => tracing::warn!("Failed to edit message {}: {}, sending new", message_id.0, e),
        }
    }

    let mut req = bot
        .send_message(chat_id, screen.text.clone())
        .parse_mode(ParseMode::MarkdownV2);
    if let Some(keyboard) = screen.keyboard() {
        req = req.reply_markup(keyboard);
    }
    req.await?;

    Ok(())
}
