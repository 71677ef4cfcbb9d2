//! Telegram adapter: alert delivery, inbound authorization, slash commands.
//!
//! Outbound delivery is a send-only [`Notifier`] over the Bot API. Inbound
//! runs a teloxide dispatcher that gates on `allowed_users`, registers the
//! alert chat on first authorized contact, and answers read-only commands.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, info, warn};

use crate::dispatch::{AlertDispatcher, AlertTarget, Notifier, NotifyError};
use crate::registry::ContainerRegistry;

pub mod commands;
pub mod ui;

// ---------------------------------------------------------------------------
// Outbound delivery
// ---------------------------------------------------------------------------

/// Sends alert messages through the Telegram Bot API.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    /// Wrap an existing bot handle.
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Shared state for handler injection
// ---------------------------------------------------------------------------

/// Shared dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
struct SharedState {
    allowed_users: Vec<i64>,
    target: Arc<AlertTarget>,
    registry: Arc<ContainerRegistry>,
    dispatcher: Arc<AlertDispatcher>,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the inbound Telegram dispatcher.
///
/// Blocks until the bot is stopped (Ctrl+C). The first message from an
/// allowed user registers its chat as the alert target; until that happens
/// the watchdog observes but cannot deliver.
pub async fn run_telegram(
    bot: Bot,
    allowed_users: Vec<i64>,
    target: Arc<AlertTarget>,
    registry: Arc<ContainerRegistry>,
    dispatcher: Arc<AlertDispatcher>,
) {
    let shared = SharedState {
        allowed_users,
        target,
        registry,
        dispatcher,
    };

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    info!("telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![shared])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

// ---------------------------------------------------------------------------
// Message handler
// ---------------------------------------------------------------------------

/// Handle an incoming Telegram message.
///
/// Checks `allowed_users`, claims the alert chat on first authorized
/// contact, and dispatches slash commands.
async fn handle_message(bot: Bot, msg: Message, state: SharedState) -> ResponseResult<()> {
    let user_id = match msg.from {
        Some(ref user) => {
            // teloxide uses u64 for user IDs; our config stores i64.
            i64::try_from(user.id.0).unwrap_or(0)
        }
        None => return Ok(()),
    };

    debug!(user_id, "telegram message received");

    if !state.allowed_users.contains(&user_id) {
        warn!(user_id, "message dropped: user not in allowed_users");
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    if state.target.register(chat_id) {
        info!(chat_id, "alert chat registered");
        bot.send_message(msg.chat.id, "Alerts will be delivered to this chat.")
            .await?;
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        let reply = dispatch_command(text, &state).await;
        bot.send_message(msg.chat.id, reply)
            .parse_mode(ParseMode::Html)
            .await?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatcher
// ---------------------------------------------------------------------------

/// Parse and dispatch a slash command, returning the HTML response.
async fn dispatch_command(text: &str, state: &SharedState) -> String {
    // Strip the leading "/" and split into command and args.
    let without_slash = &text[1..];
    // Handle bot-mention suffixes like "/status@armitage_bot".
    let (full_command, _args) = match without_slash.split_once(' ') {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (without_slash, ""),
    };
    let command = full_command.split('@').next().unwrap_or(full_command);

    match command {
        "help" | "start" => commands::handle_help(),
        "status" => commands::handle_status(&state.registry).await,
        "errors" => commands::handle_errors(state.dispatcher.cooldowns()),
        _ => format!("Unknown command: /{}", ui::escape_html(command)),
    }
}
