use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::messages;
use crate::parser::{self, BotCmd};
use crate::subscription::{SubscriptionManager, Toggle};
use crate::telegram::Notifier;

/// Inbound telegram update, only the fields the bot cares about.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<Sender>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

/// Interactive half of the bot: takes a parsed update, drives the
/// subscription manager and replies through the notifier.
#[derive(Clone)]
pub struct Bot {
    subscriptions: SubscriptionManager,
    notifier: Arc<dyn Notifier>,
}

impl Bot {
    pub fn new(subscriptions: SubscriptionManager, notifier: Arc<dyn Notifier>) -> Self {
        Bot {
            subscriptions,
            notifier,
        }
    }

    pub async fn handle_update(&self, update: Update) -> Result<()> {
        let msg = match update.message {
            Some(msg) => msg,
            None => return Ok(()),
        };
        let text = match msg.text {
            Some(text) => text,
            None => return Ok(()),
        };
        let chat_id = msg.chat.id.to_string();
        let sender = msg
            .from
            .and_then(|u| u.username.or(u.first_name))
            .unwrap_or_else(|| "<unknown>".to_string());
        log::info!("message from {} ({}): {}", sender, chat_id, text);

        match parser::parse_message(&text) {
            BotCmd::ToggleRoom(room_id) => self.handle_toggle(&chat_id, room_id).await,
            BotCmd::Help => self.notifier.send_message(&chat_id, messages::WELCOME).await,
            BotCmd::List => self.handle_list(&chat_id).await,
            BotCmd::Other(_) => {
                self.notifier
                    .send_message(&chat_id, messages::UNKNOWN_COMMAND)
                    .await
            }
        }
    }

    async fn handle_toggle(&self, chat_id: &str, room_id: &str) -> Result<()> {
        log::info!("room link detected, room id: {}", room_id);
        let reply = match self.subscriptions.toggle(chat_id, room_id).await {
            Ok(Toggle::Added(info)) => messages::toggle_added(&info),
            Ok(Toggle::Removed(info)) => messages::toggle_removed(&info),
            Err(err) => {
                log::error!("toggle failed for room {}: {}", room_id, err);
                messages::toggle_failed(&err)
            }
        };
        self.notifier.send_message(chat_id, &reply).await
    }

    async fn handle_list(&self, chat_id: &str) -> Result<()> {
        let reply = match self.subscriptions.list_for_subscriber(chat_id).await {
            Ok(rooms) => messages::subscription_list(&rooms),
            Err(err) => {
                log::error!("cannot list rooms for {}: {}", chat_id, err);
                messages::LIST_FAILED.to_string()
            }
        };
        self.notifier.send_message(chat_id, &reply).await
    }
}
