//! Telegram front-end of the post-authoring conversation.
//!
//! A long-poll loop turns updates into [`Interaction`]s. Each interaction runs
//! on its own task; tasks of one user are chained so they complete in arrival
//! order, while different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use telegram::models::{EditMessageText, ReplyMarkup, SendMessage, Update};
use telegram::{TelegramError, TelegramService};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domains::posts::conversation::{
    callback_data, parse_callback, CheckboxList, Controls, Conversation, Interaction, Reply,
    SelectionKind, CANCEL, CONTINUE, START_COMMAND,
};
use crate::kernel::UserId;

/// Sent to the user whenever handling an interaction fails.
pub const ERROR_TEXT: &str = "Something went wrong! Please try again.";

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// One update reduced to what the conversation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub user: UserId,
    pub chat_id: i64,
    pub interaction: Interaction,
    pub callback: Option<CallbackRef>,
}

/// The callback query to answer and the message its button sits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRef {
    pub id: String,
    pub message_id: Option<i64>,
}

impl Incoming {
    /// `None` for updates the bot does not react to.
    pub fn from_update(update: Update) -> Option<Self> {
        if let Some(message) = update.message {
            let user = message.from.as_ref()?.id;
            let text = message.text?;
            return Some(Self {
                user,
                chat_id: message.chat.id,
                interaction: interaction_for_text(text),
                callback: None,
            });
        }

        let query = update.callback_query?;
        let (kind, value) = parse_callback(query.data.as_deref()?)?;
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);

        Some(Self {
            user: query.from.id,
            chat_id,
            interaction: Interaction::Toggle { kind, value },
            callback: Some(CallbackRef {
                id: query.id,
                message_id: query.message.map(|m| m.message_id),
            }),
        })
    }
}

fn interaction_for_text(text: String) -> Interaction {
    // Commands may carry the bot name in groups: /create_post@poster_bot
    let command = text.split('@').next().unwrap_or_default().trim();
    if command == START_COMMAND {
        Interaction::Start
    } else {
        Interaction::Text(text)
    }
}

/// Reply keyboard for `controls`.
pub fn controls_markup(controls: Controls) -> ReplyMarkup {
    match controls {
        Controls::None => ReplyMarkup::remove(),
        Controls::Cancel => ReplyMarkup::reply_row([CANCEL.to_string()]),
        Controls::ContinueOrCancel => {
            ReplyMarkup::reply_row([CONTINUE.to_string(), CANCEL.to_string()])
        }
    }
}

/// Inline keyboard with one checkbox per row.
pub fn checkbox_markup(kind: SelectionKind, list: &CheckboxList) -> ReplyMarkup {
    ReplyMarkup::inline_column(
        list.items()
            .iter()
            .map(|item| (item.label(), callback_data(kind, &item.value))),
    )
}

#[derive(Clone)]
pub struct Bot {
    telegram: Arc<TelegramService>,
    conversation: Arc<Conversation>,
}

impl Bot {
    pub fn new(telegram: Arc<TelegramService>, conversation: Arc<Conversation>) -> Self {
        Self {
            telegram,
            conversation,
        }
    }

    /// Poll for updates until `shutdown` fires, then wait for in-flight
    /// interactions.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut offset: Option<i64> = None;
        let mut inflight: HashMap<UserId, JoinHandle<()>> = HashMap::new();

        info!("Telegram bot polling for updates");
        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.telegram.get_updates(offset) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Failed to poll Telegram updates");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                let Some(incoming) = Incoming::from_update(update) else {
                    continue;
                };

                let previous = inflight.remove(&incoming.user);
                let user = incoming.user;
                let bot = self.clone();
                let task = tokio::spawn(async move {
                    if let Some(previous) = previous {
                        let _ = previous.await;
                    }
                    bot.process(incoming).await;
                });
                inflight.insert(user, task);
            }

            inflight.retain(|_, task| !task.is_finished());
        }

        info!(pending = inflight.len(), "Telegram bot stopping");
        for (_, task) in inflight {
            let _ = task.await;
        }
    }

    async fn process(&self, incoming: Incoming) {
        let Incoming {
            user,
            chat_id,
            interaction,
            callback,
        } = incoming;

        let result = self.conversation.handle(user, interaction).await;

        if let Some(callback) = &callback {
            if let Err(e) = self.telegram.answer_callback_query(&callback.id).await {
                debug!(user, error = %e, "Failed to answer callback query");
            }
        }

        let replies = match result {
            Ok(replies) => replies,
            Err(e) => {
                error!(user, error = %e, "Failed to handle interaction");
                vec![Reply::text(ERROR_TEXT, Controls::None)]
            }
        };

        let edit_target = callback.and_then(|c| c.message_id);
        for reply in replies {
            if let Err(e) = self.send_reply(chat_id, edit_target, reply).await {
                warn!(user, error = %e, "Failed to send reply");
            }
        }
    }

    async fn send_reply(
        &self,
        chat_id: i64,
        edit_target: Option<i64>,
        reply: Reply,
    ) -> Result<(), TelegramError> {
        let (text, markup) = match reply {
            Reply::Text { text, controls } => (text, controls_markup(controls)),
            Reply::Checkboxes { text, kind, list } => (text, checkbox_markup(kind, &list)),
            Reply::RefreshCheckboxes { text, kind, list } => {
                let markup = checkbox_markup(kind, &list);
                if let Some(message_id) = edit_target {
                    return self
                        .telegram
                        .edit_message_text(&EditMessageText {
                            chat_id,
                            message_id,
                            text,
                            reply_markup: Some(markup),
                        })
                        .await;
                }
                (text, markup)
            }
        };

        self.telegram
            .send_message(&SendMessage {
                chat_id,
                text,
                parse_mode: None,
                reply_markup: Some(markup),
            })
            .await
            .map(|_| ())
    }
}
