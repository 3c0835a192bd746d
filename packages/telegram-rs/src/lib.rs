// https://core.telegram.org/bots/api

pub mod models;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    AnswerCallbackQuery, ApiResponse, EditMessageText, GetUpdates, Message, SendMessage, Update,
};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("request to Telegram failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram returned an error ({code:?}): {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },

    #[error("Telegram returned ok without a result")]
    EmptyResult,
}

#[derive(Debug, Clone)]
pub struct TelegramOptions {
    pub token: String,
    pub api_url: String,
    /// Server-side long-poll wait for `getUpdates`.
    pub poll_timeout: Duration,
}

impl TelegramOptions {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            poll_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramService {
    options: TelegramOptions,
    client: Client,
}

impl TelegramService {
    pub fn new(options: TelegramOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{base}/bot{token}/{method}",
            base = self.options.api_url.trim_end_matches('/'),
            token = self.options.token,
        )
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;

        let envelope = response.json::<ApiResponse<T>>().await?;
        if !envelope.ok {
            let description = envelope.description.unwrap_or_default();
            warn!(method, code = ?envelope.error_code, %description, "Telegram API error");
            return Err(TelegramError::Api {
                code: envelope.error_code,
                description,
            });
        }

        envelope.result.ok_or(TelegramError::EmptyResult)
    }

    /// Long-poll for new updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdates {
            offset,
            timeout: self.options.poll_timeout.as_secs(),
            allowed_updates: vec!["message", "callback_query"],
        };
        self.call("getUpdates", &body).await
    }

    pub async fn send_message(&self, message: &SendMessage) -> Result<Message, TelegramError> {
        self.call("sendMessage", message).await
    }

    pub async fn edit_message_text(&self, edit: &EditMessageText) -> Result<(), TelegramError> {
        // Answers with the edited Message, or `true` for inline messages.
        let _: serde_json::Value = self.call("editMessageText", edit).await?;
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
    ) -> Result<(), TelegramError> {
        let _: bool = self
            .call("answerCallbackQuery", &AnswerCallbackQuery { callback_query_id })
            .await?;
        Ok(())
    }
}
