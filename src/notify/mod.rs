//! Notification transports: `notify_chat`/`notify_mail`, best-effort sinks
//! that may fail and are logged but never fatal. The wire protocol, auth and
//! retry policy of a real chat/mail backend are out of scope; callers
//! configure a webhook URL per channel and get a plain JSON POST, which is
//! enough to make the daemon's expiry and next-user-handoff notifications
//! observable end to end.

use async_trait::async_trait;
use serde_json::json;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_chat(&self, user: &str, subject: &str, body: &str) -> Result<(), String>;
    async fn notify_mail(&self, from: &str, user: &str, subject: &str, body: &str) -> Result<(), String>;
}

/// Logs every notification at `info` and never fails. Used when no webhook is
/// configured, and in tests.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_chat(&self, user: &str, subject: &str, body: &str) -> Result<(), String> {
        log::info!("chat notification to {user}: {subject}: {body}");
        Ok(())
    }

    async fn notify_mail(&self, from: &str, user: &str, subject: &str, body: &str) -> Result<(), String> {
        log::info!("mail notification from {from} to {user}: {subject}: {body}");
        Ok(())
    }
}

/// Posts a JSON `{user, subject, body}` payload to configured webhook URLs.
/// Falls back to logging when a channel has no URL configured. A failed POST
/// is logged and swallowed, never returned as an error to the caller beyond
/// this function's own `Result`, which the background loops already treat as
/// best-effort.
pub struct WebhookNotifier {
    client: reqwest::Client,
    chat_webhook: Option<String>,
    mail_webhook: Option<String>,
}

impl WebhookNotifier {
    pub fn new(chat_webhook: Option<String>, mail_webhook: Option<String>) -> Self {
        WebhookNotifier { client: reqwest::Client::new(), chat_webhook, mail_webhook }
    }

    async fn post(&self, url: &str, payload: serde_json::Value) -> Result<(), String> {
        self.client.post(url).json(&payload).send().await.map_err(|e| e.to_string())?.error_for_status().map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_chat(&self, user: &str, subject: &str, body: &str) -> Result<(), String> {
        match &self.chat_webhook {
            Some(url) => self.post(url, json!({"user": user, "subject": subject, "body": body})).await,
            None => {
                log::info!("chat notification to {user} (no webhook configured): {subject}: {body}");
                Ok(())
            }
        }
    }

    async fn notify_mail(&self, from: &str, user: &str, subject: &str, body: &str) -> Result<(), String> {
        match &self.mail_webhook {
            Some(url) => self.post(url, json!({"from": from, "user": user, "subject": subject, "body": body})).await,
            None => {
                log::info!("mail notification from {from} to {user} (no webhook configured): {subject}: {body}");
                Ok(())
            }
        }
    }
}
