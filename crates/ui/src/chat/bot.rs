use std::time::Duration;

use parlor_gateway::ChatId;
use snafu::{ResultExt, Snafu, ensure};
use uuid::Uuid;

const BOT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the acting user's id to the bot webhook.
pub const BOT_USER_HEADER: &str = "x-hasura-user-id";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BotError {
    #[snafu(display("failed to build bot http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("bot webhook request failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("bot webhook returned status {status} on `{stage}`"))]
    Status { stage: &'static str, status: u16 },
}

/// Fire-and-forget client for the bot reply webhook.
pub struct BotTrigger {
    http: reqwest::Client,
    webhook_url: String,
}

impl BotTrigger {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, BotError> {
        let http = reqwest::Client::builder()
            .timeout(BOT_REQUEST_TIMEOUT)
            .build()
            .context(BuildClientSnafu {
                stage: "build-bot-http-client",
            })?;

        Ok(Self {
            http,
            webhook_url: webhook_url.into(),
        })
    }

    /// Asks the bot to reply to `content` in `chat_id` on behalf of
    /// `user_id`. The caller decides what a failure means for the UI.
    pub async fn notify(
        &self,
        user_id: Uuid,
        chat_id: ChatId,
        content: &str,
    ) -> Result<(), BotError> {
        let stage = "notify-bot";
        let response = self
            .http
            .post(&self.webhook_url)
            .header(BOT_USER_HEADER, user_id.to_string())
            .json(&notify_payload(chat_id, content))
            .send()
            .await
            .context(TransportSnafu { stage })?;

        let status = response.status();
        ensure!(
            status.is_success(),
            StatusSnafu {
                stage,
                status: status.as_u16(),
            }
        );

        Ok(())
    }
}

pub(crate) fn notify_payload(chat_id: ChatId, content: &str) -> serde_json::Value {
    serde_json::json!({
        "input": {
            "chat_id": chat_id,
            "content": content,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_nests_chat_and_content_under_input() {
        let chat_id = ChatId::new(Uuid::new_v4());
        let payload = notify_payload(chat_id, "hello bot");

        assert_eq!(payload["input"]["chat_id"], serde_json::json!(chat_id));
        assert_eq!(payload["input"]["content"], "hello bot");
    }

    #[test]
    fn user_header_name_matches_the_gateway_convention() {
        assert_eq!(BOT_USER_HEADER, "x-hasura-user-id");
    }
}
