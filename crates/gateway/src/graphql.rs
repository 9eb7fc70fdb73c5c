use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, ensure};
use uuid::Uuid;

use crate::error::{
    BuildClientSnafu, DecodeResponseSnafu, GatewayResult, GraphqlErrorsSnafu, HttpStatusSnafu,
    MissingDataSnafu, TransportSnafu,
};
use crate::ids::ChatId;
use crate::types::{ChatRecord, MessageRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) const LIST_CHATS: &str = r#"
query GetChats($userId: uuid!) {
  chats(where: { user_id: { _eq: $userId } }, order_by: { created_at: desc }) {
    id
    title
    created_at
  }
}
"#;

pub(crate) const CREATE_CHAT: &str = r#"
mutation CreateChat($title: String!, $userId: uuid!) {
  insert_chats_one(object: { title: $title, user_id: $userId }) {
    id
    title
    created_at
  }
}
"#;

pub(crate) const DELETE_CHAT: &str = r#"
mutation DeleteChat($chatId: uuid!) {
  delete_chats_by_pk(id: $chatId) {
    id
  }
}
"#;

// The client never authors bot rows, so the flag is part of the document
// rather than a variable.
pub(crate) const SEND_MESSAGE: &str = r#"
mutation SendMessage($chatId: uuid!, $content: String!) {
  insert_messages_one(
    object: { chat_id: $chatId, content: $content, is_bot: false }
  ) {
    id
    content
    created_at
    is_bot
  }
}
"#;

/// GraphQL request/response client for chat and message operations.
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatsData {
    chats: Vec<ChatRecord>,
}

#[derive(Debug, Deserialize)]
struct CreateChatData {
    insert_chats_one: Option<ChatRecord>,
}

#[derive(Debug, Deserialize)]
struct DeleteChatData {
    delete_chats_by_pk: Option<DeletedChat>,
}

#[derive(Debug, Deserialize)]
struct DeletedChat {
    id: ChatId,
}

#[derive(Debug, Deserialize)]
struct SendMessageData {
    insert_messages_one: Option<MessageRecord>,
}

impl GraphqlClient {
    pub fn new(endpoint: impl Into<String>) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(BuildClientSnafu {
                stage: "build-gateway-http-client",
            })?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Lists every chat owned by `user_id`, newest first.
    pub async fn list_chats(
        &self,
        access_token: &str,
        user_id: Uuid,
    ) -> GatewayResult<Vec<ChatRecord>> {
        let stage = "list-chats";
        let data: ChatsData = self
            .execute(
                stage,
                access_token,
                LIST_CHATS,
                serde_json::json!({ "userId": user_id }),
            )
            .await?;
        Ok(data.chats)
    }

    pub async fn create_chat(
        &self,
        access_token: &str,
        user_id: Uuid,
        title: &str,
    ) -> GatewayResult<ChatRecord> {
        let stage = "create-chat";
        let data: CreateChatData = self
            .execute(
                stage,
                access_token,
                CREATE_CHAT,
                serde_json::json!({ "title": title, "userId": user_id }),
            )
            .await?;
        data.insert_chats_one.context(MissingDataSnafu { stage })
    }

    /// Deletes a chat; the gateway cascades its messages.
    pub async fn delete_chat(&self, access_token: &str, chat_id: ChatId) -> GatewayResult<ChatId> {
        let stage = "delete-chat";
        let data: DeleteChatData = self
            .execute(
                stage,
                access_token,
                DELETE_CHAT,
                serde_json::json!({ "chatId": chat_id }),
            )
            .await?;
        // Hasura returns null when row-level permissions hide the row.
        let deleted = data.delete_chats_by_pk.context(MissingDataSnafu { stage })?;
        Ok(deleted.id)
    }

    pub async fn send_message(
        &self,
        access_token: &str,
        chat_id: ChatId,
        content: &str,
    ) -> GatewayResult<MessageRecord> {
        let stage = "send-message";
        let data: SendMessageData = self
            .execute(
                stage,
                access_token,
                SEND_MESSAGE,
                serde_json::json!({ "chatId": chat_id, "content": content }),
            )
            .await?;
        data.insert_messages_one.context(MissingDataSnafu { stage })
    }

    async fn execute<V: Serialize, T: DeserializeOwned>(
        &self,
        stage: &'static str,
        access_token: &str,
        query: &str,
        variables: V,
    ) -> GatewayResult<T> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(access_token)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .context(TransportSnafu {
                stage,
                endpoint: self.endpoint.clone(),
            })?;

        let status = response.status();
        ensure!(
            status.is_success(),
            HttpStatusSnafu {
                stage,
                status: status.as_u16(),
            }
        );

        let envelope = response
            .json::<GraphqlResponse<T>>()
            .await
            .context(DecodeResponseSnafu { stage })?;

        if !envelope.errors.is_empty() {
            let message = envelope
                .errors
                .iter()
                .map(|entry| entry.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            tracing::warn!(stage, %message, "gateway returned graphql errors");
            return GraphqlErrorsSnafu { stage, message }.fail();
        }

        envelope.data.context(MissingDataSnafu { stage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_document_never_marks_rows_as_bot() {
        assert!(SEND_MESSAGE.contains("is_bot: false"));
        assert!(!SEND_MESSAGE.contains("$isBot"));
    }

    #[test]
    fn list_chats_document_filters_by_owner_and_orders_newest_first() {
        assert!(LIST_CHATS.contains("user_id: { _eq: $userId }"));
        assert!(LIST_CHATS.contains("order_by: { created_at: desc }"));
    }

    #[test]
    fn response_envelope_surfaces_graphql_errors() {
        let raw = r#"{
            "data": null,
            "errors": [
                { "message": "field 'chats' not found" },
                { "message": "permission denied" }
            ]
        }"#;

        let envelope: GraphqlResponse<ChatsData> = serde_json::from_str(raw).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors.len(), 2);
        assert_eq!(envelope.errors[1].message, "permission denied");
    }

    #[test]
    fn chats_data_decodes_record_fields() {
        let raw = r#"{
            "chats": [
                {
                    "id": "7f8a6e9c-4f2a-4f6e-b6ce-16e3f2f3fa11",
                    "title": "Plans",
                    "created_at": "2026-08-23T09:00:00Z"
                }
            ]
        }"#;

        let data: ChatsData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.chats.len(), 1);
        assert_eq!(data.chats[0].title, "Plans");
    }
}
