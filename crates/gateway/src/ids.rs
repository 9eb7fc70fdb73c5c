use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use uuid::Uuid;

use super::error::{GatewayError, GatewayResult, InvalidIdSnafu};

// Macro keeps all ID wrappers structurally identical, so wire handling stays predictable.
macro_rules! define_gateway_id {
    ($name:ident, $id_type:literal) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(raw: Uuid) -> Self {
                Self(raw)
            }

            pub fn parse(raw: &str) -> GatewayResult<Self> {
                let parsed = Uuid::parse_str(raw).context(InvalidIdSnafu {
                    stage: "parse-gateway-id",
                    id_type: $id_type,
                    raw: raw.to_string(),
                })?;
                Ok(Self(parsed))
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = GatewayError;

            fn from_str(raw: &str) -> GatewayResult<Self> {
                Self::parse(raw)
            }
        }
    };
}

define_gateway_id!(ChatId, "chat-id");
define_gateway_id!(MessageId, "message-id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_round_trips_through_serde_as_bare_uuid() {
        let id = ChatId::parse("7f8a6e9c-4f2a-4f6e-b6ce-16e3f2f3fa11").unwrap();
        let encoded = serde_json::to_string(&id).unwrap();
        assert_eq!(encoded, "\"7f8a6e9c-4f2a-4f6e-b6ce-16e3f2f3fa11\"");

        let decoded: ChatId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn malformed_id_is_rejected_with_raw_input() {
        let error = MessageId::parse("not-a-uuid").unwrap_err();
        assert!(error.to_string().contains("not-a-uuid"));
    }
}
