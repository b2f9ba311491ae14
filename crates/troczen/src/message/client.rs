// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Messages sent by clients, received by relays

use serde_json::{json, Value};

use super::{MessageHandleError, SubscriptionId};
use crate::event::Event;
use crate::filter::Filter;

/// Messages sent by clients, received by relays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `["EVENT", <event JSON>]`
    Event(Box<Event>),
    /// `["REQ", <subscription_id>, <filter JSON>, ...]`
    Req {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Filters
        filters: Vec<Filter>,
    },
    /// `["CLOSE", <subscription_id>]`
    Close(SubscriptionId),
}

impl ClientMessage {
    /// New `EVENT` message
    #[inline]
    pub fn event(event: Event) -> Self {
        Self::Event(Box::new(event))
    }

    /// New `REQ` message
    #[inline]
    pub fn req(subscription_id: SubscriptionId, filters: Vec<Filter>) -> Self {
        Self::Req {
            subscription_id,
            filters,
        }
    }

    /// New `CLOSE` message
    #[inline]
    pub fn close(subscription_id: SubscriptionId) -> Self {
        Self::Close(subscription_id)
    }

    /// Serialize to the JSON array frame
    pub fn as_json(&self) -> String {
        self.as_value().to_string()
    }

    fn as_value(&self) -> Value {
        match self {
            Self::Event(event) => json!(["EVENT", event]),
            Self::Req {
                subscription_id,
                filters,
            } => {
                let mut frame = json!(["REQ", subscription_id]);
                let mut filters = json!(filters);

                if let Some(frame) = frame.as_array_mut() {
                    if let Some(filters) = filters.as_array_mut() {
                        frame.append(filters);
                    }
                }

                frame
            }
            Self::Close(subscription_id) => json!(["CLOSE", subscription_id]),
        }
    }

    /// Deserialize from a JSON array frame
    pub fn from_json<T>(json: T) -> Result<Self, MessageHandleError>
    where
        T: AsRef<[u8]>,
    {
        let value: Value = serde_json::from_slice(json.as_ref())?;
        Self::from_value(value)
    }

    /// Deserialize from a JSON array value
    pub fn from_value(value: Value) -> Result<Self, MessageHandleError> {
        let array = value
            .as_array()
            .ok_or(MessageHandleError::InvalidMessage)?;

        if array.is_empty() {
            return Err(MessageHandleError::InvalidMessage);
        }

        match array[0].as_str() {
            Some("EVENT") => {
                if array.len() != 2 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let event: Event = serde_json::from_value(array[1].clone())?;
                Ok(Self::event(event))
            }
            Some("REQ") => {
                if array.len() < 3 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(array[1].clone())?;
                let filters: Vec<Filter> = array[2..]
                    .iter()
                    .cloned()
                    .map(serde_json::from_value)
                    .collect::<Result<_, _>>()?;
                Ok(Self::req(subscription_id, filters))
            }
            Some("CLOSE") => {
                if array.len() != 2 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(array[1].clone())?;
                Ok(Self::close(subscription_id))
            }
            _ => Err(MessageHandleError::InvalidMessage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::event::Kind;

    #[test]
    fn test_req_serialization() {
        let filters = vec![
            Filter::new().kind(Kind::PermitAttestation).limit(0),
            Filter::new().custom_tag("market", "market_toulouse"),
        ];

        let msg = ClientMessage::req(SubscriptionId::new("test"), filters);
        assert_eq!(
            msg.as_json(),
            r##"["REQ","test",{"kinds":[30502],"limit":0},{"#market":["market_toulouse"]}]"##
        );
    }

    #[test]
    fn test_close_serialization() {
        let msg = ClientMessage::close(SubscriptionId::new("test"));
        assert_eq!(msg.as_json(), r#"["CLOSE","test"]"#);
    }

    #[test]
    fn test_req_roundtrip() {
        let msg = ClientMessage::req(
            SubscriptionId::new("sub"),
            vec![Filter::new().kind(Kind::Bond).limit(500)],
        );
        let back = ClientMessage::from_json(msg.as_json()).unwrap();
        assert_eq!(back, msg);
    }
}
