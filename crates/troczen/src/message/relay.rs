// Copyright (c) 2025 TrocZen Developers
// Distributed under the MIT software license

//! Messages sent by relays, received by clients

use serde_json::{json, Value};

use super::{MessageHandleError, SubscriptionId};
use crate::event::{Event, EventId};

/// Messages sent by relays, received by clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// `["EVENT", <subscription_id>, <event JSON>]`
    Event {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Event
        event: Box<Event>,
    },
    /// `["OK", <event_id>, <true|false>, <message>]`
    Ok {
        /// Event ID
        event_id: EventId,
        /// Status
        status: bool,
        /// Message
        message: String,
    },
    /// `["EOSE", <subscription_id>]`
    EndOfStoredEvents(SubscriptionId),
    /// `["NOTICE", <message>]`
    Notice {
        /// Message
        message: String,
    },
    /// `["CLOSED", <subscription_id>, <message>]`
    Closed {
        /// Subscription ID
        subscription_id: SubscriptionId,
        /// Message
        message: String,
    },
    /// `["AUTH", <challenge-string>]`
    Auth {
        /// Challenge
        challenge: String,
    },
}

impl RelayMessage {
    /// New `EVENT` message
    #[inline]
    pub fn event(subscription_id: SubscriptionId, event: Event) -> Self {
        Self::Event {
            subscription_id,
            event: Box::new(event),
        }
    }

    /// New `EOSE` message
    #[inline]
    pub fn eose(subscription_id: SubscriptionId) -> Self {
        Self::EndOfStoredEvents(subscription_id)
    }

    /// New `NOTICE` message
    #[inline]
    pub fn notice<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Notice {
            message: message.into(),
        }
    }

    /// New `OK` message
    #[inline]
    pub fn ok<S>(event_id: EventId, status: bool, message: S) -> Self
    where
        S: Into<String>,
    {
        Self::Ok {
            event_id,
            status,
            message: message.into(),
        }
    }

    /// Serialize to the JSON array frame
    pub fn as_json(&self) -> String {
        self.as_value().to_string()
    }

    fn as_value(&self) -> Value {
        match self {
            Self::Event {
                subscription_id,
                event,
            } => json!(["EVENT", subscription_id, event]),
            Self::Ok {
                event_id,
                status,
                message,
            } => json!(["OK", event_id, status, message]),
            Self::EndOfStoredEvents(subscription_id) => json!(["EOSE", subscription_id]),
            Self::Notice { message } => json!(["NOTICE", message]),
            Self::Closed {
                subscription_id,
                message,
            } => json!(["CLOSED", subscription_id, message]),
            Self::Auth { challenge } => json!(["AUTH", challenge]),
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
                if array.len() != 3 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(array[1].clone())?;
                let event: Event = serde_json::from_value(array[2].clone())?;
                Ok(Self::event(subscription_id, event))
            }
            Some("OK") => {
                if array.len() != 4 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let event_id: EventId = serde_json::from_value(array[1].clone())?;
                let status: bool = array[2].as_bool().ok_or(MessageHandleError::InvalidMessage)?;
                let message: String = serde_json::from_value(array[3].clone())?;
                Ok(Self::Ok {
                    event_id,
                    status,
                    message,
                })
            }
            Some("EOSE") => {
                if array.len() != 2 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(array[1].clone())?;
                Ok(Self::EndOfStoredEvents(subscription_id))
            }
            Some("NOTICE") => {
                if array.len() != 2 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let message: String = serde_json::from_value(array[1].clone())?;
                Ok(Self::Notice { message })
            }
            Some("CLOSED") => {
                if array.len() != 3 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let subscription_id: SubscriptionId = serde_json::from_value(array[1].clone())?;
                let message: String = serde_json::from_value(array[2].clone())?;
                Ok(Self::Closed {
                    subscription_id,
                    message,
                })
            }
            Some("AUTH") => {
                if array.len() != 2 {
                    return Err(MessageHandleError::InvalidMessage);
                }
                let challenge: String = serde_json::from_value(array[1].clone())?;
                Ok(Self::Auth { challenge })
            }
            _ => Err(MessageHandleError::InvalidMessage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eose_roundtrip() {
        let msg = RelayMessage::eose(SubscriptionId::new("troczen-0"));
        assert_eq!(msg.as_json(), r#"["EOSE","troczen-0"]"#);
        assert_eq!(RelayMessage::from_json(msg.as_json()).unwrap(), msg);
    }

    #[test]
    fn test_notice() {
        let msg = RelayMessage::from_json(r#"["NOTICE","slow down"]"#).unwrap();
        assert_eq!(msg, RelayMessage::notice("slow down"));
    }

    #[test]
    fn test_ok() {
        let id = "2be17aa3031bdcb006f0fce80c146dea9c1c0268b0af2398bb673365c6444d45";
        let json = format!(r#"["OK","{id}",true,"duplicate: already have this event"]"#);
        let msg = RelayMessage::from_json(json).unwrap();
        match msg {
            RelayMessage::Ok {
                event_id, status, ..
            } => {
                assert_eq!(event_id.to_hex(), id);
                assert!(status);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_frame_is_an_error() {
        assert!(RelayMessage::from_json(r#"["COUNT","sub",{"count":5}]"#).is_err());
        assert!(RelayMessage::from_json(r#"{"not":"an array"}"#).is_err());
    }
}
