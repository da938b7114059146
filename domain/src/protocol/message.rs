//! Protocol messages and their wire encoding
//!
//! Every message travels as one compact JSON object:
//!
//! ```text
//! {"type": "ready",        "robot_id": "r1"}
//! {"type": "proposal",     "robot_id": "r1", "proposal": "north"}
//! {"type": "start_voting"}
//! ```
//!
//! Decoding is strict about what the protocol needs (a known `type` and its
//! required, non-empty fields) and lenient about everything else (extra
//! fields are ignored).

use crate::core::identity::AgentId;
use crate::core::proposal::Proposal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TYPE_READY: &str = "ready";
const TYPE_PROPOSAL: &str = "proposal";
const TYPE_BEGIN: &str = "start_voting";

/// A message exchanged between agents and the barrier coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// The sender has reached the readiness barrier
    Ready { sender: AgentId },
    /// The sender's single proposal for this round
    Proposal { sender: AgentId, value: Proposal },
    /// Broadcast by the coordinator: the proposal phase may start
    Begin,
}

/// Why an inbound payload could not be turned into a [`ProtocolMessage`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("undecodable payload: {0}")]
    Undecodable(String),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("'{kind}' message is missing field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    robot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proposal: Option<String>,
}

impl ProtocolMessage {
    pub fn ready(sender: AgentId) -> Self {
        ProtocolMessage::Ready { sender }
    }

    pub fn proposal(sender: AgentId, value: Proposal) -> Self {
        ProtocolMessage::Proposal { sender, value }
    }

    /// Wire `type` tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolMessage::Ready { .. } => TYPE_READY,
            ProtocolMessage::Proposal { .. } => TYPE_PROPOSAL,
            ProtocolMessage::Begin => TYPE_BEGIN,
        }
    }

    /// Sender identity, if the message carries one
    pub fn sender(&self) -> Option<&AgentId> {
        match self {
            ProtocolMessage::Ready { sender } | ProtocolMessage::Proposal { sender, .. } => {
                Some(sender)
            }
            ProtocolMessage::Begin => None,
        }
    }

    /// Encode as a compact JSON object
    pub fn encode(&self) -> Vec<u8> {
        let wire = match self {
            ProtocolMessage::Ready { sender } => WireMessage {
                kind: TYPE_READY.to_string(),
                robot_id: Some(sender.to_string()),
                proposal: None,
            },
            ProtocolMessage::Proposal { sender, value } => WireMessage {
                kind: TYPE_PROPOSAL.to_string(),
                robot_id: Some(sender.to_string()),
                proposal: Some(value.to_string()),
            },
            ProtocolMessage::Begin => WireMessage {
                kind: TYPE_BEGIN.to_string(),
                robot_id: None,
                proposal: None,
            },
        };
        // A struct of strings always serializes
        serde_json::to_vec(&wire).unwrap_or_default()
    }

    /// Decode a payload received from the bus
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireMessage = serde_json::from_slice(payload)
            .map_err(|e| DecodeError::Undecodable(e.to_string()))?;

        match wire.kind.as_str() {
            TYPE_READY => Ok(ProtocolMessage::Ready {
                sender: required_sender(TYPE_READY, wire.robot_id)?,
            }),
            TYPE_PROPOSAL => {
                let sender = required_sender(TYPE_PROPOSAL, wire.robot_id)?;
                let value = non_empty(wire.proposal).ok_or(DecodeError::MissingField {
                    kind: TYPE_PROPOSAL,
                    field: "proposal",
                })?;
                Ok(ProtocolMessage::Proposal {
                    sender,
                    value: Proposal::new(value),
                })
            }
            TYPE_BEGIN => Ok(ProtocolMessage::Begin),
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

fn required_sender(kind: &'static str, robot_id: Option<String>) -> Result<AgentId, DecodeError> {
    non_empty(robot_id)
        .and_then(|id| AgentId::new(id).ok())
        .ok_or(DecodeError::MissingField {
            kind,
            field: "robot_id",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AgentId {
        AgentId::new(s).unwrap()
    }

    #[test]
    fn test_encode_matches_wire_schema() {
        let ready = ProtocolMessage::ready(id("r1")).encode();
        assert_eq!(
            String::from_utf8(ready).unwrap(),
            r#"{"type":"ready","robot_id":"r1"}"#
        );

        let proposal = ProtocolMessage::proposal(id("r2"), "x".into()).encode();
        assert_eq!(
            String::from_utf8(proposal).unwrap(),
            r#"{"type":"proposal","robot_id":"r2","proposal":"x"}"#
        );

        let begin = ProtocolMessage::Begin.encode();
        assert_eq!(String::from_utf8(begin).unwrap(), r#"{"type":"start_voting"}"#);
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let msg = ProtocolMessage::decode(br#"{"type":"ready","robot_id":"r9","ts":12}"#).unwrap();
        assert_eq!(msg, ProtocolMessage::ready(id("r9")));
    }

    #[test]
    fn test_decode_begin_without_payload() {
        let msg = ProtocolMessage::decode(br#"{"type":"start_voting"}"#).unwrap();
        assert_eq!(msg, ProtocolMessage::Begin);
        assert!(msg.sender().is_none());
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let err = ProtocolMessage::decode(b"\xff\xfe not json").unwrap_err();
        assert!(matches!(err, DecodeError::Undecodable(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let err = ProtocolMessage::decode(br#"{"type":"vote","robot_id":"r1"}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownType("vote".to_string()));
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let err = ProtocolMessage::decode(br#"{"type":"ready"}"#).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                kind: "ready",
                field: "robot_id"
            }
        );

        let err = ProtocolMessage::decode(br#"{"type":"proposal","robot_id":"r1"}"#).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                kind: "proposal",
                field: "proposal"
            }
        );

        // Empty strings are as good as missing
        let err =
            ProtocolMessage::decode(br#"{"type":"proposal","robot_id":"r1","proposal":""}"#)
                .unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { .. }));
    }

    #[test]
    fn test_decode_rejects_missing_type() {
        let err = ProtocolMessage::decode(br#"{"robot_id":"r1"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Undecodable(_)));
    }
}
