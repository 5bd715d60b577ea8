//! # Envelope Codec
//!
//! Stamps packets with a send time and maps them to and from text frames.
//! The timestamp sits beside the packet's own fields rather than nested, so
//! a frame reads as one flat object.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ProtocolError;

const TIMESTAMP_FIELD: &str = "timestamp";

/// A packet together with the time it was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<P> {
    pub packet: P,
    pub timestamp: DateTime<Utc>,
}

impl<P> Envelope<P> {
    /// Stamp `packet` with the current time.
    pub fn now(packet: P) -> Self {
        Self {
            packet,
            timestamp: Utc::now(),
        }
    }
}

impl<P: Serialize> Envelope<P> {
    /// Encode as a single JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut value = serde_json::to_value(&self.packet)?;
        let Value::Object(fields) = &mut value else {
            return Err(ProtocolError::NotAnObject);
        };
        fields.insert(
            TIMESTAMP_FIELD.to_string(),
            serde_json::to_value(self.timestamp)?,
        );
        Ok(serde_json::to_string(&value)?)
    }
}

impl<P: DeserializeOwned> Envelope<P> {
    /// Decode a text frame. A missing timestamp is taken as "now".
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        let timestamp = match fields.remove(TIMESTAMP_FIELD) {
            Some(raw) => serde_json::from_value(raw)?,
            None => Utc::now(),
        };
        let packet = serde_json::from_value(Value::Object(fields))?;
        Ok(Self { packet, timestamp })
    }
}
