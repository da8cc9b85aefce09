//! Versioned payload and form encoding between master and slave.
//!
//! A remote delivery is an `application/x-www-form-urlencoded` POST with two
//! fields: `user` and `payload`. The payload is a JSON envelope
//! `{"version": 1, "actions": {...}}`. The slave answers with plain text whose
//! last line is exactly [`SUCCESS_MARKER`] when every action succeeded.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::actions::SlaveActions;
use crate::error::WireError;

pub const PAYLOAD_VERSION: u32 = 1;
pub const SUCCESS_MARKER: &str = "CONDUIT-SLAVE-OK";
pub const USER_FIELD: &str = "user";
pub const PAYLOAD_FIELD: &str = "payload";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    actions: SlaveActions,
}

/// A decoded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveRequest {
    pub user: String,
    pub actions: SlaveActions,
}

pub fn encode_payload(actions: &SlaveActions) -> Result<String, WireError> {
    let envelope = Envelope {
        version: PAYLOAD_VERSION,
        actions: actions.clone(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode an envelope. The version is checked before the actions are read so
/// a newer master gets a version error rather than a shape error.
pub fn decode_payload(payload: &str) -> Result<SlaveActions, WireError> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    let version = value
        .get("version")
        .ok_or(WireError::MissingField("version"))?
        .as_u64()
        .ok_or_else(|| WireError::Malformed("'version' must be a number".to_string()))?;
    if version != u64::from(PAYLOAD_VERSION) {
        return Err(WireError::UnsupportedVersion {
            found: u32::try_from(version).unwrap_or(u32::MAX),
            expected: PAYLOAD_VERSION,
        });
    }
    let actions = value
        .get("actions")
        .cloned()
        .ok_or(WireError::MissingField("actions"))?;
    Ok(serde_json::from_value(actions)?)
}

pub fn encode_form(user: &str, actions: &SlaveActions) -> Result<String, WireError> {
    let payload = encode_payload(actions)?;
    Ok(form_urlencoded::Serializer::new(String::new())
        .append_pair(USER_FIELD, user)
        .append_pair(PAYLOAD_FIELD, &payload)
        .finish())
}

pub fn decode_form(body: &[u8]) -> Result<SlaveRequest, WireError> {
    let mut user = None;
    let mut payload = None;
    for (key, value) in form_urlencoded::parse(body) {
        match key.as_ref() {
            USER_FIELD => user = Some(value.into_owned()),
            PAYLOAD_FIELD => payload = Some(value.into_owned()),
            _ => {}
        }
    }
    let user = user.ok_or(WireError::MissingField(USER_FIELD))?;
    if user.trim().is_empty() {
        return Err(WireError::Malformed("'user' must not be empty".to_string()));
    }
    let payload = payload.ok_or(WireError::MissingField(PAYLOAD_FIELD))?;
    Ok(SlaveRequest {
        user,
        actions: decode_payload(&payload)?,
    })
}

/// Whether a slave response reports success.
///
/// Only the terminator of the last line is ignored; the line itself must be
/// the bare marker.
pub fn is_success(body: &str) -> bool {
    body.lines().last() == Some(SUCCESS_MARKER)
}
