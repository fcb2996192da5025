use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Shared projection types (questions, progress, ranking rows).
pub mod common;
/// Request and response bodies of the game action surface.
pub mod game;
/// Health check payloads.
pub mod health;
/// Client-visible phase and status enums.
pub mod phase;
/// Validation helpers shared by request DTOs.
pub mod validation;
/// WebSocket envelopes, client messages, and push events.
pub mod ws;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
