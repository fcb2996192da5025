/// OpenAPI document aggregation.
pub mod documentation;
/// Health reporting.
pub mod health_service;
/// Typed push-event constructors over the connection registry.
pub mod push_events;
/// Pure scoring engine invoked at round close.
pub mod scoring;
/// Public operations of the session state machine.
pub mod session_service;
/// Storage backend supervision and degraded-mode handling.
pub mod storage_supervisor;
/// WebSocket lifecycle for game clients.
pub mod websocket_service;
