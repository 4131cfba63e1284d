//! Per-variant adapters for declared sources (§4.11). Webhook sources have
//! no background task of their own; they're served by the reporter's HTTP
//! routes directly against the source registry.

pub mod polling;
pub mod stream;
pub mod webhook;
