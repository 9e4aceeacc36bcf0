//! filechat - terminal chat client and backend triad for an LLM-driven
//! file upload flow.
//!
//! The client side is built around a pure orchestrator state machine
//! (Elm Architecture pattern); the backend services are thin axum apps.

pub mod client;
pub mod config;
pub mod flowlog;
pub mod orchestrator;
pub mod runtime;
pub mod services;
pub mod tui;
