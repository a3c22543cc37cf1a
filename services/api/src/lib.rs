//! Motion API Library Crate
//!
//! This library contains the web service around the report workflow: the
//! application state, configuration, REST handlers, WebSocket protocol and
//! routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
