//! WebSocket Session Management
//!
//! One WebSocket connection carries one report conversation:
//!
//! - `protocol`: the inbound JSON messages; outbound frames are core `Message`s.
//! - `session`: the connection lifecycle and dispatch of inbound messages.
//! - `cycle`: the "ReAct" (Reason-Act) chat turn, where the model may call the
//!   illustration tool.

mod cycle;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
