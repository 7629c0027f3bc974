// src/core/protocol/mod.rs

//! The wire protocol between a keeper and the monitor.
//!
//! spec.md §6 describes the real system's wire protocol as "every monitor
//! RPC is a Postgres function call over libpq". The core's contract only
//! depends on request/response *semantics* (§4.6's `MonitorClient`
//! contract), never on libpq framing, so this module substitutes a plain
//! length-prefixed `bincode` frame over TCP — the same "codec over a raw
//! stream" shape the teacher uses for its RESP protocol
//! (`tokio_util::codec::{Encoder, Decoder}`), just carrying our own message
//! types instead of RESP frames. See DESIGN.md for the rationale.

mod codec;
mod messages;

pub use codec::WireCodec;
pub use messages::{NodeObservation, RpcRequest, RpcResponse};
