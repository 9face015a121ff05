//! Test doubles for driving an `amqp_wire` connection without a broker.
//!
//! [`ScriptedTransport`] replays canned server bytes and records what the
//! client writes. The [`wire`] builders lay out frames and method arguments
//! independently of the crate under test, and [`server`] assembles the
//! frames a broker sends during common exchanges.
//!
//! ```rust
//! use amqp_wire_testing::{ScriptedTransport, server};
//!
//! let mut transport = ScriptedTransport::new();
//! transport.push(server::connection_start(0, 9));
//! transport.push(server::connection_tune(2047, 4096, 60));
//! transport.push(server::connection_open_ok());
//! ```

pub mod server;
pub mod transport;
pub mod wire;

pub use transport::{ScriptedTransport, scripted};
pub use wire::{ArgBuilder, RawFrame, TableBuilder};
