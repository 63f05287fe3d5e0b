//! Transport backed by a sidecar process that drives the messaging client.

mod client;
mod protocol;

pub use client::{BridgeOptions, BridgeTransport};
