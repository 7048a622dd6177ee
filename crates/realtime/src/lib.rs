//! Real-time event delivery for LiveNest.
//!
//! [`Broadcaster`] fans events out to subscribers inside one process.
//! [`RedisPubSub`] carries events between server instances and hands what it
//! receives to the local broadcaster. Both implement
//! [`livenest_core::EventPublisher`], so services never know which one is in
//! use.

pub mod broadcaster;
pub mod pubsub;

pub use broadcaster::{Broadcaster, RealtimeEvent};
pub use pubsub::RedisPubSub;
