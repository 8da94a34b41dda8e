//! Publish/subscribe event bus, the only inter-component channel.
//!
//! Payloads are the typed [`Event`] enum. Each variant is delivered on one
//! topic string from [`topics`], and subscribers register by topic.
//!
//! # Delivery rules
//!
//! - Synchronous: `emit` returns after every listener ran.
//! - Per-topic order equals registration order. No ordering across topics.
//! - A panicking listener is logged and skipped. Delivery continues.
//! - No queue, no priority, no wildcard topics.

mod bus;
mod event;

pub use bus::{
    BusStats, EventBus, EventRecord, Listener, Subscription, SubscriptionSet,
    DEFAULT_HISTORY_LIMIT,
};
pub use event::{topics, DragEvent, Event};
