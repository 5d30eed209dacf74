//! `skyloop-middleware` – The Nervous System
//!
//! Routes asynchronous data between the flight tick, the perception loop and
//! whoever owns the world transform, without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
