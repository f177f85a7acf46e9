//! Subscription system for live store updates.
//!
//! Stores broadcast every applied change (insert, update, delete including
//! cascaded deletes) to in-process subscribers. Subscriptions filter by
//! collection and owner and use bounded buffers; a subscriber that falls
//! behind is dropped rather than blocking writers.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::collection(Collection::HabitCompletions),
//!     ..Default::default()
//! });
//!
//! loop {
//!     match handle.recv() {
//!         Ok(StoreEvent::Updated { record }) => println!("count changed: {:?}", record),
//!         Ok(StoreEvent::Dropped { .. }) | Err(_) => break,
//!         Ok(_) => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
