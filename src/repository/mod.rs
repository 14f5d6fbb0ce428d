//! File-backed repositories for the farm, flock, and tracking stores.
//!
//! Each repository wraps one or more [`JsonStore`](crate::store::JsonStore)
//! files under a shared data directory and is the only owner of its
//! entities: creation goes through a factory method that assigns the id,
//! mutation through update methods, and every mutation is written through
//! to disk before returning.

pub mod farm;
pub mod flock;
pub mod tracking;

pub use farm::FarmRepository;
pub use flock::FlockRepository;
pub use tracking::TrackingRepository;

use uuid::Uuid;

/// Generate a prefixed unique entity id, e.g. `flock-6f9e...`.
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}
