//! Shared lock and collection types.
//!
//! Everything in the graph kernel goes through these aliases so the lock
//! implementation can be swapped in one place.

pub use parking_lot::{Mutex, MutexGuard, RwLock};

pub use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Weak,
};

pub use hashbrown::{HashMap, HashSet};
