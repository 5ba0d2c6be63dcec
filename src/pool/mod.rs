//! Pooled resource management
//!
//! The pool subsystem provides index-based identity with generation-tagged
//! reuse over a small fixed set of payload types. A [`PoolManager`] couples a
//! payload slot pool with a control-block slot pool and hands out RAII
//! [`StrongLease`]s (and, for weak-capable categories, [`WeakLease`]s); the
//! [`LeaseCategory`] chosen per payload type decides the ownership discipline.

pub mod block_vec;
pub mod category;
pub mod config;
pub mod control;
pub mod lease;
pub mod manager;
pub mod slot;

#[cfg(test)]
mod tests;

pub use block_vec::BlockVec;
pub use category::{LeaseCategory, Raw, Shared, SharedLeaseCategory, Unique, WeakShared, WeakableLeaseCategory};
pub use config::PoolConfig;
pub use control::ControlBlock;
pub use lease::{StrongLease, WeakLease};
pub use manager::{PoolManager, PoolSpec};
pub use slot::PayloadSlot;
