//! Object pooling.
//!
//! [`PooledObject`] is a single reusable slot, [`GenericPool`] layers a
//! lock-free hot cache over an overflow tier of such slots, and
//! [`PoolManager`] maps names to type-erased pools.

pub mod generic;
pub mod manager;
pub mod object;

pub use generic::{Factory, GenericPool, PoolStats, Pooled};
pub use manager::{ObjectPool, PoolManager};
pub use object::{Hook, PooledObject};
