//! One-line import surface for applications.

pub use crate::collections::{ModelList, ModelSet, RedisList, RedisSet};
pub use crate::connection::{Client, Connection, StoreConfig};
pub use crate::core::{Key, Result, RomError};
pub use crate::model::{Model, Reference, SaveOptions};
pub use crate::store::{MemoryStore, Store, Transaction};
pub use crate::{redis_model, scalar_field};
