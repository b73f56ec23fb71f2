pub mod codec;
pub mod list;
pub mod set;

pub use codec::{ElementCodec, ModelElement, ScalarElement};
pub use list::RedisList;
pub use set::RedisSet;

/// Set of models, cached by id until loaded.
pub type ModelSet<M> = RedisSet<M, ModelElement>;

/// List of models, cached by id until loaded.
pub type ModelList<M> = RedisList<M, ModelElement>;
