pub mod error;
pub mod key;
pub mod value;

pub use error::{Result, RomError};
pub use key::Key;
pub use value::RedisValue;
