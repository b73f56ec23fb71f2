// ============================================================================
// RustRomDb Library
// ============================================================================
//
// Asynchronous object mapper over a Redis-shaped key-value store. Models are
// declared with `redis_model!`, persisted as hashes (one hash per instance,
// nested sub-keys for collections), related to each other through lazy or
// eager references, and written through optimistically locked multi-key
// transactions.
//
// ```ignore
// use rustromdb::prelude::*;
//
// redis_model! {
//     pub struct Bar {
//         field1: i64,
//         field2: String,
//     }
// }
//
// # async fn demo() -> rustromdb::Result<()> {
// let client = Client::in_memory();
// let cx = client.connection();
//
// Bar::new("1", 123, "value".to_string())
//     .save(&cx, SaveOptions::default())
//     .await?;
// let bar = Bar::get(&cx, "1").await?;
// bar.update(&cx, SaveOptions::optimistic(), vec![BarChange::Field2("updated".into())])
//     .await?;
// # Ok(())
// # }
// ```

pub mod collections;
pub mod connection;
pub mod core;
pub mod model;
pub mod store;

mod macros;

pub mod prelude;

// Re-export main types for convenience
pub use crate::core::{Key, RedisValue, Result, RomError};

pub use connection::{Client, Connection, StoreConfig};

pub use store::{CommandBatch, MemoryStore, Store, StoreCommand, Transaction};

pub use model::{
    ElementKind, FieldContext, FieldDescriptor, FieldIo, FieldKind, FieldOptions, FieldWrite,
    Model, ModelSchema, ModelWrite, NestedCollectionWrite, NestedModelWrite, Reference,
    SaveOptions, ScalarValue, SchemaBuilder,
};

pub use collections::{
    ElementCodec, ModelElement, ModelList, ModelSet, RedisList, RedisSet, ScalarElement,
};

// Macro support: the declarative macros expand against these paths.
pub use async_trait::async_trait;
pub use paste;
pub use tokio;

#[doc(hidden)]
pub use model::serialize::{__read_scalar_field, __write_scalar_field};
