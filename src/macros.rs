//! Macro definitions for model declaration.
//!
//! `redis_model!` turns a struct declaration into a full [`crate::Model`]
//! implementation: the struct itself (with an implicit `id` field), a
//! constructor, a `{Name}Change` enum consumed by `update`, and the
//! per-field serialization plumbing. `scalar_field!` wires a custom
//! [`crate::ScalarValue`] type into the field layer.

/// Implements [`crate::FieldIo`] for a type that implements
/// [`crate::ScalarValue`].
///
/// Use the `default` form when the type implements `Default`; it enables
/// `#[rom(default)]` handling (missing stored values decode to the default,
/// values equal to the default are omitted from serialization).
///
/// ```ignore
/// rustromdb::scalar_field!(MyWireType, default);
/// rustromdb::scalar_field!(MyOtherType);
/// ```
#[macro_export]
macro_rules! scalar_field {
    ($t:ty) => {
        #[$crate::async_trait]
        impl $crate::FieldIo for $t {
            const KIND: $crate::FieldKind = $crate::FieldKind::Primitive;

            fn write(
                &self,
                field: &$crate::FieldDescriptor,
            ) -> $crate::Result<$crate::FieldWrite> {
                $crate::__write_scalar_field(self, field, None)
            }

            async fn read(
                ctx: &$crate::FieldContext<'_>,
                raw: Option<&$crate::RedisValue>,
            ) -> $crate::Result<Self> {
                $crate::__read_scalar_field(ctx, raw)
            }
        }
    };
    ($t:ty, default) => {
        #[$crate::async_trait]
        impl $crate::FieldIo for $t {
            const KIND: $crate::FieldKind = $crate::FieldKind::Primitive;

            fn write(
                &self,
                field: &$crate::FieldDescriptor,
            ) -> $crate::Result<$crate::FieldWrite> {
                $crate::__write_scalar_field(
                    self,
                    field,
                    Some(&<$t as ::std::default::Default>::default()),
                )
            }

            async fn read(
                ctx: &$crate::FieldContext<'_>,
                raw: Option<&$crate::RedisValue>,
            ) -> $crate::Result<Self> {
                $crate::__read_scalar_field(ctx, raw)
            }

            fn default_value() -> Option<Self> {
                Some(<$t as ::std::default::Default>::default())
            }
        }
    };
}

/// Declares a persistent model.
///
/// Expands to the struct (an implicit `id: Key` first field is added), a
/// `new(id, fields…)` constructor, a `{Name}Change` enum with one variant
/// per field for [`crate::Model::update`], and the [`crate::Model`]
/// implementation. Field behavior is tuned with `#[rom(...)]` markers:
/// `transient`, `cascade`, `eager`, `default`.
///
/// ```ignore
/// redis_model! {
///     pub struct Bar {
///         field1: i64,
///         field2: String,
///         #[rom(default)]
///         tags: RedisSet<String>,
///         #[rom(cascade, eager)]
///         owner: Reference<Owner>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! redis_model {
    (
        $(#[$struct_meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[rom($($fopt:ident),+ $(,)?)])?
                $fname:ident : $fty:ty
            ),+ $(,)?
        }
    ) => {
        $crate::paste::paste! {
            $(#[$struct_meta])*
            #[derive(Clone, Debug, PartialEq)]
            $vis struct $name {
                pub id: $crate::Key,
                $( pub $fname : $fty, )+
            }

            impl $name {
                pub fn new(id: impl Into<$crate::Key>, $($fname: $fty),+) -> Self {
                    Self {
                        id: id.into(),
                        $( $fname, )+
                    }
                }
            }

            /// One pending field assignment, consumed by `update`.
            #[derive(Clone, Debug)]
            $vis enum [<$name Change>] {
                $( [<$fname:camel>]($fty), )+
            }

            #[$crate::async_trait]
            impl $crate::Model for $name {
                type Change = [<$name Change>];

                fn model_name() -> &'static str {
                    static NAME: ::std::sync::OnceLock<String> = ::std::sync::OnceLock::new();
                    NAME.get_or_init(|| stringify!($name).to_ascii_lowercase())
                }

                fn schema() -> &'static $crate::ModelSchema {
                    static SCHEMA: ::std::sync::OnceLock<$crate::ModelSchema> =
                        ::std::sync::OnceLock::new();
                    SCHEMA.get_or_init(|| {
                        $crate::SchemaBuilder::new(<Self as $crate::Model>::model_name())
                            $(
                                .field(
                                    stringify!($fname),
                                    <$fty as $crate::FieldIo>::KIND,
                                    <$fty as $crate::FieldIo>::OPTIONAL,
                                    $crate::FieldOptions::new()$($(.$fopt())+)?,
                                )
                            )+
                            .build()
                            .unwrap_or_else(|err| {
                                panic!("invalid model `{}`: {}", stringify!($name), err)
                            })
                    })
                }

                fn id(&self) -> &$crate::Key {
                    &self.id
                }

                fn write_field(&self, name: &str) -> $crate::Result<$crate::FieldWrite> {
                    let schema = <Self as $crate::Model>::schema();
                    match name {
                        $(
                            stringify!($fname) => {
                                let field = schema.expect_field(stringify!($fname))?;
                                <$fty as $crate::FieldIo>::write(&self.$fname, field)
                            }
                        )+
                        other => Err($crate::RomError::unknown_field(
                            <Self as $crate::Model>::model_name(),
                            other,
                        )),
                    }
                }

                async fn read_row(
                    cx: &$crate::Connection,
                    id: &$crate::Key,
                    row: &::std::collections::HashMap<String, $crate::RedisValue>,
                ) -> $crate::Result<Self> {
                    let schema = <Self as $crate::Model>::schema();
                    let db_key = $crate::Key::namespaced(
                        <Self as $crate::Model>::model_name(),
                        id,
                    );
                    let ($($fname,)+) = $crate::tokio::try_join!(
                        $(
                            async {
                                let field = schema.expect_field(stringify!($fname))?;
                                if field.transient() {
                                    return <$fty as $crate::FieldIo>::default_value()
                                        .ok_or($crate::RomError::MissingField {
                                            model: <Self as $crate::Model>::model_name(),
                                            field: stringify!($fname),
                                        });
                                }
                                let ctx = $crate::FieldContext {
                                    cx,
                                    model: <Self as $crate::Model>::model_name(),
                                    field,
                                    nested_key: db_key.join(stringify!($fname)),
                                };
                                <$fty as $crate::FieldIo>::read(&ctx, row.get(stringify!($fname)))
                                    .await
                            }
                        ),+
                    )?;
                    Ok(Self {
                        id: id.clone(),
                        $( $fname, )+
                    })
                }

                fn apply_change(&mut self, change: Self::Change) {
                    match change {
                        $(
                            [<$name Change>]::[<$fname:camel>](value) => {
                                self.$fname = value;
                            }
                        )+
                    }
                }

                fn change_target(change: &Self::Change) -> &'static str {
                    match change {
                        $(
                            [<$name Change>]::[<$fname:camel>](_) => stringify!($fname),
                        )+
                    }
                }
            }
        }
    };
}
