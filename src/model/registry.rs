use crate::core::{Result, RomError};
use crate::model::fields::{FieldDescriptor, FieldKind, FieldOptions};

/// The resolved descriptor table of one model type.
///
/// Built lazily, exactly once per type, inside the `schema()` the
/// `redis_model!` macro generates (a `OnceLock` per model struct), and
/// shared by every task thereafter. Declaration mistakes surface here, at
/// first access, not at save/get time.
#[derive(Debug)]
pub struct ModelSchema {
    model: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl ModelSchema {
    pub fn model(&self) -> &'static str {
        self.model
    }

    /// Descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn expect_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name)
            .ok_or_else(|| RomError::unknown_field(self.model, name))
    }
}

/// Accumulates field declarations and validates them as a whole.
pub struct SchemaBuilder {
    model: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            fields: Vec::new(),
        }
    }

    pub fn field(
        mut self,
        name: &'static str,
        kind: FieldKind,
        optional: bool,
        options: FieldOptions,
    ) -> Self {
        self.fields
            .push(FieldDescriptor::new(name, kind, optional, options));
        self
    }

    pub fn build(self) -> Result<ModelSchema> {
        for (index, field) in self.fields.iter().enumerate() {
            if field.name == "id" {
                return Err(RomError::config(format!(
                    "{}: 'id' is implicit and cannot be redeclared",
                    self.model
                )));
            }
            if self.fields[..index].iter().any(|f| f.name == field.name) {
                return Err(RomError::config(format!(
                    "{}: duplicate field '{}'",
                    self.model, field.name
                )));
            }
            if field.cascade() && !field.kind.references_models() {
                return Err(RomError::config(format!(
                    "{}.{}: cascade requires a model reference or model collection, not a {}",
                    self.model, field.name, field.kind
                )));
            }
            if field.eager() && field.kind == FieldKind::Primitive {
                return Err(RomError::config(format!(
                    "{}.{}: eager has no meaning on a primitive field",
                    self.model, field.name
                )));
            }
            if field.transient() && (field.cascade() || field.eager()) {
                return Err(RomError::config(format!(
                    "{}.{}: a transient field cannot be cascade or eager",
                    self.model, field.name
                )));
            }
            if field.has_default() && field.kind == FieldKind::Reference {
                return Err(RomError::config(format!(
                    "{}.{}: a reference field cannot declare a default",
                    self.model, field.name
                )));
            }
        }

        Ok(ModelSchema {
            model: self.model,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fields::ElementKind;

    #[test]
    fn test_valid_schema() {
        let schema = SchemaBuilder::new("bar")
            .field("field1", FieldKind::Primitive, false, FieldOptions::new())
            .field(
                "tags",
                FieldKind::Set(ElementKind::Scalar),
                false,
                FieldOptions::new().default(),
            )
            .build()
            .unwrap();
        assert_eq!(schema.fields().len(), 2);
        assert!(schema.field("tags").unwrap().has_default());
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn test_cascade_on_scalar_is_rejected() {
        let err = SchemaBuilder::new("bar")
            .field(
                "field1",
                FieldKind::Primitive,
                false,
                FieldOptions::new().cascade(),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, RomError::Config(_)));
    }

    #[test]
    fn test_eager_on_primitive_is_rejected() {
        assert!(
            SchemaBuilder::new("bar")
                .field(
                    "field1",
                    FieldKind::Primitive,
                    false,
                    FieldOptions::new().eager(),
                )
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_reserved_id_name_is_rejected() {
        assert!(
            SchemaBuilder::new("bar")
                .field("id", FieldKind::Primitive, false, FieldOptions::new())
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        assert!(
            SchemaBuilder::new("bar")
                .field("x", FieldKind::Primitive, false, FieldOptions::new())
                .field("x", FieldKind::Primitive, false, FieldOptions::new())
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_transient_cascade_conflict_is_rejected() {
        assert!(
            SchemaBuilder::new("bar")
                .field(
                    "other",
                    FieldKind::Reference,
                    false,
                    FieldOptions::new().transient().cascade(),
                )
                .build()
                .is_err()
        );
    }
}
