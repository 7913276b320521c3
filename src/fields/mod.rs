pub mod form_field;
pub mod kind;
pub mod spec;

pub use form_field::{FieldClass, FormField};
pub use kind::{FieldKind, resolve_variant};
pub use spec::{FIELD_TABLE, FieldBase, FieldOptions, FieldRecord, FieldSpec};
