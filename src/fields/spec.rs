//! Persisted field specifications.
//!
//! A specification is stored as a base row in [`FIELD_TABLE`] tagged with a
//! `real_type`, plus one row in the variant table of that kind keyed by
//! `field_ptr`. [`FieldRecord`] holds a loaded base row and resolves the
//! concrete [`FieldSpec`] on demand.

use super::form_field::FormField;
use super::kind::FieldKind;
use crate::core::{Column, DataType, FormError, Result, Row, Value};
use crate::forms::owner::{OwnerKind, OwnerRef};
use crate::storage::{InMemoryStorage, TableSchema};
use crate::widgets::WidgetRegistry;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::OnceCell;

pub const FIELD_TABLE: &str = "memoforms_field";

pub fn field_base_schema() -> TableSchema {
    TableSchema::new(
        FIELD_TABLE,
        vec![
            Column::auto_id("id"),
            Column::new("name", DataType::Text).not_null(),
            Column::new("label", DataType::Text).not_null(),
            Column::new("help_text", DataType::Text),
            Column::new("required", DataType::Boolean)
                .not_null()
                .default_value(false),
            Column::new("widget", DataType::Text).not_null(),
            Column::new("order", DataType::Integer)
                .not_null()
                .default_value(0i64),
            Column::new("owner_kind", DataType::Text).not_null(),
            Column::new("owner_id", DataType::Integer).not_null(),
            Column::new("real_type", DataType::Text),
        ],
    )
}

/// Columns shared by every field kind.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBase {
    pub id: Option<u64>,
    pub name: String,
    pub label: String,
    pub help_text: Option<String>,
    pub required: bool,
    pub widget: String,
    pub order: i64,
    pub owner: Option<OwnerRef>,
    pub real_type: Option<FieldKind>,
}

impl FieldBase {
    pub(crate) fn to_values(&self) -> Result<HashMap<String, Value>> {
        let owner = self.owner.ok_or_else(|| {
            FormError::validation(format!("Field '{}' is not attached to a form", self.name))
        })?;

        let mut values = HashMap::new();
        values.insert("name".to_string(), Value::from(self.name.as_str()));
        values.insert("label".to_string(), Value::from(self.label.as_str()));
        values.insert("help_text".to_string(), Value::from(self.help_text.clone()));
        values.insert("required".to_string(), Value::Boolean(self.required));
        values.insert("widget".to_string(), Value::from(self.widget.as_str()));
        values.insert("order".to_string(), Value::Integer(self.order));
        values.insert("owner_kind".to_string(), Value::from(owner.kind.as_str()));
        values.insert("owner_id".to_string(), Value::Integer(owner.id as i64));
        values.insert(
            "real_type".to_string(),
            Value::from(self.real_type.map(|kind| kind.tag())),
        );
        Ok(values)
    }

    pub(crate) fn from_row(schema: &TableSchema, id: u64, row: &Row) -> Result<Self> {
        let text = |column: &str| -> Result<String> {
            Ok(schema.value(row, column)?.as_opt_string().unwrap_or_default())
        };

        let real_type = match schema.value(row, "real_type")? {
            Value::Text(tag) => Some(FieldKind::from_tag(tag).ok_or_else(|| {
                FormError::configuration(format!("Unknown field type '{}'", tag))
            })?),
            _ => None,
        };

        let owner_kind = text("owner_kind")?;
        let owner = OwnerKind::parse(&owner_kind)
            .zip(schema.value(row, "owner_id")?.as_i64())
            .map(|(kind, owner_id)| OwnerRef::new(kind, owner_id as u64));

        Ok(Self {
            id: Some(id),
            name: text("name")?,
            label: text("label")?,
            help_text: schema.value(row, "help_text")?.as_opt_string(),
            required: schema.value(row, "required")?.as_bool().unwrap_or(false),
            widget: text("widget")?,
            order: schema.value(row, "order")?.as_i64().unwrap_or(0),
            owner,
            real_type,
        })
    }
}

/// Kind-specific payload of a specification.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOptions {
    /// Pre-filled value for scalar kinds.
    Initial(Value),
    /// One choice per line.
    Choices(String),
    /// Table whose rows are offered.
    Related(String),
}

impl FieldOptions {
    fn empty_for(kind: FieldKind) -> Self {
        if kind.has_choices() {
            Self::Choices(String::new())
        } else if kind.is_relational() {
            Self::Related(String::new())
        } else {
            Self::Initial(Value::Null)
        }
    }

    fn fits(&self, kind: FieldKind) -> bool {
        match self {
            Self::Initial(value) => kind
                .initial_type()
                .is_some_and(|data_type| data_type.is_compatible(value)),
            Self::Choices(_) => kind.has_choices(),
            Self::Related(_) => kind.is_relational(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Initial(value) => value.clone(),
            Self::Choices(text) | Self::Related(text) => Value::from(text.as_str()),
        }
    }
}

/// A concrete field specification.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    base: FieldBase,
    kind: FieldKind,
    options: FieldOptions,
}

impl FieldSpec {
    /// New unsaved specification using the kind's default widget.
    pub fn new(kind: FieldKind, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            base: FieldBase {
                id: None,
                name: name.into(),
                label: label.into(),
                help_text: None,
                required: false,
                widget: kind.default_widget().to_string(),
                order: 0,
                owner: None,
                real_type: None,
            },
            kind,
            options: FieldOptions::empty_for(kind),
        }
    }

    pub fn help_text(mut self, help_text: impl Into<String>) -> Self {
        self.base.help_text = Some(help_text.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.base.required = required;
        self
    }

    pub fn widget(mut self, identifier: impl Into<String>) -> Self {
        self.base.widget = identifier.into();
        self
    }

    pub fn order(mut self, order: i64) -> Self {
        self.base.order = order;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.base.label = label.into();
        self
    }

    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.options = FieldOptions::Initial(value.into());
        self
    }

    pub fn choices(mut self, lines: impl Into<String>) -> Self {
        self.options = FieldOptions::Choices(lines.into());
        self
    }

    pub fn related_type(mut self, table: impl Into<String>) -> Self {
        self.options = FieldOptions::Related(table.into());
        self
    }

    pub(crate) fn attach(mut self, owner: OwnerRef) -> Self {
        self.base.owner = Some(owner);
        self
    }

    /// Marks the concrete kind; only rows without an id are stamped.
    pub(crate) fn stamp_real_type(&mut self) {
        if self.base.id.is_none() {
            self.base.real_type = Some(self.kind);
        }
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.base.id = Some(id);
    }

    pub fn base(&self) -> &FieldBase {
        &self.base
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn options(&self) -> &FieldOptions {
        &self.options
    }

    pub fn id(&self) -> Option<u64> {
        self.base.id
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn owner(&self) -> Option<OwnerRef> {
        self.base.owner
    }

    pub fn initial_value(&self) -> &Value {
        match &self.options {
            FieldOptions::Initial(value) => value,
            _ => &Value::Null,
        }
    }

    pub fn related_table(&self) -> Option<&str> {
        match &self.options {
            FieldOptions::Related(table) => Some(table),
            _ => None,
        }
    }

    /// Parsed `(value, label)` pairs of a choice kind.
    pub fn choice_pairs(&self) -> Vec<(String, String)> {
        match &self.options {
            FieldOptions::Choices(lines) => parse_choices(lines),
            _ => Vec::new(),
        }
    }

    /// Checks the invariants that do not need storage.
    pub fn validate(&self) -> Result<()> {
        let name = &self.base.name;
        if name.is_empty()
            || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || name.starts_with(|c: char| c.is_ascii_digit())
        {
            return Err(FormError::validation(format!(
                "'{}' is not a valid field name",
                name
            )));
        }
        if self.base.label.trim().is_empty() {
            return Err(FormError::validation(format!(
                "Field '{}' needs a label",
                name
            )));
        }
        if !self.kind.allows_widget(&self.base.widget) {
            return Err(FormError::validation(format!(
                "Widget '{}' is not allowed for a {}; choose one of: {}",
                self.base.widget,
                self.kind.verbose_name(),
                self.kind.widgets().join(", ")
            )));
        }
        if !self.options.fits(self.kind) {
            return Err(FormError::validation(format!(
                "Invalid initial data for {} '{}'",
                self.kind.verbose_name(),
                name
            )));
        }
        if let FieldOptions::Related(table) = &self.options
            && table.trim().is_empty()
        {
            return Err(FormError::validation(format!(
                "Field '{}' needs a related type",
                name
            )));
        }
        Ok(())
    }

    /// Variant row keyed by the base row id.
    pub(crate) fn variant_row(&self, field_ptr: u64) -> Row {
        vec![Value::Integer(field_ptr as i64), self.options.to_value()]
    }

    pub(crate) fn from_parts(base: FieldBase, kind: FieldKind, variant: &Row) -> Result<Self> {
        let payload = variant.get(1).ok_or_else(|| {
            FormError::TypeMismatch(format!("Malformed row in {}", kind.variant_table()))
        })?;

        let options = if kind.has_choices() {
            FieldOptions::Choices(payload.as_opt_string().unwrap_or_default())
        } else if kind.is_relational() {
            FieldOptions::Related(payload.as_opt_string().unwrap_or_default())
        } else {
            FieldOptions::Initial(payload.clone())
        };

        Ok(Self {
            base,
            kind,
            options,
        })
    }

    /// Builds the live form field this specification describes.
    pub async fn render(
        &self,
        widgets: &WidgetRegistry,
        storage: &InMemoryStorage,
    ) -> Result<FormField> {
        let widget = widgets.build(&self.base.widget)?;
        let choices = match &self.options {
            FieldOptions::Choices(lines) => parse_choices(lines),
            FieldOptions::Related(table) => related_choices(storage, table).await?,
            FieldOptions::Initial(_) => Vec::new(),
        };

        Ok(FormField {
            name: self.base.name.clone(),
            class: self.kind.field_class(),
            label: self.base.label.clone(),
            help_text: self.base.help_text.clone(),
            required: self.base.required,
            initial: self.initial_value().clone(),
            widget,
            choices,
        })
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.label)
    }
}

pub(crate) fn parse_choices(lines: &str) -> Vec<(String, String)> {
    lines
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| (line.to_string(), line.to_string()))
        .collect()
}

/// Every row of `table` as a `(id, display label)` pair.
pub(crate) async fn related_choices(
    storage: &InMemoryStorage,
    table: &str,
) -> Result<Vec<(String, String)>> {
    let schema = storage.get_schema(table).await?;
    Ok(storage
        .scan_table(table)
        .await?
        .into_iter()
        .map(|(id, row)| (id.to_string(), schema.display_row(id, &row)))
        .collect())
}

/// A loaded base row with a lazily resolved concrete specification.
#[derive(Debug)]
pub struct FieldRecord {
    base: FieldBase,
    specific: OnceCell<FieldSpec>,
}

impl FieldRecord {
    pub fn from_base(base: FieldBase) -> Self {
        Self {
            base,
            specific: OnceCell::new(),
        }
    }

    pub fn base(&self) -> &FieldBase {
        &self.base
    }

    pub fn is_resolved(&self) -> bool {
        self.specific.initialized()
    }

    /// The concrete specification, fetched from its variant table once.
    pub async fn specific(&self, storage: &InMemoryStorage) -> Result<&FieldSpec> {
        self.specific
            .get_or_try_init(|| async {
                let kind = self.base.real_type.ok_or_else(|| {
                    FormError::configuration(format!(
                        "Field '{}' has no stored real type",
                        self.base.name
                    ))
                })?;
                let id = self.base.id.ok_or_else(|| {
                    FormError::configuration(format!("Field '{}' was never saved", self.base.name))
                })?;
                let row = storage
                    .get_row(&kind.variant_table(), id)
                    .await?
                    .ok_or(FormError::NotFound {
                        kind: "field variant",
                        id,
                    })?;
                FieldSpec::from_parts(self.base.clone(), kind, &row)
            })
            .await
    }
}

impl From<FieldSpec> for FieldRecord {
    fn from(spec: FieldSpec) -> Self {
        Self {
            base: spec.base.clone(),
            specific: OnceCell::new_with(Some(spec)),
        }
    }
}
