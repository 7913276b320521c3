//! Form definitions: the owner of field and handler specifications.

use super::class::{FormClass, FormClassBuilder};
use super::owner::{OwnerKind, OwnerRef};
use crate::core::{FormError, Result, Value};
use crate::fields::FieldSpec;
use crate::handlers::HandlerRecord;
use crate::storage::{InMemoryStorage, TableSchema};
use crate::widgets::WidgetRegistry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    Free,
    /// Bound to the data model stored in the given table.
    ModelBound(TableSchema),
}

/// A loaded form definition with its fields resolved and its handlers
/// waiting to be resolved.
#[derive(Debug)]
pub struct FormDefinition {
    owner: OwnerRef,
    title: String,
    kind: FormKind,
    fields: Vec<FieldSpec>,
    handlers: Vec<Arc<HandlerRecord>>,
}

impl FormDefinition {
    pub fn new(owner: OwnerRef, title: impl Into<String>, kind: FormKind) -> Self {
        Self {
            owner,
            title: title.into(),
            kind,
            fields: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn free(id: u64, title: impl Into<String>) -> Self {
        Self::new(OwnerRef::form(id), title, FormKind::Free)
    }

    pub fn model_bound(id: u64, title: impl Into<String>, model: TableSchema) -> Self {
        Self::new(OwnerRef::model_form(id), title, FormKind::ModelBound(model))
    }

    /// Replaces the fields, keeping them sorted by `order`.
    pub fn with_fields(mut self, mut fields: Vec<FieldSpec>) -> Self {
        fields.sort_by_key(|field| (field.base().order, field.id()));
        self.fields = fields;
        self
    }

    /// Replaces the handlers, keeping them sorted by `order`.
    pub fn with_handlers(mut self, mut handlers: Vec<Arc<HandlerRecord>>) -> Self {
        handlers.sort_by_key(|record| (record.base().order, record.base().id));
        self.handlers = handlers;
        self
    }

    pub fn owner(&self) -> OwnerRef {
        self.owner
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> &FormKind {
        &self.kind
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn handlers(&self) -> &[Arc<HandlerRecord>] {
        &self.handlers
    }

    pub fn model(&self) -> Option<&TableSchema> {
        match &self.kind {
            FormKind::ModelBound(model) => Some(model),
            FormKind::Free => None,
        }
    }

    /// Name of the data model table, for model-bound forms.
    pub fn content_type(&self) -> Option<&str> {
        self.model().map(TableSchema::name)
    }

    fn require_model(&self) -> Result<&TableSchema> {
        self.model().ok_or_else(|| {
            FormError::configuration(format!(
                "Form '{}' is not bound to a data model",
                self.title
            ))
        })
    }

    pub fn used_field_names(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .map(|field| field.name().to_string())
            .collect()
    }

    /// Model columns that could still be added, with a readable label.
    ///
    /// Skips used names, the primary key and relational columns.
    pub fn suggested_model_field_choices(&self) -> Result<Vec<(String, String)>> {
        let model = self.require_model()?;
        let used = self.used_field_names();

        Ok(model
            .columns()
            .iter()
            .filter(|column| {
                !column.primary_key
                    && !column.data_type.is_relational()
                    && !used.contains(&column.name)
            })
            .map(|column| (column.name.clone(), column.name.replace('_', " ")))
            .collect())
    }

    /// Model columns a submission must supply, in declaration order.
    pub fn required_field_names(&self) -> Result<Vec<String>> {
        let model = self.require_model()?;
        Ok(model
            .columns()
            .iter()
            .filter(|column| column.is_required())
            .map(|column| column.name.clone())
            .collect())
    }

    /// Non-empty initial values keyed by field name.
    pub fn initial_data(&self) -> BTreeMap<String, Value> {
        self.fields
            .iter()
            .filter(|field| !field.initial_value().is_empty())
            .map(|field| (field.name().to_string(), field.initial_value().clone()))
            .collect()
    }

    /// `Form<Title>` or `ModelForm<Title>` with the title in CamelCase.
    pub fn form_class_name(&self) -> String {
        let prefix = match self.owner.kind {
            OwnerKind::Form => "Form",
            OwnerKind::ModelForm => "ModelForm",
        };
        let camel: String = self
            .title
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect();
        format!("{}{}", prefix, camel)
    }

    pub async fn build_form_class(
        &self,
        widgets: &WidgetRegistry,
        storage: &InMemoryStorage,
    ) -> Result<FormClass> {
        FormClassBuilder::new(widgets, storage).build(self).await
    }
}

impl fmt::Display for FormDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}
