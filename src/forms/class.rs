//! Synthesized form classes.

use super::bound::{BoundForm, FormData};
use super::definition::{FormDefinition, FormKind};
use super::owner::OwnerRef;
use crate::core::{FormError, Result, Value};
use crate::fields::spec::related_choices;
use crate::fields::{FormField, resolve_variant};
use crate::handlers::HandlerRecord;
use crate::storage::{InMemoryStorage, TableSchema};
use crate::widgets::WidgetRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A form type built from a stored definition.
#[derive(Debug)]
pub struct FormClass {
    name: String,
    owner: Option<OwnerRef>,
    model: Option<TableSchema>,
    fields: Vec<FormField>,
    initial: BTreeMap<String, Value>,
    handlers: Vec<Arc<HandlerRecord>>,
}

impl FormClass {
    /// A class with no fields and no handlers.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            model: None,
            fields: Vec::new(),
            initial: BTreeMap::new(),
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<OwnerRef> {
        self.owner
    }

    pub fn model(&self) -> Option<&TableSchema> {
        self.model.as_ref()
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    pub fn initial(&self) -> &BTreeMap<String, Value> {
        &self.initial
    }

    pub fn handlers(&self) -> &[Arc<HandlerRecord>] {
        &self.handlers
    }

    pub fn unbound(&self) -> BoundForm<'_> {
        BoundForm::new(self, None, None)
    }

    pub fn bind(&self, data: FormData) -> BoundForm<'_> {
        BoundForm::new(self, Some(data), None)
    }

    /// Binds a submission that edits an existing model instance.
    pub fn bind_instance(&self, data: FormData, instance_id: u64) -> BoundForm<'_> {
        BoundForm::new(self, Some(data), Some(instance_id))
    }

    /// Unbound HTML, pre-filled with the initial values.
    pub fn as_p(&self) -> String {
        self.unbound().as_p()
    }
}

/// Turns definitions into [`FormClass`]es.
pub struct FormClassBuilder<'a> {
    widgets: &'a WidgetRegistry,
    storage: &'a InMemoryStorage,
}

impl<'a> FormClassBuilder<'a> {
    pub fn new(widgets: &'a WidgetRegistry, storage: &'a InMemoryStorage) -> Self {
        Self { widgets, storage }
    }

    /// Builds the class. Reads related tables but never writes.
    pub async fn build(&self, definition: &FormDefinition) -> Result<FormClass> {
        let mut fields = Vec::with_capacity(definition.fields().len());

        for spec in definition.fields() {
            let mut field = spec.render(self.widgets, self.storage).await?;

            if let FormKind::ModelBound(model) = definition.kind() {
                let column = model.get_column(spec.name()).ok_or_else(|| {
                    FormError::configuration(format!(
                        "Field '{}' does not exist on model '{}'",
                        spec.name(),
                        model.name()
                    ))
                })?;

                field.required = column.is_required();
                // Choice kinds keep their own class and choices.
                if !spec.kind().has_choices()
                    && let Some(kind) = resolve_variant(column)
                {
                    field.class = kind.field_class();
                    if !spec.kind().is_relational()
                        && let Some(table) = column.data_type.related_table()
                    {
                        field.choices = related_choices(self.storage, table).await?;
                    }
                }
            }

            fields.push(field);
        }

        log::debug!(
            "Built {} with {} field(s) and {} handler(s)",
            definition.form_class_name(),
            fields.len(),
            definition.handlers().len()
        );

        Ok(FormClass {
            name: definition.form_class_name(),
            owner: Some(definition.owner()),
            model: definition.model().cloned(),
            fields,
            initial: definition.initial_data(),
            handlers: definition.handlers().to_vec(),
        })
    }
}
