//! Create, update and delete operations on stored definitions.

use crate::core::{FormError, Result, Value};
use crate::fields::spec::field_base_schema;
use crate::fields::{FIELD_TABLE, FieldBase, FieldKind, FieldRecord, FieldSpec};
use crate::forms::definition::{FormDefinition, FormKind};
use crate::forms::owner::{OwnerKind, OwnerRef};
use crate::handlers::{
    HANDLER_TABLE, HandlerBase, HandlerKind, HandlerRecord, HandlerSpec, handler_base_schema,
};
use crate::storage::{InMemoryStorage, TableSchema};
use crate::widgets::WidgetRegistry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const RESERVED_PREFIX: &str = "memoforms_";

/// One row of the form listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSummary {
    pub owner: OwnerRef,
    pub title: String,
    pub content_type: Option<String>,
}

impl fmt::Display for FormSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content_type {
            Some(content_type) => write!(f, "{} {} [{}]", self.owner, self.title, content_type),
            None => write!(f, "{} {}", self.owner, self.title),
        }
    }
}

/// Persists forms, field specifications and handler specifications.
#[derive(Debug, Clone)]
pub struct FormRepository {
    storage: Arc<InMemoryStorage>,
    widgets: Arc<WidgetRegistry>,
}

impl FormRepository {
    pub fn new(storage: Arc<InMemoryStorage>, widgets: Arc<WidgetRegistry>) -> Self {
        Self { storage, widgets }
    }

    pub fn storage(&self) -> &InMemoryStorage {
        &self.storage
    }

    /// Creates every definition table that does not exist yet.
    pub async fn bootstrap(&self) -> Result<()> {
        let mut schemas = vec![
            OwnerKind::Form.schema(),
            OwnerKind::ModelForm.schema(),
            field_base_schema(),
            handler_base_schema(),
        ];
        schemas.extend(FieldKind::ALL.iter().map(|kind| kind.variant_schema()));
        schemas.extend(HandlerKind::ALL.iter().map(|kind| kind.variant_schema()));

        for schema in schemas {
            self.storage.ensure_table(schema).await?;
        }
        Ok(())
    }

    /// Makes a host data model available to model-bound forms.
    pub async fn register_model(&self, schema: TableSchema) -> Result<()> {
        if schema.name().starts_with(RESERVED_PREFIX) {
            return Err(FormError::configuration(format!(
                "Model name '{}' uses the reserved prefix '{}'",
                schema.name(),
                RESERVED_PREFIX
            )));
        }
        if schema.schema().primary_key().is_none() {
            return Err(FormError::configuration(format!(
                "Model '{}' has no primary key",
                schema.name()
            )));
        }
        let name = schema.name().to_string();
        self.storage.create_table(schema).await?;
        log::info!("Registered data model '{}'", name);
        Ok(())
    }

    pub async fn create_form(&self, title: &str) -> Result<OwnerRef> {
        let title = check_title(title)?;
        let mut values = HashMap::new();
        values.insert("title".to_string(), Value::from(title));

        let id = self
            .storage
            .insert_values(OwnerKind::Form.table_name(), &values)
            .await?;
        log::info!("Created form {} '{}'", id, title);
        Ok(OwnerRef::form(id))
    }

    pub async fn create_model_form(&self, title: &str, content_type: &str) -> Result<OwnerRef> {
        let title = check_title(title)?;
        if content_type.starts_with(RESERVED_PREFIX) || !self.storage.table_exists(content_type).await {
            return Err(FormError::validation(format!(
                "'{}' is not a registered data model",
                content_type
            )));
        }

        let mut values = HashMap::new();
        values.insert("title".to_string(), Value::from(title));
        values.insert("content_type".to_string(), Value::from(content_type));

        let id = self
            .storage
            .insert_values(OwnerKind::ModelForm.table_name(), &values)
            .await?;
        log::info!("Created model form {} '{}' for {}", id, title, content_type);
        Ok(OwnerRef::model_form(id))
    }

    /// Changes the title; the data model of a model form never changes.
    pub async fn rename_form(&self, owner: OwnerRef, title: &str) -> Result<()> {
        let title = check_title(title)?;
        let mut values = HashMap::new();
        values.insert("title".to_string(), Value::from(title));

        if !self
            .storage
            .update_values(owner.kind.table_name(), owner.id, &values)
            .await?
        {
            return Err(FormError::NotFound {
                kind: "form",
                id: owner.id,
            });
        }
        Ok(())
    }

    /// Deletes the form with all of its fields and handlers.
    pub async fn delete_form(&self, owner: OwnerRef) -> Result<()> {
        self.form_row(owner).await?;

        for record in self.field_records(owner).await? {
            if let Some(id) = record.base().id {
                self.delete_field_rows(id, record.base().real_type).await?;
            }
        }
        for record in self.handler_records(owner).await? {
            if let Some(id) = record.base().id {
                self.delete_handler_rows(id, record.base().real_type).await?;
            }
        }

        self.storage
            .delete_row(owner.kind.table_name(), owner.id)
            .await?;
        log::info!("Deleted form {}", owner);
        Ok(())
    }

    pub async fn list_forms(&self) -> Result<Vec<FormSummary>> {
        let mut forms = Vec::new();
        for kind in [OwnerKind::Form, OwnerKind::ModelForm] {
            let schema = kind.schema();
            for (id, row) in self.storage.scan_table(kind.table_name()).await? {
                forms.push(FormSummary {
                    owner: OwnerRef::new(kind, id),
                    title: schema.value(&row, "title")?.to_string(),
                    content_type: match kind {
                        OwnerKind::Form => None,
                        OwnerKind::ModelForm => schema.value(&row, "content_type")?.as_opt_string(),
                    },
                });
            }
        }
        Ok(forms)
    }

    async fn form_row(&self, owner: OwnerRef) -> Result<(String, Option<String>)> {
        let row = self
            .storage
            .get_row(owner.kind.table_name(), owner.id)
            .await?
            .ok_or(FormError::NotFound {
                kind: "form",
                id: owner.id,
            })?;
        let schema = owner.kind.schema();
        let title = schema.value(&row, "title")?.to_string();
        let content_type = match owner.kind {
            OwnerKind::Form => None,
            OwnerKind::ModelForm => schema.value(&row, "content_type")?.as_opt_string(),
        };
        Ok((title, content_type))
    }

    /// Loads a definition: fields resolved eagerly, handlers on first use.
    pub async fn load_form(&self, owner: OwnerRef) -> Result<FormDefinition> {
        let (title, content_type) = self.form_row(owner).await?;
        let kind = match content_type {
            None => FormKind::Free,
            Some(content_type) => {
                FormKind::ModelBound(self.storage.get_schema(&content_type).await?)
            }
        };

        let mut fields = Vec::new();
        for record in self.field_records(owner).await? {
            fields.push(record.specific(&self.storage).await?.clone());
        }
        let handlers = self
            .handler_records(owner)
            .await?
            .into_iter()
            .map(Arc::new)
            .collect();

        Ok(FormDefinition::new(owner, title, kind)
            .with_fields(fields)
            .with_handlers(handlers))
    }

    /// Base rows of the form's fields, by order.
    pub async fn field_records(&self, owner: OwnerRef) -> Result<Vec<FieldRecord>> {
        let schema = field_base_schema();
        let mut records = Vec::new();
        for (id, row) in self
            .storage
            .scan_where(FIELD_TABLE, &owner_filter(owner))
            .await?
        {
            records.push(FieldRecord::from_base(FieldBase::from_row(&schema, id, &row)?));
        }
        records.sort_by_key(|record| (record.base().order, record.base().id));
        Ok(records)
    }

    pub async fn field_record(&self, id: u64) -> Result<FieldRecord> {
        let row = self
            .storage
            .get_row(FIELD_TABLE, id)
            .await?
            .ok_or(FormError::NotFound { kind: "field", id })?;
        Ok(FieldRecord::from_base(FieldBase::from_row(
            &field_base_schema(),
            id,
            &row,
        )?))
    }

    async fn check_field(&self, owner: OwnerRef, spec: &FieldSpec, id: Option<u64>) -> Result<()> {
        spec.validate()?;
        if !self.widgets.contains(&spec.base().widget) {
            return Err(FormError::configuration(format!(
                "Unknown widget '{}'",
                spec.base().widget
            )));
        }
        if let (_, Some(content_type)) = self.form_row(owner).await? {
            let model = self.storage.get_schema(&content_type).await?;
            if model.get_column(spec.name()).is_none() {
                return Err(FormError::validation(format!(
                    "Field '{}' does not exist on model '{}'",
                    spec.name(),
                    content_type
                )));
            }
        }
        if let Some(table) = spec.related_table()
            && !self.storage.table_exists(table).await
        {
            return Err(FormError::validation(format!(
                "'{}' is not a registered data model",
                table
            )));
        }

        for record in self.field_records(owner).await? {
            let other = record.base();
            if other.id == id {
                continue;
            }
            if other.name == spec.name() {
                return Err(FormError::validation(format!(
                    "A field named '{}' already exists on this form",
                    spec.name()
                )));
            }
            if other.order == spec.base().order {
                return Err(FormError::validation(format!(
                    "Order {} is already used by field '{}'",
                    other.order, other.name
                )));
            }
        }
        Ok(())
    }

    /// Stores a new field on the form and returns it with its id.
    pub async fn add_field(&self, owner: OwnerRef, spec: FieldSpec) -> Result<FieldSpec> {
        self.form_row(owner).await?;
        if spec.id().is_some() {
            return Err(FormError::validation(format!(
                "Field '{}' is already stored",
                spec.name()
            )));
        }
        self.check_field(owner, &spec, None).await?;

        let mut spec = spec.attach(owner);
        spec.stamp_real_type();
        let id = self
            .storage
            .insert_values(FIELD_TABLE, &spec.base().to_values()?)
            .await?;
        spec.assign_id(id);
        self.storage
            .insert_row(&spec.kind().variant_table(), spec.variant_row(id))
            .await?;

        log::info!(
            "Added {} '{}' to {}",
            spec.kind().verbose_name(),
            spec.name(),
            owner
        );
        Ok(spec)
    }

    /// Replaces the editable parts of a stored field: label, help text,
    /// required flag, widget, order and initial data.
    pub async fn update_field(&self, id: u64, spec: FieldSpec) -> Result<FieldSpec> {
        let record = self.field_record(id).await?;
        let stored = record.specific(&self.storage).await?;
        let owner = stored.owner().ok_or_else(|| {
            FormError::configuration(format!("Field {} has no owner", id))
        })?;

        if spec.kind() != stored.kind() {
            return Err(FormError::validation(format!(
                "Field '{}' is a {} and cannot become a {}",
                stored.name(),
                stored.kind().verbose_name(),
                spec.kind().verbose_name()
            )));
        }
        if spec.name() != stored.name() {
            return Err(FormError::validation(format!(
                "Field '{}' cannot be renamed",
                stored.name()
            )));
        }
        if spec.owner().is_some_and(|other| other != owner) {
            return Err(FormError::validation(format!(
                "Field '{}' cannot move to another form",
                stored.name()
            )));
        }
        self.check_field(owner, &spec, Some(id)).await?;

        let mut spec = spec.attach(owner);
        spec.stamp_real_type();
        spec.assign_id(id);
        self.storage
            .update_values(FIELD_TABLE, id, &spec.base().to_values()?)
            .await?;
        self.storage
            .update_row(&spec.kind().variant_table(), id, spec.variant_row(id))
            .await?;

        log::debug!("Updated field {} '{}'", id, spec.name());
        Ok(spec)
    }

    pub async fn remove_field(&self, id: u64) -> Result<()> {
        let record = self.field_record(id).await?;
        self.delete_field_rows(id, record.base().real_type).await?;
        log::info!("Removed field {} '{}'", id, record.base().name);
        Ok(())
    }

    async fn delete_field_rows(&self, id: u64, kind: Option<FieldKind>) -> Result<()> {
        if let Some(kind) = kind {
            self.storage.delete_row(&kind.variant_table(), id).await?;
        }
        self.storage.delete_row(FIELD_TABLE, id).await?;
        Ok(())
    }

    /// Base rows of the form's handlers, by order.
    pub async fn handler_records(&self, owner: OwnerRef) -> Result<Vec<HandlerRecord>> {
        let schema = handler_base_schema();
        let mut records = Vec::new();
        for (id, row) in self
            .storage
            .scan_where(HANDLER_TABLE, &owner_filter(owner))
            .await?
        {
            records.push(HandlerRecord::from_base(HandlerBase::from_row(
                &schema, id, &row,
            )?));
        }
        records.sort_by_key(|record| (record.base().order, record.base().id));
        Ok(records)
    }

    pub async fn handler_record(&self, id: u64) -> Result<HandlerRecord> {
        let row = self
            .storage
            .get_row(HANDLER_TABLE, id)
            .await?
            .ok_or(FormError::NotFound {
                kind: "handler",
                id,
            })?;
        Ok(HandlerRecord::from_base(HandlerBase::from_row(
            &handler_base_schema(),
            id,
            &row,
        )?))
    }

    async fn check_handler_order(&self, owner: OwnerRef, spec: &HandlerSpec, id: Option<u64>) -> Result<()> {
        for record in self.handler_records(owner).await? {
            let other = record.base();
            if other.id != id && other.order == spec.base().order {
                return Err(FormError::validation(format!(
                    "Order {} is already used by handler '{}'",
                    other.order, other.name
                )));
            }
        }
        Ok(())
    }

    /// Cleans the handler against its form, then stores it.
    pub async fn add_handler(&self, owner: OwnerRef, spec: HandlerSpec) -> Result<HandlerSpec> {
        let definition = self.load_form(owner).await?;
        spec.clean(&definition)?;
        self.check_handler_order(owner, &spec, None).await?;

        let mut spec = spec.attach(owner);
        spec.stamp_real_type();
        let id = self
            .storage
            .insert_values(HANDLER_TABLE, &spec.base().to_values()?)
            .await?;
        spec.assign_id(id);
        self.storage
            .insert_row(&spec.kind().variant_table(), spec.variant_row(id))
            .await?;

        log::info!(
            "Added {} '{}' to {}",
            spec.kind().verbose_name(),
            spec.name(),
            owner
        );
        Ok(spec)
    }

    /// Replaces name, order and configuration of a stored handler.
    pub async fn update_handler(&self, id: u64, spec: HandlerSpec) -> Result<HandlerSpec> {
        let record = self.handler_record(id).await?;
        let stored = record.specific(&self.storage).await?;
        let owner = stored.base().owner.ok_or_else(|| {
            FormError::configuration(format!("Handler {} has no owner", id))
        })?;
        if spec.kind() != stored.kind() {
            return Err(FormError::validation(format!(
                "Handler '{}' is a {} and cannot become a {}",
                stored.name(),
                stored.kind().verbose_name(),
                spec.kind().verbose_name()
            )));
        }

        let definition = self.load_form(owner).await?;
        spec.clean(&definition)?;
        self.check_handler_order(owner, &spec, Some(id)).await?;

        let mut spec = spec.attach(owner);
        spec.stamp_real_type();
        spec.assign_id(id);
        self.storage
            .update_values(HANDLER_TABLE, id, &spec.base().to_values()?)
            .await?;
        self.storage
            .update_row(&spec.kind().variant_table(), id, spec.variant_row(id))
            .await?;

        log::debug!("Updated handler {} '{}'", id, spec.name());
        Ok(spec)
    }

    pub async fn remove_handler(&self, id: u64) -> Result<()> {
        let record = self.handler_record(id).await?;
        self.delete_handler_rows(id, record.base().real_type).await?;
        log::info!("Removed handler {} '{}'", id, record.base().name);
        Ok(())
    }

    async fn delete_handler_rows(&self, id: u64, kind: Option<HandlerKind>) -> Result<()> {
        if let Some(kind) = kind {
            self.storage.delete_row(&kind.variant_table(), id).await?;
        }
        self.storage.delete_row(HANDLER_TABLE, id).await?;
        Ok(())
    }
}

fn check_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(FormError::validation("Forms need a title"));
    }
    Ok(title)
}

fn owner_filter(owner: OwnerRef) -> [(&'static str, Value); 2] {
    [
        ("owner_kind", Value::from(owner.kind.as_str())),
        ("owner_id", Value::Integer(owner.id as i64)),
    ]
}
