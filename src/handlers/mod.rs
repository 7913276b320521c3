//! Post-validation actions attached to a form.
//!
//! Handlers are persisted the same way as field specifications: a base row
//! in [`HANDLER_TABLE`] tagged with `real_type` and one variant row keyed by
//! `handler_ptr`.

pub mod chain;
pub mod email;
pub mod save_instance;

use crate::config::FormsConfig;
use crate::core::{Column, DataType, FormError, Result, Row, Value};
use crate::forms::BoundForm;
use crate::forms::definition::FormDefinition;
use crate::forms::owner::{OwnerKind, OwnerRef};
use crate::mail::Mailer;
use crate::storage::{InMemoryStorage, TableSchema};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::OnceCell;

pub use chain::run_chain;
pub use email::EmailHandler;
pub use save_instance::SaveInstanceHandler;

pub const HANDLER_TABLE: &str = "memoforms_handler";
pub const HANDLER_VARIANT_PREFIX: &str = "memoforms_handler_";

pub fn handler_base_schema() -> TableSchema {
    TableSchema::new(
        HANDLER_TABLE,
        vec![
            Column::auto_id("id"),
            Column::new("name", DataType::Text).not_null(),
            Column::new("order", DataType::Integer)
                .not_null()
                .default_value(0i64),
            Column::new("owner_kind", DataType::Text).not_null(),
            Column::new("owner_id", DataType::Integer).not_null(),
            Column::new("real_type", DataType::Text),
        ],
    )
}

/// Everything a handler may touch while it runs.
pub struct HandlerContext<'a> {
    pub storage: &'a InMemoryStorage,
    pub mailer: &'a dyn Mailer,
    pub config: &'a FormsConfig,
}

#[async_trait]
pub trait FormHandler: Send + Sync {
    /// Acts on a validated form.
    async fn handle(&self, form: &BoundForm<'_>, ctx: &HandlerContext<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Email,
    SaveInstance,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 2] = [HandlerKind::Email, HandlerKind::SaveInstance];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::SaveInstance => "save_instance",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn verbose_name(self) -> &'static str {
        match self {
            Self::Email => "Email Handler",
            Self::SaveInstance => "Save Instance Handler",
        }
    }

    pub fn variant_table(self) -> String {
        format!("{}{}", HANDLER_VARIANT_PREFIX, self.tag())
    }

    pub fn variant_schema(self) -> TableSchema {
        let mut columns = vec![Column::new("handler_ptr", DataType::Integer).primary_key()];
        if self == Self::Email {
            columns.push(Column::new("subject", DataType::Text).not_null());
            columns.push(Column::new("recipients", DataType::Text).not_null());
            columns.push(Column::new("template", DataType::Text).not_null());
        }
        TableSchema::new(self.variant_table(), columns)
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Columns shared by every handler kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBase {
    pub id: Option<u64>,
    pub name: String,
    pub order: i64,
    pub owner: Option<OwnerRef>,
    pub real_type: Option<HandlerKind>,
}

impl HandlerBase {
    pub(crate) fn to_values(&self) -> Result<HashMap<String, Value>> {
        let owner = self.owner.ok_or_else(|| {
            FormError::validation(format!("Handler '{}' is not attached to a form", self.name))
        })?;

        let mut values = HashMap::new();
        values.insert("name".to_string(), Value::from(self.name.as_str()));
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
        let real_type = match schema.value(row, "real_type")? {
            Value::Text(tag) => Some(HandlerKind::from_tag(tag).ok_or_else(|| {
                FormError::configuration(format!("Unknown handler type '{}'", tag))
            })?),
            _ => None,
        };
        let owner = schema
            .value(row, "owner_kind")?
            .as_str()
            .and_then(OwnerKind::parse)
            .zip(schema.value(row, "owner_id")?.as_i64())
            .map(|(kind, owner_id)| OwnerRef::new(kind, owner_id as u64));

        Ok(Self {
            id: Some(id),
            name: schema
                .value(row, "name")?
                .as_opt_string()
                .unwrap_or_default(),
            order: schema.value(row, "order")?.as_i64().unwrap_or(0),
            owner,
            real_type,
        })
    }
}

/// A base row on its own has no behaviour.
#[async_trait]
impl FormHandler for HandlerBase {
    async fn handle(&self, _form: &BoundForm<'_>, _ctx: &HandlerContext<'_>) -> Result<()> {
        Err(FormError::NotImplemented(format!(
            "handler '{}' was not resolved to a concrete type",
            self.name
        )))
    }
}

/// Kind-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerConfig {
    Email(EmailHandler),
    SaveInstance(SaveInstanceHandler),
}

impl HandlerConfig {
    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Email(_) => HandlerKind::Email,
            Self::SaveInstance(_) => HandlerKind::SaveInstance,
        }
    }
}

/// A concrete handler specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    base: HandlerBase,
    config: HandlerConfig,
}

impl HandlerSpec {
    pub fn new(name: impl Into<String>, config: HandlerConfig) -> Self {
        Self {
            base: HandlerBase {
                id: None,
                name: name.into(),
                order: 0,
                owner: None,
                real_type: None,
            },
            config,
        }
    }

    pub fn email(name: impl Into<String>, handler: EmailHandler) -> Self {
        Self::new(name, HandlerConfig::Email(handler))
    }

    pub fn save_instance(name: impl Into<String>) -> Self {
        Self::new(name, HandlerConfig::SaveInstance(SaveInstanceHandler))
    }

    pub fn order(mut self, order: i64) -> Self {
        self.base.order = order;
        self
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn base(&self) -> &HandlerBase {
        &self.base
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn kind(&self) -> HandlerKind {
        self.config.kind()
    }

    pub fn id(&self) -> Option<u64> {
        self.base.id
    }

    pub(crate) fn attach(mut self, owner: OwnerRef) -> Self {
        self.base.owner = Some(owner);
        self
    }

    pub(crate) fn stamp_real_type(&mut self) {
        if self.base.id.is_none() {
            self.base.real_type = Some(self.kind());
        }
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.base.id = Some(id);
    }

    /// Checks the handler against the form it is attached to.
    pub fn clean(&self, definition: &FormDefinition) -> Result<()> {
        if self.base.name.trim().is_empty() {
            return Err(FormError::validation("Handlers need a name"));
        }
        match &self.config {
            HandlerConfig::Email(handler) => handler.clean(),
            HandlerConfig::SaveInstance(handler) => handler.clean(definition),
        }
    }

    pub(crate) fn variant_row(&self, handler_ptr: u64) -> Row {
        let mut row = vec![Value::Integer(handler_ptr as i64)];
        if let HandlerConfig::Email(handler) = &self.config {
            row.push(Value::from(handler.subject.as_str()));
            row.push(Value::from(handler.recipients.as_str()));
            row.push(Value::from(handler.template.as_str()));
        }
        row
    }

    pub(crate) fn from_parts(base: HandlerBase, kind: HandlerKind, variant: &Row) -> Result<Self> {
        let config = match kind {
            HandlerKind::Email => {
                let schema = kind.variant_schema();
                let text = |column: &str| -> Result<String> {
                    Ok(schema
                        .value(variant, column)?
                        .as_opt_string()
                        .unwrap_or_default())
                };
                HandlerConfig::Email(EmailHandler {
                    subject: text("subject")?,
                    recipients: text("recipients")?,
                    template: text("template")?,
                })
            }
            HandlerKind::SaveInstance => HandlerConfig::SaveInstance(SaveInstanceHandler),
        };
        Ok(Self { base, config })
    }
}

#[async_trait]
impl FormHandler for HandlerSpec {
    async fn handle(&self, form: &BoundForm<'_>, ctx: &HandlerContext<'_>) -> Result<()> {
        match &self.config {
            HandlerConfig::Email(handler) => handler.handle(form, ctx).await,
            HandlerConfig::SaveInstance(handler) => handler.handle(form, ctx).await,
        }
    }
}

impl fmt::Display for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.name)
    }
}

/// A loaded handler base row with a lazily resolved concrete handler.
#[derive(Debug)]
pub struct HandlerRecord {
    base: HandlerBase,
    specific: OnceCell<HandlerSpec>,
}

impl HandlerRecord {
    pub fn from_base(base: HandlerBase) -> Self {
        Self {
            base,
            specific: OnceCell::new(),
        }
    }

    pub fn base(&self) -> &HandlerBase {
        &self.base
    }

    pub fn is_resolved(&self) -> bool {
        self.specific.initialized()
    }

    pub async fn specific(&self, storage: &InMemoryStorage) -> Result<&HandlerSpec> {
        self.specific
            .get_or_try_init(|| async {
                let kind = self.base.real_type.ok_or_else(|| {
                    FormError::configuration(format!(
                        "Handler '{}' has no stored real type",
                        self.base.name
                    ))
                })?;
                let id = self.base.id.ok_or_else(|| {
                    FormError::configuration(format!(
                        "Handler '{}' was never saved",
                        self.base.name
                    ))
                })?;
                let row = storage
                    .get_row(&kind.variant_table(), id)
                    .await?
                    .ok_or(FormError::NotFound {
                        kind: "handler variant",
                        id,
                    })?;
                HandlerSpec::from_parts(self.base.clone(), kind, &row)
            })
            .await
    }
}

impl From<HandlerSpec> for HandlerRecord {
    fn from(spec: HandlerSpec) -> Self {
        Self {
            base: spec.base.clone(),
            specific: OnceCell::new_with(Some(spec)),
        }
    }
}
