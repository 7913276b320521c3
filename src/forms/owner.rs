//! The generic owner relation of field and handler rows.

use crate::core::{Column, DataType};
use crate::storage::TableSchema;
use std::fmt;

pub const FORM_TABLE: &str = "memoforms_form";
pub const MODEL_FORM_TABLE: &str = "memoforms_model_form";

/// Which form table an owned row points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OwnerKind {
    Form,
    ModelForm,
}

impl OwnerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::ModelForm => "model_form",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "form" => Some(Self::Form),
            "model_form" => Some(Self::ModelForm),
            _ => None,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Form => FORM_TABLE,
            Self::ModelForm => MODEL_FORM_TABLE,
        }
    }

    pub fn schema(self) -> TableSchema {
        let mut columns = vec![
            Column::auto_id("id"),
            Column::new("title", DataType::Text).not_null(),
        ];
        if self == Self::ModelForm {
            columns.push(Column::new("content_type", DataType::Text).not_null());
        }
        TableSchema::new(self.table_name(), columns)
    }
}

/// `(owner_kind, owner_id)` pair identifying a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerRef {
    pub kind: OwnerKind,
    pub id: u64,
}

impl OwnerRef {
    pub fn new(kind: OwnerKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn form(id: u64) -> Self {
        Self::new(OwnerKind::Form, id)
    }

    pub fn model_form(id: u64) -> Self {
        Self::new(OwnerKind::ModelForm, id)
    }

    /// Parses `form:3` / `model_form:3`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, id) = raw.split_once(':')?;
        Some(Self::new(OwnerKind::parse(kind)?, id.parse().ok()?))
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}
