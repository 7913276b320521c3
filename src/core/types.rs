use super::{FormError, Result, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Row = Vec<Value>;

/// Declared type of a stored column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Integer primary key filled in by the table on insert.
    AutoId,
    Boolean,
    Text,
    Email,
    Url,
    Slug,
    IpAddress,
    Uuid,
    Integer,
    Float,
    Decimal,
    Date,
    DateTime,
    Time,
    Duration,
    /// Row id of the named table.
    ForeignKey(String),
    /// List of row ids of the named table.
    ManyToMany(String),
}

impl DataType {
    pub fn is_relational(&self) -> bool {
        matches!(self, Self::ForeignKey(_) | Self::ManyToMany(_))
    }

    pub fn related_table(&self) -> Option<&str> {
        match self {
            Self::ForeignKey(table) | Self::ManyToMany(table) => Some(table),
            _ => None,
        }
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::AutoId | Self::Integer | Self::ForeignKey(_), Value::Integer(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (
                Self::Text | Self::Email | Self::Url | Self::Slug | Self::IpAddress,
                Value::Text(_),
            ) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            (Self::Float, Value::Float(_) | Value::Integer(_)) => true,
            (Self::Decimal, Value::Decimal(_) | Value::Integer(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::DateTime, Value::DateTime(_)) => true,
            (Self::Time, Value::Time(_)) => true,
            (Self::Duration, Value::Duration(_)) => true,
            (Self::ManyToMany(_), Value::List(items)) => {
                items.iter().all(|item| matches!(item, Value::Integer(_)))
            }
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoId => write!(f, "AUTO_ID"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Text => write!(f, "TEXT"),
            Self::Email => write!(f, "EMAIL"),
            Self::Url => write!(f, "URL"),
            Self::Slug => write!(f, "SLUG"),
            Self::IpAddress => write!(f, "IP_ADDRESS"),
            Self::Uuid => write!(f, "UUID"),
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Decimal => write!(f, "DECIMAL"),
            Self::Date => write!(f, "DATE"),
            Self::DateTime => write!(f, "DATETIME"),
            Self::Time => write!(f, "TIME"),
            Self::Duration => write!(f, "DURATION"),
            Self::ForeignKey(table) => write!(f, "FOREIGN_KEY({})", table),
            Self::ManyToMany(table) => write!(f, "MANY_TO_MANY({})", table),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    /// The conventional `id` primary key of a model table.
    pub fn auto_id(name: impl Into<String>) -> Self {
        Self::new(name, DataType::AutoId).primary_key()
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Must a submitted form supply this column?
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default() && !self.primary_key
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if matches!(value, Value::Null) {
            if !self.nullable && self.data_type != DataType::AutoId {
                return Err(FormError::ConstraintViolation(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(FormError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.find_column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn primary_key(&self) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, col)| col.primary_key)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
