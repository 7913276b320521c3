use crate::core::{Column, DataType, FormError, Result, Row, Schema, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<u64, Row>,
    next_row_id: u64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 1,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Inserts a row and returns its id.
    ///
    /// A NULL `AutoId` primary key is filled with the next id. An explicit
    /// integer primary key becomes the row id.
    pub fn insert(&mut self, mut row: Row) -> Result<u64> {
        self.validate_row(&row)?;

        let id = match self.schema.schema().primary_key() {
            Some((idx, column)) => match &row[idx] {
                Value::Null if column.data_type == DataType::AutoId => {
                    let id = self.next_row_id;
                    row[idx] = Value::Integer(id as i64);
                    id
                }
                Value::Integer(explicit) if *explicit > 0 => *explicit as u64,
                other => {
                    return Err(FormError::ConstraintViolation(format!(
                        "Primary key '{}' must be a positive integer, got {}",
                        column.name,
                        other.type_name()
                    )));
                }
            },
            None => self.next_row_id,
        };

        if self.rows.contains_key(&id) {
            return Err(FormError::ConstraintViolation(format!(
                "Row {} already exists in table '{}'",
                id, self.schema.name
            )));
        }
        self.check_uniqueness(&row, None)?;

        self.next_row_id = self.next_row_id.max(id + 1);
        self.rows.insert(id, row);
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn update(&mut self, id: u64, new_row: Row) -> Result<bool> {
        self.validate_row(&new_row)?;
        if !self.rows.contains_key(&id) {
            return Ok(false);
        }
        self.check_uniqueness(&new_row, Some(id))?;
        self.rows.insert(id, new_row);
        Ok(true)
    }

    pub fn delete(&mut self, id: u64) -> bool {
        self.rows.remove(&id).is_some()
    }

    pub fn scan(&self) -> Vec<(u64, Row)> {
        self.rows
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Builds a full row from named values, filling gaps with column
    /// defaults (or NULL).
    pub fn row_from_values(&self, values: &HashMap<String, Value>) -> Result<Row> {
        for name in values.keys() {
            if self.schema.schema().find_column_index(name).is_none() {
                return Err(FormError::ColumnNotFound(
                    name.clone(),
                    self.schema.name.clone(),
                ));
            }
        }

        Ok(self
            .schema
            .schema()
            .columns()
            .iter()
            .map(|column| match values.get(&column.name) {
                Some(value) => value.clone(),
                None => column.default.clone().unwrap_or(Value::Null),
            })
            .collect())
    }

    fn check_uniqueness(&self, row: &Row, ignore_id: Option<u64>) -> Result<()> {
        for (col_idx, column) in self.schema.schema().columns().iter().enumerate() {
            if !(column.primary_key || column.unique) {
                continue;
            }
            let value = &row[col_idx];
            if value.is_null() {
                continue;
            }

            let clash = self
                .rows
                .iter()
                .filter(|(id, _)| Some(**id) != ignore_id)
                .any(|(_, existing)| &existing[col_idx] == value);
            if clash {
                return Err(FormError::ConstraintViolation(format!(
                    "Unique constraint violation: Column '{}' already contains value {}",
                    column.name, value
                )));
            }
        }
        Ok(())
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema().columns();
        if row.len() != columns.len() {
            return Err(FormError::TypeMismatch(format!(
                "Expected {} columns, got {}",
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        self.schema.columns()
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.schema.get_column(name)
    }

    /// Reads a named value out of a row of this table.
    pub fn value<'a>(&self, row: &'a Row, column: &str) -> Result<&'a Value> {
        self.schema
            .find_column_index(column)
            .and_then(|idx| row.get(idx))
            .ok_or_else(|| FormError::ColumnNotFound(column.to_string(), self.name.clone()))
    }

    /// Human readable label for a row: the first text column, or
    /// `<table> object (<id>)`.
    pub fn display_row(&self, id: u64, row: &Row) -> String {
        self.columns()
            .iter()
            .zip(row.iter())
            .find_map(|(column, value)| match (&column.data_type, value) {
                (DataType::Text, Value::Text(text)) if !column.primary_key => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_else(|| format!("{} object ({})", self.name, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        Table::new(TableSchema::new(
            "people",
            vec![
                Column::auto_id("id"),
                Column::new("name", DataType::Text).not_null(),
                Column::new("email", DataType::Email).unique(),
                Column::new("active", DataType::Boolean)
                    .not_null()
                    .default_value(true),
            ],
        ))
    }

    #[test]
    fn test_insert_assigns_ids() {
        let mut table = people();
        let first = table
            .insert(vec![
                Value::Null,
                Value::from("Alice"),
                Value::Null,
                Value::Boolean(true),
            ])
            .unwrap();
        let second = table
            .insert(vec![
                Value::Null,
                Value::from("Bob"),
                Value::Null,
                Value::Boolean(false),
            ])
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(table.get(2).unwrap()[0], Value::Integer(2));
    }

    #[test]
    fn test_unique_constraint() {
        let mut table = people();
        let row = vec![
            Value::Null,
            Value::from("Alice"),
            Value::from("a@example.com"),
            Value::Boolean(true),
        ];
        table.insert(row.clone()).unwrap();
        assert!(matches!(
            table.insert(row),
            Err(FormError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_row_from_values_uses_defaults() {
        let table = people();
        let mut values = HashMap::new();
        values.insert("name".to_string(), Value::from("Carol"));
        let row = table.row_from_values(&values).unwrap();
        assert_eq!(
            row,
            vec![Value::Null, Value::from("Carol"), Value::Null, Value::Boolean(true)]
        );

        values.insert("unknown".to_string(), Value::Null);
        assert!(matches!(
            table.row_from_values(&values),
            Err(FormError::ColumnNotFound(_, _))
        ));
    }

    #[test]
    fn test_display_row() {
        let mut table = people();
        let id = table
            .insert(vec![
                Value::Null,
                Value::from("Dora"),
                Value::Null,
                Value::Boolean(true),
            ])
            .unwrap();
        let row = table.get(id).unwrap().clone();
        assert_eq!(table.schema().display_row(id, &row), "Dora");
    }
}
