use super::{Table, TableSchema};
use crate::core::{FormError, Result, Row, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub row_lookups: u64,
    pub table_scans: u64,
    pub writes: u64,
}

#[derive(Default)]
struct Counters {
    row_lookups: AtomicU64,
    table_scans: AtomicU64,
    writes: AtomicU64,
}

pub struct InMemoryStorage {
    /// Each table has its own lock
    tables: RwLock<HashMap<String, Arc<RwLock<Table>>>>,
    counters: Counters,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub async fn create_table(&self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        let mut tables = self.tables.write().await;

        if tables.contains_key(&name) {
            return Err(FormError::TableExists(name));
        }

        tables.insert(name, Arc::new(RwLock::new(Table::new(schema))));
        Ok(())
    }

    /// Creates the table unless one with the same name exists.
    pub async fn ensure_table(&self, schema: TableSchema) -> Result<()> {
        match self.create_table(schema).await {
            Err(FormError::TableExists(_)) => Ok(()),
            other => other,
        }
    }

    pub async fn drop_table(&self, table_name: &str) -> Result<()> {
        if self.tables.write().await.remove(table_name).is_none() {
            return Err(FormError::TableNotFound(table_name.to_string()));
        }
        Ok(())
    }

    pub async fn get_table(&self, name: &str) -> Result<Arc<RwLock<Table>>> {
        self.tables
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| FormError::TableNotFound(name.to_string()))
    }

    pub async fn insert_row(&self, table_name: &str, row: Row) -> Result<u64> {
        let table_handle = self.get_table(table_name).await?;
        let mut table = table_handle.write().await;
        let id = table.insert(row)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Inserts named values; missing columns take their defaults.
    pub async fn insert_values(
        &self,
        table_name: &str,
        values: &HashMap<String, Value>,
    ) -> Result<u64> {
        let table_handle = self.get_table(table_name).await?;
        let mut table = table_handle.write().await;
        let row = table.row_from_values(values)?;
        let id = table.insert(row)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    pub async fn get_row(&self, table_name: &str, id: u64) -> Result<Option<Row>> {
        let table_handle = self.get_table(table_name).await?;
        let table = table_handle.read().await;
        self.counters.row_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(table.get(id).cloned())
    }

    pub async fn update_row(&self, table_name: &str, id: u64, new_row: Row) -> Result<bool> {
        let table_handle = self.get_table(table_name).await?;
        let mut table = table_handle.write().await;
        let updated = table.update(id, new_row)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(updated)
    }

    /// Overwrites the named columns of an existing row.
    pub async fn update_values(
        &self,
        table_name: &str,
        id: u64,
        values: &HashMap<String, Value>,
    ) -> Result<bool> {
        let table_handle = self.get_table(table_name).await?;
        let mut table = table_handle.write().await;
        let Some(mut row) = table.get(id).cloned() else {
            return Ok(false);
        };
        for (name, value) in values {
            let idx = table
                .schema()
                .schema()
                .find_column_index(name)
                .ok_or_else(|| FormError::ColumnNotFound(name.clone(), table_name.to_string()))?;
            row[idx] = value.clone();
        }
        let updated = table.update(id, row)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(updated)
    }

    pub async fn delete_row(&self, table_name: &str, id: u64) -> Result<bool> {
        let table_handle = self.get_table(table_name).await?;
        let mut table = table_handle.write().await;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(table.delete(id))
    }

    pub async fn scan_table(&self, table_name: &str) -> Result<Vec<(u64, Row)>> {
        let table_handle = self.get_table(table_name).await?;
        let table = table_handle.read().await;
        self.counters.table_scans.fetch_add(1, Ordering::Relaxed);
        Ok(table.scan())
    }

    /// Rows whose `column` equals every given value, in id order.
    pub async fn scan_where(
        &self,
        table_name: &str,
        filters: &[(&str, Value)],
    ) -> Result<Vec<(u64, Row)>> {
        let table_handle = self.get_table(table_name).await?;
        let table = table_handle.read().await;
        self.counters.table_scans.fetch_add(1, Ordering::Relaxed);

        let mut indexes = Vec::with_capacity(filters.len());
        for (column, value) in filters {
            let idx = table
                .schema()
                .schema()
                .find_column_index(column)
                .ok_or_else(|| {
                    FormError::ColumnNotFound(column.to_string(), table_name.to_string())
                })?;
            indexes.push((idx, value));
        }

        Ok(table
            .scan()
            .into_iter()
            .filter(|(_, row)| indexes.iter().all(|(idx, value)| &row[*idx] == *value))
            .collect())
    }

    pub async fn get_schema(&self, table_name: &str) -> Result<TableSchema> {
        let table_handle = self.get_table(table_name).await?;
        let table = table_handle.read().await;
        Ok(table.schema().clone())
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.tables.read().await.contains_key(name)
    }

    pub async fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            row_lookups: self.counters.row_lookups.load(Ordering::Relaxed),
            table_scans: self.counters.table_scans.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }

    /// Copies every table for snapshots.
    pub async fn get_all_tables(&self) -> HashMap<String, Table> {
        let tables = self.tables.read().await;
        let mut copies = HashMap::with_capacity(tables.len());

        for (name, table_handle) in tables.iter() {
            let table = table_handle.read().await;
            copies.insert(name.clone(), table.clone());
        }

        copies
    }

    /// Replaces every table with the given copies.
    pub async fn restore_tables(&self, restored: HashMap<String, Table>) {
        let mut tables = self.tables.write().await;
        tables.clear();

        for (name, table) in restored {
            tables.insert(name, Arc::new(RwLock::new(table)));
        }
    }
}

impl fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    async fn storage_with_notes() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        storage
            .create_table(TableSchema::new(
                "notes",
                vec![
                    Column::auto_id("id"),
                    Column::new("body", DataType::Text).not_null(),
                    Column::new("owner", DataType::Integer),
                ],
            ))
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn test_create_table_twice_fails() {
        let storage = storage_with_notes().await;
        let again = storage
            .create_table(TableSchema::new("notes", vec![Column::auto_id("id")]))
            .await;
        assert!(matches!(again, Err(FormError::TableExists(_))));
        assert!(
            storage
                .ensure_table(TableSchema::new("notes", vec![Column::auto_id("id")]))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_scan_where_filters_rows() {
        let storage = storage_with_notes().await;
        for (body, owner) in [("a", 1), ("b", 2), ("c", 1)] {
            let mut values = HashMap::new();
            values.insert("body".to_string(), Value::from(body));
            values.insert("owner".to_string(), Value::Integer(owner));
            storage.insert_values("notes", &values).await.unwrap();
        }

        let rows = storage
            .scan_where("notes", &[("owner", Value::Integer(1))])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].1[1], Value::from("c"));
    }

    #[tokio::test]
    async fn test_lookup_counter() {
        let storage = storage_with_notes().await;
        let before = storage.stats().row_lookups;
        assert!(storage.get_row("notes", 42).await.unwrap().is_none());
        assert_eq!(storage.stats().row_lookups, before + 1);
    }

    #[tokio::test]
    async fn test_restore_tables() {
        let storage = storage_with_notes().await;
        let checkpoint = storage.get_all_tables().await;

        let mut values = HashMap::new();
        values.insert("body".to_string(), Value::from("draft"));
        storage.insert_values("notes", &values).await.unwrap();
        assert_eq!(storage.scan_table("notes").await.unwrap().len(), 1);

        storage.restore_tables(checkpoint).await;
        assert!(storage.scan_table("notes").await.unwrap().is_empty());
    }
}
