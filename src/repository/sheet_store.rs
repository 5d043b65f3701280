//! Tabular backing store.
//!
//! Every table follows the same layout: row 1 is a title banner, row 2 holds
//! the column names and data starts at row 3. The trait speaks in data-row
//! indices (0 is sheet row 3) so callers never deal with the header offset.

use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub type Cell = Value;
pub type Row = Vec<Cell>;

/// First sheet row (1-based) that holds data.
pub const DATA_START_ROW: usize = 3;

/// Static description of one table: its name, banner and column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub headers: &'static [&'static str],
}

impl SheetSpec {
    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn sheet_exists(&self, sheet: &str) -> RepositoryResult<bool>;

    /// Create the table with its banner and header rows. No-op if it exists.
    async fn create_sheet(&self, spec: &SheetSpec) -> RepositoryResult<()>;

    /// Data rows of the table, padded or cut to `width` cells.
    /// Returns `None` when the table does not exist.
    async fn read_rows(&self, sheet: &str, width: usize) -> RepositoryResult<Option<Vec<Row>>>;

    async fn append_row(&self, sheet: &str, row: Row) -> RepositoryResult<()>;

    async fn update_row(&self, sheet: &str, index: usize, row: Row) -> RepositoryResult<()>;

    async fn delete_row(&self, sheet: &str, index: usize) -> RepositoryResult<()>;
}

/// Make sure `spec` exists before writing to it.
pub async fn ensure_sheet(store: &dyn SheetStore, spec: &SheetSpec) -> RepositoryResult<()> {
    if !store.sheet_exists(spec.name).await? {
        info!(sheet = spec.name, "Sheet missing, creating it");
        store.create_sheet(spec).await?;
    }
    Ok(())
}

fn fit_row(mut row: Row, width: usize) -> Row {
    row.resize(width, Value::String(String::new()));
    row
}

#[derive(Debug, Clone, Default)]
struct MemorySheet {
    title: String,
    headers: Vec<String>,
    rows: Vec<Row>,
}

/// Process-local store. Used for tests and for running without a spreadsheet.
#[derive(Debug, Default)]
pub struct InMemorySheetStore {
    sheets: RwLock<HashMap<String, MemorySheet>>,
}

impl InMemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Banner and column names of a table, if it exists.
    pub async fn header(&self, sheet: &str) -> Option<(String, Vec<String>)> {
        let sheets = self.sheets.read().await;
        sheets.get(sheet).map(|s| (s.title.clone(), s.headers.clone()))
    }

    /// Raw data rows, unpadded.
    pub async fn raw_rows(&self, sheet: &str) -> Vec<Row> {
        let sheets = self.sheets.read().await;
        sheets.get(sheet).map(|s| s.rows.clone()).unwrap_or_default()
    }
}

fn missing_sheet(sheet: &str) -> RepositoryError {
    RepositoryError::not_found(format!("Sheet '{}' does not exist", sheet))
}

#[async_trait]
impl SheetStore for InMemorySheetStore {
    async fn sheet_exists(&self, sheet: &str) -> RepositoryResult<bool> {
        Ok(self.sheets.read().await.contains_key(sheet))
    }

    async fn create_sheet(&self, spec: &SheetSpec) -> RepositoryResult<()> {
        let mut sheets = self.sheets.write().await;
        sheets.entry(spec.name.to_string()).or_insert_with(|| MemorySheet {
            title: spec.title.to_string(),
            headers: spec.headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn read_rows(&self, sheet: &str, width: usize) -> RepositoryResult<Option<Vec<Row>>> {
        let sheets = self.sheets.read().await;
        Ok(sheets
            .get(sheet)
            .map(|s| s.rows.iter().cloned().map(|r| fit_row(r, width)).collect()))
    }

    async fn append_row(&self, sheet: &str, row: Row) -> RepositoryResult<()> {
        let mut sheets = self.sheets.write().await;
        let target = sheets.get_mut(sheet).ok_or_else(|| missing_sheet(sheet))?;
        target.rows.push(row);
        debug!(sheet, rows = target.rows.len(), "Row appended");
        Ok(())
    }

    async fn update_row(&self, sheet: &str, index: usize, row: Row) -> RepositoryResult<()> {
        let mut sheets = self.sheets.write().await;
        let target = sheets.get_mut(sheet).ok_or_else(|| missing_sheet(sheet))?;
        let slot = target
            .rows
            .get_mut(index)
            .ok_or_else(|| RepositoryError::not_found(format!("Row {} not found in '{}'", index + DATA_START_ROW, sheet)))?;
        *slot = row;
        Ok(())
    }

    async fn delete_row(&self, sheet: &str, index: usize) -> RepositoryResult<()> {
        let mut sheets = self.sheets.write().await;
        let target = sheets.get_mut(sheet).ok_or_else(|| missing_sheet(sheet))?;
        if index >= target.rows.len() {
            return Err(RepositoryError::not_found(format!(
                "Row {} not found in '{}'",
                index + DATA_START_ROW,
                sheet
            )));
        }
        target.rows.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPEC: SheetSpec = SheetSpec {
        name: "Things",
        title: "Things banner",
        headers: &["id", "name", "price"],
    };

    #[tokio::test]
    async fn test_missing_sheet_reads_as_none() {
        let store = InMemorySheetStore::new();
        assert!(store.read_rows("Things", 3).await.unwrap().is_none());
        assert!(!store.sheet_exists("Things").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_sheet_creates_headers_once() {
        let store = InMemorySheetStore::new();
        ensure_sheet(&store, &SPEC).await.unwrap();
        store.append_row("Things", vec![json!("a")]).await.unwrap();
        ensure_sheet(&store, &SPEC).await.unwrap();

        let (title, headers) = store.header("Things").await.unwrap();
        assert_eq!(title, "Things banner");
        assert_eq!(headers, vec!["id", "name", "price"]);
        assert_eq!(store.raw_rows("Things").await.len(), 1);
    }

    #[tokio::test]
    async fn test_rows_are_padded_to_width() {
        let store = InMemorySheetStore::new();
        store.create_sheet(&SPEC).await.unwrap();
        store.append_row("Things", vec![json!("a")]).await.unwrap();
        let rows = store.read_rows("Things", 3).await.unwrap().unwrap();
        assert_eq!(rows[0].len(), 3);
    }

    #[tokio::test]
    async fn test_delete_out_of_range_fails() {
        let store = InMemorySheetStore::new();
        store.create_sheet(&SPEC).await.unwrap();
        assert!(store.delete_row("Things", 0).await.is_err());
    }
}
