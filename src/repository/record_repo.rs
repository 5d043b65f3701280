use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::sheet_store::{ensure_sheet, Cell, Row, SheetSpec, SheetStore};
use crate::util::coerce::cell_key;
use async_trait::async_trait;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An entity stored as one row of a table, keyed by its first column.
pub trait SheetRecord: Clone + Send + Sync + 'static {
    const SHEET: SheetSpec;
    /// Human readable kind, used in log lines and messages.
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Trim text fields and apply defaults.
    fn normalized(self) -> Self;

    /// `(field name, value)` pairs that must not be blank.
    fn required_fields(&self) -> Vec<(&'static str, &str)>;

    fn to_row(&self) -> Row;

    /// `None` for rows that do not hold a usable record (blank id or name).
    fn from_row(row: &[Cell]) -> Option<Self>;

    fn validate(&self) -> RepositoryResult<()> {
        for (field, value) in self.required_fields() {
            if value.trim().is_empty() {
                return Err(RepositoryError::missing_field(field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub action: UpsertAction,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub deleted: usize,
}

#[async_trait]
pub trait RecordRepository<T: SheetRecord>: Send + Sync {
    async fn upsert(&self, record: T) -> RepositoryResult<UpsertOutcome>;
    async fn delete(&self, id: &str) -> RepositoryResult<DeleteOutcome>;
    async fn list_all(&self) -> RepositoryResult<Vec<T>>;
}

/// Index of the first data row whose `column` equals `key` (trimmed), plus
/// how many rows matched in total.
pub fn find_first_match(rows: &[Row], column: usize, key: &str) -> (Option<usize>, usize) {
    let mut first = None;
    let mut matches = 0;
    for (index, row) in rows.iter().enumerate() {
        let cell = row.get(column).map(cell_key).unwrap_or_default();
        if cell == key {
            matches += 1;
            if first.is_none() {
                first = Some(index);
            }
        }
    }
    (first, matches)
}

/// Delete every data row of `spec` whose `column` equals `key`, last row
/// first so earlier indices stay valid. A missing table deletes nothing.
pub async fn delete_rows_matching(
    store: &dyn SheetStore,
    spec: &SheetSpec,
    column: usize,
    key: &str,
) -> RepositoryResult<usize> {
    let rows = match store.read_rows(spec.name, spec.width()).await? {
        Some(rows) => rows,
        None => {
            debug!(sheet = spec.name, "Sheet not found, nothing to delete");
            return Ok(0);
        }
    };

    let mut deleted = 0;
    for index in (0..rows.len()).rev() {
        let cell = rows[index].get(column).map(cell_key).unwrap_or_default();
        if cell == key {
            store.delete_row(spec.name, index).await?;
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// Upsert-by-scan repository over one table.
pub struct SheetRecordRepository<T> {
    store: Arc<dyn SheetStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T: SheetRecord> SheetRecordRepository<T> {
    pub fn new(store: Arc<dyn SheetStore>) -> Self {
        Self { store, _record: PhantomData }
    }

    pub fn store(&self) -> &Arc<dyn SheetStore> {
        &self.store
    }
}

impl<T> Clone for SheetRecordRepository<T> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), _record: PhantomData }
    }
}

#[async_trait]
impl<T: SheetRecord> RecordRepository<T> for SheetRecordRepository<T> {
    #[tracing::instrument(skip(self, record), fields(kind = T::KIND, id = %record.id()))]
    async fn upsert(&self, record: T) -> RepositoryResult<UpsertOutcome> {
        let record = record.normalized();
        record.validate()?;

        let spec = T::SHEET;
        ensure_sheet(self.store.as_ref(), &spec).await?;

        let id = record.id().to_string();
        let rows = self.store.read_rows(spec.name, spec.width()).await?.unwrap_or_default();
        let (existing, matches) = find_first_match(&rows, 0, &id);
        if matches > 1 {
            warn!(matches, "Duplicate ids in sheet, only the first row is updated");
        }

        let row = record.to_row();
        match existing {
            Some(index) => {
                self.store.update_row(spec.name, index, row).await?;
                info!("{} updated", T::KIND);
                Ok(UpsertOutcome { action: UpsertAction::Updated, id })
            }
            None => {
                self.store.append_row(spec.name, row).await?;
                info!("{} created", T::KIND);
                Ok(UpsertOutcome { action: UpsertAction::Created, id })
            }
        }
    }

    #[tracing::instrument(skip(self), fields(kind = T::KIND))]
    async fn delete(&self, id: &str) -> RepositoryResult<DeleteOutcome> {
        let target = id.trim();
        if target.is_empty() {
            return Err(RepositoryError::missing_field("id"));
        }
        let deleted = delete_rows_matching(self.store.as_ref(), &T::SHEET, 0, target).await?;
        info!(target_id = %target, deleted, "{} delete finished", T::KIND);
        Ok(DeleteOutcome { deleted })
    }

    #[tracing::instrument(skip(self), fields(kind = T::KIND))]
    async fn list_all(&self) -> RepositoryResult<Vec<T>> {
        let spec = T::SHEET;
        let rows = match self.store.read_rows(spec.name, spec.width()).await? {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };
        let records: Vec<T> = rows.iter().filter_map(|row| T::from_row(row)).collect();
        debug!(count = records.len(), "Listed records");
        Ok(records)
    }
}
