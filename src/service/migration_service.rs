//! One-shot copy of every legacy record into the document database.
//!
//! All four entity kinds are fetched before anything is written, so a
//! failing read endpoint leaves the destination untouched. Writes are
//! committed in batches of at most [`MAX_BATCH_SIZE`]; each batch is atomic.

use crate::config::mongo_conf::MAX_BATCH_SIZE;
use crate::model::quotation::DEFAULT_TAX_RATE;
use crate::repository::document_store::{DocumentStore, DocumentWrite};
use crate::repository::repository_error::RepositoryError;
use crate::util::coerce::{cell_key, cell_number, number_value};
use crate::util::quotation_api::{
    ApiError, QuotationApiClient, READ_CUSTOMERS, READ_NOTES_TEMPLATES, READ_QUOTES, READ_SERVICES,
};
use async_trait::async_trait;
use bson::{Bson, DateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Customers,
    Services,
    NoteTemplates,
    Quotations,
}

impl EntityKind {
    /// Fetch and commit order.
    pub const ALL: [EntityKind; 4] =
        [EntityKind::Customers, EntityKind::Services, EntityKind::NoteTemplates, EntityKind::Quotations];

    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Customers => "customers",
            EntityKind::Services => "services",
            EntityKind::NoteTemplates => "notesTemplates",
            EntityKind::Quotations => "quotations",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            EntityKind::Customers => READ_CUSTOMERS,
            EntityKind::Services => READ_SERVICES,
            EntityKind::NoteTemplates => READ_NOTES_TEMPLATES,
            EntityKind::Quotations => READ_QUOTES,
        }
    }

    fn stamps_updated_at(&self) -> bool {
        matches!(self, EntityKind::Customers | EntityKind::Quotations)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Customers => "customers",
            EntityKind::Services => "services",
            EntityKind::NoteTemplates => "note templates",
            EntityKind::Quotations => "quotations",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    /// Records returned by the legacy endpoint, including skipped ones.
    pub fetched: usize,
    pub written: usize,
    /// Records without an id.
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub customers: EntityCounts,
    pub services: EntityCounts,
    pub note_templates: EntityCounts,
    pub quotations: EntityCounts,
}

impl MigrationReport {
    pub fn counts(&self, kind: EntityKind) -> &EntityCounts {
        match kind {
            EntityKind::Customers => &self.customers,
            EntityKind::Services => &self.services,
            EntityKind::NoteTemplates => &self.note_templates,
            EntityKind::Quotations => &self.quotations,
        }
    }

    fn counts_mut(&mut self, kind: EntityKind) -> &mut EntityCounts {
        match kind {
            EntityKind::Customers => &mut self.customers,
            EntityKind::Services => &mut self.services,
            EntityKind::NoteTemplates => &mut self.note_templates,
            EntityKind::Quotations => &mut self.quotations,
        }
    }

    pub fn total_written(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.counts(*k).written).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationStage {
    Connecting,
    Fetching(EntityKind),
    Normalizing,
    Committing { batch: usize, batches: usize },
    Done(MigrationReport),
    Failed(String),
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStage::Connecting => write!(f, "Connecting to document database"),
            MigrationStage::Fetching(kind) => write!(f, "Fetching {}", kind),
            MigrationStage::Normalizing => write!(f, "Normalizing records"),
            MigrationStage::Committing { batch, batches } => write!(f, "Committing batch {}/{}", batch, batches),
            MigrationStage::Done(report) => write!(
                f,
                "Migration finished: {} customers, {} services, {} note templates, {} quotations",
                report.customers.written,
                report.services.written,
                report.note_templates.written,
                report.quotations.written
            ),
            MigrationStage::Failed(reason) => write!(f, "Migration failed: {}", reason),
        }
    }
}

/// Receives every stage transition of a run.
pub trait ProgressSink: Send + Sync {
    fn report(&self, stage: &MigrationStage);
}

impl<F> ProgressSink for F
where
    F: Fn(&MigrationStage) + Send + Sync,
{
    fn report(&self, stage: &MigrationStage) {
        self(stage)
    }
}

/// Progress written to the log only.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, stage: &MigrationStage) {
        info!(stage = %stage, "Migration progress");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Failed to fetch {kind}: {source}")]
    Fetch {
        kind: EntityKind,
        #[source]
        source: ApiError,
    },

    #[error("Invalid {kind} record '{id}': {reason}")]
    Normalize { kind: EntityKind, id: String, reason: String },

    #[error("Batch {batch} of {batches} was not committed: {source}")]
    Commit {
        batch: usize,
        batches: usize,
        #[source]
        source: RepositoryError,
    },
}

/// Where legacy records are read from.
#[async_trait]
pub trait LegacySource: Send + Sync {
    async fn fetch(&self, kind: EntityKind) -> Result<Vec<Value>, ApiError>;
}

#[async_trait]
impl LegacySource for QuotationApiClient {
    /// A `{success:false}` answer counts as an empty list; transport and
    /// parse failures abort the run.
    async fn fetch(&self, kind: EntityKind) -> Result<Vec<Value>, ApiError> {
        match self.fetch_raw(kind.endpoint()).await {
            Err(ApiError::Server(reason)) => {
                warn!(%kind, %reason, "Legacy endpoint reported failure, treating as empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

fn set_number(record: &mut Map<String, Value>, key: &str, value: f64) {
    record.insert(key.to_string(), number_value(value));
}

/// Apply the per-kind numeric defaults. Returns `None` for records without an id.
pub fn normalize_record(kind: EntityKind, record: Value) -> Option<(String, Map<String, Value>)> {
    let mut record = match record {
        Value::Object(map) => map,
        _ => return None,
    };
    let id = record.get("id").map(cell_key).unwrap_or_default();
    if id.is_empty() {
        return None;
    }

    match kind {
        EntityKind::Services => {
            let price = record.get("price").map(cell_number).unwrap_or(0.0);
            set_number(&mut record, "price", price);
        }
        EntityKind::Quotations => {
            let rate = record.get("taxRate").map(cell_number).unwrap_or(0.0);
            let rate = if rate == 0.0 { DEFAULT_TAX_RATE as f64 } else { rate };
            set_number(&mut record, "taxRate", rate);
            if !matches!(record.get("items"), Some(Value::Array(_))) {
                record.insert("items".to_string(), Value::Array(Vec::new()));
            }
            if let Some(Value::Array(items)) = record.get_mut("items") {
                for item in items.iter_mut().filter_map(Value::as_object_mut) {
                    let price = item.get("price").map(cell_number).unwrap_or(0.0);
                    let qty = item.get("qty").map(cell_number).unwrap_or(0.0);
                    set_number(item, "price", price);
                    set_number(item, "qty", qty);
                }
            }
        }
        EntityKind::Customers | EntityKind::NoteTemplates => {}
    }
    Some((id, record))
}

pub struct MigrationService {
    source: Arc<dyn LegacySource>,
    target: Arc<dyn DocumentStore>,
    batch_size: usize,
}

impl MigrationService {
    pub fn new(source: Arc<dyn LegacySource>, target: Arc<dyn DocumentStore>, batch_size: usize) -> Self {
        Self { source, target, batch_size: batch_size.clamp(1, MAX_BATCH_SIZE) }
    }

    fn to_write(
        kind: EntityKind,
        id: String,
        record: Map<String, Value>,
        migrated_at: DateTime,
    ) -> Result<DocumentWrite, MigrationError> {
        let mut document = bson::to_document(&record).map_err(|e| MigrationError::Normalize {
            kind,
            id: id.clone(),
            reason: e.to_string(),
        })?;
        document.insert("migratedAt", Bson::DateTime(migrated_at));
        if kind.stamps_updated_at() {
            document.insert("updatedAt", Bson::DateTime(migrated_at));
        }
        Ok(DocumentWrite { collection: kind.collection().to_string(), id, document })
    }

    #[instrument(skip(self, progress), fields(batch_size = self.batch_size))]
    pub async fn run(&self, progress: &dyn ProgressSink) -> Result<MigrationReport, MigrationError> {
        let mut fetched = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            progress.report(&MigrationStage::Fetching(kind));
            match self.source.fetch(kind).await {
                Ok(records) => {
                    info!(%kind, count = records.len(), "Fetched legacy records");
                    fetched.push((kind, records));
                }
                Err(source) => {
                    let err = MigrationError::Fetch { kind, source };
                    error!("{}", err);
                    progress.report(&MigrationStage::Failed(err.to_string()));
                    return Err(err);
                }
            }
        }

        progress.report(&MigrationStage::Normalizing);
        let migrated_at = DateTime::now();
        let mut report = MigrationReport::default();
        let mut writes: Vec<(EntityKind, DocumentWrite)> = Vec::new();
        for (kind, records) in fetched {
            let counts = report.counts_mut(kind);
            counts.fetched = records.len();
            for record in records {
                match normalize_record(kind, record) {
                    Some((id, record)) => {
                        let write = match Self::to_write(kind, id, record, migrated_at) {
                            Ok(write) => write,
                            Err(err) => {
                                progress.report(&MigrationStage::Failed(err.to_string()));
                                return Err(err);
                            }
                        };
                        writes.push((kind, write));
                    }
                    None => counts.skipped += 1,
                }
            }
        }

        let batches = writes.len().div_ceil(self.batch_size);
        for (index, chunk) in writes.chunks(self.batch_size).enumerate() {
            let batch = index + 1;
            progress.report(&MigrationStage::Committing { batch, batches });
            let documents: Vec<DocumentWrite> = chunk.iter().map(|(_, w)| w.clone()).collect();
            if let Err(source) = self.target.commit_batch(&documents).await {
                let err = MigrationError::Commit { batch, batches, source };
                error!("{}", err);
                progress.report(&MigrationStage::Failed(err.to_string()));
                return Err(err);
            }
            for (kind, _) in chunk {
                report.counts_mut(*kind).written += 1;
            }
        }

        progress.report(&MigrationStage::Done(report.clone()));
        info!(written = report.total_written(), batches, "Migration complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_quotation_defaults() {
        let (id, record) = normalize_record(
            EntityKind::Quotations,
            json!({ "id": " Q1 ", "taxRate": "", "items": [{ "name": "Setup", "qty": "2", "price": "abc" }] }),
        )
        .unwrap();
        assert_eq!(id, "Q1");
        assert_eq!(record["taxRate"], json!(5));
        assert_eq!(record["items"][0]["qty"], json!(2));
        assert_eq!(record["items"][0]["price"], json!(0));
    }

    #[test]
    fn test_normalize_quotation_without_item_list() {
        for items in [None, Some(json!(null)), Some(json!("Design x2"))] {
            let mut record = json!({ "id": "Q2", "taxRate": 10 });
            if let Some(items) = items {
                record["items"] = items;
            }
            let (_, record) = normalize_record(EntityKind::Quotations, record).unwrap();
            assert_eq!(record["items"], json!([]));
            assert_eq!(record["taxRate"], json!(10));
        }
    }

    #[test]
    fn test_normalize_service_price() {
        let (_, record) = normalize_record(EntityKind::Services, json!({ "id": "s1", "price": "1500" })).unwrap();
        assert_eq!(record["price"], json!(1500));
    }

    #[test]
    fn test_normalize_skips_missing_id() {
        assert!(normalize_record(EntityKind::Customers, json!({ "name": "No id" })).is_none());
        assert!(normalize_record(EntityKind::Customers, json!({ "id": "  " })).is_none());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(MigrationStage::Fetching(EntityKind::NoteTemplates).to_string(), "Fetching note templates");
        assert_eq!(
            MigrationStage::Committing { batch: 1, batches: 3 }.to_string(),
            "Committing batch 1/3"
        );
    }
}
