use crate::model::quotation::{LineItem, Milestone, Quotation};
use crate::repository::record_repo::{
    delete_rows_matching, RecordRepository, SheetRecordRepository, UpsertOutcome,
};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::sheet_schema::{LINE_ITEMS, MILESTONES, QUOTATIONS, QUOTE_KEY_COLUMN};
use crate::repository::sheet_store::{ensure_sheet, Row, SheetSpec, SheetStore};
use crate::util::coerce::cell_key;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Rows removed from each table by a cascade delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeDeleteResult {
    pub quote: usize,
    pub items: usize,
    pub milestones: usize,
}

impl CascadeDeleteResult {
    pub fn total(&self) -> usize {
        self.quote + self.items + self.milestones
    }
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    /// Quotations with their line items and milestones, in row order.
    async fn list(&self) -> RepositoryResult<Vec<Quotation>>;
    /// Upsert the quotation row and replace its dependent rows.
    async fn save(&self, quotation: Quotation) -> RepositoryResult<UpsertOutcome>;
    /// Remove the quotation and every line item and milestone keyed by `id`.
    async fn delete_cascade(&self, id: &str) -> RepositoryResult<CascadeDeleteResult>;
}

pub struct SheetQuotationRepository {
    store: Arc<dyn SheetStore>,
    quotes: SheetRecordRepository<Quotation>,
}

impl SheetQuotationRepository {
    pub fn new(store: Arc<dyn SheetStore>) -> Self {
        let quotes = SheetRecordRepository::new(store.clone());
        Self { store, quotes }
    }

    async fn rows_by_quote(&self, spec: &SheetSpec) -> RepositoryResult<HashMap<String, Vec<Row>>> {
        let mut grouped: HashMap<String, Vec<Row>> = HashMap::new();
        let rows = self.store.read_rows(spec.name, spec.width()).await?.unwrap_or_default();
        for row in rows {
            let key = row.get(QUOTE_KEY_COLUMN).map(cell_key).unwrap_or_default();
            if !key.is_empty() {
                grouped.entry(key).or_default().push(row);
            }
        }
        Ok(grouped)
    }

    async fn replace_children(&self, spec: &SheetSpec, id: &str, rows: Vec<Row>) -> RepositoryResult<()> {
        let removed = delete_rows_matching(self.store.as_ref(), spec, QUOTE_KEY_COLUMN, id).await?;
        if rows.is_empty() {
            info!(sheet = spec.name, removed, "Cleared dependent rows");
            return Ok(());
        }
        ensure_sheet(self.store.as_ref(), spec).await?;
        let added = rows.len();
        for row in rows {
            self.store.append_row(spec.name, row).await?;
        }
        info!(sheet = spec.name, removed, added, "Replaced dependent rows");
        Ok(())
    }
}

#[async_trait]
impl QuotationRepository for SheetQuotationRepository {
    #[tracing::instrument(skip(self))]
    async fn list(&self) -> RepositoryResult<Vec<Quotation>> {
        let mut quotations = self.quotes.list_all().await?;
        let mut items = self.rows_by_quote(&LINE_ITEMS).await?;
        let mut milestones = self.rows_by_quote(&MILESTONES).await?;

        for quotation in quotations.iter_mut() {
            quotation.items = items
                .remove(&quotation.id)
                .unwrap_or_default()
                .iter()
                .enumerate()
                .map(|(position, row)| LineItem::from_row(row, position))
                .collect();
            quotation.milestones = milestones
                .remove(&quotation.id)
                .unwrap_or_default()
                .iter()
                .enumerate()
                .map(|(position, row)| Milestone::from_row(row, position))
                .collect();
        }
        if !items.is_empty() || !milestones.is_empty() {
            warn!(
                orphan_items = items.len(),
                orphan_milestones = milestones.len(),
                "Dependent rows reference unknown quotations"
            );
        }
        info!(count = quotations.len(), "Listed quotations");
        Ok(quotations)
    }

    #[tracing::instrument(skip(self, quotation), fields(id = %quotation.id))]
    async fn save(&self, quotation: Quotation) -> RepositoryResult<UpsertOutcome> {
        quotation.validate_items()?;
        let id = quotation.id.trim().to_string();
        let number = quotation.quote_number.trim().to_string();

        if !id.is_empty() && !number.is_empty() {
            let existing = self.quotes.list_all().await?;
            if let Some(other) = existing.iter().find(|q| q.quote_number == number && q.id != id) {
                error!(quote_number = %number, other_id = %other.id, "Quote number already in use");
                return Err(RepositoryError::already_exists(format!(
                    "Quote number {} is already used by quotation {}",
                    number, other.id
                )));
            }
        }

        let item_rows: Vec<Row> = quotation.items.iter().map(|item| item.to_row(&id)).collect();
        let milestone_rows: Vec<Row> = quotation.milestones.iter().map(|m| m.to_row(&id)).collect();

        let outcome = self.quotes.upsert(quotation).await?;
        self.replace_children(&LINE_ITEMS, &outcome.id, item_rows).await?;
        self.replace_children(&MILESTONES, &outcome.id, milestone_rows).await?;
        info!(action = ?outcome.action, "Quotation saved");
        Ok(outcome)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_cascade(&self, id: &str) -> RepositoryResult<CascadeDeleteResult> {
        let target = id.trim();
        if target.is_empty() {
            return Err(RepositoryError::missing_field("id"));
        }
        let store = self.store.as_ref();
        let result = CascadeDeleteResult {
            quote: delete_rows_matching(store, &QUOTATIONS, QUOTE_KEY_COLUMN, target).await?,
            items: delete_rows_matching(store, &LINE_ITEMS, QUOTE_KEY_COLUMN, target).await?,
            milestones: delete_rows_matching(store, &MILESTONES, QUOTE_KEY_COLUMN, target).await?,
        };
        info!(
            target_id = %target,
            quote = result.quote,
            items = result.items,
            milestones = result.milestones,
            "Cascade delete finished"
        );
        Ok(result)
    }
}
