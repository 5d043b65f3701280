use crate::repository::record_repo::SheetRecord;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::sheet_schema::QUOTATIONS;
use crate::repository::sheet_store::{Cell, Row, SheetSpec};
use crate::util::coerce::{cell_key, cell_number, lenient_f64, lenient_i64, lenient_string, number_value};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Tax rate applied when a quotation does not carry one.
pub const DEFAULT_TAX_RATE: i64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(QuoteStatus::Draft),
            "sent" => Ok(QuoteStatus::Sent),
            "accepted" => Ok(QuoteStatus::Accepted),
            "rejected" => Ok(QuoteStatus::Rejected),
            "expired" => Ok(QuoteStatus::Expired),
            other => Err(format!("Unknown quote status: {}", other)),
        }
    }
}

/// Serde helper: unknown, blank or non-string statuses read as draft.
fn lenient_status<'de, D>(deserializer: D) -> Result<QuoteStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(cell_key(&value).parse().unwrap_or_default())
}

/// Bank transfer details printed on a quotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub bank_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub bank_code: String,
    #[serde(deserialize_with = "lenient_string")]
    pub branch_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub account_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub account_name: String,
}

impl BankInfo {
    pub fn is_empty(&self) -> bool {
        [&self.bank_name, &self.bank_code, &self.branch_name, &self.account_number, &self.account_name]
            .iter()
            .all(|s| s.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub desc: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub qty: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub unit: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub price: f64,
}

impl Default for LineItem {
    fn default() -> Self {
        LineItem {
            id: String::new(),
            name: String::new(),
            desc: String::new(),
            qty: 1,
            unit: String::new(),
            price: 0.0,
        }
    }
}

impl LineItem {
    pub fn subtotal(&self) -> f64 {
        self.qty as f64 * self.price
    }

    pub fn to_row(&self, quote_id: &str) -> Row {
        vec![
            Value::from(quote_id),
            Value::from(self.name.trim()),
            Value::from(self.desc.trim()),
            Value::from(self.qty),
            Value::from(self.unit.trim()),
            number_value(self.price),
            number_value(self.subtotal()),
        ]
    }

    /// Rows carry no item id, so ids are regenerated from the row order.
    pub fn from_row(row: &[Cell], position: usize) -> Self {
        let cell = |i: usize| row.get(i).map(cell_key).unwrap_or_default();
        LineItem {
            id: format!("I{}", position + 1),
            name: cell(1),
            desc: cell(2),
            qty: row.get(3).map(cell_number).unwrap_or(0.0).round() as i64,
            unit: cell(4),
            price: row.get(5).map(cell_number).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub week: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    /// Comma separated task list.
    #[serde(deserialize_with = "lenient_string")]
    pub tasks: String,
}

impl Milestone {
    pub fn task_list(&self) -> Vec<&str> {
        self.tasks
            .split([',', '、', '，'])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn to_row(&self, quote_id: &str) -> Row {
        vec![
            Value::from(quote_id),
            Value::from(self.week.trim()),
            Value::from(self.title.trim()),
            Value::from(self.tasks.trim()),
        ]
    }

    pub fn from_row(row: &[Cell], position: usize) -> Self {
        let cell = |i: usize| row.get(i).map(cell_key).unwrap_or_default();
        Milestone {
            id: format!("m{}", position + 1),
            week: cell(1),
            title: cell(2),
            tasks: cell(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quotation {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub quote_number: String,
    #[serde(deserialize_with = "lenient_string")]
    pub customer_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_contact: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_phone: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_address: String,
    #[serde(deserialize_with = "lenient_string")]
    pub project_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub project_type: String,
    pub items: Vec<LineItem>,
    pub milestones: Vec<Milestone>,
    #[serde(deserialize_with = "lenient_i64")]
    pub tax_rate: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub notes: String,
    #[serde(deserialize_with = "lenient_status")]
    pub status: QuoteStatus,
    #[serde(deserialize_with = "lenient_string")]
    pub created_at: String,
    #[serde(deserialize_with = "lenient_string")]
    pub valid_until: String,
    #[serde(deserialize_with = "lenient_string")]
    pub payment_terms: String,
    pub bank_info: BankInfo,
}

impl Default for Quotation {
    fn default() -> Self {
        Quotation {
            id: String::new(),
            quote_number: String::new(),
            customer_id: String::new(),
            client_name: String::new(),
            client_contact: String::new(),
            client_phone: String::new(),
            client_email: String::new(),
            client_address: String::new(),
            project_name: String::new(),
            project_type: String::new(),
            items: Vec::new(),
            milestones: Vec::new(),
            tax_rate: DEFAULT_TAX_RATE,
            notes: String::new(),
            status: QuoteStatus::Draft,
            created_at: String::new(),
            valid_until: String::new(),
            payment_terms: String::new(),
            bank_info: BankInfo::default(),
        }
    }
}

impl Quotation {
    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    pub fn tax(&self) -> f64 {
        (self.subtotal() * self.tax_rate as f64 / 100.0).round()
    }

    pub fn total(&self) -> f64 {
        self.subtotal() + self.tax()
    }

    /// Quantities must be positive and prices non-negative.
    pub fn validate_items(&self) -> RepositoryResult<()> {
        for (index, item) in self.items.iter().enumerate() {
            if item.qty < 1 {
                return Err(RepositoryError::validation(format!(
                    "Line item {} must have a positive quantity, got {}",
                    index + 1,
                    item.qty
                )));
            }
            if item.price < 0.0 || !item.price.is_finite() {
                return Err(RepositoryError::validation(format!(
                    "Line item {} must have a non-negative price",
                    index + 1
                )));
            }
        }
        Ok(())
    }
}

impl SheetRecord for Quotation {
    const SHEET: SheetSpec = QUOTATIONS;
    const KIND: &'static str = "Quotation";

    fn id(&self) -> &str {
        &self.id
    }

    fn normalized(self) -> Self {
        let trim = |s: String| s.trim().to_string();
        Quotation {
            id: trim(self.id),
            quote_number: trim(self.quote_number),
            customer_id: trim(self.customer_id),
            client_name: trim(self.client_name),
            client_contact: trim(self.client_contact),
            client_phone: trim(self.client_phone),
            client_email: trim(self.client_email),
            client_address: trim(self.client_address),
            project_name: trim(self.project_name),
            project_type: trim(self.project_type),
            items: self.items,
            milestones: self.milestones,
            tax_rate: self.tax_rate,
            notes: trim(self.notes),
            status: self.status,
            created_at: trim(self.created_at),
            valid_until: trim(self.valid_until),
            payment_terms: trim(self.payment_terms),
            bank_info: self.bank_info,
        }
    }

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("id", &self.id), ("quoteNumber", &self.quote_number)]
    }

    fn to_row(&self) -> Row {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.customer_id.as_str()),
            Value::from(self.client_name.as_str()),
            Value::from(self.client_contact.as_str()),
            Value::from(self.client_phone.as_str()),
            Value::from(self.client_email.as_str()),
            Value::from(self.client_address.as_str()),
            Value::from(self.project_name.as_str()),
            Value::from(self.project_type.as_str()),
            Value::from(self.tax_rate),
            Value::from(self.status.as_str()),
            Value::from(self.created_at.as_str()),
            Value::from(self.valid_until.as_str()),
            Value::from(self.payment_terms.as_str()),
            Value::from(self.notes.as_str()),
            Value::from(self.quote_number.as_str()),
        ]
    }

    /// Legacy rows carry no display number; their key doubles as one.
    fn from_row(row: &[Cell]) -> Option<Self> {
        let cell = |i: usize| row.get(i).map(cell_key).unwrap_or_default();
        let id = cell(0);
        let display_number = cell(15);
        let quotation = Quotation {
            quote_number: if display_number.is_empty() { id.clone() } else { display_number },
            id,
            customer_id: cell(1),
            client_name: cell(2),
            client_contact: cell(3),
            client_phone: cell(4),
            client_email: cell(5),
            client_address: cell(6),
            project_name: cell(7),
            project_type: cell(8),
            tax_rate: row
                .get(9)
                .filter(|c| !cell_key(c).is_empty())
                .map(|c| cell_number(c).round() as i64)
                .unwrap_or(DEFAULT_TAX_RATE),
            status: cell(10).parse().unwrap_or_default(),
            created_at: cell(11),
            valid_until: cell(12),
            payment_terms: cell(13),
            notes: cell(14),
            ..Default::default()
        };
        (!quotation.id.is_empty() && !quotation.quote_number.is_empty()).then_some(quotation)
    }
}

/// Next free quote number for `year`, shaped `{prefix}-{year}-{NNN}`.
///
/// Numbering starts after the count of numbers already issued that year and
/// skips forward past any number that is still taken.
pub fn next_quote_number<'a, I>(prefix: &str, year: i32, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let year_tag = year.to_string();
    let issued: Vec<&str> = existing.into_iter().filter(|n| n.contains(&year_tag)).collect();
    let mut seq = issued.len() + 1;
    loop {
        let candidate = format!("{}-{}-{:03}", prefix, year, seq);
        if !issued.iter().any(|n| n.trim() == candidate) {
            return candidate;
        }
        seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(qty: i64, price: f64) -> LineItem {
        LineItem { name: "Work".into(), qty, price, ..Default::default() }
    }

    #[test]
    fn test_totals_round_tax() {
        let quotation = Quotation {
            items: vec![item(1, 15000.0), item(2, 5000.0), item(1, 333.0)],
            tax_rate: 5,
            ..Default::default()
        };
        assert_eq!(quotation.subtotal(), 25333.0);
        assert_eq!(quotation.tax(), 1267.0);
        assert_eq!(quotation.total(), 26600.0);
    }

    #[test]
    fn test_deserialize_defaults_and_coercion() {
        let quotation: Quotation = serde_json::from_value(json!({
            "id": "Q1",
            "quoteNumber": "ZN-2026-001",
            "taxRate": "5",
            "status": "sent",
            "items": [{ "name": "Setup", "qty": "2", "price": "1500" }]
        }))
        .unwrap();
        assert_eq!(quotation.tax_rate, 5);
        assert_eq!(quotation.status, QuoteStatus::Sent);
        assert_eq!(quotation.items[0].qty, 2);
        assert_eq!(quotation.items[0].price, 1500.0);
        assert!(quotation.milestones.is_empty());
    }

    #[test]
    fn test_unreadable_status_falls_back_to_draft() {
        for status in [json!(""), json!(null), json!("bogus"), json!(3)] {
            let quotation: Quotation = serde_json::from_value(json!({ "id": "Q1", "status": status })).unwrap();
            assert_eq!(quotation.status, QuoteStatus::Draft, "{}", status);
        }
        let quotation: Quotation = serde_json::from_value(json!({ "id": "Q1", "status": " Accepted " })).unwrap();
        assert_eq!(quotation.status, QuoteStatus::Accepted);
    }

    #[test]
    fn test_missing_tax_rate_defaults_to_five() {
        let quotation: Quotation = serde_json::from_value(json!({ "id": "Q1" })).unwrap();
        assert_eq!(quotation.tax_rate, DEFAULT_TAX_RATE);
    }

    #[test]
    fn test_validate_items_rejects_zero_quantity() {
        let quotation = Quotation { items: vec![item(0, 10.0)], ..Default::default() };
        assert!(quotation.validate_items().is_err());
        let quotation = Quotation { items: vec![item(1, -1.0)], ..Default::default() };
        assert!(quotation.validate_items().is_err());
    }

    #[test]
    fn test_line_item_row_carries_subtotal() {
        let row = item(3, 8000.0).to_row("Q3");
        assert_eq!(row[0], json!("Q3"));
        assert_eq!(row[6], json!(24000));
    }

    #[test]
    fn test_milestone_task_list() {
        let milestone = Milestone { tasks: "UAT, go-live,, handover".into(), ..Default::default() };
        assert_eq!(milestone.task_list(), vec!["UAT", "go-live", "handover"]);
    }

    #[test]
    fn test_quotation_row_round_trip() {
        let quotation = Quotation {
            id: "Q1".into(),
            quote_number: "ZN-2026-001".into(),
            client_name: "Veg8".into(),
            tax_rate: 0,
            status: QuoteStatus::Accepted,
            ..Default::default()
        };
        let parsed = Quotation::from_row(&quotation.to_row()).unwrap();
        assert_eq!(parsed.id, "Q1");
        assert_eq!(parsed.tax_rate, 0);
        assert_eq!(parsed.status, QuoteStatus::Accepted);
        assert_eq!(parsed.client_name, "Veg8");
        assert_eq!(parsed.quote_number, "ZN-2026-001");
    }

    #[test]
    fn test_legacy_row_without_display_number() {
        let row: Vec<Value> = [
            "ZN-2026-001", "C001", "Acme", "Bob", "02-1234", "ops@acme.test", "Taipei", "Site",
            "web", "", "sent", "2026-01-05", "2026-02-04", "Net 30", "rush",
        ]
        .iter()
        .map(|cell| json!(cell))
        .collect();
        assert_eq!(row.len(), QUOTATIONS.width() - 1);

        let parsed = Quotation::from_row(&row).unwrap();
        assert_eq!(parsed.id, "ZN-2026-001");
        assert_eq!(parsed.quote_number, "ZN-2026-001");
        assert_eq!(parsed.customer_id, "C001");
        assert_eq!(parsed.client_name, "Acme");
        assert_eq!(parsed.project_type, "web");
        assert_eq!(parsed.tax_rate, DEFAULT_TAX_RATE);
        assert_eq!(parsed.status, QuoteStatus::Sent);
        assert_eq!(parsed.created_at, "2026-01-05");
        assert_eq!(parsed.notes, "rush");
    }

    #[test]
    fn test_row_keeps_key_first_and_display_number_last() {
        let quotation = Quotation { id: "Q7".into(), quote_number: "ZN-2026-007".into(), ..Default::default() };
        let row = quotation.to_row();
        assert_eq!(row.len(), QUOTATIONS.width());
        assert_eq!(row[0], json!("Q7"));
        assert_eq!(row[QUOTATIONS.width() - 1], json!("ZN-2026-007"));
    }

    #[test]
    fn test_next_quote_number() {
        let existing = ["ZN-2026-001", "ZN-2026-002", "ZN-2025-009"];
        assert_eq!(next_quote_number("ZN", 2026, existing), "ZN-2026-003");
        assert_eq!(next_quote_number("ZN", 2027, existing), "ZN-2027-001");
    }

    #[test]
    fn test_next_quote_number_skips_taken_numbers() {
        let existing = ["ZN-2026-001", "ZN-2026-003"];
        assert_eq!(next_quote_number("ZN", 2026, existing), "ZN-2026-004");
    }
}
