use crate::repository::record_repo::SheetRecord;
use crate::repository::sheet_schema::SERVICES;
use crate::repository::sheet_store::{Cell, Row, SheetSpec};
use crate::util::coerce::{cell_key, cell_number, lenient_f64, lenient_string, number_value};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unit used when a catalog entry does not name one.
pub const DEFAULT_UNIT: &str = "式";

/// Catalog entry of the service library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceItem {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub desc: String,
    #[serde(deserialize_with = "lenient_string")]
    pub unit: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub price: f64,
}

impl SheetRecord for ServiceItem {
    const SHEET: SheetSpec = SERVICES;
    const KIND: &'static str = "Service";

    fn id(&self) -> &str {
        &self.id
    }

    fn normalized(self) -> Self {
        let unit = self.unit.trim();
        ServiceItem {
            id: self.id.trim().to_string(),
            name: self.name.trim().to_string(),
            desc: self.desc.trim().to_string(),
            unit: if unit.is_empty() { DEFAULT_UNIT.to_string() } else { unit.to_string() },
            price: if self.price.is_finite() { self.price } else { 0.0 },
        }
    }

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("id", &self.id), ("name", &self.name)]
    }

    fn to_row(&self) -> Row {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.name.as_str()),
            Value::from(self.desc.as_str()),
            Value::from(self.unit.as_str()),
            number_value(self.price),
        ]
    }

    fn from_row(row: &[Cell]) -> Option<Self> {
        let cell = |i: usize| row.get(i).map(cell_key).unwrap_or_default();
        let service = ServiceItem {
            id: cell(0),
            name: cell(1),
            desc: cell(2),
            unit: cell(3),
            price: row.get(4).map(cell_number).unwrap_or(0.0),
        };
        (!service.id.is_empty() && !service.name.is_empty()).then_some(service)
    }
}
