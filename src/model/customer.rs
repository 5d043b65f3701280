use crate::repository::record_repo::SheetRecord;
use crate::repository::sheet_schema::CUSTOMERS;
use crate::repository::sheet_store::{Cell, Row, SheetSpec};
use crate::util::coerce::{cell_key, lenient_string};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub contact: String,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    #[serde(deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(deserialize_with = "lenient_string")]
    pub tax_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub notes: String,
    #[serde(deserialize_with = "lenient_string")]
    pub created_at: String,
}

impl SheetRecord for Customer {
    const SHEET: SheetSpec = CUSTOMERS;
    const KIND: &'static str = "Customer";

    fn id(&self) -> &str {
        &self.id
    }

    fn normalized(self) -> Self {
        Customer {
            id: self.id.trim().to_string(),
            name: self.name.trim().to_string(),
            contact: self.contact.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
            address: self.address.trim().to_string(),
            tax_id: self.tax_id.trim().to_string(),
            notes: self.notes.trim().to_string(),
            created_at: self.created_at.trim().to_string(),
        }
    }

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("id", &self.id), ("name", &self.name)]
    }

    fn to_row(&self) -> Row {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.name.as_str()),
            Value::from(self.contact.as_str()),
            Value::from(self.phone.as_str()),
            Value::from(self.email.as_str()),
            Value::from(self.address.as_str()),
            Value::from(self.tax_id.as_str()),
            Value::from(self.notes.as_str()),
            Value::from(self.created_at.as_str()),
        ]
    }

    fn from_row(row: &[Cell]) -> Option<Self> {
        let cell = |i: usize| row.get(i).map(cell_key).unwrap_or_default();
        let customer = Customer {
            id: cell(0),
            name: cell(1),
            contact: cell(2),
            phone: cell(3),
            email: cell(4),
            address: cell(5),
            tax_id: cell(6),
            notes: cell(7),
            created_at: cell(8),
        };
        (!customer.id.is_empty() && !customer.name.is_empty()).then_some(customer)
    }
}
