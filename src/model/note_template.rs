use crate::repository::record_repo::SheetRecord;
use crate::repository::sheet_schema::NOTE_TEMPLATES;
use crate::repository::sheet_store::{Cell, Row, SheetSpec};
use crate::util::coerce::{cell_key, lenient_string};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reusable note text. Selecting one copies its text into a quotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteTemplate {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(deserialize_with = "lenient_string")]
    pub text: String,
}

impl SheetRecord for NoteTemplate {
    const SHEET: SheetSpec = NOTE_TEMPLATES;
    const KIND: &'static str = "Note template";

    fn id(&self) -> &str {
        &self.id
    }

    fn normalized(self) -> Self {
        NoteTemplate {
            id: self.id.trim().to_string(),
            label: self.label.trim().to_string(),
            text: self.text.trim().to_string(),
        }
    }

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("id", &self.id), ("label", &self.label)]
    }

    fn to_row(&self) -> Row {
        vec![
            Value::from(self.id.as_str()),
            Value::from(self.label.as_str()),
            Value::from(self.text.as_str()),
        ]
    }

    fn from_row(row: &[Cell]) -> Option<Self> {
        let cell = |i: usize| row.get(i).map(cell_key).unwrap_or_default();
        let template = NoteTemplate { id: cell(0), label: cell(1), text: cell(2) };
        (!template.id.is_empty() && !template.label.is_empty()).then_some(template)
    }
}
