//! [`SheetStore`] backed by the Google Sheets REST API (v4).
//!
//! Authentication is a bearer token supplied through configuration; token
//! refresh is left to whatever provisions it.

use crate::config::sheets_conf::SheetsConfig;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::repository::sheet_store::{Row, SheetSpec, SheetStore, DATA_START_ROW};
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

/// Spreadsheet column letter for a 1-based column number (1 → A, 27 → AA).
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 range covering `width` columns of `sheet`, from `first_row` to
/// `last_row` (open-ended when `None`).
pub fn a1_range(sheet: &str, width: usize, first_row: usize, last_row: Option<usize>) -> String {
    let quoted = sheet.replace('\'', "''");
    let last_col = column_letter(width.max(1));
    match last_row {
        Some(last) => format!("'{}'!A{}:{}{}", quoted, first_row, last_col, last),
        None => format!("'{}'!A{}:{}", quoted, first_row, last_col),
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

pub struct GoogleSheetsStore {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    access_token: String,
    sheet_ids: RwLock<HashMap<String, i64>>,
}

impl GoogleSheetsStore {
    pub fn new(config: &SheetsConfig) -> RepositoryResult<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| RepositoryError::connection("Spreadsheet id not configured"))?;
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| RepositoryError::connection("Sheets access token not configured"))?;
        info!(spreadsheet_id = %spreadsheet_id, "Using Google Sheets store");
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            spreadsheet_id,
            access_token,
            sheet_ids: RwLock::new(HashMap::new()),
        })
    }

    fn url(&self, tail: &[&str]) -> RepositoryResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| RepositoryError::connection(format!("Invalid sheets API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| RepositoryError::connection("Sheets API base cannot be a base URL"))?
            .pop_if_empty()
            .push("spreadsheets")
            .extend(tail);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> RepositoryResult<Value> {
        debug!(%method, %url, "Sheets request");
        let mut request = self.client.request(method, url).bearer_auth(&self.access_token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Sheets API returned an error");
            return Err(RepositoryError::database(format!("Sheets API error ({}): {}", status, body)));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| RepositoryError::serialization(format!("Invalid sheets response: {}", e)))
    }

    async fn batch_update(&self, requests: Value) -> RepositoryResult<Value> {
        let url = self.url(&[&format!("{}:batchUpdate", self.spreadsheet_id)])?;
        self.send(Method::POST, url, Some(json!({ "requests": requests }))).await
    }

    async fn refresh_sheet_ids(&self) -> RepositoryResult<()> {
        let mut url = self.url(&[&self.spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties(sheetId,title)");
        let body = self.send(Method::GET, url, None).await?;
        let meta: SpreadsheetMeta = serde_json::from_value(body)
            .map_err(|e| RepositoryError::serialization(format!("Invalid spreadsheet metadata: {}", e)))?;
        let mut ids = self.sheet_ids.write().await;
        ids.clear();
        for sheet in meta.sheets {
            ids.insert(sheet.properties.title, sheet.properties.sheet_id);
        }
        Ok(())
    }

    async fn sheet_id(&self, sheet: &str) -> RepositoryResult<Option<i64>> {
        if let Some(id) = self.sheet_ids.read().await.get(sheet) {
            return Ok(Some(*id));
        }
        self.refresh_sheet_ids().await?;
        Ok(self.sheet_ids.read().await.get(sheet).copied())
    }

    async fn require_sheet_id(&self, sheet: &str) -> RepositoryResult<i64> {
        self.sheet_id(sheet)
            .await?
            .ok_or_else(|| RepositoryError::not_found(format!("Sheet '{}' does not exist", sheet)))
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsStore {
    async fn sheet_exists(&self, sheet: &str) -> RepositoryResult<bool> {
        Ok(self.sheet_id(sheet).await?.is_some())
    }

    #[instrument(skip(self, spec), fields(sheet = spec.name))]
    async fn create_sheet(&self, spec: &SheetSpec) -> RepositoryResult<()> {
        if self.sheet_exists(spec.name).await? {
            return Ok(());
        }
        info!("Creating sheet");
        let reply = self
            .batch_update(json!([{
                "addSheet": {
                    "properties": {
                        "title": spec.name,
                        "gridProperties": { "frozenRowCount": 2 }
                    }
                }
            }]))
            .await?;
        let sheet_id = reply
            .pointer("/replies/0/addSheet/properties/sheetId")
            .and_then(Value::as_i64)
            .ok_or_else(|| RepositoryError::serialization("addSheet reply without sheetId"))?;
        self.sheet_ids.write().await.insert(spec.name.to_string(), sheet_id);

        let width = spec.width();
        let mut banner = vec![Value::from(spec.title)];
        banner.resize(width, Value::from(""));
        let headers: Vec<Value> = spec.headers.iter().map(|h| Value::from(*h)).collect();

        let range = a1_range(spec.name, width, 1, Some(2));
        let mut url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        self.send(
            Method::PUT,
            url,
            Some(json!({ "range": range, "majorDimension": "ROWS", "values": [banner, headers] })),
        )
        .await?;

        self.batch_update(json!([{
            "mergeCells": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": 0,
                    "endRowIndex": 1,
                    "startColumnIndex": 0,
                    "endColumnIndex": width
                },
                "mergeType": "MERGE_ALL"
            }
        }]))
        .await?;
        Ok(())
    }

    async fn read_rows(&self, sheet: &str, width: usize) -> RepositoryResult<Option<Vec<Row>>> {
        if !self.sheet_exists(sheet).await? {
            return Ok(None);
        }
        let range = a1_range(sheet, width, DATA_START_ROW, None);
        let mut url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");
        let body = self.send(Method::GET, url, None).await?;
        let values: ValueRange = serde_json::from_value(body)
            .map_err(|e| RepositoryError::serialization(format!("Invalid value range: {}", e)))?;
        let rows = values
            .values
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::from(""));
                row
            })
            .collect();
        Ok(Some(rows))
    }

    async fn append_row(&self, sheet: &str, row: Row) -> RepositoryResult<()> {
        let range = a1_range(sheet, row.len(), 1, None);
        let mut url = self.url(&[&self.spreadsheet_id, "values", &format!("{}:append", range)])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.send(Method::POST, url, Some(json!({ "majorDimension": "ROWS", "values": [row] })))
            .await?;
        Ok(())
    }

    async fn update_row(&self, sheet: &str, index: usize, row: Row) -> RepositoryResult<()> {
        let sheet_row = index + DATA_START_ROW;
        let range = a1_range(sheet, row.len(), sheet_row, Some(sheet_row));
        let mut url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        self.send(
            Method::PUT,
            url,
            Some(json!({ "range": range, "majorDimension": "ROWS", "values": [row] })),
        )
        .await?;
        Ok(())
    }

    async fn delete_row(&self, sheet: &str, index: usize) -> RepositoryResult<()> {
        let sheet_id = self.require_sheet_id(sheet).await?;
        let start = index + DATA_START_ROW - 1;
        self.batch_update(json!([{
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": start,
                    "endIndex": start + 1
                }
            }
        }]))
        .await?;
        Ok(())
    }
}
