use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Network deadline for the spreadsheet provider round trip.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const VALUES_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Full-grid range over the first worksheet.
const FULL_RANGE: &str = "A:ZZ";

#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("failed to read credential file {path}: {source}")]
    Credentials {
        path: String,
        source: std::io::Error,
    },

    #[error("sheet link {0:?} does not contain a spreadsheet id")]
    BadLink(String),

    #[error("spreadsheet request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("spreadsheet provider returned {0}")]
    Provider(reqwest::StatusCode),
}

/// One imported row, keyed by the header row's field names.
pub type SheetRecord = serde_json::Map<String, Value>;

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Client for the external spreadsheet service.
pub struct SheetsClient {
    http: reqwest::Client,
    token: String,
}

impl SheetsClient {
    /// Build a client from a service credential file holding a bearer token.
    pub fn from_credentials_file(path: &str) -> Result<Self, SheetsError> {
        let token = std::fs::read_to_string(path).map_err(|source| SheetsError::Credentials {
            path: path.to_string(),
            source,
        })?;

        Self::new(token.trim().to_string())
    }

    pub fn new(token: String) -> Result<Self, SheetsError> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;

        Ok(Self { http, token })
    }

    /// Fetch the full value grid of the first worksheet behind a share link.
    pub async fn fetch_first_sheet(&self, link: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let id = spreadsheet_id_from_link(link)?;
        let url = format!("{VALUES_ENDPOINT}/{id}/values/{FULL_RANGE}");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SheetsError::Provider(response.status()));
        }

        let range: ValueRange = response.json().await?;
        Ok(range.values)
    }
}

/// Pull the spreadsheet id out of a share link of the form
/// `https://docs.google.com/spreadsheets/d/<id>/...`.
pub fn spreadsheet_id_from_link(link: &str) -> Result<&str, SheetsError> {
    let id = link
        .split_once("/d/")
        .map(|(_, rest)| rest.split(['/', '?', '#']).next().unwrap_or(""))
        .unwrap_or("");

    if id.is_empty() {
        return Err(SheetsError::BadLink(link.to_string()));
    }

    Ok(id)
}

/// Convert a value grid into records: the first row names the fields,
/// each later row maps field name to cell value. Rows where every cell
/// is the empty string are skipped; rows shorter than the header read
/// the missing cells as empty.
pub fn grid_to_records(grid: &[Vec<String>]) -> Vec<SheetRecord> {
    let Some((headers, rows)) = grid.split_first() else {
        return Vec::new();
    };

    rows.iter()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let cell = row.get(i).cloned().unwrap_or_default();
                    (header.clone(), Value::String(cell))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn record(pairs: &[(&str, &str)]) -> SheetRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn blank_rows_are_skipped() {
        let grid = grid(&[
            &["Name", "Hours"],
            &["Alice", "5"],
            &["", ""],
            &["Bob", "3"],
        ]);

        let records = grid_to_records(&grid);
        assert_eq!(
            records,
            vec![
                record(&[("Name", "Alice"), ("Hours", "5")]),
                record(&[("Name", "Bob"), ("Hours", "3")]),
            ]
        );
    }

    #[test]
    fn partially_blank_rows_are_kept() {
        let grid = grid(&[&["Name", "Hours"], &["Alice", ""]]);

        let records = grid_to_records(&grid);
        assert_eq!(records, vec![record(&[("Name", "Alice"), ("Hours", "")])]);
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() {
        let grid = grid(&[&["Name", "Hours"], &["Alice"]]);

        let records = grid_to_records(&grid);
        assert_eq!(records, vec![record(&[("Name", "Alice"), ("Hours", "")])]);
    }

    #[test]
    fn header_only_grid_yields_nothing() {
        assert!(grid_to_records(&grid(&[&["Name", "Hours"]])).is_empty());
        assert!(grid_to_records(&[]).is_empty());
    }

    #[test]
    fn id_extraction_from_share_links() {
        let link = "https://docs.google.com/spreadsheets/d/abc123XYZ/edit#gid=0";
        assert_eq!(spreadsheet_id_from_link(link).unwrap(), "abc123XYZ");

        let bare = "https://docs.google.com/spreadsheets/d/abc123XYZ";
        assert_eq!(spreadsheet_id_from_link(bare).unwrap(), "abc123XYZ");

        assert!(spreadsheet_id_from_link("https://example.com/nope").is_err());
        assert!(spreadsheet_id_from_link("https://docs.google.com/spreadsheets/d/").is_err());
    }
}
