//! Override sheet adapter
//!
//! The authoritative winners and dates live in a spreadsheet whose CSV
//! export is fetched over HTTP. The first row is the header; the edition
//! column may be published under the alias `"Edition #"`. A sheet without
//! an edition column yields an empty table and the pipeline proceeds
//! without overrides.

use std::collections::HashMap;

use crate::remote::RemoteError;

const EDITION_COLUMN: &str = "Edition";
const EDITION_ALIAS: &str = "Edition #";
const WINNER_COLUMN: &str = "Winner";
const DATE_COLUMN: &str = "Date";

/// Authoritative fields for one edition. Only present, non-empty sheet
/// cells end up here; absence never erases archived data downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideRow {
    pub winner: Option<String>,
    pub date: Option<String>,
}

/// Overrides keyed by the string form of the edition number.
pub type OverrideTable = HashMap<String, OverrideRow>;

/// Fetch the sheet's CSV export and parse it into an override table.
pub async fn fetch_overrides(
    http_client: &reqwest::Client,
    url: &str,
) -> Result<OverrideTable, RemoteError> {
    tracing::debug!(url = %url, "Fetching override sheet");
    let response = http_client
        .get(url)
        .send()
        .await
        .map_err(|e| RemoteError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::Api(status.as_u16()));
    }

    let text = response
        .text()
        .await
        .map_err(|e| RemoteError::Network(e.to_string()))?;

    let table = parse_overrides(&text);
    tracing::info!(rows = table.len(), "Override sheet loaded");
    Ok(table)
}

/// Parse CSV text into an override table.
pub fn parse_overrides(text: &str) -> OverrideTable {
    let mut rows = parse_csv(text).into_iter();

    let Some(header) = rows.next() else {
        tracing::warn!("Override sheet is empty");
        return OverrideTable::new();
    };

    let columns: Vec<String> = header.iter().map(|c| normalize_column(c)).collect();
    let Some(edition_idx) = find_column(&columns, EDITION_COLUMN) else {
        tracing::warn!("Override sheet has no edition column, proceeding without overrides");
        return OverrideTable::new();
    };
    let winner_idx = find_column(&columns, WINNER_COLUMN);
    let date_idx = find_column(&columns, DATE_COLUMN);

    let mut table = OverrideTable::new();
    for row in rows {
        let Some(edition) = cell(&row, Some(edition_idx)) else {
            continue;
        };
        // Fold "07" onto "7" so lookups by the integer key's textual form hit
        let edition = edition
            .parse::<u32>()
            .map(|n| n.to_string())
            .unwrap_or(edition);
        // First row for an edition is authoritative
        table.entry(edition).or_insert_with(|| OverrideRow {
            winner: cell(&row, winner_idx),
            date: cell(&row, date_idx),
        });
    }
    table
}

/// Trim header whitespace and fold the known alias onto the canonical name.
fn normalize_column(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(EDITION_ALIAS) {
        EDITION_COLUMN.to_string()
    } else {
        trimmed.to_string()
    }
}

fn find_column(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.eq_ignore_ascii_case(name))
}

/// A trimmed, non-empty cell value, if the column exists in this row.
fn cell(row: &[String], index: Option<usize>) -> Option<String> {
    let value = row.get(index?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Minimal CSV parser: quoted fields, doubled-quote escapes, CRLF tolerant.
/// Blank lines are dropped.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(std::mem::take(&mut field)),
            '\r' | '\n' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(std::mem::take(&mut field));
                let blank = row.len() == 1 && row[0].is_empty();
                if !blank {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    // Trailing row without a final newline
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}
