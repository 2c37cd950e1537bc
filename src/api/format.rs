//! Response shapes for interpolated data pages.
//!
//! The format only changes how a page is serialized, never its values.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::data::Value;
use crate::service::DataPage;

/// Header carrying the continuation token of the next page
pub const NEXT_PAGE_HEADER: &str = "x-next-page-token";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Array of `{column: value}` objects
    #[default]
    #[serde(alias = "default")]
    Default,
    /// `{columns, rows}`
    #[serde(alias = "table")]
    Table,
    #[serde(alias = "tableNoHeaders", alias = "tablenoheaders")]
    TableNoHeaders,
    #[serde(alias = "csv")]
    Csv,
    /// CSV with a header line
    #[serde(alias = "csvh", alias = "csvH")]
    CsvH,
}

#[derive(Serialize)]
struct TableBody {
    columns: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
}

/// Serialize a page, attaching the next-page token as a header
pub fn render(format: OutputFormat, page: DataPage) -> Response {
    let next_page_token = page.next_page_token.clone();

    let mut response = match format {
        OutputFormat::Default => Json(records(&page)).into_response(),
        OutputFormat::Table => Json(TableBody {
            rows: json_rows(&page.rows),
            columns: page.columns,
        })
        .into_response(),
        OutputFormat::TableNoHeaders => Json(json_rows(&page.rows)).into_response(),
        OutputFormat::Csv => csv_response(to_csv(&page, false)),
        OutputFormat::CsvH => csv_response(to_csv(&page, true)),
    };

    if let Some(token) = next_page_token {
        if let Ok(value) = HeaderValue::from_str(&token) {
            response.headers_mut().insert(NEXT_PAGE_HEADER, value);
        }
    }
    response
}

fn records(page: &DataPage) -> Vec<serde_json::Map<String, serde_json::Value>> {
    page.rows
        .iter()
        .map(|row| {
            page.columns
                .iter()
                .zip(row)
                .map(|(column, value)| (column.clone(), value.to_json()))
                .collect()
        })
        .collect()
}

fn json_rows(rows: &[Vec<Value>]) -> Vec<Vec<serde_json::Value>> {
    rows.iter()
        .map(|row| row.iter().map(Value::to_json).collect())
        .collect()
}

fn csv_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Render rows as CSV. Missing values are empty cells.
pub fn to_csv(page: &DataPage, with_header: bool) -> String {
    let mut out = String::new();
    if with_header {
        push_line(&mut out, page.columns.iter().map(String::as_str));
    }
    for row in &page.rows {
        let cells: Vec<String> = row.iter().map(Value::to_label).collect();
        push_line(&mut out, cells.iter().map(String::as_str));
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push_str("\r\n");
}
