//! Tabular import/export. Bulk line-item upload accepts a CSV with either a
//! header row (matched by name) or bare `code,name,quantity` columns; the
//! admin report export mirrors the display table column set.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;

use crate::db::models::request::{LineItem, PoRequest};

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to read tabular data: {0}")]
    Csv(#[from] csv::Error),

    /// The file parsed but produced nothing usable. Surfaced as its own
    /// outcome so the UI can say "no valid rows" instead of a generic error.
    #[error("No valid line item rows found in the uploaded file")]
    NoValidRows,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write tabular data: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to finalize export: {0}")]
    Finalize(String),
}

const CODE_HEADERS: &[&str] = &["item_code", "item code", "code", "erp_code", "erp code"];
const NAME_HEADERS: &[&str] = &["item_name", "item name", "name"];
const QTY_HEADERS: &[&str] = &["quantity", "qty", "amount"];

fn header_index(record: &StringRecord, names: &[&str]) -> Option<usize> {
    record
        .iter()
        .position(|cell| names.contains(&cell.trim().to_lowercase().as_str()))
}

/// Parse uploaded bytes into line items.
///
/// If the first row names the columns, rows are mapped by header; otherwise
/// the first three columns are taken as (code, name, quantity) in order.
/// Rows missing a code/name or with an unparseable quantity are skipped.
pub fn parse_line_items(data: &[u8]) -> ImportResult<Vec<LineItem>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }

    let (code_idx, name_idx, qty_idx, skip_first) = match records.first() {
        Some(first) => match (
            header_index(first, CODE_HEADERS),
            header_index(first, NAME_HEADERS),
            header_index(first, QTY_HEADERS),
        ) {
            (Some(c), Some(n), Some(q)) => (c, n, q, true),
            _ => (0, 1, 2, false),
        },
        None => return Err(ImportError::NoValidRows),
    };

    let items: Vec<LineItem> = records
        .iter()
        .skip(usize::from(skip_first))
        .filter_map(|record| {
            let code = record.get(code_idx)?.trim();
            let name = record.get(name_idx)?.trim();
            let quantity: i64 = record.get(qty_idx)?.trim().parse().ok()?;
            if code.is_empty() && name.is_empty() {
                return None;
            }
            Some(LineItem {
                item_code: code.to_string(),
                item_name: name.to_string(),
                quantity,
            })
        })
        .collect();

    if items.is_empty() {
        return Err(ImportError::NoValidRows);
    }
    Ok(items)
}

/// Serde-derived snake_case label for an enum value, for report cells.
fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn items_cell(request: &PoRequest) -> String {
    request
        .items
        .iter()
        .map(|item| format!("{} {} x{}", item.item_code, item.item_name, item.quantity))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Write the request report the admin view downloads. Column set mirrors the
/// display table; rows arrive already filtered and sorted.
pub fn write_report(requests: &[PoRequest]) -> Result<Vec<u8>, ExportError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record([
        "request_date",
        "request_type",
        "category",
        "priority",
        "so_number",
        "customer",
        "requesting_dept",
        "requester_name",
        "factory_shipment_date",
        "confirmed_shipment_date",
        "shipping_method",
        "items",
        "reason_for_request",
        "request_details",
        "feasibility",
        "review_details",
        "reviewer_name",
        "reviewed_at",
        "status",
        "completed",
    ])?;

    for r in requests {
        writer.write_record([
            r.request_date.to_string(),
            label(&r.request_type),
            label(&r.category_of_request),
            label(&r.priority),
            r.so_number.clone().unwrap_or_default(),
            r.customer.clone(),
            r.requesting_dept.clone(),
            r.requester_name.clone(),
            r.factory_shipment_date.to_string(),
            r.confirmed_shipment_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            r.shipping_method.clone().unwrap_or_default(),
            items_cell(r),
            r.reason_for_request.clone(),
            r.request_details.clone(),
            r.feasibility.map(|f| label(&f)).unwrap_or_default(),
            r.review_details.clone().unwrap_or_default(),
            r.reviewer_name.clone().unwrap_or_default(),
            r.reviewed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            label(&r.status),
            r.completed.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Finalize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_header_names() {
        let data = b"item_code,item_name,quantity\nIB-100,Widget,5\nIB-200,Bracket,-2\n";
        let items = parse_line_items(data).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_code, "IB-100");
        assert_eq!(items[1].quantity, -2);
    }

    #[test]
    fn parses_headerless_rows_by_column_order() {
        let data = b"IB-100,Widget,3\nIB-300,Plate,0\n";
        let items = parse_line_items(data).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].quantity, 0);
    }

    #[test]
    fn reordered_headers_are_matched_by_name() {
        let data = b"qty,name,code\n7,Widget,IB-100\n";
        let items = parse_line_items(data).unwrap();
        assert_eq!(items[0].item_code, "IB-100");
        assert_eq!(items[0].quantity, 7);
    }

    #[test]
    fn skips_rows_with_bad_quantity() {
        let data = b"item_code,item_name,quantity\nIB-100,Widget,abc\nIB-200,Bracket,4\n";
        let items = parse_line_items(data).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_code, "IB-200");
    }

    #[test]
    fn empty_file_yields_no_valid_rows() {
        assert!(matches!(
            parse_line_items(b""),
            Err(ImportError::NoValidRows)
        ));
        assert!(matches!(
            parse_line_items(b"item_code,item_name,quantity\n"),
            Err(ImportError::NoValidRows)
        ));
    }

    #[test]
    fn report_has_header_row() {
        let bytes = write_report(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("request_date,request_type,category"));
    }
}
