//! Record normalizer: raw delimited text → typed [`SalesRecord`]s.
//!
//! Pure, no I/O. The first non-empty line is the header; fields are matched
//! by exact header name against the fixed schema. Splitting is a naive
//! single-character split with whitespace trim — quoted fields containing
//! the delimiter are not supported.
//!
//! Malformed rows never abort a batch: a row with an unparseable date or
//! numeric field is excluded from the output and counted, so the caller can
//! report exactly what was dropped. A failed numeric field is never coerced
//! to zero.

use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};

use crate::models::SalesRecord;

/// Fixed header names, matching the original consolidated sales export.
pub const HEADER_DATE: &str = "Data";
pub const HEADER_TRANSACTION_ID: &str = "ID_Transacao";
pub const HEADER_PRODUCT: &str = "Produto";
pub const HEADER_CATEGORY: &str = "Categoria";
pub const HEADER_REGION: &str = "Regiao";
pub const HEADER_QUANTITY: &str = "Quantidade";
pub const HEADER_UNIT_PRICE: &str = "Preco_Unitario";
pub const HEADER_TOTAL_REVENUE: &str = "Receita_Total";

/// Date format accepted for the `Data` field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A raw row keyed by header name, before typing.
pub type RawRow = HashMap<String, String>;

/// Result of normalizing one batch: the records that parsed cleanly plus
/// per-reason counts of rows that were dropped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NormalizedBatch {
    /// Records in input order.
    pub records: Vec<SalesRecord>,
    /// Rows dropped because the date did not parse.
    pub skipped_dates: usize,
    /// Rows dropped because a numeric field did not parse.
    pub skipped_numeric: usize,
}

impl NormalizedBatch {
    /// Total rows dropped, all reasons combined.
    pub fn skipped(&self) -> usize {
        self.skipped_dates + self.skipped_numeric
    }
}

/// Split raw delimited text into rows keyed by the header line.
///
/// The first non-empty line is the header. A UTF-8 byte-order mark on the
/// first header token is stripped. Rows shorter than the header get empty
/// strings for the missing trailing fields; extra trailing fields are
/// ignored.
///
/// Returns an error only when the input contains no header line at all.
pub fn parse_delimited(text: &str, delimiter: char) -> Result<Vec<RawRow>> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let header_line = match lines.next() {
        Some(line) => line,
        None => bail!("input contains no header row"),
    };

    let headers: Vec<String> = header_line
        .split(delimiter)
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let rows = lines
        .map(|line| {
            let values: Vec<&str> = line.split(delimiter).map(str::trim).collect();
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = values.get(i).copied().unwrap_or("");
                    (header.clone(), value.to_string())
                })
                .collect()
        })
        .collect();

    Ok(rows)
}

/// Normalize raw rows into typed records against the fixed schema.
///
/// Row order is preserved. Rows with a malformed `Data` or an unparseable
/// numeric field are dropped and counted in the returned batch.
pub fn normalize_rows(rows: &[RawRow]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for row in rows {
        let date = match NaiveDate::parse_from_str(field(row, HEADER_DATE), DATE_FORMAT) {
            Ok(date) => date,
            Err(_) => {
                batch.skipped_dates += 1;
                continue;
            }
        };

        let quantity = field(row, HEADER_QUANTITY).parse::<i64>();
        let unit_price = field(row, HEADER_UNIT_PRICE).parse::<f64>();
        let total_revenue = field(row, HEADER_TOTAL_REVENUE).parse::<f64>();

        let (quantity, unit_price, total_revenue) = match (quantity, unit_price, total_revenue) {
            (Ok(q), Ok(p), Ok(r)) => (q, p, r),
            _ => {
                batch.skipped_numeric += 1;
                continue;
            }
        };

        batch.records.push(SalesRecord {
            date,
            transaction_id: field(row, HEADER_TRANSACTION_ID).to_string(),
            product: field(row, HEADER_PRODUCT).to_string(),
            category: field(row, HEADER_CATEGORY).to_string(),
            region: field(row, HEADER_REGION).to_string(),
            quantity,
            unit_price,
            total_revenue,
            month: date.month(),
            year: date.year(),
        });
    }

    batch
}

/// Parse raw delimited text straight into a normalized batch.
pub fn normalize_text(text: &str, delimiter: char) -> Result<NormalizedBatch> {
    let rows = parse_delimited(text, delimiter)?;
    Ok(normalize_rows(&rows))
}

fn field<'a>(row: &'a RawRow, header: &str) -> &'a str {
    row.get(header).map(String::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Data,ID_Transacao,Produto,Categoria,Regiao,Quantidade,Preco_Unitario,Receita_Total
2024-01-05,T-0001,Mouse,Acessórios,Sul,10,25.00,250.00
2024-02-10,T-0002,Teclado,Acessórios,Norte,4,80.50,322.00
";

    #[test]
    fn test_valid_rows_all_normalized() {
        let batch = normalize_text(SAMPLE, ',').unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skipped(), 0);

        let first = &batch.records[0];
        assert_eq!(first.transaction_id, "T-0001");
        assert_eq!(first.product, "Mouse");
        assert_eq!(first.region, "Sul");
        assert_eq!(first.quantity, 10);
        assert_eq!(first.unit_price, 25.00);
        assert_eq!(first.total_revenue, 250.00);
        assert_eq!(first.month, 1);
        assert_eq!(first.year, 2024);
    }

    #[test]
    fn test_bom_stripped_from_first_header() {
        let text = format!("\u{feff}{}", SAMPLE);
        let batch = normalize_text(&text, ',').unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].date.to_string(), "2024-01-05");
    }

    #[test]
    fn test_header_order_is_arbitrary() {
        let text = "\
Produto,Data,Receita_Total,ID_Transacao,Categoria,Regiao,Preco_Unitario,Quantidade
Monitor,2024-03-01,1200.00,T-0100,Eletrônicos,Sudeste,600.00,2
";
        let batch = normalize_text(text, ',').unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].product, "Monitor");
        assert_eq!(batch.records[0].quantity, 2);
        assert_eq!(batch.records[0].total_revenue, 1200.00);
    }

    #[test]
    fn test_malformed_date_skips_row_only() {
        let text = "\
Data,ID_Transacao,Produto,Categoria,Regiao,Quantidade,Preco_Unitario,Receita_Total
05/01/2024,T-0001,Mouse,Acessórios,Sul,10,25.00,250.00
2024-02-10,T-0002,Teclado,Acessórios,Norte,4,80.50,322.00
";
        let batch = normalize_text(text, ',').unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped_dates, 1);
        assert_eq!(batch.skipped_numeric, 0);
        assert_eq!(batch.records[0].transaction_id, "T-0002");
    }

    #[test]
    fn test_unparseable_quantity_skips_exactly_one_row() {
        let text = "\
Data,ID_Transacao,Produto,Categoria,Regiao,Quantidade,Preco_Unitario,Receita_Total
2024-01-05,T-0001,Mouse,Acessórios,Sul,abc,25.00,250.00
2024-02-10,T-0002,Teclado,Acessórios,Norte,4,80.50,322.00
";
        let batch = normalize_text(text, ',').unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped_numeric, 1);
        assert_eq!(batch.records[0].transaction_id, "T-0002");
        // The bad row must not survive with a zeroed quantity.
        assert!(batch.records.iter().all(|r| r.transaction_id != "T-0001"));
    }

    #[test]
    fn test_short_row_missing_numeric_counts_as_skip() {
        let text = "\
Data,ID_Transacao,Produto,Categoria,Regiao,Quantidade,Preco_Unitario,Receita_Total
2024-01-05,T-0001,Mouse,Acessórios,Sul
";
        let batch = normalize_text(text, ',').unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.skipped_numeric, 1);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let text = "\

Data,ID_Transacao,Produto,Categoria,Regiao,Quantidade,Preco_Unitario,Receita_Total

2024-01-05,T-0001,Mouse,Acessórios,Sul,10,25.00,250.00

";
        let batch = normalize_text(text, ',').unwrap();
        assert_eq!(batch.records.len(), 1);
    }

    #[test]
    fn test_whitespace_trimmed_around_fields() {
        let text = "\
Data , ID_Transacao , Produto , Categoria , Regiao , Quantidade , Preco_Unitario , Receita_Total
 2024-01-05 , T-0001 , Mouse , Acessórios , Sul , 10 , 25.00 , 250.00
";
        let batch = normalize_text(text, ',').unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].product, "Mouse");
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(parse_delimited("", ',').is_err());
        assert!(parse_delimited("  \n\n  ", ',').is_err());
    }

    #[test]
    fn test_alternate_delimiter() {
        let text = "\
Data;ID_Transacao;Produto;Categoria;Regiao;Quantidade;Preco_Unitario;Receita_Total
2024-01-05;T-0001;Mouse;Acessórios;Sul;10;25.00;250.00
";
        let batch = normalize_text(text, ';').unwrap();
        assert_eq!(batch.records.len(), 1);
    }
}
