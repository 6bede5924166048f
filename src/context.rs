//! Context formatter: [`SalesRecord`]s → one bounded text block.
//!
//! The formatted block is the grounding context handed to the completion
//! service: a header line naming all ten logical fields, then one line per
//! record in fixed field order. Currency fields carry an `R$` marker.
//!
//! The entire dataset is serialized every time — no truncation, pagination,
//! or summarization. Analysis answers depend on the model seeing every
//! record, at the cost of context size growing linearly with the dataset.

use std::fmt::Write;

use crate::models::SalesRecord;

/// Field separator used between columns.
pub const FIELD_SEPARATOR: &str = " | ";

/// Header line naming the ten logical fields in render order.
pub const CONTEXT_HEADER: &str =
    "Data | ID_Transacao | Produto | Categoria | Regiao | Quantidade | Preco_Unitario | Receita_Total | Mes | Ano";

/// Render a record sequence as the model-facing context block.
///
/// An empty sequence renders as the header line alone.
pub fn format_context(records: &[SalesRecord]) -> String {
    let mut out = String::with_capacity(CONTEXT_HEADER.len() + records.len() * 96);
    out.push_str(CONTEXT_HEADER);

    for record in records {
        out.push('\n');
        out.push_str(&format_record(record));
    }

    out
}

/// Render one record as a single context line.
pub fn format_record(record: &SalesRecord) -> String {
    let mut line = String::with_capacity(96);
    let _ = write!(
        line,
        "{date}{sep}{id}{sep}{product}{sep}{category}{sep}{region}{sep}{quantity}{sep}R$ {price:.2}{sep}R$ {revenue:.2}{sep}{month}{sep}{year}",
        date = record.date.format("%Y-%m-%d"),
        id = record.transaction_id,
        product = record.product,
        category = record.category,
        region = record.region,
        quantity = record.quantity,
        price = record.unit_price,
        revenue = record.total_revenue,
        month = record.month,
        year = record.year,
        sep = FIELD_SEPARATOR,
    );
    line
}
