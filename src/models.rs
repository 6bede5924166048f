//! Core data types shared across the ingestion and chat pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One normalized sales transaction, the unit entity of the dataset.
///
/// Produced exclusively by the normalizer ([`crate::normalize`]) and stored
/// as one row of the `vendas` table. `month` and `year` are derived from
/// `date` at ingestion time. `total_revenue` is trusted as supplied by the
/// source file and is never recomputed from `quantity * unit_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    /// Externally supplied identifier; no uniqueness is enforced.
    pub transaction_id: String,
    pub product: String,
    pub category: String,
    pub region: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_revenue: f64,
    /// 1-12, derived from `date`.
    pub month: u32,
    pub year: i32,
}

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn of the caller-owned conversation history.
///
/// History is append-only from the caller's perspective: the gateway never
/// mutates or reorders it, it only prepends one synthesized system turn
/// before forwarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
