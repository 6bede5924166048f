//! # Tecnobot
//!
//! A sales-dataset ingestion and LLM-grounded analysis backend.
//!
//! Tecnobot turns delimited-text sales exports into a normalized SQLite
//! table and answers natural-language questions about them by forwarding a
//! conversation, grounded in a textual rendering of the full dataset, to an
//! external chat-completion service.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌─────────┐
//! │ Delimited │──▶│ Normalizer │──▶│ SQLite  │
//! │   text    │   │  (typed)   │   │ vendas  │
//! └───────────┘   └────────────┘   └────┬────┘
//!                                       │
//!                 ┌───────────┐   ┌─────▼─────┐   ┌────────────┐
//!   question ────▶│  Gateway  │◀──│ Formatter │   │    CLI     │
//!                 │ (LLM API) │   │ (context) │   │   / HTTP   │
//!                 └───────────┘   └───────────┘   └────────────┘
//! ```
//!
//! Each import replaces the entire stored generation; each chat request
//! serializes the whole dataset as context. See the module docs for the
//! consistency and failure contracts.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Delimited text → typed records |
//! | [`store`] | Dataset store (SQLite + in-memory) |
//! | [`migrate`] | Schema migrations |
//! | [`context`] | Dataset → model-facing context block |
//! | [`gateway`] | Completion service client and error taxonomy |
//! | [`server`] | HTTP API (import, chat, health) |

pub mod config;
pub mod context;
pub mod gateway;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod server;
pub mod store;
