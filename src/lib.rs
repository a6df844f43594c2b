//! KadeDB: an embeddable multi-model database engine combining
//! relational tables, schema-flexible documents, a labeled property
//! graph, and append-only time series over one shared value/row/schema
//! layer, queried through KadeQL.
//!
//! General design
//!
//! Every engine stores [`row::Row`]/[`row::Document`] values validated
//! against a [`schema::TableSchema`] or [`schema::DocumentSchema`], and
//! selects rows through a [`predicate::Predicate`] tree rather than
//! bespoke per-engine filter code. [`kadeql`] compiles KadeQL text down
//! to that same predicate/row interface, so the wire query language and
//! a direct Rust caller end up running identical code paths. Results
//! flow out through the shared [`resultset::ResultSet`], which knows
//! how to paginate, cursor over, and render itself as CSV or JSON.
//! [`serialize`] gives every value/row/schema a versioned binary and
//! JSON wire form, and [`storage`] persists pages of those bytes to a
//! real file behind a pinning LRU cache.
//!
//! ```
//! use kadedb::engine::Database;
//! use kadedb::schema::{Column, TableSchema};
//! use kadedb::value::{DataType, Value};
//! use kadedb::row::Row;
//!
//! let db = Database::new();
//! let schema = TableSchema::new(vec![Column::new("name", DataType::String)]).unwrap();
//! db.relational.create_table("people", schema).unwrap();
//! db.relational.insert_row("people", Row::new(vec![Value::string("Ada")])).unwrap();
//! ```

/// Status codes and the `Result` alias used at every API boundary.
pub mod status;

/// The tagged-union runtime value shared by every engine.
pub mod value;

/// Column, table, and document schemas plus validation.
pub mod schema;

/// Row and document record types.
pub mod row;

/// The predicate tree used to filter rows and documents.
pub mod predicate;

/// Relational, document, graph, and time-series storage engines.
pub mod engine;

/// KadeQL: tokenizer, parser, optimizer, and executor.
pub mod kadeql;

/// Query results: column metadata, pagination, cursoring, rendering.
pub mod resultset;

/// Versioned binary and JSON wire formats.
pub mod serialize;

/// Paged, file-backed storage with a pinning LRU cache.
pub mod storage;

pub use engine::Database;
pub use status::{KdbResult, Status, StatusCode};
