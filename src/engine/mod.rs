//! The four storage engines (spec §2, §4.E-H) plus a thin facade that
//! composes them into one `Database` handle. The facade itself has no
//! direct spec grounding — it exists so `kadeql::executor` and the
//! top-level crate API have a single object to hold, the way the
//! teacher's `Database` in `init.rs`/`run.rs` owns its storage.

pub mod document;
pub mod graph;
pub mod relational;
pub mod timeseries;

use document::DocumentStore;
use graph::GraphStore;
use relational::RelationalStore;
use timeseries::TimeSeriesStore;

#[derive(Default)]
pub struct Database {
    pub relational: RelationalStore,
    pub document: DocumentStore,
    pub graph: GraphStore,
    pub timeseries: TimeSeriesStore,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }
}
