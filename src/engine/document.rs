//! In-memory document engine (spec §4.F).
//!
//! Storage = `map<collection, {schema?, docs: map<key, Document>}>`. Schema
//! is optional per collection, unlike the relational engine where it is
//! mandatory — `put` auto-creates a missing collection the way the teacher's
//! SQL layer auto-creates system catalog rows on first use.

use crate::predicate::DocPredicate;
use crate::row::Document;
use crate::schema::{validate_document, validate_unique_docs, DocumentSchema};
use crate::status::{KdbResult, Status};
use rustc_hash::FxHashMap;
use parking_lot::Mutex;

struct CollectionData {
    schema: Option<DocumentSchema>,
    docs: FxHashMap<String, Document>,
}

#[derive(Default)]
pub struct DocumentStore {
    collections: Mutex<FxHashMap<String, CollectionData>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_collection(&self, name: &str, schema: Option<DocumentSchema>) -> KdbResult<()> {
        let mut cols = self.collections.lock();
        if cols.contains_key(name) {
            return Err(Status::already_exists(format!(
                "collection '{}' already exists",
                name
            )));
        }
        cols.insert(
            name.to_string(),
            CollectionData {
                schema,
                docs: FxHashMap::default(),
            },
        );
        Ok(())
    }

    /// Auto-creates the collection (schemaless) if missing. If the
    /// collection has a schema, validates the document and re-checks
    /// uniqueness across a virtual copy that excludes the key being
    /// replaced plus the new document.
    pub fn put(&self, collection: &str, key: &str, doc: Document) -> KdbResult<()> {
        let mut cols = self.collections.lock();
        let c = cols.entry(collection.to_string()).or_insert_with(|| CollectionData {
            schema: None,
            docs: FxHashMap::default(),
        });

        if let Some(schema) = &c.schema {
            validate_document(schema, doc.fields())?;

            let others: Vec<&Document> = c
                .docs
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v)
                .collect();
            let mut virtual_set: Vec<&Document> = others;
            virtual_set.push(&doc);
            validate_unique_docs(schema, virtual_set.into_iter(), true)?;
        }

        c.docs.insert(key.to_string(), doc.clone_deep());
        Ok(())
    }

    pub fn get(&self, collection: &str, key: &str) -> KdbResult<Document> {
        let cols = self.collections.lock();
        let c = cols
            .get(collection)
            .ok_or_else(|| Status::not_found(format!("collection '{}' not found", collection)))?;
        c.docs
            .get(key)
            .map(|d| d.clone_deep())
            .ok_or_else(|| Status::not_found(format!("document '{}' not found", key)))
    }

    pub fn erase(&self, collection: &str, key: &str) -> KdbResult<()> {
        let mut cols = self.collections.lock();
        let c = cols
            .get_mut(collection)
            .ok_or_else(|| Status::not_found(format!("collection '{}' not found", collection)))?;
        if c.docs.remove(key).is_none() {
            return Err(Status::not_found(format!("document '{}' not found", key)));
        }
        Ok(())
    }

    pub fn count(&self, collection: &str) -> KdbResult<u64> {
        let cols = self.collections.lock();
        let c = cols
            .get(collection)
            .ok_or_else(|| Status::not_found(format!("collection '{}' not found", collection)))?;
        Ok(c.docs.len() as u64)
    }

    /// Projection names and predicate field names must exist in the schema
    /// (if present); returns `(key, projectedDocument)` pairs with
    /// deep-cloned cells.
    pub fn query(
        &self,
        collection: &str,
        projection: &[String],
        where_: Option<&DocPredicate>,
    ) -> KdbResult<Vec<(String, Document)>> {
        let cols = self.collections.lock();
        let c = cols
            .get(collection)
            .ok_or_else(|| Status::not_found(format!("collection '{}' not found", collection)))?;

        if let Some(schema) = &c.schema {
            for p in projection {
                if !schema.has_field(p) {
                    return Err(Status::invalid_argument(format!("unknown field '{}'", p)));
                }
            }
            check_predicate_fields(schema, where_)?;
        }

        let mut out = Vec::new();
        for (key, doc) in &c.docs {
            if let Some(pred) = where_ {
                if !pred.eval(doc) {
                    continue;
                }
            }
            out.push((key.clone(), doc.project(projection)));
        }
        Ok(out)
    }
}

fn check_predicate_fields(schema: &DocumentSchema, pred: Option<&DocPredicate>) -> KdbResult<()> {
    let Some(pred) = pred else { return Ok(()) };
    match pred {
        DocPredicate::Comparison { field, .. } => {
            if !schema.has_field(field) {
                return Err(Status::invalid_argument(format!("unknown field '{}'", field)));
            }
            Ok(())
        }
        DocPredicate::And(kids) | DocPredicate::Or(kids) => {
            for k in kids {
                check_predicate_fields(schema, Some(k))?;
            }
            Ok(())
        }
        DocPredicate::Not(kid) => check_predicate_fields(schema, Some(kid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::CompareOp;
    use crate::schema::Column;
    use crate::value::{DataType, Value};

    #[test]
    fn put_auto_creates_schemaless_collection() {
        let store = DocumentStore::new();
        let mut doc = Document::new();
        doc.set("x", Value::integer(1));
        store.put("events", "k1", doc).unwrap();
        assert_eq!(store.count("events").unwrap(), 1);
    }

    #[test]
    fn put_enforces_schema_and_uniqueness() {
        let store = DocumentStore::new();
        let mut fields = FxHashMap::default();
        fields.insert("email".to_string(), Column::new("email", DataType::String).nullable(false).unique(true));
        store.create_collection("users", Some(DocumentSchema::new(fields))).unwrap();

        let mut a = Document::new();
        a.set("email", Value::string("a@x.com"));
        store.put("users", "1", a).unwrap();

        let mut b = Document::new();
        b.set("email", Value::string("a@x.com"));
        let err = store.put("users", "2", b).unwrap_err();
        assert_eq!(err.code, crate::status::StatusCode::FailedPrecondition);
    }

    #[test]
    fn put_replace_same_key_does_not_self_conflict() {
        let store = DocumentStore::new();
        let mut fields = FxHashMap::default();
        fields.insert("email".to_string(), Column::new("email", DataType::String).unique(true));
        store.create_collection("users", Some(DocumentSchema::new(fields))).unwrap();

        let mut a = Document::new();
        a.set("email", Value::string("a@x.com"));
        store.put("users", "1", a.clone()).unwrap();
        // Re-putting the same key with the same value must not conflict
        // with itself.
        store.put("users", "1", a).unwrap();
    }

    #[test]
    fn query_rejects_unknown_projection_field_when_schema_present() {
        let store = DocumentStore::new();
        let mut fields = FxHashMap::default();
        fields.insert("x".to_string(), Column::new("x", DataType::Integer));
        store.create_collection("c", Some(DocumentSchema::new(fields))).unwrap();
        let err = store.query("c", &["missing".to_string()], None).unwrap_err();
        assert_eq!(err.code, crate::status::StatusCode::InvalidArgument);
    }

    #[test]
    fn query_projects_and_filters() {
        let store = DocumentStore::new();
        let mut d1 = Document::new();
        d1.set("a", Value::integer(1));
        d1.set("b", Value::integer(2));
        store.put("c", "k1", d1).unwrap();
        let mut d2 = Document::new();
        d2.set("a", Value::integer(5));
        d2.set("b", Value::integer(6));
        store.put("c", "k2", d2).unwrap();

        let pred = DocPredicate::Comparison {
            field: "a".to_string(),
            op: CompareOp::Gt,
            rhs: Value::integer(2),
        };
        let results = store.query("c", &["b".to_string()], Some(&pred)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "k2");
        assert_eq!(results[0].1.get("b"), Some(&Value::integer(6)));
        assert_eq!(results[0].1.get("a"), None);
    }
}
