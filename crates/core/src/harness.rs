//! In-memory record store for tests: scripted records, call logging,
//! and injectable failures.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use serde_json::Value;

use crate::store::{layouts, FieldData, RecordStore, RecordWithId, StoreError, UpdateOptions};

#[derive(Default)]
pub struct MemoryStore {
    records: RefCell<HashMap<String, Vec<(String, FieldData)>>>,
    next_id: Cell<u64>,
    next_trans: Cell<u64>,
    calls: RefCell<Vec<String>>,
    fail_op: RefCell<Option<(String, StoreError)>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        let store = MemoryStore::default();
        store.next_id.set(1);
        store.next_trans.set(1);
        store
    }

    /// Seed a record. `fields` must be a JSON object.
    pub fn put_record(&self, layout: &str, record_id: &str, fields: Value) {
        let Value::Object(map) = fields else {
            panic!("put_record expects a JSON object");
        };
        self.records
            .borrow_mut()
            .entry(layout.to_string())
            .or_default()
            .push((record_id.to_string(), map));
    }

    /// Make every subsequent call of `op` ("find", "create", "update",
    /// "delete", "get") fail with the given error.
    pub fn fail_on(&self, op: &str, err: StoreError) {
        *self.fail_op.borrow_mut() = Some((op.to_string(), err));
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn calls_of(&self, op: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(&format!("{}:", op)))
            .count()
    }

    pub fn record(&self, layout: &str, record_id: &str) -> Option<FieldData> {
        self.records
            .borrow()
            .get(layout)?
            .iter()
            .find(|(id, _)| id == record_id)
            .map(|(_, f)| f.clone())
    }

    pub fn record_count(&self, layout: &str) -> usize {
        self.records.borrow().get(layout).map_or(0, |v| v.len())
    }

    fn log(&self, op: &str, layout: &str) {
        self.calls.borrow_mut().push(format!("{}:{}", op, layout));
    }

    fn check_fail(&self, op: &str) -> Result<(), StoreError> {
        if let Some((fail_op, err)) = &*self.fail_op.borrow() {
            if fail_op == op {
                return Err(err.clone());
            }
        }
        Ok(())
    }
}

/// Query matching: numbers compare numerically (the store treats a
/// numeric string and a number as the same value), strings trimmed.
fn value_matches(record: &Value, query: &Value) -> bool {
    let as_f64 = |v: &Value| -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    };
    if let (Some(a), Some(b)) = (as_f64(record), as_f64(query)) {
        return a == b;
    }
    match (record, query) {
        (Value::String(a), Value::String(b)) => a.trim() == b.trim(),
        (a, b) => a == b,
    }
}

fn matches_query(fields: &FieldData, query: &FieldData) -> bool {
    query.iter().all(|(k, qv)| {
        fields.get(k).map_or(false, |rv| value_matches(rv, qv))
    })
}

impl RecordStore for MemoryStore {
    fn find(
        &self,
        layout: &str,
        query: &FieldData,
        limit: usize,
    ) -> Result<Vec<FieldData>, StoreError> {
        Ok(self
            .find_with_ids(layout, query, limit)?
            .into_iter()
            .map(|r| r.fields)
            .collect())
    }

    fn find_with_ids(
        &self,
        layout: &str,
        query: &FieldData,
        limit: usize,
    ) -> Result<Vec<RecordWithId>, StoreError> {
        self.log("find", layout);
        self.check_fail("find")?;
        Ok(self
            .records
            .borrow()
            .get(layout)
            .map(|records| {
                records
                    .iter()
                    .filter(|(_, f)| matches_query(f, query))
                    .take(limit)
                    .map(|(id, f)| RecordWithId {
                        record_id: id.clone(),
                        fields: f.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get(&self, layout: &str, record_id: &str) -> Result<Option<FieldData>, StoreError> {
        self.log("get", layout);
        self.check_fail("get")?;
        Ok(self.record(layout, record_id))
    }

    fn create(&self, layout: &str, fields: &FieldData) -> Result<String, StoreError> {
        self.log("create", layout);
        self.check_fail("create")?;
        let id = format!("rec-{}", self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);

        let mut stored = fields.clone();
        // The server assigns the transaction reference on header create
        if layout == layouts::PAYABLES_MAIN && !stored.contains_key("TransRef") {
            let trans = format!("TR-{}", self.next_trans.get());
            self.next_trans.set(self.next_trans.get() + 1);
            stored.insert("TransRef".to_string(), Value::String(trans));
        }
        self.records
            .borrow_mut()
            .entry(layout.to_string())
            .or_default()
            .push((id.clone(), stored));
        Ok(id)
    }

    fn update(
        &self,
        layout: &str,
        record_id: &str,
        fields: &FieldData,
        options: UpdateOptions,
    ) -> Result<(), StoreError> {
        self.log("update", layout);
        self.check_fail("update")?;
        let mut records = self.records.borrow_mut();
        let entry = records
            .get_mut(layout)
            .and_then(|v| v.iter_mut().find(|(id, _)| id == record_id));
        match entry {
            Some((_, stored)) => {
                for (k, v) in fields {
                    let is_empty_string = matches!(v, Value::String(s) if s.is_empty());
                    if is_empty_string && !options.allow_empty_strings {
                        continue;
                    }
                    stored.insert(k.clone(), v.clone());
                }
                Ok(())
            }
            None => Err(StoreError::Http(404, format!("no record {}", record_id))),
        }
    }

    fn delete(&self, layout: &str, record_id: &str) -> Result<(), StoreError> {
        self.log("delete", layout);
        self.check_fail("delete")?;
        let mut records = self.records.borrow_mut();
        if let Some(v) = records.get_mut(layout) {
            v.retain(|(id, _)| id != record_id);
        }
        Ok(())
    }
}
