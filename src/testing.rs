//! Test doubles and fixture builders for the backing-store protocol.
//!
//! The engine takes its backing store as an owned dependency, so tests swap
//! in a [`StubStore`] that records every outgoing query and let the test feed
//! responses back through the normal event path.

use crate::protocol::{
    BackingStore, ChildrenQuery, ChildrenResponse, RangeQuery, RangeResponse, Row, RowPatch,
};
use crate::record::Payload;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Captured {
    ranges: Vec<RangeQuery>,
    children: Vec<ChildrenQuery>,
}

/// A backing store that records queries instead of answering them.
///
/// Clones share the capture buffer: hand one clone to the controller and keep
/// another to inspect what was asked.
#[derive(Debug, Clone, Default)]
pub struct StubStore {
    captured: Arc<Mutex<Captured>>,
}

impl StubStore {
    /// Create an empty stub.
    pub fn new() -> Self {
        Self::default()
    }

    /// All range queries issued so far, in order.
    pub fn range_queries(&self) -> Vec<RangeQuery> {
        self.captured.lock().ranges.clone()
    }

    /// Number of range queries issued so far.
    pub fn range_query_count(&self) -> usize {
        self.captured.lock().ranges.len()
    }

    /// The most recent range query, if any.
    pub fn last_range_query(&self) -> Option<RangeQuery> {
        self.captured.lock().ranges.last().copied()
    }

    /// All children queries issued so far, in order.
    pub fn children_queries(&self) -> Vec<ChildrenQuery> {
        self.captured.lock().children.clone()
    }
}

impl BackingStore for StubStore {
    fn fetch_range(&mut self, query: RangeQuery) {
        self.captured.lock().ranges.push(query);
    }

    fn fetch_children(&mut self, query: ChildrenQuery) {
        self.captured.lock().children.push(query);
    }
}

/// A bare row with the given key and an empty payload.
pub fn row(key: &str) -> Row {
    Row::new(key, Payload::new())
}

/// `Add` patches for the given keys, in order.
pub fn adds(keys: &[&str]) -> Vec<RowPatch> {
    keys.iter().map(|&key| RowPatch::Add { row: row(key) }).collect()
}

/// A bulk snapshot response covering `offset..offset + keys.len()`.
pub fn range_response(offset: usize, keys: &[&str], seq: u64) -> RangeResponse {
    RangeResponse {
        data: adds(keys),
        offset,
        limit: keys.len(),
        seq,
    }
}

/// A children response for `parent` with one child per key.
pub fn children_response(parent: &str, keys: &[&str]) -> ChildrenResponse {
    ChildrenResponse {
        parent_key: parent.into(),
        children: keys.iter().map(|&key| row(key)).collect(),
    }
}
