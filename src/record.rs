//! Row records: the unit of data flowing through the engine.
//!
//! A [`RowRecord`] is either a top-level row from the backing store, a child
//! of an expanded group, or a synthetic loading placeholder standing in for
//! data that has not arrived yet. Records are identified by a unique string
//! key; identity is preserved across a full snapshot replace when the key is
//! unchanged, so expansion state survives a refresh.

use serde_json::Value;

/// Compact string type for row keys. Most keys fit inline without a heap
/// allocation.
pub type RowKey = smartstring::alias::String;

/// Arbitrary payload fields copied from the backing store's record.
pub type Payload = serde_json::Map<String, Value>;

bitflags::bitflags! {
    /// Row state flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct RowFlags: u8 {
        /// The row can be expanded into an inline child block.
        const GROUP = 1 << 0;
        /// The row's children are currently displayed inline.
        const EXPANDED = 1 << 1;
        /// Placeholder whose real data has not arrived yet.
        const LOADING = 1 << 2;
        /// The row is a child of an expanded group.
        const CHILD = 1 << 3;
    }
}

/// A single row in the windowed view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    /// Unique key, stable across refreshes.
    pub key: RowKey,
    /// Group/expansion/loading state.
    pub flags: RowFlags,
    /// Inline children; empty unless the row is an expanded group.
    pub children: Vec<RowRecord>,
    /// Server-provided fields, opaque to the engine.
    pub payload: Payload,
}

impl RowRecord {
    /// Create a top-level record from a server payload.
    pub fn new(key: impl Into<RowKey>, payload: Payload) -> Self {
        Self {
            key: key.into(),
            flags: RowFlags::empty(),
            children: Vec::new(),
            payload,
        }
    }

    /// Create a child record from a server payload.
    pub fn child(key: impl Into<RowKey>, payload: Payload) -> Self {
        Self {
            key: key.into(),
            flags: RowFlags::CHILD,
            children: Vec::new(),
            payload,
        }
    }

    /// Synthetic loading child shown under `parent` while its real children
    /// are in flight. The slot keeps placeholder keys unique so they survive
    /// an upserting index.
    pub(crate) fn loading_child(parent: &RowKey, slot: usize) -> Self {
        Self {
            key: format!("{parent}/loading.{slot}").into(),
            flags: RowFlags::CHILD | RowFlags::LOADING,
            children: Vec::new(),
            payload: Payload::new(),
        }
    }

    /// Synthetic top-level placeholder padding the cache while a range
    /// refresh is in flight.
    pub(crate) fn gap_placeholder(slot: usize) -> Self {
        Self {
            key: format!("loading.{slot}").into(),
            flags: RowFlags::LOADING,
            children: Vec::new(),
            payload: Payload::new(),
        }
    }

    /// Whether the row can be expanded.
    pub fn is_group(&self) -> bool {
        self.flags.contains(RowFlags::GROUP)
    }

    /// Whether the row's children are currently shown inline.
    pub fn is_expanded(&self) -> bool {
        self.flags.contains(RowFlags::EXPANDED)
    }

    /// Whether the row is a loading placeholder.
    pub fn is_loading(&self) -> bool {
        self.flags.contains(RowFlags::LOADING)
    }

    /// Whether the row is a child of an expanded group.
    pub fn is_child(&self) -> bool {
        self.flags.contains(RowFlags::CHILD)
    }

    /// Toggle the expanded flag.
    pub fn set_expanded(&mut self, expanded: bool) {
        self.flags.set(RowFlags::EXPANDED, expanded);
    }

    /// Merge fresh payload fields into the record, overwriting existing
    /// entries and leaving flags and children untouched.
    pub fn merge_payload(&mut self, patch: Payload) {
        for (field, value) in patch {
            self.payload.insert(field, value);
        }
    }
}
