//! Backing-store protocol: queries, responses, and push notifications.
//!
//! The backing store is an opaque asynchronous collaborator. The engine pulls
//! bulk snapshots ([`RangeQuery`] → [`RangeResponse`]) and lazy children
//! ([`ChildrenQuery`] → [`ChildrenResponse`]), and receives unsolicited
//! pushes: incremental deltas to the cached range ([`DeltaPush`]) and anchor
//! shifts re-basing all absolute positions ([`AnchorShift`]).
//!
//! All calls are non-blocking: [`BackingStore`] methods fire and forget, and
//! responses arrive later as [`StoreEvent`]s in whatever order the store
//! produces them. A plain `mpsc` sender satisfies the trait, so any
//! channel-backed collaborator plugs in without an adapter.

use crate::record::{Payload, RowKey, RowRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// A keyed server record: the unique row key plus its payload fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Unique row key.
    pub key: RowKey,
    /// Whether the row can be expanded into children.
    #[serde(default)]
    pub group: bool,
    /// Arbitrary payload fields.
    #[serde(default)]
    pub record: Payload,
}

impl Row {
    /// Build a row from a key and payload.
    pub fn new(key: impl Into<RowKey>, record: Payload) -> Self {
        Self {
            key: key.into(),
            group: false,
            record,
        }
    }

    /// Mark the row as expandable.
    pub fn group(mut self) -> Self {
        self.group = true;
        self
    }
}

impl From<Row> for RowRecord {
    fn from(row: Row) -> Self {
        let mut record = RowRecord::new(row.key, row.record);
        record.flags.set(crate::record::RowFlags::GROUP, row.group);
        record
    }
}

/// One operation inside a bulk response or delta push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RowPatch {
    /// Insert a top-level row.
    Add {
        /// The row to insert.
        row: Row,
    },
    /// Merge fresh payload fields into an existing row.
    Update {
        /// Key of the row to patch.
        key: RowKey,
        /// Fields to merge.
        patch: Payload,
    },
    /// Remove rows by key.
    Delete {
        /// Keys of the rows to remove.
        keys: Vec<RowKey>,
    },
}

/// Bulk snapshot request for a top-level range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeQuery {
    /// First top-level position requested.
    pub offset: usize,
    /// Number of rows requested.
    pub limit: usize,
    /// Issue-order tag; the matching response echoes it back.
    pub seq: u64,
}

/// Authoritative snapshot of `[offset, offset + limit)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeResponse {
    /// Row operations; bulk snapshots carry only `Add`.
    pub data: Vec<RowPatch>,
    /// First top-level position covered.
    pub offset: usize,
    /// Number of rows covered.
    pub limit: usize,
    /// Echo of the originating query's tag.
    pub seq: u64,
}

/// Request for the children of a group row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildrenQuery {
    /// Key of the group row.
    pub parent_key: RowKey,
}

/// Children of a group row, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildrenResponse {
    /// Key of the group row.
    pub parent_key: RowKey,
    /// Child rows.
    pub children: Vec<Row>,
}

/// Unsolicited incremental update to the currently cached range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaPush {
    /// Ordered add/update/delete operations.
    pub data: Vec<RowPatch>,
    /// First top-level position of the range the store is updating.
    pub offset: usize,
    /// Length of that range.
    pub limit: usize,
}

/// Unsolicited notification that the store's index space has shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorShift {
    /// Amount by which all cached absolute positions move.
    pub anchor_offset: i64,
}

/// Everything the backing store can send the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreEvent {
    /// Response to a [`RangeQuery`].
    Range(RangeResponse),
    /// Response to a [`ChildrenQuery`].
    Children(ChildrenResponse),
    /// Incremental update push.
    Delta(DeltaPush),
    /// Anchor shift push.
    Anchor(AnchorShift),
}

/// A request on its way to the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreRequest {
    /// Bulk snapshot request.
    Range(RangeQuery),
    /// Children request.
    Children(ChildrenQuery),
}

/// The engine's outbound pull interface to the backing store.
///
/// Both calls must be non-blocking: the control thread never waits for the
/// store. Responses come back later as [`StoreEvent`]s.
pub trait BackingStore: Send {
    /// Ask for a bulk snapshot of a top-level range.
    fn fetch_range(&mut self, query: RangeQuery);
    /// Ask for the children of a group row.
    fn fetch_children(&mut self, query: ChildrenQuery);
}

/// Any unbounded sender of [`StoreRequest`] is a backing store; a dropped
/// receiver shows up as a permanent stall, which is the store-unavailable
/// behavior the engine expects.
impl BackingStore for mpsc::UnboundedSender<StoreRequest> {
    fn fetch_range(&mut self, query: RangeQuery) {
        if self.send(StoreRequest::Range(query)).is_err() {
            trace!("backing store receiver dropped; range query lost");
        }
    }

    fn fetch_children(&mut self, query: ChildrenQuery) {
        if self.send(StoreRequest::Children(query)).is_err() {
            trace!("backing store receiver dropped; children query lost");
        }
    }
}

/// What the engine tells its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The flattened view changed.
    Changed {
        /// Flattened rows: each top-level record followed by its children
        /// when expanded.
        rows: Vec<RowRecord>,
        /// Grid position of the first row in `rows`.
        start_row: usize,
    },
    /// The store's index space shifted; the consumer should scroll by
    /// `row_offset` rows to keep the same logical rows in place.
    ViewportShift {
        /// Signed row displacement.
        row_offset: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_patch_serializes_with_action_tags() {
        let patch = RowPatch::Delete {
            keys: vec!["ord1".into(), "ord2".into()],
        };
        let json = serde_json::to_value(&patch).expect("serialize");
        assert_eq!(json["action"], "delete");
        assert_eq!(json["keys"][1], "ord2");
    }

    #[test]
    fn add_round_trips_through_json() {
        let patch = RowPatch::Add {
            row: Row::new("ord1", Payload::new()).group(),
        };
        let json = serde_json::to_string(&patch).expect("serialize");
        let back: RowPatch = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, patch);
    }

    #[test]
    fn row_group_flag_carries_into_the_record() {
        let record = RowRecord::from(Row::new("ord1", Payload::new()).group());
        assert!(record.is_group());
        let plain = RowRecord::from(Row::new("ord2", Payload::new()));
        assert!(!plain.is_group());
    }

    #[test]
    fn channel_backed_store_forwards_requests() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        BackingStore::fetch_range(
            &mut tx,
            RangeQuery {
                offset: 5,
                limit: 20,
                seq: 1,
            },
        );
        match rx.try_recv().expect("request queued") {
            StoreRequest::Range(query) => assert_eq!(query.offset, 5),
            other => panic!("unexpected request: {other:?}"),
        }
    }
}
