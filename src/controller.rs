//! Window controller: the windowing/synchronization core.
//!
//! Orchestrates range requests against the backing store, merges push
//! notifications, and maintains the flattened view the rendering surface
//! scrolls over. The controller is a stateful cache: it keeps the last
//! server-confirmed range of top-level rows, decides per requested range
//! whether the cache can serve it, and folds asynchronous responses and
//! pushes back into a consistent local view.
//!
//! All methods are synchronous and must be called from one control thread;
//! the async driver in [`crate::engine`] provides that discipline. Every
//! mutating operation recomputes derived state (flattened view, group
//! positions) before a notification is emitted.
//!
//! Anomalies are resolved by state inspection, not errors: a response whose
//! target is gone is dropped, an operation on an absent key is a no-op, and
//! a range response bearing a superseded sequence tag is ignored.

use crate::config::ViewportConfig;
use crate::debounce::Debouncer;
use crate::groups::{GroupRegistry, OpenGroup};
use crate::index::PositionIndex;
use crate::protocol::{
    AnchorShift, BackingStore, ChildrenQuery, ChildrenResponse, DeltaPush, RangeQuery,
    RangeResponse, Row, RowPatch, StoreEvent, ViewEvent,
};
use crate::record::{RowFlags, RowKey, RowRecord};
use crate::sort::compare_keys;
use rustc_hash::FxHashMap;
use std::ops::Range;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Where the most recent view emission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// A fresh snapshot from the backing store.
    Server,
    /// The local cache, untouched.
    Cache,
}

/// Parameters of a coalesced range request.
#[derive(Debug, Clone, Copy)]
struct RangeRequest {
    offset: usize,
    limit: usize,
}

/// The windowing engine core. See the module docs.
pub struct WindowController {
    store: Box<dyn BackingStore>,
    events: mpsc::UnboundedSender<ViewEvent>,

    /// Top-level rows in server sort order.
    top_level: PositionIndex<RowRecord>,
    /// Top-level rows interleaved with expanded children.
    flat: PositionIndex<RowRecord>,
    /// Expanded groups and their last known positions.
    groups: GroupRegistry,

    /// Range of top-level positions currently cached from the store.
    server_viewport: Option<Range<usize>>,
    /// Range of flattened positions last requested by the consumer.
    grid_viewport: Range<usize>,

    debounce: Debouncer<RangeRequest>,
    /// Tag of the most recently issued range query.
    seq: u64,
    last_origin: Option<DataOrigin>,
}

impl WindowController {
    /// Create a controller talking to `store` and notifying `events`.
    pub fn new(
        store: Box<dyn BackingStore>,
        events: mpsc::UnboundedSender<ViewEvent>,
        config: ViewportConfig,
    ) -> Self {
        Self {
            store,
            events,
            top_level: PositionIndex::new(),
            flat: PositionIndex::new(),
            groups: GroupRegistry::new(),
            server_viewport: None,
            grid_viewport: 0..0,
            debounce: Debouncer::new(config.debounce),
            seq: 0,
            last_origin: None,
        }
    }

    // ------------------------------------------------------------------
    // Consumer-facing operations
    // ------------------------------------------------------------------

    /// The rendering surface scrolled to a new grid range.
    ///
    /// Maps both ends to server space and queries the store iff this is the
    /// first request or either mapped end falls outside the cached range;
    /// otherwise the flattened cache is served unmodified. Store queries go
    /// through the leading-edge debouncer, so bursts coalesce into one
    /// physical query per quiescence window.
    pub fn set_range(&mut self, grid_start: usize, grid_end: usize, now: Instant) {
        debug_assert!(grid_start <= grid_end);
        self.grid_viewport = grid_start..grid_end;

        let mapped_start = self.groups.server_position(grid_start);
        let mapped_end = self.groups.server_position(grid_end);

        let refresh = match &self.server_viewport {
            None => true,
            Some(cached) => mapped_start < cached.start || mapped_end > cached.end,
        };

        if refresh {
            self.request_range(mapped_start, grid_end - grid_start, now);
        } else {
            trace!(grid_start, grid_end, "range served from cache");
            self.last_origin = Some(DataOrigin::Cache);
            self.notify();
        }
    }

    /// Expand a group row: issue a children query and, unless the group is
    /// already registered, show a loading placeholder child immediately.
    pub fn expand(&mut self, key: &str) {
        debug!(key, "expand");
        self.store.fetch_children(ChildrenQuery {
            parent_key: key.into(),
        });
        if self.groups.contains(key) {
            return;
        }
        let Some(parent) = self.top_level.get_mut(key) else {
            trace!(key, "expand for unknown row ignored");
            return;
        };
        let placeholder = RowRecord::loading_child(&parent.key, 0);
        parent.children = vec![placeholder];
        parent.set_expanded(true);
        self.emit_changed();
    }

    /// Collapse a group row: drop its children and registry entry, then
    /// refetch if the shorter view no longer covers the grid range.
    pub fn collapse(&mut self, key: &str, now: Instant) {
        debug!(key, "collapse");
        if let Some(parent) = self.top_level.get_mut(key) {
            parent.children.clear();
            parent.set_expanded(false);
        }
        self.groups.remove(key);
        self.fetch_if_short(now);
        self.emit_changed();
    }

    // ------------------------------------------------------------------
    // Store-facing callbacks
    // ------------------------------------------------------------------

    /// Dispatch one inbound store event.
    pub fn on_store_event(&mut self, event: StoreEvent, now: Instant) {
        match event {
            StoreEvent::Range(response) => self.on_range_response(response),
            StoreEvent::Children(response) => self.on_children_response(response),
            StoreEvent::Delta(push) => self.on_delta(push, now),
            StoreEvent::Anchor(shift) => self.on_anchor_shift(shift),
        }
    }

    /// A bulk snapshot arrived: authoritative for its range.
    ///
    /// Rebuilds the top-level snapshot, reusing existing records by key so
    /// expansion and loading state survive the replace. Records that were
    /// open groups when they last left the window come back expanded, with
    /// loading placeholders for the remembered child count and a fresh
    /// children query in flight.
    pub fn on_range_response(&mut self, response: RangeResponse) {
        if response.seq != self.seq {
            trace!(
                seq = response.seq,
                current = self.seq,
                "stale range response dropped"
            );
            return;
        }
        debug!(offset = response.offset, limit = response.limit, "range response");
        self.server_viewport = Some(response.offset..response.offset + response.limit);

        let mut prior: FxHashMap<RowKey, RowRecord> =
            std::mem::take(&mut self.top_level).into_entries().collect();
        let mut next = PositionIndex::with_capacity(response.data.len());
        for patch in response.data {
            match patch {
                RowPatch::Add { row } => {
                    let record = match prior.remove(row.key.as_str()) {
                        Some(mut existing) => {
                            existing.flags.set(RowFlags::GROUP, row.group);
                            existing.payload = row.record;
                            existing
                        }
                        None => self.admit_top_level(row),
                    };
                    next.insert(record.key.clone(), record);
                }
                other => trace!(?other, "non-add patch in bulk response ignored"),
            }
        }
        self.top_level.replace(next);
        self.sort_top_level();
        self.recompute_group_positions();
        self.last_origin = Some(DataOrigin::Server);
        self.emit_changed();
    }

    /// An incremental update to the cached range arrived.
    pub fn on_delta(&mut self, push: DeltaPush, now: Instant) {
        debug!(ops = push.data.len(), "delta push");
        for patch in push.data {
            match patch {
                RowPatch::Add { row } => {
                    let record = self.admit_top_level(row);
                    self.top_level.insert(record.key.clone(), record);
                }
                RowPatch::Update { key, patch } => match self.top_level.get_mut(key.as_str()) {
                    Some(record) => record.merge_payload(patch),
                    None => trace!(key = %key, "update for unknown row ignored"),
                },
                RowPatch::Delete { keys } => {
                    for key in keys {
                        if self.top_level.remove(key.as_str()).is_none() {
                            trace!(key = %key, "delete for unknown row ignored");
                        }
                        self.groups.remove(key.as_str());
                    }
                }
            }
        }
        self.sort_top_level();
        self.recompute_group_positions();
        self.fetch_if_short(now);
        self.emit_changed();
    }

    /// The store's index space shifted: rebase the cached bounds and tell
    /// the consumer to compensate its scroll position. No refetch.
    pub fn on_anchor_shift(&mut self, shift: AnchorShift) {
        debug!(offset = shift.anchor_offset, "anchor shift");
        if let Some(cached) = &self.server_viewport {
            let length = cached.end - cached.start;
            let start = (cached.start as i64 + shift.anchor_offset).max(0) as usize;
            self.server_viewport = Some(start..start + length);
        }
        if self
            .events
            .send(ViewEvent::ViewportShift {
                row_offset: shift.anchor_offset,
            })
            .is_err()
        {
            trace!("view event receiver dropped");
        }
    }

    /// Children for a group row arrived. Dropped silently if the parent was
    /// evicted in the interim.
    pub fn on_children_response(&mut self, response: ChildrenResponse) {
        let Some(position) = self.top_level.position(response.parent_key.as_str()) else {
            trace!(parent = %response.parent_key, "children response for evicted row dropped");
            return;
        };
        let server_start = self.server_viewport.as_ref().map_or(0, |range| range.start);
        let count = response.children.len();
        debug!(parent = %response.parent_key, count, "children response");
        self.groups.register(
            response.parent_key.clone(),
            OpenGroup {
                count,
                server_index: position + server_start,
            },
        );
        if let Some(parent) = self.top_level.get_mut(response.parent_key.as_str()) {
            parent.children = response
                .children
                .into_iter()
                .map(|row| {
                    let mut child = RowRecord::from(row);
                    child.flags.insert(RowFlags::CHILD);
                    child
                })
                .collect();
            parent.set_expanded(true);
        }
        self.emit_changed();
    }

    // ------------------------------------------------------------------
    // Debounce plumbing
    // ------------------------------------------------------------------

    /// When the driver must next call
    /// [`on_debounce_elapsed`](Self::on_debounce_elapsed), if at all.
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// The quiescence window elapsed: flush the coalesced request, if any.
    pub fn on_debounce_elapsed(&mut self, now: Instant) {
        if let Some(request) = self.debounce.poll(now) {
            self.issue_range_query(request);
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// The cached server range, if a snapshot has been installed.
    pub fn server_viewport(&self) -> Option<Range<usize>> {
        self.server_viewport.clone()
    }

    /// The grid range last requested by the consumer.
    pub fn grid_viewport(&self) -> Range<usize> {
        self.grid_viewport.clone()
    }

    /// Where the most recent emission came from.
    pub fn last_origin(&self) -> Option<DataOrigin> {
        self.last_origin
    }

    /// The open-group registry.
    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// Map a grid position to server space under the current registry.
    pub fn server_position(&self, grid_position: usize) -> usize {
        self.groups.server_position(grid_position)
    }

    /// The flattened view in display order.
    pub fn flattened(&self) -> impl Iterator<Item = &RowRecord> {
        self.flat.iter()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Build a record for a row entering the top level. A row whose group
    /// was open when it last left the window comes back expanded with
    /// loading placeholders and a refresh query in flight.
    fn admit_top_level(&mut self, row: Row) -> RowRecord {
        let mut record = RowRecord::from(row);
        if let Some(group) = self.groups.get(record.key.as_str()).copied() {
            record.children = (0..group.count)
                .map(|slot| RowRecord::loading_child(&record.key, slot))
                .collect();
            record.set_expanded(true);
            self.store.fetch_children(ChildrenQuery {
                parent_key: record.key.clone(),
            });
        }
        record
    }

    fn request_range(&mut self, offset: usize, limit: usize, now: Instant) {
        if let Some(request) = self.debounce.submit(RangeRequest { offset, limit }, now) {
            self.issue_range_query(request);
        }
    }

    fn issue_range_query(&mut self, request: RangeRequest) {
        self.seq += 1;
        debug!(
            offset = request.offset,
            limit = request.limit,
            seq = self.seq,
            "range query"
        );
        self.store.fetch_range(RangeQuery {
            offset: request.offset,
            limit: request.limit,
            seq: self.seq,
        });
    }

    /// If the grid range now maps beyond the cached server range (rows were
    /// removed, or a group collapsed), refresh and pad the uncovered tail
    /// with loading placeholders.
    fn fetch_if_short(&mut self, now: Instant) {
        let Some(cached) = self.server_viewport.clone() else {
            return;
        };
        let mapped_end = self.groups.server_position(self.grid_viewport.end);
        if mapped_end <= cached.end {
            return;
        }
        let mapped_start = self.groups.server_position(self.grid_viewport.start);
        let span = self.grid_viewport.end - self.grid_viewport.start;
        self.request_range(mapped_start, span, now);
        for slot in 0..mapped_end - cached.end {
            let placeholder = RowRecord::gap_placeholder(slot);
            self.top_level.insert(placeholder.key.clone(), placeholder);
        }
    }

    fn sort_top_level(&mut self) {
        self.top_level.sort_by_keys(|a, b| compare_keys(a, b));
    }

    /// Re-derive every open group's server index from its current slot.
    /// Groups outside the window keep their last known index.
    fn recompute_group_positions(&mut self) {
        let server_start = self.server_viewport.as_ref().map_or(0, |range| range.start);
        for (position, (key, _)) in self.top_level.entries().enumerate() {
            if let Some(group) = self.groups.get_mut(key.as_str()) {
                group.server_index = position + server_start;
            }
        }
    }

    /// Recompute the flattened view, then notify.
    fn emit_changed(&mut self) {
        self.recompute_flat();
        self.notify();
    }

    /// Rebuild the flattened view: each top-level record followed by its
    /// children.
    fn recompute_flat(&mut self) {
        let mut flat = PositionIndex::with_capacity(self.top_level.len());
        for (key, record) in self.top_level.entries() {
            flat.insert(key.clone(), record.clone());
            for child in &record.children {
                flat.insert(child.key.clone(), child.clone());
            }
        }
        self.flat.replace(flat);
    }

    /// Send the flattened view to the consumer. Quiet until the first
    /// snapshot arrives, since the start row is undefined before then.
    fn notify(&mut self) {
        let Some(cached) = &self.server_viewport else {
            return;
        };
        let start_row = cached.start + self.groups.children_above(cached.start);
        let rows: Vec<RowRecord> = self.flat.iter().cloned().collect();
        trace!(rows = rows.len(), start_row, "view changed");
        if self.events.send(ViewEvent::Changed { rows, start_row }).is_err() {
            trace!("view event receiver dropped");
        }
    }
}
