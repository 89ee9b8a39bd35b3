//! gridport - windowed synchronization engine for server-resident data grids.
//!
//! Presents a very large, hierarchically groupable dataset through a small,
//! fixed-size visible window without ever materializing the full dataset
//! locally. The engine keeps a dense position index over the visible rows,
//! translates between grid positions (which count inline-expanded group
//! children) and the backing store's flat top-level positions, serves
//! repeat ranges from cache, and merges asynchronous server notifications —
//! bulk snapshots, incremental deltas, anchor shifts, lazy children — into a
//! consistent local view.
//!
//! Rendering is somebody else's job: the consumer receives flattened row
//! snapshots plus a start offset and draws them however it likes.
//!
//! # Example
//!
//! ```ignore
//! use gridport::{ViewportConfig, ViewportEngine};
//! use tokio::sync::mpsc;
//!
//! // The backing store is any channel-backed collaborator.
//! let (store_tx, store_rx) = mpsc::unbounded_channel();
//! let (event_tx, event_rx) = mpsc::unbounded_channel();
//! // ... hand store_rx to the store, have it answer on event_tx ...
//!
//! let (engine, handle, mut views) =
//!     ViewportEngine::new(Box::new(store_tx), event_rx, ViewportConfig::default());
//! tokio::spawn(engine.run());
//!
//! handle.set_range(0, 40)?;       // scrolled somewhere
//! handle.expand("ord17")?;        // opened a group inline
//! // views.recv().await yields ViewEvent::Changed { rows, start_row }
//! # Ok::<(), gridport::EngineError>(())
//! ```

pub mod config;
pub mod controller;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod groups;
pub mod index;
pub mod protocol;
pub mod record;
pub mod sort;
pub mod testing;

pub use config::ViewportConfig;
pub use controller::{DataOrigin, WindowController};
pub use engine::{Command, ViewportEngine, ViewportHandle};
pub use error::EngineError;
pub use groups::{GroupRegistry, OpenGroup};
pub use index::PositionIndex;
pub use protocol::{
    AnchorShift, BackingStore, ChildrenQuery, ChildrenResponse, DeltaPush, RangeQuery,
    RangeResponse, Row, RowPatch, StoreEvent, StoreRequest, ViewEvent,
};
pub use record::{Payload, RowFlags, RowKey, RowRecord};
