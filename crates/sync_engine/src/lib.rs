//! # Sync Engine
//!
//! Multi-stream frame synchronization.
//!
//! Responsibilities:
//! - Keep the latest unconsumed frame of every active stream
//! - Emit a `FrameSet` once every stream has a frame within tolerance
//! - Hand sets to one consumer through a depth-1 delivery slot
//! - Surface capture faults and shutdown to blocked consumers
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::FrameSynchronizer;
//!
//! let sync = Arc::new(FrameSynchronizer::new(profiles, None));
//!
//! // capture thread
//! sync.push_event(event);
//!
//! // consumer
//! let set = sync.wait_for_next(Duration::from_secs(5))?;
//! ```

mod matcher;
mod synchronizer;

pub use matcher::{default_tolerance_ms, FrameMatcher};
pub use synchronizer::FrameSynchronizer;

pub use contracts::{FrameSet, RawFrame, SyncStats};
