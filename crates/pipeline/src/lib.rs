//! # Pipeline
//!
//! Streaming pipeline controller.
//!
//! Responsibilities:
//! - Collect stream requests, a device constraint and module requirements
//! - Resolve them against connected devices (`resolve`)
//! - Drive the Created → Configuring → Committed → Streaming → Stopped
//!   lifecycle
//! - Hand synchronized `FrameSet`s to the consumer
//!
//! ## Usage Example
//!
//! ```ignore
//! use pipeline::Pipeline;
//! use contracts::{Format, StreamKind, StreamRequest};
//!
//! let pipe = Pipeline::new(context);
//! pipe.enable_stream(
//!     StreamRequest::new(StreamKind::Depth)
//!         .with_resolution(640, 480)
//!         .with_format(Format::Z16)
//!         .with_fps(30),
//! )?;
//! pipe.enable_stream(StreamRequest::new(StreamKind::Color))?;
//! pipe.start()?;
//!
//! let frames = pipe.wait_for_frames_default()?;
//! let depth = frames.depth();
//! pipe.stop()?;
//! ```

mod controller;
mod request_set;
mod resolver;

pub use controller::{Pipeline, DEFAULT_FRAME_TIMEOUT};
pub use request_set::StreamRequestSet;
pub use resolver::{merge_requirements, resolve, ResolvedConfiguration};

pub use contracts::{FrameSet, PipelineError, PipelineState, Result, StreamProfile, SyncStats};
