//! Frame ingestion sources.
//!
//! Video capture and decoding are external collaborators; the pipeline only
//! sees the `FrameSource` trait. Sources are responsible for:
//! - Producing `Frame` values with monotonic sequence numbers
//! - Pacing to their configured frame rate
//! - Reporting end of stream as `Ok(None)`, not as an error
//!
//! The only built-in source is the synthetic `stub://` source used by tests
//! and the demo. Real camera/file decode is wired in by the deployment.

mod file;

pub use file::{FileSource, VideoConfig};

use anyhow::Result;

use crate::frame::Frame;

pub trait FrameSource: Send {
    /// Open the underlying stream. The one fatal error in the system: if
    /// this fails, the pipeline never starts.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` when the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
