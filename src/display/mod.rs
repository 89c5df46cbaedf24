//! Presentation side: the render-thread reader and the sinks it paints into.

mod presenter;
mod sinks;

use crate::error::Result;
use crate::frame::FrameView;

pub use presenter::{DrawOutcome, Presenter};
pub use sinks::{NullSink, SnapshotSink, StatsSink};

/// Whatever paints a Mono8 frame at a window position. Called with the
/// frame lock released.
pub trait DisplaySink {
    fn render(&mut self, frame: &FrameView<'_>, x: i32, y: i32) -> Result<()>;
}
