use log::trace;

use super::DisplaySink;
use crate::error::Result;
use crate::frame::{FrameView, SharedFrameBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The session has no buffer yet; nothing was rendered.
    NoFrame,
    /// Rendered the zero-filled buffer; acquisition has not published anything.
    Blank,
    Rendered {
        sequence: u64,
        /// Whether a frame was published since the previous draw.
        fresh: bool,
    },
}

/// Render-thread side of the shared buffer.
///
/// Copies the frame out under the lock into its own scratch storage and
/// renders from that copy with the lock released.
pub struct Presenter {
    buffer: SharedFrameBuffer,
    scratch: Vec<u8>,
    last_sequence: u64,
}

impl Presenter {
    pub fn new(buffer: SharedFrameBuffer) -> Self {
        let scratch = Vec::with_capacity(buffer.len());
        Self {
            buffer,
            scratch,
            last_sequence: 0,
        }
    }

    pub fn draw(&mut self, sink: &mut dyn DisplaySink, x: i32, y: i32) -> Result<DrawOutcome> {
        let info = self.buffer.read_into(&mut self.scratch);

        let view = FrameView {
            width: self.buffer.width(),
            height: self.buffer.height(),
            info,
            data: &self.scratch,
        };
        sink.render(&view, x, y)?;

        if view.is_blank() {
            return Ok(DrawOutcome::Blank);
        }
        let fresh = info.sequence != self.last_sequence;
        self.last_sequence = info.sequence;
        trace!("Rendered frame #{} (fresh: {})", info.sequence, fresh);
        Ok(DrawOutcome::Rendered {
            sequence: info.sequence,
            fresh,
        })
    }

    pub fn buffer(&self) -> &SharedFrameBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::StatsSink;

    #[test]
    fn test_blank_then_fresh_then_stale() {
        let buffer = SharedFrameBuffer::new(3, 2);
        let mut presenter = Presenter::new(buffer.clone());
        let mut sink = StatsSink::default();

        assert_eq!(presenter.draw(&mut sink, 0, 0).unwrap(), DrawOutcome::Blank);
        assert_eq!(sink.last_mean(), Some(0.0));

        buffer.publish(&[90; 6], 1, 0).unwrap();
        assert_eq!(
            presenter.draw(&mut sink, 0, 0).unwrap(),
            DrawOutcome::Rendered { sequence: 1, fresh: true }
        );
        assert_eq!(
            presenter.draw(&mut sink, 0, 0).unwrap(),
            DrawOutcome::Rendered { sequence: 1, fresh: false }
        );
        assert_eq!(sink.rendered(), 3);
        assert_eq!(sink.last_mean(), Some(90.0));
    }
}
