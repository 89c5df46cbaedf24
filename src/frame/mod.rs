mod buffer;
mod processor;
mod types;

pub use buffer::SharedFrameBuffer;
pub use processor::FrameProcessor;
pub use types::{FrameInfo, FrameView, ImageStatus, PixelFormat, RawImage};
