use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Mono8,
    /// Little-endian 16-bit samples.
    Mono16,
    Rgb8,
    Bgr8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Mono8 => 1,
            PixelFormat::Mono16 => 2,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    Complete,
    /// Carries the SDK's status description.
    Incomplete(String),
}

/// An image as handed back by the SDK, before conversion.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub status: ImageStatus,
    pub frame_id: u64,
    pub timestamp_ns: u64,
    pub data: Vec<u8>,
}

impl RawImage {
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixel_format,
            status: ImageStatus::Complete,
            frame_id: 0,
            timestamp_ns: 0,
            data,
        }
    }

    pub fn with_frame_id(mut self, frame_id: u64, timestamp_ns: u64) -> Self {
        self.frame_id = frame_id;
        self.timestamp_ns = timestamp_ns;
        self
    }

    pub fn incomplete(mut self, description: impl Into<String>) -> Self {
        self.status = ImageStatus::Incomplete(description.into());
        self
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self.status, ImageStatus::Incomplete(_))
    }
}

/// Metadata of the frame currently held by the shared buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// 0 until the first frame is published.
    pub sequence: u64,
    pub frame_id: u64,
    pub timestamp_ns: u64,
}

/// Borrowed Mono8 frame handed to a display sink.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub width: u32,
    pub height: u32,
    pub info: FrameInfo,
    pub data: &'a [u8],
}

impl FrameView<'_> {
    pub fn is_blank(&self) -> bool {
        self.info.sequence == 0
    }

    pub fn mean_intensity(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&v| v as u64).sum();
        sum as f64 / self.data.len() as f64
    }
}
