use image::GrayImage;
use log::{debug, info};
use std::path::{Path, PathBuf};

use super::DisplaySink;
use crate::error::{AppError, Result};
use crate::frame::FrameView;

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn render(&mut self, _frame: &FrameView<'_>, _x: i32, _y: i32) -> Result<()> {
        Ok(())
    }
}

/// Counts renders and remembers the last frame's mean intensity.
#[derive(Debug, Default)]
pub struct StatsSink {
    rendered: u64,
    last_mean: Option<f64>,
    last_sequence: u64,
}

impl StatsSink {
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn last_mean(&self) -> Option<f64> {
        self.last_mean
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }
}

impl DisplaySink for StatsSink {
    fn render(&mut self, frame: &FrameView<'_>, _x: i32, _y: i32) -> Result<()> {
        self.rendered += 1;
        self.last_mean = Some(frame.mean_intensity());
        self.last_sequence = frame.info.sequence;
        Ok(())
    }
}

/// Keeps a copy of the last rendered frame and writes it out as an image file.
pub struct SnapshotSink {
    path: PathBuf,
    last: Option<GrayImage>,
}

impl SnapshotSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last: None,
        }
    }

    pub fn last(&self) -> Option<&GrayImage> {
        self.last.as_ref()
    }

    /// Writes the last rendered frame. The format follows the file extension.
    pub fn save(&self) -> Result<()> {
        let image = self
            .last
            .as_ref()
            .ok_or_else(|| AppError::display("no frame rendered yet"))?;
        image.save(&self.path)?;
        info!("Saved snapshot to {}", self.path.display());
        Ok(())
    }
}

impl DisplaySink for SnapshotSink {
    fn render(&mut self, frame: &FrameView<'_>, x: i32, y: i32) -> Result<()> {
        match self.last.as_mut() {
            Some(image) if image.dimensions() == (frame.width, frame.height) && image.len() == frame.data.len() => {
                image.copy_from_slice(frame.data);
            }
            _ => {
                let image = GrayImage::from_raw(frame.width, frame.height, frame.data.to_vec())
                    .ok_or_else(|| AppError::display("frame data does not match its dimensions"))?;
                self.last = Some(image);
            }
        }
        debug!("Snapshot sink holds frame #{} at ({}, {})", frame.info.sequence, x, y);
        Ok(())
    }
}
