use super::types::FrameInfo;
use crate::error::CameraError;
use image::GrayImage;
use std::sync::{Arc, Mutex, MutexGuard};

struct Slot {
    info: FrameInfo,
    pixels: Vec<u8>,
}

/// The most recently completed Mono8 frame, shared between the acquisition
/// thread and the render thread behind a single mutex.
///
/// The pixel storage is allocated once, zero-filled, and only ever
/// overwritten in place, so its length is fixed at `width * height`.
#[derive(Clone)]
pub struct SharedFrameBuffer {
    width: u32,
    height: u32,
    slot: Arc<Mutex<Slot>>,
}

impl SharedFrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            slot: Arc::new(Mutex::new(Slot {
                info: FrameInfo::default(),
                pixels: vec![0; len],
            })),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A writer that panicked mid-copy poisons the lock. Frames are plain bytes,
    // so the next publish repairs the slot and readers keep going.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copies a complete frame in and returns its sequence number.
    pub fn publish(&self, pixels: &[u8], frame_id: u64, timestamp_ns: u64) -> Result<u64, CameraError> {
        if pixels.len() != self.len() {
            return Err(CameraError::conversion(format!(
                "frame has {} bytes, buffer holds {}x{}",
                pixels.len(),
                self.width,
                self.height
            )));
        }

        let mut slot = self.lock();
        slot.pixels.copy_from_slice(pixels);
        slot.info = FrameInfo {
            sequence: slot.info.sequence + 1,
            frame_id,
            timestamp_ns,
        };
        Ok(slot.info.sequence)
    }

    /// Copies the current frame into `dest`, resizing it on first use.
    pub fn read_into(&self, dest: &mut Vec<u8>) -> FrameInfo {
        let slot = self.lock();
        dest.clear();
        dest.extend_from_slice(&slot.pixels);
        slot.info
    }

    pub fn info(&self) -> FrameInfo {
        self.lock().info
    }

    /// Owned copy of the current frame.
    pub fn snapshot(&self) -> GrayImage {
        let mut pixels = Vec::with_capacity(self.len());
        self.read_into(&mut pixels);
        // the slot length always equals width * height
        GrayImage::from_raw(self.width, self.height, pixels)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zero_filled() {
        let buffer = SharedFrameBuffer::new(4, 3);
        let mut out = Vec::new();
        let info = buffer.read_into(&mut out);
        assert_eq!(info.sequence, 0);
        assert_eq!(out, vec![0; 12]);
    }

    #[test]
    fn test_publish_increments_sequence() {
        let buffer = SharedFrameBuffer::new(2, 2);
        assert_eq!(buffer.publish(&[1; 4], 10, 100).unwrap(), 1);
        assert_eq!(buffer.publish(&[2; 4], 11, 200).unwrap(), 2);

        let info = buffer.info();
        assert_eq!(info.frame_id, 11);
        assert_eq!(info.timestamp_ns, 200);
        assert_eq!(buffer.snapshot().into_raw(), vec![2; 4]);
    }

    #[test]
    fn test_wrong_size_is_rejected_and_buffer_untouched() {
        let buffer = SharedFrameBuffer::new(2, 2);
        buffer.publish(&[7; 4], 1, 0).unwrap();
        assert!(buffer.publish(&[9; 5], 2, 0).is_err());
        assert!(buffer.publish(&[9; 3], 3, 0).is_err());

        assert_eq!(buffer.info().sequence, 1);
        assert_eq!(buffer.snapshot().into_raw(), vec![7; 4]);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_clones_share_storage() {
        let writer = SharedFrameBuffer::new(1, 2);
        let reader = writer.clone();
        writer.publish(&[5, 6], 1, 0).unwrap();
        assert_eq!(reader.snapshot().into_raw(), vec![5, 6]);
    }
}
