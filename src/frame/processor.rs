use super::types::{PixelFormat, RawImage};
use crate::error::CameraError;
use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use log::trace;
use std::borrow::Cow;

pub struct FrameProcessor;

impl FrameProcessor {
    /// Converts an SDK image into tightly packed Mono8 samples.
    ///
    /// Mono8 input is borrowed as-is. Other formats go through `image`'s
    /// luma conversion. Trailing padding past `width * height * bpp` is ignored.
    pub fn to_mono8(raw: &RawImage) -> Result<Cow<'_, [u8]>, CameraError> {
        trace!("Converting frame {} from {:?}", raw.frame_id, raw.pixel_format);

        let (width, height) = (raw.width, raw.height);
        let needed = width as usize * height as usize * raw.pixel_format.bytes_per_pixel();
        if raw.data.len() < needed {
            return Err(CameraError::conversion(format!(
                "frame {} has {} bytes, {}x{} {:?} needs {}",
                raw.frame_id,
                raw.data.len(),
                width,
                height,
                raw.pixel_format,
                needed
            )));
        }
        let data = &raw.data[..needed];

        let dynamic = match raw.pixel_format {
            PixelFormat::Mono8 => return Ok(Cow::Borrowed(data)),
            PixelFormat::Mono16 => {
                let samples: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(width, height, samples)
                    .map(DynamicImage::ImageLuma16)
            }
            PixelFormat::Rgb8 => ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width, height, data.to_vec())
                .map(DynamicImage::ImageRgb8),
            PixelFormat::Bgr8 => {
                let mut swapped = data.to_vec();
                for pixel in swapped.chunks_exact_mut(3) {
                    pixel.swap(0, 2);
                }
                ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width, height, swapped)
                    .map(DynamicImage::ImageRgb8)
            }
        }
        .ok_or_else(|| CameraError::conversion("Failed to create ImageBuffer"))?;

        Ok(Cow::Owned(dynamic.to_luma8().into_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono8_is_borrowed() {
        let raw = RawImage::new(2, 2, PixelFormat::Mono8, vec![1, 2, 3, 4, 99]);
        let converted = FrameProcessor::to_mono8(&raw).unwrap();
        assert!(matches!(converted, Cow::Borrowed(_)));
        assert_eq!(&*converted, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_mono16_keeps_high_byte_range() {
        let samples: Vec<u8> = [0u16, 65535, 32896, 0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let raw = RawImage::new(2, 2, PixelFormat::Mono16, samples);
        let converted = FrameProcessor::to_mono8(&raw).unwrap();
        assert_eq!(converted[0], 0);
        assert_eq!(converted[1], 255);
        assert_eq!(converted[2], 128);
    }

    #[test]
    fn test_grey_rgb_and_bgr_agree() {
        let rgb = RawImage::new(1, 1, PixelFormat::Rgb8, vec![10, 20, 30]);
        let bgr = RawImage::new(1, 1, PixelFormat::Bgr8, vec![30, 20, 10]);
        let a = FrameProcessor::to_mono8(&rgb).unwrap();
        let b = FrameProcessor::to_mono8(&bgr).unwrap();
        assert_eq!(a, b);

        let grey = RawImage::new(1, 1, PixelFormat::Rgb8, vec![128, 128, 128]);
        assert_eq!(&*FrameProcessor::to_mono8(&grey).unwrap(), &[128]);
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let raw = RawImage::new(4, 4, PixelFormat::Mono8, vec![0; 10]);
        assert!(matches!(
            FrameProcessor::to_mono8(&raw),
            Err(CameraError::Conversion(_))
        ));
    }
}
