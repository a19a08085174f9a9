//! Bounded bitmap decoding.
//!
//! Decoding never surfaces an error to the caller: an unreadable or
//! malformed source yields `None` and the loader moves on to the next
//! strategy in its fallback order.

use std::io::Read;
use std::path::Path;

use image::{DynamicImage, ImageFormat};

/// How many leading bytes of a source file are scanned for an embedded
/// JPEG preview.
const EMBEDDED_SCAN_BYTES: usize = 512 * 1024;

/// Embedded JPEG candidates smaller than this are treated as junk.
const EMBEDDED_MIN_BYTES: usize = 1024;

/// Target bounds preset, chosen by the caller's context.
///
/// The preset is the whole decode strategy: it carries the bounds and
/// whether an embedded preview is ever an acceptable substitute for a
/// real decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsPreset {
    /// Grid thumbnail, 100x100
    Thumbnail,
    /// Map cluster marker, 50x50
    Marker,
    /// Full-screen viewer, 720x960
    Viewer,
}

impl BoundsPreset {
    /// Target bounds (width, height) for this preset.
    #[must_use]
    pub const fn bounds(self) -> (u32, u32) {
        match self {
            Self::Thumbnail => (100, 100),
            Self::Marker => (50, 50),
            Self::Viewer => (720, 960),
        }
    }

    /// Whether an embedded preview may stand in for a decode.
    ///
    /// Embedded previews are small; they can cover thumbnail and marker
    /// bounds but never the viewer.
    #[must_use]
    pub const fn accepts_embedded(self) -> bool {
        !matches!(self, Self::Viewer)
    }
}

/// Which strategy produced a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOrigin {
    /// Extracted from an embedded preview in the source file
    Embedded,
    /// Served from the bitmap cache
    Cache,
    /// Down-sampled decode bounded to the target
    Sampled,
    /// Unbounded direct decode (last resort)
    Direct,
}

/// Compute the largest power-of-two divisor such that the sampled
/// dimensions still cover the requested target.
#[must_use]
pub fn sample_factor(width: u32, height: u32, target_w: u32, target_h: u32) -> u32 {
    let mut factor = 1;
    if width > target_w && height > target_h {
        let half_w = width / 2;
        let half_h = height / 2;
        while half_w / factor >= target_w && half_h / factor >= target_h {
            factor *= 2;
        }
    }
    factor
}

/// Decode `path` down-sampled so the result still covers
/// `target_w` x `target_h`.
///
/// Probes the image dimensions first, computes the power-of-two sample
/// factor, then decodes and shrinks by that factor. Returns `None` if the
/// file is unreadable or not a valid image.
#[must_use]
pub fn decode_bounded(path: &Path, target_w: u32, target_h: u32) -> Option<DynamicImage> {
    let (width, height) = image::image_dimensions(path).ok()?;
    let factor = sample_factor(width, height, target_w, target_h);

    let image = image::open(path).ok()?;
    if factor == 1 {
        return Some(image);
    }

    let sampled_w = (width / factor).max(1);
    let sampled_h = (height / factor).max(1);
    tracing::debug!(
        "bounded decode {}: {width}x{height} / {factor} -> {sampled_w}x{sampled_h}",
        path.display()
    );
    Some(image.resize_exact(sampled_w, sampled_h, image::imageops::FilterType::Triangle))
}

/// Unbounded direct decode, the last resort when every bounded strategy
/// came up empty.
#[must_use]
pub fn decode_direct(path: &Path) -> Option<DynamicImage> {
    image::open(path).ok()
}

/// Extract an embedded JPEG preview from the head of `path`, accepting it
/// only when its dimensions cover `target_w` x `target_h`.
///
/// Photo formats routinely embed a pre-rendered JPEG; finding one is far
/// cheaper than decoding the full image. Candidates are located by their
/// SOI/EOI markers and tried in order until one decodes with acceptable
/// dimensions.
#[must_use]
pub fn embedded_thumbnail(path: &Path, target_w: u32, target_h: u32) -> Option<DynamicImage> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut data = vec![0u8; EMBEDDED_SCAN_BYTES];
    let bytes_read = file.read(&mut data).ok()?;
    data.truncate(bytes_read);

    for (start, end) in jpeg_candidates(&data) {
        let Ok(image) = image::load_from_memory_with_format(&data[start..=end], ImageFormat::Jpeg)
        else {
            continue;
        };
        if image.width() >= target_w && image.height() >= target_h {
            tracing::debug!(
                "embedded preview {}: {}x{} at offset {start}",
                path.display(),
                image.width(),
                image.height()
            );
            return Some(image);
        }
    }
    None
}

/// Locate candidate embedded JPEG streams by their SOI (FFD8) and EOI
/// (FFD9) markers. Returns inclusive byte ranges, earliest start first.
fn jpeg_candidates(data: &[u8]) -> Vec<(usize, usize)> {
    const SOI: [u8; 2] = [0xFF, 0xD8];
    const EOI: [u8; 2] = [0xFF, 0xD9];

    let mut starts = Vec::new();
    for (i, window) in data.windows(2).enumerate() {
        if window == SOI {
            starts.push(i);
            if starts.len() > 5 {
                break;
            }
        }
    }

    let mut candidates = Vec::new();
    for &start in &starts {
        if let Some(offset) = data[start..].windows(2).position(|w| w == EOI) {
            let end = start + offset + 1;
            if end - start + 1 >= EMBEDDED_MIN_BYTES {
                candidates.push((start, end));
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_sample_factor() {
        assert_eq!(sample_factor(200, 200, 100, 100), 2);
        assert_eq!(sample_factor(800, 800, 100, 100), 8);
        assert_eq!(sample_factor(100, 100, 100, 100), 1);
        assert_eq!(sample_factor(50, 50, 100, 100), 1);
        // Limited by the smaller dimension
        assert_eq!(sample_factor(800, 200, 100, 100), 2);
    }

    #[test]
    fn test_decode_bounded_downsamples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.png");
        write_png(&path, 400, 400);

        let img = decode_bounded(&path, 100, 100).unwrap();
        assert_eq!((img.width(), img.height()), (100, 100));
    }

    #[test]
    fn test_decode_bounded_small_source_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.png");
        write_png(&path, 40, 30);

        let img = decode_bounded(&path, 100, 100).unwrap();
        assert_eq!((img.width(), img.height()), (40, 30));
    }

    #[test]
    fn test_unreadable_source_is_none_for_every_preset() {
        let path = Path::new("/nonexistent/photo.jpg");
        for preset in [
            BoundsPreset::Thumbnail,
            BoundsPreset::Marker,
            BoundsPreset::Viewer,
        ] {
            let (w, h) = preset.bounds();
            assert!(decode_bounded(path, w, h).is_none());
            assert!(embedded_thumbnail(path, w, h).is_none());
            assert!(decode_direct(path).is_none());
        }
    }

    #[test]
    fn test_malformed_source_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.jpg");
        std::fs::write(&path, b"not an image at all").unwrap();
        assert!(decode_bounded(&path, 100, 100).is_none());
        assert!(decode_direct(&path).is_none());
    }

    #[test]
    fn test_embedded_thumbnail_extraction() {
        let dir = tempdir().unwrap();

        // Encode a JPEG preview into memory
        let preview = RgbImage::from_fn(160, 120, |x, y| {
            image::Rgb([(x * 3 % 256) as u8, (y * 7 % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(preview)
            .write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        // Bury it inside an otherwise opaque container
        let mut container = vec![0u8; 4096];
        container.extend_from_slice(&jpeg);
        container.extend_from_slice(&[0u8; 1024]);
        let path = dir.path().join("shot.nef");
        std::fs::write(&path, &container).unwrap();

        let thumb = embedded_thumbnail(&path, 100, 100).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (160, 120));

        // Too small to cover the viewer bounds
        assert!(embedded_thumbnail(&path, 720, 960).is_none());
    }

    #[test]
    fn test_preset_bounds() {
        assert_eq!(BoundsPreset::Thumbnail.bounds(), (100, 100));
        assert_eq!(BoundsPreset::Marker.bounds(), (50, 50));
        assert_eq!(BoundsPreset::Viewer.bounds(), (720, 960));
        assert!(BoundsPreset::Thumbnail.accepts_embedded());
        assert!(BoundsPreset::Marker.accepts_embedded());
        assert!(!BoundsPreset::Viewer.accepts_embedded());
    }
}
