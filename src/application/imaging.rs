//! Poster degradation: crop, blur, sharpen and re-encode on a bounded pool of
//! blocking workers.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use metrics::histogram;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use super::error::PosterImageError;
use crate::domain::poster::{self, CropStage};

const SOURCE: &str = "application::imaging";
const JPEG_QUALITY: u8 = 90;
pub const RENDERED_MIME: &str = "image/jpeg";

/// Normalised 3x3 smoothing kernel the sharpen pass blends against.
const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

pub(crate) const METRIC_POSTER_RENDER_MS: &str = "guesssenpai_poster_render_ms";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderJob {
    pub hint_round: usize,
    pub total_rounds: usize,
    pub crop: Option<CropStage>,
}

/// Image bytes with their MIME type. Cached as `{"data": <base64>, "mime": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    #[serde(rename = "data", with = "base64_bytes")]
    pub bytes: Bytes,
    pub mime: String,
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(D::Error::custom)
    }
}

/// Runs renders on the blocking thread pool, at most `workers` at a time.
#[derive(Clone)]
pub struct RenderPool {
    permits: Arc<Semaphore>,
}

impl RenderPool {
    pub fn new(workers: NonZeroUsize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.get())),
        }
    }

    pub async fn render(&self, source: Bytes, job: RenderJob) -> Result<EncodedImage, PosterImageError> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|err| PosterImageError::render(format!("render pool closed: {err}")))?;

        let started_at = Instant::now();
        let rendered = tokio::task::spawn_blocking(move || render_variant(&source, &job))
            .await
            .map_err(|err| PosterImageError::render(format!("render task failed: {err}")))??;

        let elapsed = started_at.elapsed();
        histogram!(METRIC_POSTER_RENDER_MS).record(elapsed.as_secs_f64() * 1000.0);
        debug!(
            target = SOURCE,
            op = "render",
            hint_round = job.hint_round,
            bytes = rendered.bytes.len(),
            elapsed_ms = elapsed.as_millis() as u64
        );
        Ok(rendered)
    }
}

/// Degrade `source` for `job.hint_round` of `job.total_rounds` and encode the
/// result as JPEG.
pub fn render_variant(source: &[u8], job: &RenderJob) -> Result<EncodedImage, PosterImageError> {
    let decoded = image::load_from_memory(source).map_err(|err| PosterImageError::decode(err))?;
    let mut canvas = DynamicImage::ImageRgb8(decoded.to_rgb8());

    if let Some(stage) = job.crop.as_ref() {
        canvas = apply_crop(&canvas, stage);
    }

    let clarity = poster::clarity(job.hint_round, job.total_rounds);
    let radius = poster::blur_radius(clarity);
    if radius > 0.0 {
        canvas = canvas.blur(radius as f32);
    }
    let sharpened = sharpen(&canvas.to_rgb8(), poster::sharpen_factor(clarity));

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY)
        .encode_image(&sharpened)
        .map_err(|err| PosterImageError::render(err))?;

    Ok(EncodedImage {
        bytes: Bytes::from(encoded),
        mime: RENDERED_MIME.to_string(),
    })
}

fn apply_crop(canvas: &DynamicImage, stage: &CropStage) -> DynamicImage {
    let (width, height) = canvas.dimensions();
    let window = poster::crop_window(width, height, stage);
    if window.width == width && window.height == height {
        return canvas.clone();
    }
    canvas
        .crop_imm(window.left, window.top, window.width, window.height)
        .resize_exact(width, height, FilterType::Lanczos3)
}

/// Blend between a smoothed copy (`factor` 0) and the input (`factor` 1);
/// factors above 1 extrapolate away from the smoothed copy.
fn sharpen(image: &RgbImage, factor: f64) -> RgbImage {
    if (factor - 1.0).abs() < f64::EPSILON {
        return image.clone();
    }
    let smooth = image::imageops::filter3x3(image, &SMOOTH_KERNEL);
    let (width, height) = image.dimensions();
    let mut out = image.clone();
    // Edge pixels keep their original value; the kernel has no full neighbourhood there.
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let original = image.get_pixel(x, y);
            let blurred = smooth.get_pixel(x, y);
            let pixel = out.get_pixel_mut(x, y);
            for channel in 0..3 {
                let base = f64::from(blurred[channel]);
                let value = base + factor * (f64::from(original[channel]) - base);
                pixel[channel] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb};

    use super::*;

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([240, 30, 30])
            } else {
                Rgb([20, 20, 200])
            }
        });
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, ImageFormat::Png)
            .expect("encode fixture");
        bytes.into_inner()
    }

    #[test]
    fn renders_jpeg_with_source_dimensions() {
        let source = png_fixture(48, 64);
        let job = RenderJob {
            hint_round: 1,
            total_rounds: 3,
            crop: Some(CropStage {
                scale: 1.65,
                offset_x: 30.0,
                offset_y: 70.0,
            }),
        };
        let rendered = render_variant(&source, &job).expect("render");
        assert_eq!(rendered.mime, "image/jpeg");
        let decoded = image::load_from_memory(&rendered.bytes).expect("decode output");
        assert_eq!(decoded.dimensions(), (48, 64));
    }

    #[test]
    fn undecodable_source_is_a_decode_error() {
        let job = RenderJob {
            hint_round: 3,
            total_rounds: 3,
            crop: None,
        };
        let err = render_variant(b"definitely not an image", &job).expect_err("must fail");
        assert!(matches!(err, PosterImageError::Decode(_)));
    }

    #[test]
    fn cached_form_is_base64() {
        let image = EncodedImage {
            bytes: Bytes::from_static(b"jpeg"),
            mime: RENDERED_MIME.to_string(),
        };
        let json = serde_json::to_value(&image).expect("serialize");
        assert_eq!(json["data"], "anBlZw==");
        assert_eq!(json["mime"], "image/jpeg");
        assert!(serde_json::from_str::<EncodedImage>(r#"{"data":"***","mime":"image/png"}"#).is_err());
    }

    #[test]
    fn full_clarity_sharpen_is_identity() {
        let image = RgbImage::from_pixel(5, 5, Rgb([10, 20, 30]));
        assert_eq!(sharpen(&image, 1.0), image);
    }

    #[test]
    fn sharpen_keeps_flat_regions_flat() {
        let image = RgbImage::from_pixel(6, 6, Rgb([100, 150, 200]));
        let softened = sharpen(&image, 0.4);
        for pixel in softened.pixels() {
            for (channel, expected) in [100i16, 150, 200].into_iter().enumerate() {
                assert!((i16::from(pixel[channel]) - expected).abs() <= 1);
            }
        }
    }

    #[tokio::test]
    async fn pool_renders_off_the_async_runtime() {
        let pool = RenderPool::new(NonZeroUsize::new(1).expect("non-zero"));
        let rendered = pool
            .render(
                Bytes::from(png_fixture(16, 16)),
                RenderJob {
                    hint_round: 2,
                    total_rounds: 3,
                    crop: None,
                },
            )
            .await
            .expect("render");
        assert!(!rendered.bytes.is_empty());
    }
}
