//! Poster zoom geometry and clarity schedule.
//!
//! Crop offsets come from a digest of the media id and cover URL, so a
//! poster always zooms into the same spot, and a new cover yields a new spot.

use sha2::{Digest, Sha256};

use super::media::MediaItem;

/// Zoom factors per round, tightest first. The last round shows the full poster.
pub const CROP_SCALES: [f64; 3] = [1.65, 1.25, 1.0];
/// Fraction of each edge that offsets may not enter, per zoomed round.
const CROP_MARGINS: [f64; 2] = [0.22, 0.12];

const MIN_CLARITY: f64 = 0.2;
const MAX_BLUR_RADIUS: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropStage {
    pub scale: f64,
    /// Horizontal centre in percent of the width.
    pub offset_x: f64,
    /// Vertical centre in percent of the height.
    pub offset_y: f64,
}

impl CropStage {
    pub const FULL: CropStage = CropStage {
        scale: 1.0,
        offset_x: 50.0,
        offset_y: 50.0,
    };
}

/// Pixel rectangle cut from the source before it is scaled back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

fn offset_from_digest(digest: &[u8], stage: usize, margin: f64) -> (f64, f64) {
    let start = (stage * 4) % digest.len();
    let window: Vec<u8> = digest
        .iter()
        .cycle()
        .skip(start)
        .take(4)
        .copied()
        .collect();
    let raw_x = f64::from(u16::from_be_bytes([window[0], window[1]])) / 65535.0;
    let raw_y = f64::from(u16::from_be_bytes([window[2], window[3]])) / 65535.0;
    let lower = margin * 100.0;
    let span = (100.0 - lower - lower).max(0.0);
    (lower + raw_x * span, lower + raw_y * span)
}

/// One stage per round; the final stage is always [`CropStage::FULL`].
pub fn crop_stages(media: &MediaItem) -> Vec<CropStage> {
    let seed = format!(
        "poster:{}:{}",
        media.id,
        media.best_image_url().unwrap_or_default()
    );
    let digest = Sha256::digest(seed.as_bytes());
    let last = CROP_SCALES.len() - 1;

    CROP_SCALES
        .iter()
        .enumerate()
        .map(|(index, scale)| {
            if index == last {
                return CropStage::FULL;
            }
            let margin = CROP_MARGINS[index.min(CROP_MARGINS.len() - 1)];
            let (offset_x, offset_y) = offset_from_digest(&digest, index, margin);
            CropStage {
                scale: *scale,
                offset_x,
                offset_y,
            }
        })
        .collect()
}

/// Window of `width / scale` by `height / scale` centred on the stage offset
/// and shifted back inside the image when it would overflow.
pub fn crop_window(width: u32, height: u32, stage: &CropStage) -> CropWindow {
    let scale = if stage.scale > 0.0 { stage.scale } else { 1.0 };
    let (w, h) = (f64::from(width), f64::from(height));
    let crop_width = (w / scale).clamp(1.0, w.max(1.0));
    let crop_height = (h / scale).clamp(1.0, h.max(1.0));

    let center_x = stage.offset_x / 100.0 * w;
    let center_y = stage.offset_y / 100.0 * h;
    let left = (center_x - crop_width / 2.0).clamp(0.0, (w - crop_width).max(0.0));
    let top = (center_y - crop_height / 2.0).clamp(0.0, (h - crop_height).max(0.0));

    let left = left.round() as u32;
    let top = top.round() as u32;
    CropWindow {
        left,
        top,
        width: (crop_width.round() as u32).min(width.saturating_sub(left)).max(1),
        height: (crop_height.round() as u32).min(height.saturating_sub(top)).max(1),
    }
}

/// Image clarity for a 1-based round: 0.2 on the first round rising
/// linearly to 1.0 on the last, rounded to two decimals.
pub fn clarity(hint_round: usize, total_rounds: usize) -> f64 {
    if total_rounds <= 1 {
        return 1.0;
    }
    let progress = hint_round.saturating_sub(1) as f64 / (total_rounds - 1) as f64;
    let normalized = MIN_CLARITY + (1.0 - MIN_CLARITY) * progress;
    ((normalized * 100.0).round() / 100.0).clamp(0.0, 1.0)
}

pub fn blur_radius(clarity: f64) -> f64 {
    (1.0 - clarity) * MAX_BLUR_RADIUS
}

pub fn sharpen_factor(clarity: f64) -> f64 {
    0.4 + 0.6 * clarity
}

/// Cache partition for a raw hint count: clamped into `[0, total_rounds - 1]`.
pub fn hint_bucket(requested_hints: i64, total_rounds: usize) -> usize {
    let max_bucket = total_rounds.saturating_sub(1);
    usize::try_from(requested_hints.max(0))
        .unwrap_or(usize::MAX)
        .min(max_bucket)
}

/// 1-based round shown after `hints_used` hints.
pub fn hint_round(hints_used: usize, total_rounds: usize) -> usize {
    if total_rounds == 0 {
        return 1;
    }
    (hints_used + 1).clamp(1, total_rounds)
}
