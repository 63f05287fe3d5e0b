//! Timestamp band compositor.

use crate::error::{ProbeError, Result};
use crate::transport::Compositor;
use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

const BAND_RATIO: f32 = 0.06;
const BAND_MIN_PX: u32 = 60;
const BAND_MAX_PX: u32 = 160;
const FONT_RATIO: f32 = 0.6;
const FONT_MIN_PX: f32 = 28.0;
const FONT_MAX_PX: f32 = 56.0;
const TEXT_LEFT_PX: i32 = 20;

/// Families tried, in order, when no font file is configured.
const PREFERRED_FAMILIES: &[&str] = &["Arial", "Helvetica", "Liberation Sans", "DejaVu Sans"];

/// Band height for an image of height `image_height`.
pub fn band_height(image_height: u32) -> u32 {
    ((image_height as f32 * BAND_RATIO).round() as u32).clamp(BAND_MIN_PX, BAND_MAX_PX)
}

/// Font size for a band of height `band`.
pub fn font_size(band: u32) -> f32 {
    (band as f32 * FONT_RATIO).round().clamp(FONT_MIN_PX, FONT_MAX_PX)
}

/// Darkens a band across the top of the image and writes the stamp in it.
pub struct TimestampBand {
    font: Option<FontVec>,
    warned_no_font: AtomicBool,
}

impl TimestampBand {
    /// A compositor that draws the band without text.
    pub fn without_font() -> Self {
        Self {
            font: None,
            warned_no_font: AtomicBool::new(false),
        }
    }

    /// Loads a TTF/OTF font for the stamp text.
    pub fn with_font_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data).map_err(|e| {
            ProbeError::ConfigError(format!("invalid font {}: {e}", path.display()))
        })?;
        Ok(Self {
            font: Some(font),
            warned_no_font: AtomicBool::new(false),
        })
    }

    /// Uses the first installed sans-serif font. Fails when the system has
    /// no usable font at all.
    pub fn with_system_font() -> Result<Self> {
        let font = system_font().ok_or_else(|| {
            ProbeError::ConfigError(
                "no system font found for the timestamp band; set capture.font_path".into(),
            )
        })?;
        Ok(Self {
            font: Some(font),
            warned_no_font: AtomicBool::new(false),
        })
    }

    /// Uses the configured font, or a system font when none is configured.
    pub fn from_optional_font(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::with_font_file(path),
            None => Self::with_system_font(),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn darken_band(image: &mut RgbaImage, band: u32) {
        let rows = band.min(image.height());
        for y in 0..rows {
            for x in 0..image.width() {
                let pixel = image.get_pixel_mut(x, y);
                // 50% black over the source, alpha kept.
                pixel[0] /= 2;
                pixel[1] /= 2;
                pixel[2] /= 2;
                pixel[3] = pixel[3].max(128);
            }
        }
    }
}

fn system_font() -> Option<FontVec> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let named = PREFERRED_FAMILIES.iter().map(|name| fontdb::Family::Name(name));
    let id = named
        .chain([fontdb::Family::SansSerif])
        .find_map(|family| {
            db.query(&fontdb::Query {
                families: &[family],
                ..fontdb::Query::default()
            })
        })
        .or_else(|| db.faces().next().map(|face| face.id))?;

    let font = db.with_face_data(id, |data, index| {
        FontVec::try_from_vec_and_index(data.to_vec(), index).ok()
    })??;
    if let Some(face) = db.face(id) {
        debug!(family = ?face.families.first().map(|(name, _)| name), "timestamp font selected");
    }
    Some(font)
}

impl Compositor for TimestampBand {
    fn overlay_timestamp_band(&self, image: &[u8], stamp: &str) -> Result<Vec<u8>> {
        let mut canvas = image::load_from_memory(image)
            .map_err(|e| ProbeError::Image(format!("decode screenshot: {e}")))?
            .to_rgba8();

        let band = band_height(canvas.height());
        Self::darken_band(&mut canvas, band);

        match &self.font {
            Some(font) => {
                let size = font_size(band);
                let top = ((band as f32 - size) / 2.0).max(0.0) as i32;
                draw_text_mut(
                    &mut canvas,
                    Rgba([255, 255, 255, 255]),
                    TEXT_LEFT_PX,
                    top,
                    PxScale::from(size),
                    font,
                    stamp,
                );
            }
            None => {
                if !self.warned_no_font.swap(true, Ordering::Relaxed) {
                    warn!("no capture font loaded; timestamp band drawn without text");
                }
            }
        }

        let mut out = Cursor::new(Vec::new());
        canvas
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| ProbeError::Image(format!("encode capture: {e}")))?;
        Ok(out.into_inner())
    }
}
