use ndarray::{s, Axis};

use crate::overlay::domain::composite_style::CompositeStyle;
use crate::overlay::domain::label_metrics::LabelMetrics;
use crate::overlay::domain::placement::Anchor;
use crate::overlay::domain::text_renderer::TextRenderer;
use crate::shared::error::WatermarkError;
use crate::shared::frame::Frame;

/// Backing-box rectangle clamped to the frame, as half-open pixel ranges
/// `[left, right) x [top, bottom)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BackingBox {
    /// Box around a label drawn at `anchor`, grown by the style padding and
    /// clamped to `[0, frame_width] x [0, frame_height]`. Anchors far outside
    /// the frame produce an empty box.
    pub fn around(
        anchor: Anchor,
        metrics: &LabelMetrics,
        style: &CompositeStyle,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let pad = i64::from(style.padding);
        let clamp_x = |v: i64| v.clamp(0, i64::from(frame_width)) as u32;
        let clamp_y = |v: i64| v.clamp(0, i64::from(frame_height)) as u32;

        Self {
            left: clamp_x(anchor.x - pad),
            top: clamp_y(anchor.y - i64::from(metrics.height) - pad),
            right: clamp_x(anchor.x + i64::from(metrics.width) + pad),
            bottom: clamp_y(anchor.y + pad),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// Stamps the watermark onto frames: a translucent backing box for
/// legibility, then the label text on top of it.
pub struct OverlayCompositor {
    renderer: Box<dyn TextRenderer>,
}

impl OverlayCompositor {
    pub fn new(renderer: Box<dyn TextRenderer>) -> Self {
        Self { renderer }
    }

    /// Measures the label once; the result is reused for every frame.
    pub fn measure(
        &self,
        label: &str,
        style: &CompositeStyle,
    ) -> Result<LabelMetrics, WatermarkError> {
        self.renderer
            .measure(label, style)
            .map_err(|e| WatermarkError::RenderUnavailable(e.to_string()))
    }

    /// Returns `frame` with the backing box blended in and `label` drawn at
    /// `anchor`. Dimensions never change; pixels outside the clamped box and
    /// the glyph coverage are left untouched.
    pub fn composite(
        &self,
        mut frame: Frame,
        anchor: Anchor,
        label: &str,
        metrics: &LabelMetrics,
        style: &CompositeStyle,
    ) -> Result<Frame, WatermarkError> {
        let bbox = BackingBox::around(anchor, metrics, style, frame.width(), frame.height());
        blend_box(&mut frame, &bbox, style);

        self.renderer
            .stamp(&mut frame, anchor, label, style)
            .map_err(|e| WatermarkError::RenderUnavailable(e.to_string()))?;

        Ok(frame)
    }
}

/// Blends `style.box_color` into the box region with weight `style.opacity`.
fn blend_box(frame: &mut Frame, bbox: &BackingBox, style: &CompositeStyle) {
    if bbox.is_empty() {
        return;
    }

    let lut = blend_table(style.box_color, style.opacity);
    let mut pixels = frame.as_ndarray_mut();
    let mut roi = pixels.slice_mut(s![
        bbox.top as usize..bbox.bottom as usize,
        bbox.left as usize..bbox.right as usize,
        ..
    ]);
    for mut px in roi.lanes_mut(Axis(2)) {
        for (c, v) in px.iter_mut().enumerate() {
            *v = lut[c][*v as usize];
        }
    }
}

/// Per-channel lookup of `opacity * color + (1 - opacity) * v`, rounded and
/// clamped to the channel range.
fn blend_table(color: [u8; 3], opacity: f32) -> [[u8; 256]; 3] {
    let alpha = f64::from(opacity.clamp(0.0, 1.0));
    let mut lut = [[0u8; 256]; 3];
    for (c, table) in lut.iter_mut().enumerate() {
        let overlay = alpha * f64::from(color[c]);
        for (v, out) in table.iter_mut().enumerate() {
            let blended = overlay + (1.0 - alpha) * v as f64;
            *out = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    lut
}
