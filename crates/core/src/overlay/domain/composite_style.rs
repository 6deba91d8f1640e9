use crate::shared::constants::DEFAULT_FONT_SIZE;

pub const DEFAULT_PADDING: u32 = 10;
pub const DEFAULT_OPACITY: f32 = 0.4;
pub const DEFAULT_MARGIN: u32 = 20;
pub const DEFAULT_STROKE_THICKNESS: u32 = 2;

/// Fixed look of the watermark for one run.
///
/// Built once before the frame loop and handed to the resolver and
/// compositor by reference; nothing mutates it afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeStyle {
    /// Space between the label and the edge of the backing box.
    pub padding: u32,
    /// Weight of `box_color` when blending the backing box (0.0-1.0).
    pub opacity: f32,
    pub box_color: [u8; 3],
    pub text_color: [u8; 3],
    /// Distance between the label and the frame edge for corner placements.
    pub margin: u32,
    pub stroke_thickness: u32,
    pub font_size: f32,
}

impl CompositeStyle {
    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

impl Default for CompositeStyle {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
            opacity: DEFAULT_OPACITY,
            box_color: [0, 0, 0],
            text_color: [255, 255, 255],
            margin: DEFAULT_MARGIN,
            stroke_thickness: DEFAULT_STROKE_THICKNESS,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}
