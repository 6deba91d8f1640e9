/// Pixel extent of the rendered watermark label.
///
/// `height` is measured from the baseline upward; `baseline` is how far
/// descenders reach below it. Measured once per run since the text never
/// changes between frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LabelMetrics {
    pub width: u32,
    pub height: u32,
    pub baseline: u32,
}

impl LabelMetrics {
    pub fn new(width: u32, height: u32, baseline: u32) -> Self {
        Self {
            width,
            height,
            baseline,
        }
    }
}
