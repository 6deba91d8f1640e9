use crate::overlay::domain::composite_style::CompositeStyle;
use crate::overlay::domain::label_metrics::LabelMetrics;
use crate::overlay::domain::placement::Anchor;
use crate::shared::frame::Frame;

/// Domain interface for glyph measurement and rasterisation.
///
/// Implementations own the font resource. Both calls honour the font size,
/// stroke thickness and text colour of the given style.
pub trait TextRenderer: Send {
    fn measure(
        &self,
        text: &str,
        style: &CompositeStyle,
    ) -> Result<LabelMetrics, Box<dyn std::error::Error>>;

    /// Draws `text` with its baseline starting at `anchor`, clipping at the
    /// frame edges. Only pixels under glyph coverage may change.
    fn stamp(
        &self,
        frame: &mut Frame,
        anchor: Anchor,
        text: &str,
        style: &CompositeStyle,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
