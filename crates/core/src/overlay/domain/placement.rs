use std::fmt;
use std::str::FromStr;

use crate::overlay::domain::composite_style::CompositeStyle;

/// Symbolic screen position for the watermark label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Placement {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl Placement {
    pub const ALL: [Placement; 5] = [
        Placement::TopLeft,
        Placement::TopRight,
        Placement::BottomLeft,
        Placement::BottomRight,
        Placement::Center,
    ];

    /// Parses a placement name. Unrecognised names resolve to `BottomRight`.
    pub fn parse(name: &str) -> Self {
        Self::recognize(name).unwrap_or_default()
    }

    /// Exact match against the five placement names, without fallback.
    pub fn recognize(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::TopLeft => "top-left",
            Placement::TopRight => "top-right",
            Placement::BottomLeft => "bottom-left",
            Placement::BottomRight => "bottom-right",
            Placement::Center => "center",
        }
    }
}

impl FromStr for Placement {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Pixel position of the label's left edge and text baseline.
///
/// May lie partly or wholly outside the frame; the compositor clamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Anchor {
    pub x: i64,
    pub y: i64,
}

impl Anchor {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Maps a placement to the anchor where the label baseline starts.
///
/// Text grows upward from the returned `y`. Total over all inputs: labels
/// larger than the frame simply produce off-frame coordinates.
pub fn resolve(
    placement: Placement,
    frame_width: u32,
    frame_height: u32,
    label_width: u32,
    label_height: u32,
    style: &CompositeStyle,
) -> Anchor {
    let fw = i64::from(frame_width);
    let fh = i64::from(frame_height);
    let lw = i64::from(label_width);
    let lh = i64::from(label_height);
    let margin = i64::from(style.margin);

    let left = margin;
    let right = fw - lw - margin;
    let top = margin + lh;
    let bottom = fh - margin;

    match placement {
        Placement::TopLeft => Anchor::new(left, top),
        Placement::TopRight => Anchor::new(right, top),
        Placement::BottomLeft => Anchor::new(left, bottom),
        Placement::BottomRight => Anchor::new(right, bottom),
        // i64 division truncates toward zero
        Placement::Center => Anchor::new((fw - lw) / 2, (fh + lh) / 2),
    }
}
