/// Frame rate used when the source container does not report one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Glyph size in pixels for the watermark label.
pub const DEFAULT_FONT_SIZE: f32 = 32.0;

/// Largest accepted glyph size. fontdue rasterizes each glyph at full size,
/// so this bounds the per-glyph bitmap allocation.
pub const MAX_FONT_SIZE: f32 = 1024.0;

/// Font file names looked up in the user's font directory.
pub const FONT_FILE_NAMES: &[&str] = &[
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "Arial.ttf",
    "arial.ttf",
];

/// Well-known system font locations, checked in order.
pub const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];
