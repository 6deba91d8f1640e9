use std::path::{Path, PathBuf};

use crate::shared::constants::{FONT_FILE_NAMES, SYSTEM_FONT_PATHS};
use crate::shared::error::WatermarkError;

/// Resolve the font file used to render the watermark.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. User font directory (platform-specific)
/// 3. Well-known system font locations
pub fn resolve(explicit: Option<&Path>) -> Result<PathBuf, WatermarkError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(WatermarkError::RenderUnavailable(format!(
            "font file not found: {}",
            path.display()
        )));
    }

    find_installed_font().ok_or_else(|| {
        WatermarkError::RenderUnavailable(
            "no usable font found; pass --font with a TTF/OTF file".to_string(),
        )
    })
}

/// First matching font in the user font directory, then in the system
/// locations.
pub fn find_installed_font() -> Option<PathBuf> {
    let user_fonts = dirs::font_dir()
        .into_iter()
        .flat_map(|dir| FONT_FILE_NAMES.iter().map(move |name| dir.join(name)));
    let system_fonts = SYSTEM_FONT_PATHS.iter().map(PathBuf::from);

    user_fonts.chain(system_fonts).find(|p| p.is_file())
}
