//! Output file naming.
//!
//! Frame indices are zero-padded to 6 digits so lexicographic order matches
//! extraction order in downstream photogrammetry tools.

use serde::{Deserialize, Serialize};

/// Output naming scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum NamingMode {
    /// `<stem>_frame<idx>_<cam><ext>`, mask `<image>.mask.png`.
    #[default]
    RealityScan,
    /// Same image name, mask `<stem>_frame<idx>_<cam>_mask.png`.
    Simple,
    /// User templates substituting `{filename}`, `{frame}`, `{camera}`,
    /// `{ext}`, and (for masks) `{image_name}`.
    Custom {
        image_pattern: String,
        mask_pattern: String,
    },
}

/// Substitution variables available to custom templates.
#[derive(Debug, Clone)]
pub struct NamingContext<'a> {
    /// Source file name without extension.
    pub filename: &'a str,
    /// Source frame index.
    pub frame: u64,
    /// View name from the camera layout.
    pub camera: &'a str,
    /// Output extension including the leading dot.
    pub ext: &'a str,
}

impl NamingMode {
    /// File name for a reprojected view image.
    pub fn image_name(&self, ctx: &NamingContext) -> String {
        match self {
            Self::RealityScan | Self::Simple => format!(
                "{}_frame{:06}_{}{}",
                ctx.filename, ctx.frame, ctx.camera, ctx.ext
            ),
            Self::Custom { image_pattern, .. } => {
                let name = substitute(image_pattern, ctx, None);
                if image_pattern.contains("{ext}") {
                    name
                } else {
                    format!("{name}{}", ctx.ext)
                }
            }
        }
    }

    /// File name for the mask belonging to `image_name`. Masks are always PNG.
    pub fn mask_name(&self, ctx: &NamingContext, image_name: &str) -> String {
        match self {
            Self::RealityScan => format!("{image_name}.mask.png"),
            Self::Simple => format!(
                "{}_frame{:06}_{}_mask.png",
                ctx.filename, ctx.frame, ctx.camera
            ),
            Self::Custom { mask_pattern, .. } => {
                let name = substitute(mask_pattern, ctx, Some(image_name));
                if mask_pattern.contains("{ext}") {
                    name
                } else {
                    format!("{name}.png")
                }
            }
        }
    }
}

fn substitute(pattern: &str, ctx: &NamingContext, image_name: Option<&str>) -> String {
    let mut result = pattern
        .replace("{filename}", ctx.filename)
        .replace("{frame}", &format!("{:06}", ctx.frame))
        .replace("{camera}", ctx.camera)
        .replace("{ext}", ctx.ext);
    if let Some(image_name) = image_name {
        result = result.replace("{image_name}", image_name);
    }
    result
}
