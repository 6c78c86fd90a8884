use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, info};

use crate::error::{IconError, Result};
use crate::images;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Density {
    Standard,
    /// "@2x" rendering of a nominal size for high-DPI displays.
    Double,
}

impl Density {
    pub fn factor(self) -> u32 {
        match self {
            Density::Standard => 1,
            Density::Double => 2,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Density::Standard => "",
            Density::Double => "@2x",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub nominal: u32,
    pub density: Density,
}

impl VariantSpec {
    pub fn pixels(&self) -> u32 {
        self.nominal.saturating_mul(self.density.factor())
    }

    /// `icon_16x16.png`, `icon_16x16@2x.png`, ...
    pub fn file_name(&self) -> String {
        format!("icon_{n}x{n}{}.png", self.density.suffix(), n = self.nominal)
    }
}

pub struct Variant {
    pub spec: VariantSpec,
    pub image: RgbaImage,
}

pub fn validate_sizes(sizes: &[u32]) -> Result<()> {
    if sizes.is_empty() {
        return Err(IconError::InvalidSizes("no sizes given".to_string()));
    }
    if let Some(zero) = sizes.iter().position(|&s| s == 0) {
        return Err(IconError::InvalidSizes(format!("size #{} is zero", zero + 1)));
    }
    if let Some(w) = sizes.windows(2).find(|w| w[0] >= w[1]) {
        return Err(IconError::InvalidSizes(format!(
            "sizes must be strictly ascending, found {} before {}",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// Ordered variant list: each size, followed by its @2x twin when
/// `double_density` is on and the size is at most `double_max`.
pub fn plan(sizes: &[u32], double_density: bool, double_max: u32) -> Result<Vec<VariantSpec>> {
    validate_sizes(sizes)?;
    let mut specs = Vec::with_capacity(sizes.len() * 2);
    for &nominal in sizes {
        specs.push(VariantSpec { nominal, density: Density::Standard });
        if double_density && nominal <= double_max {
            specs.push(VariantSpec { nominal, density: Density::Double });
        }
    }
    Ok(specs)
}

/// Resample every planned variant from the same source canvas.
pub fn render(canvas: &RgbaImage, specs: &[VariantSpec]) -> Vec<Variant> {
    specs
        .iter()
        .map(|&spec| Variant { spec, image: images::resample(canvas, spec.pixels()) })
        .collect()
}

/// Write variants into `dir` (created if missing), one file per variant.
/// `icon_*.png` files left over from an earlier run are removed first.
pub fn stage(variants: &[Variant], dir: &Path) -> Result<Vec<PathBuf>> {
    clear_stale(dir)?;
    let mut written = Vec::with_capacity(variants.len());
    for v in variants {
        let path = dir.join(v.spec.file_name());
        images::save_png(&v.image, &path)?;
        debug!(file = %path.display(), px = v.spec.pixels(), "staged variant");
        written.push(path);
    }
    info!(dir = %dir.display(), count = written.len(), "iconset staged");
    Ok(written)
}

fn clear_stale(dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(IconError::io(dir, e)),
    };
    for entry in entries {
        let path = entry.map_err(|e| IconError::io(dir, e))?.path();
        let stale = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("icon_") && n.ends_with(".png"));
        if stale && path.is_file() {
            fs::remove_file(&path).map_err(|e| IconError::io(&path, e))?;
            debug!(file = %path.display(), "removed stale variant");
        }
    }
    Ok(())
}
