use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, warn};

use crate::error::{IconError, Result};
use crate::glyph::valid_font_size;
use crate::models::Config;

const FILE_NAME: &str = "iconforge.conf";

pub fn config_file_path() -> PathBuf {
    ProjectDirs::from("", "", "iconforge")
        .map(|dirs| dirs.config_dir().join(FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(FILE_NAME))
}

/// Load settings on top of `base`. An explicit path must exist; otherwise the
/// user config dir is tried, then `./iconforge.conf`, then `base` as is.
pub fn read_config(explicit: Option<&Path>, base: Config) -> Result<Config> {
    if let Some(path) = explicit {
        let content = fs::read_to_string(path).map_err(|e| IconError::io(path, e))?;
        debug!(path = %path.display(), "loaded config");
        return Ok(parse_config(&content, base));
    }
    for path in [config_file_path(), PathBuf::from(FILE_NAME)] {
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded config");
                return Ok(parse_config(&content, base));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(IconError::io(path, e)),
        }
    }
    debug!("no config file, using defaults");
    Ok(base)
}

/// `key=value` per line, `#` starts a comment line. Unknown keys are ignored
/// and unparsable values keep the previous setting.
pub fn parse_config(content: &str, base: Config) -> Config {
    let mut cfg = base;
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            warn!(line = lineno + 1, "ignoring config line without '='");
            continue;
        };
        let (k, v) = (k.trim(), v.trim());
        let ok = match k {
            "label" => {
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => { cfg.label = c; true }
                    _ => false,
                }
            }
            "canvas_size" => set(&mut cfg.canvas_size, v),
            "fill" => set(&mut cfg.fill, v),
            "glyph_color" => set(&mut cfg.glyph_color, v),
            "padding" => set(&mut cfg.padding, v),
            "font_path" => {
                cfg.font_path = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
                true
            }
            "font_size" => match v.parse::<f32>() {
                Ok(size) if valid_font_size(size) => { cfg.font_size = size; true }
                _ => false,
            },
            "glyph_bias" => set(&mut cfg.glyph_bias, v),
            "glyph_offset_x" => set(&mut cfg.glyph_offset_x, v),
            "glyph_offset_y" => set(&mut cfg.glyph_offset_y, v),
            "output_dir" => { cfg.output_dir = PathBuf::from(v); true }
            "png_name" => set_name(&mut cfg.png_name, v),
            "bundle_name" => set_name(&mut cfg.bundle_name, v),
            "iconset_name" => set_name(&mut cfg.iconset_name, v),
            "sizes" => match v.split(',').map(|s| s.trim().parse::<u32>()).collect::<Result<Vec<_>, _>>() {
                Ok(sizes) => { cfg.sizes = sizes; true }
                Err(_) => false,
            },
            "double_density" => match parse_flag(v) {
                Some(b) => { cfg.double_density = b; true }
                None => false,
            },
            "double_density_max" => set(&mut cfg.double_density_max, v),
            "primary" => set(&mut cfg.primary, v),
            "fallback" => set(&mut cfg.fallback, v),
            _ => {
                debug!(key = k, "ignoring unknown config key");
                true
            }
        };
        if !ok {
            warn!(line = lineno + 1, key = k, value = v, "invalid config value, keeping previous setting");
        }
    }
    cfg
}

fn set<T: std::str::FromStr>(slot: &mut T, v: &str) -> bool {
    match v.parse() {
        Ok(parsed) => { *slot = parsed; true }
        Err(_) => false,
    }
}

fn set_name(slot: &mut String, v: &str) -> bool {
    if v.is_empty() {
        return false;
    }
    *slot = v.to_string();
    true
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn save_config(cfg: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IconError::io(parent, e))?;
    }
    write_config(cfg, path).map_err(|e| IconError::io(path, e))
}

fn write_config(cfg: &Config, path: &Path) -> io::Result<()> {
    let mut f = fs::File::create(path)?;
    writeln!(f, "# iconforge settings")?;
    writeln!(f, "label={}", cfg.label)?;
    writeln!(f, "canvas_size={}", cfg.canvas_size)?;
    writeln!(f, "fill={}", cfg.fill)?;
    writeln!(f, "glyph_color={}", cfg.glyph_color)?;
    writeln!(f, "padding={}", cfg.padding)?;
    match &cfg.font_path {
        Some(font) => writeln!(f, "font_path={}", font.display())?,
        None => writeln!(f, "font_path=")?,
    }
    writeln!(f, "font_size={}", cfg.font_size)?;
    writeln!(f, "glyph_bias={}", cfg.glyph_bias)?;
    if cfg.glyph_offset_x != 0 { writeln!(f, "glyph_offset_x={}", cfg.glyph_offset_x)?; }
    if cfg.glyph_offset_y != 0 { writeln!(f, "glyph_offset_y={}", cfg.glyph_offset_y)?; }
    writeln!(f, "output_dir={}", cfg.output_dir.display())?;
    writeln!(f, "png_name={}", cfg.png_name)?;
    writeln!(f, "bundle_name={}", cfg.bundle_name)?;
    writeln!(f, "iconset_name={}", cfg.iconset_name)?;
    let sizes: Vec<String> = cfg.sizes.iter().map(u32::to_string).collect();
    writeln!(f, "sizes={}", sizes.join(","))?;
    writeln!(f, "double_density={}", if cfg.double_density { 1 } else { 0 })?;
    writeln!(f, "double_density_max={}", cfg.double_density_max)?;
    writeln!(f, "primary={}", cfg.primary)?;
    writeln!(f, "fallback={}", cfg.fallback)?;
    Ok(())
}
