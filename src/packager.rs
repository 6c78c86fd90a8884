//! Turning the base image into an `.icns` bundle.
//!
//! A primary strategy is tried first; if its tool exits non-zero, cannot be
//! launched or the native encoder fails, the fallback strategy runs. A
//! failing fallback is fatal.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use icns::{IconFamily, IconType, PixelFormat};
use image::RgbaImage;
use tracing::{info, warn};

use crate::error::{IconError, Result};
use crate::iconset::{self, Density, Variant, VariantSpec};
use crate::logger::log_command;
use crate::models::{Config, Packager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    /// Non-zero exit; `None` when killed by a signal.
    Failed(Option<i32>),
}

impl ToolStatus {
    pub fn success(self) -> bool {
        self == ToolStatus::Success
    }
}

impl From<ExitStatus> for ToolStatus {
    fn from(status: ExitStatus) -> Self {
        if status.success() { ToolStatus::Success } else { ToolStatus::Failed(status.code()) }
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Success => f.write_str("success"),
            ToolStatus::Failed(Some(code)) => write!(f, "exit code {code}"),
            ToolStatus::Failed(None) => f.write_str("terminated by signal"),
        }
    }
}

/// Runs an external program to completion and reports its status.
pub trait CommandRunner {
    fn run(&mut self, program: &str, args: &[OsString]) -> io::Result<ToolStatus>;
}

/// Spawns real processes, inheriting stdout/stderr.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, program: &str, args: &[OsString]) -> io::Result<ToolStatus> {
        log_command(program, args);
        let status = Command::new(program).args(args).status()?;
        Ok(status.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleStrategy {
    pub primary: Packager,
    pub fallback: Packager,
}

impl Default for BundleStrategy {
    fn default() -> Self {
        Self { primary: Packager::Sips, fallback: Packager::Iconutil }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleRequest {
    /// Flat PNG already written to disk; input for `sips`.
    pub base_png: PathBuf,
    pub bundle: PathBuf,
    pub staging_dir: PathBuf,
    pub sizes: Vec<u32>,
    pub double_density: bool,
    pub double_density_max: u32,
}

impl BundleRequest {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_png: cfg.png_path(),
            bundle: cfg.bundle_path(),
            staging_dir: cfg.staging_path(),
            sizes: cfg.sizes.clone(),
            double_density: cfg.double_density,
            double_density_max: cfg.double_density_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleOutcome {
    pub strategy: Packager,
    pub fell_back: bool,
    /// Files written to the staging directory, empty if nothing was staged.
    pub staged: Vec<PathBuf>,
}

enum Attempt {
    Done,
    Failed(ToolStatus),
    NotLaunched(io::Error),
    Errored(IconError),
}

struct Staging<'a> {
    canvas: &'a RgbaImage,
    specs: Vec<VariantSpec>,
    variants: Option<Vec<Variant>>,
    written: Vec<PathBuf>,
}

impl Staging<'_> {
    fn ensure(&mut self, dir: &Path) -> Result<()> {
        if self.variants.is_none() {
            let variants = iconset::render(self.canvas, &self.specs);
            self.written = iconset::stage(&variants, dir)?;
            self.variants = Some(variants);
        }
        Ok(())
    }

    fn variants(&self) -> &[Variant] {
        self.variants.as_deref().unwrap_or_default()
    }
}

pub fn produce_bundle(
    canvas: &RgbaImage,
    req: &BundleRequest,
    strategy: BundleStrategy,
    runner: &mut dyn CommandRunner,
) -> Result<BundleOutcome> {
    let specs = iconset::plan(&req.sizes, req.double_density, req.double_density_max)?;
    if let Some(parent) = req.bundle.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IconError::io(parent, e))?;
    }
    let mut staging = Staging { canvas, specs, variants: None, written: Vec::new() };

    let fell_back = match attempt(strategy.primary, req, &mut staging, runner)? {
        Attempt::Done => false,
        Attempt::Failed(status) => {
            warn!(strategy = %strategy.primary, %status, "primary packaging failed, trying {}", strategy.fallback);
            true
        }
        Attempt::NotLaunched(e) => {
            warn!(strategy = %strategy.primary, error = %e, "primary packaging unavailable, trying {}", strategy.fallback);
            true
        }
        Attempt::Errored(e) => {
            warn!(strategy = %strategy.primary, error = %e, "primary packaging errored, trying {}", strategy.fallback);
            true
        }
    };

    if fell_back {
        let tool = strategy.fallback.to_string();
        match attempt(strategy.fallback, req, &mut staging, runner)? {
            Attempt::Done => {}
            Attempt::Failed(status) => return Err(IconError::ToolFailed { tool, status }),
            Attempt::NotLaunched(source) => return Err(IconError::ToolLaunch { tool, source }),
            Attempt::Errored(e) => return Err(e),
        }
    }

    let strategy = if fell_back { strategy.fallback } else { strategy.primary };
    info!(bundle = %req.bundle.display(), %strategy, "bundle written");
    Ok(BundleOutcome { strategy, fell_back, staged: staging.written })
}

fn attempt(
    packager: Packager,
    req: &BundleRequest,
    staging: &mut Staging<'_>,
    runner: &mut dyn CommandRunner,
) -> Result<Attempt> {
    // staging I/O errors are never absorbed, whichever side needs it
    if packager.needs_staging() {
        staging.ensure(&req.staging_dir)?;
    }
    let args: Vec<OsString> = match packager {
        Packager::Sips => vec![
            "-s".into(),
            "format".into(),
            "icns".into(),
            req.base_png.clone().into(),
            "--out".into(),
            req.bundle.clone().into(),
        ],
        Packager::Iconutil => vec![
            "-c".into(),
            "icns".into(),
            req.staging_dir.clone().into(),
            "-o".into(),
            req.bundle.clone().into(),
        ],
        Packager::Native => {
            return Ok(match write_icns(staging.variants(), &req.bundle) {
                Ok(()) => Attempt::Done,
                Err(e) => Attempt::Errored(e),
            });
        }
    };

    let Some(program) = packager.program() else {
        return Ok(Attempt::Done);
    };
    match runner.run(program, &args) {
        Ok(ToolStatus::Success) => Ok(Attempt::Done),
        Ok(status) => Ok(Attempt::Failed(status)),
        Err(e) => Ok(Attempt::NotLaunched(e)),
    }
}

/// The 32-bit RGBA icns slot for a variant. Legacy RGB24 and mask slots are
/// never used.
pub fn icns_slot(spec: &VariantSpec) -> Option<IconType> {
    use Density::{Double, Standard};
    Some(match (spec.nominal, spec.density) {
        (16, Standard) => IconType::RGBA32_16x16,
        (16, Double) => IconType::RGBA32_16x16_2x,
        (32, Standard) => IconType::RGBA32_32x32,
        (32, Double) => IconType::RGBA32_32x32_2x,
        (64, Standard) => IconType::RGBA32_64x64,
        (128, Standard) => IconType::RGBA32_128x128,
        (128, Double) => IconType::RGBA32_128x128_2x,
        (256, Standard) => IconType::RGBA32_256x256,
        (256, Double) => IconType::RGBA32_256x256_2x,
        (512, Standard) => IconType::RGBA32_512x512,
        (512, Double) => IconType::RGBA32_512x512_2x,
        _ => return None,
    })
}

/// Encode variants straight into an `.icns` file. Variants without a
/// matching icns slot (e.g. 1024 at standard density) are skipped.
pub fn write_icns(variants: &[Variant], bundle: &Path) -> Result<()> {
    let icns_err = |source: io::Error| IconError::Icns { path: bundle.to_path_buf(), source };
    let mut family = IconFamily::new();
    let mut added = 0usize;
    for v in variants {
        let px = v.spec.pixels();
        let Some(icon_type) = icns_slot(&v.spec) else {
            warn!(variant = %v.spec.file_name(), "no icns slot for variant, skipping");
            continue;
        };
        let image = icns::Image::from_data(PixelFormat::RGBA, px, px, v.image.as_raw().clone())
            .map_err(icns_err)?;
        family.add_icon_with_type(&image, icon_type).map_err(icns_err)?;
        added += 1;
    }
    if added == 0 {
        return Err(icns_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no variant fits an icns slot",
        )));
    }
    let file = File::create(bundle).map_err(|e| IconError::io(bundle, e))?;
    family.write(BufWriter::new(file)).map_err(icns_err)
}
