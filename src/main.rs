use std::num::NonZeroU32;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{self, bail};
use image::RgbaImage;
use tracing::debug;

use iconforge::config::{self, read_config, save_config};
use iconforge::glyph::{self, GlyphFont};
use iconforge::packager::{self, BundleRequest, BundleStrategy, SystemRunner};
use iconforge::{Config, Packager, Rgb, icon, images, logger};

#[derive(Parser)]
#[command(name = "iconforge", version, about = "Generate lettered circle app icons and macOS icon bundles")]
struct Cli {
    /// Settings file (key=value lines)
    #[arg(short, long, global = true, env = "ICONFORGE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output, repeatable
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Less log output, repeatable
    #[arg(short, long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Draw the app icon, save it as PNG and package it as .icns
    App {
        #[command(flatten)]
        art: ArtArgs,
        #[command(flatten)]
        bundle: BundleArgs,
    },
    /// Draw the installer artwork (lighter fill, raised letter); PNG only
    Installer {
        #[command(flatten)]
        art: ArtArgs,
    },
    /// Write the built-in 16x16 placeholder icon and package it
    Placeholder {
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[command(flatten)]
        bundle: BundleArgs,
    },
    /// Resample an existing image to a square size, overwriting it
    Resize {
        path: PathBuf,
        #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..))]
        size: u32,
    },
    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the effective settings as JSON
    Show {
        #[arg(long)]
        installer: bool,
    },
    /// Write the default settings file
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ArtArgs {
    /// Letter drawn on the circle
    #[arg(long)]
    label: Option<char>,
    /// Canvas edge length in pixels
    #[arg(long)]
    size: Option<NonZeroU32>,
    /// Circle color, `r,g,b` or `#rrggbb`
    #[arg(long)]
    fill: Option<Rgb>,
    #[arg(long)]
    padding: Option<u32>,
    /// TrueType/OpenType font; the built-in font is used if it can't be loaded
    #[arg(long, conflicts_with = "no_font")]
    font: Option<PathBuf>,
    /// Always use the built-in font
    #[arg(long)]
    no_font: bool,
    /// Pixels per em, at most 4096
    #[arg(long, value_parser = parse_font_size)]
    font_size: Option<f32>,
    /// Upward shift as a fraction of glyph height
    #[arg(long, allow_hyphen_values = true)]
    bias: Option<f32>,
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args)]
struct BundleArgs {
    /// Only write the PNG
    #[arg(long)]
    no_bundle: bool,
    /// Skip @2x variants
    #[arg(long = "no-2x")]
    no_double_density: bool,
    /// Comma separated, ascending
    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<u32>>,
    #[arg(long)]
    primary: Option<Packager>,
    #[arg(long)]
    fallback: Option<Packager>,
}

fn parse_font_size(s: &str) -> Result<f32, String> {
    let size: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if glyph::valid_font_size(size) {
        Ok(size)
    } else {
        Err(format!("must be greater than 0 and at most {}", glyph::MAX_FONT_SIZE))
    }
}

impl ArtArgs {
    fn apply(self, cfg: &mut Config) {
        if let Some(label) = self.label { cfg.label = label; }
        if let Some(size) = self.size { cfg.canvas_size = size; }
        if let Some(fill) = self.fill { cfg.fill = fill; }
        if let Some(padding) = self.padding { cfg.padding = padding; }
        if self.no_font {
            cfg.font_path = None;
        } else if let Some(font) = self.font {
            cfg.font_path = Some(font);
        }
        if let Some(font_size) = self.font_size { cfg.font_size = font_size; }
        if let Some(bias) = self.bias { cfg.glyph_bias = bias; }
        if let Some(dir) = self.out_dir { cfg.output_dir = dir; }
    }
}

impl BundleArgs {
    fn apply(self, cfg: &mut Config) -> bool {
        if self.no_double_density { cfg.double_density = false; }
        if let Some(sizes) = self.sizes { cfg.sizes = sizes; }
        if let Some(p) = self.primary { cfg.primary = p; }
        if let Some(p) = self.fallback { cfg.fallback = p; }
        !self.no_bundle
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logger::init(cli.verbose.min(8) as i8 - cli.quiet.min(8) as i8);
    let explicit = cli.config.as_deref();

    match cli.command {
        Cmd::App { art, bundle } => {
            let mut cfg = read_config(explicit, Config::default())?;
            art.apply(&mut cfg);
            let with_bundle = bundle.apply(&mut cfg);
            let canvas = draw(&cfg)?;
            if with_bundle {
                package(&canvas, &cfg)?;
            }
        }
        Cmd::Installer { art } => {
            let mut cfg = read_config(explicit, Config::installer())?;
            art.apply(&mut cfg);
            draw(&cfg)?;
        }
        Cmd::Placeholder { out_dir, bundle } => {
            let mut cfg = read_config(explicit, Config::default())?;
            if let Some(dir) = out_dir { cfg.output_dir = dir; }
            let with_bundle = bundle.apply(&mut cfg);
            let canvas = images::placeholder()?;
            let png = images::save_png(&canvas, &cfg.png_path())?;
            println!("PNG icon saved to: {}", png.display());
            if with_bundle {
                package(&canvas, &cfg)?;
            }
        }
        Cmd::Resize { path, size } => {
            let report = images::resize_in_place(&path, size)?;
            println!("Original size: {}x{} px", report.original.0, report.original.1);
            println!("Icon resized to {}x{} px", report.target.0, report.target.1);
        }
        Cmd::Config { action: ConfigCmd::Show { installer } } => {
            let preset = if installer { Config::installer() } else { Config::default() };
            let cfg = read_config(explicit, preset)?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        Cmd::Config { action: ConfigCmd::Init { force } } => {
            let path = cli.config.clone().unwrap_or_else(config::config_file_path);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            save_config(&Config::default(), &path)?;
            println!("Settings written to: {}", path.display());
        }
    }
    Ok(())
}

fn draw(cfg: &Config) -> eyre::Result<RgbaImage> {
    let mut canvas = icon::render_base(cfg.canvas_size, cfg.fill, cfg.padding);
    let font = GlyphFont::load_or_default(cfg.font_path.as_deref());
    if glyph::overlay_centered(&mut canvas, &font, cfg.label, cfg.font_size, &cfg.placement(), cfg.glyph_color)
        .is_none()
    {
        debug!(label = %cfg.label, "label left blank");
    }
    let png = images::save_png(&canvas, &cfg.png_path())?;
    println!("PNG icon saved to: {}", png.display());
    Ok(canvas)
}

fn package(canvas: &RgbaImage, cfg: &Config) -> eyre::Result<()> {
    let req = BundleRequest::from_config(cfg);
    let strategy = BundleStrategy { primary: cfg.primary, fallback: cfg.fallback };
    let outcome = packager::produce_bundle(canvas, &req, strategy, &mut SystemRunner)?;
    if outcome.fell_back {
        println!("{} failed, packaged with {} instead", strategy.primary, outcome.strategy);
    }
    if !outcome.staged.is_empty() {
        println!("Iconset written to {} ({} files)", req.staging_dir.display(), outcome.staged.len());
    }
    println!("ICNS icon saved to: {}", req.bundle.display());
    Ok(())
}
