pub mod config;
pub mod error;
pub mod glyph;
pub mod icon;
pub mod iconset;
pub mod images;
pub mod logger;
pub mod models;
pub mod packager;

pub use error::{IconError, Result};
pub use models::{Config, Packager, Rgb};
