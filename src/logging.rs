//! Logger initialisation.
//!
//! The crate logs through the `log` facade only. Applications that do not bring
//! their own logger can call [`init_logging`], which installs `env_logger`.

use std::sync::Once;

use serde::{Deserialize, Serialize};

/// When to emit ANSI colours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStyle {
    #[default]
    Auto,
    Always,
    Never,
}

impl From<WriteStyle> for env_logger::WriteStyle {
    fn from(style: WriteStyle) -> Self {
        match style {
            WriteStyle::Auto => env_logger::WriteStyle::Auto,
            WriteStyle::Always => env_logger::WriteStyle::Always,
            WriteStyle::Never => env_logger::WriteStyle::Never,
        }
    }
}

/// Logger configuration, the `[logging]` table of the renderer config.
///
/// `filter` follows the `env_logger` filter syntax (e.g. `"info"` or
/// `"orb_ngin=debug,wgpu=warn"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: Option<String>,
    pub write_style: WriteStyle,
}

static INIT: Once = Once::new();

/// Installs the global logger once; later calls are ignored.
///
/// The filter comes from `config`, else from `RUST_LOG`, else defaults to `info`.
/// A logger installed by someone else wins and is left alone.
pub fn init_logging(config: &LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = &config.filter {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }
        builder.write_style(config.write_style.into());

        if let Err(e) = builder.try_init() {
            println!("Warning: Could not initialize logger: {}", e);
            return;
        }
        log::debug!("logging initialized");
    });
}
