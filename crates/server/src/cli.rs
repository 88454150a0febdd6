//! Command-line options for the server binaries.

use clap::Parser;
use std::path::PathBuf;

use mirage_core::AppConfig;

/// Headless-browser page rendering cache.
#[derive(Debug, Parser)]
#[command(name = "mirage-server")]
#[command(about = "Renders pages in headless Chromium and serves them from a cache")]
#[command(version)]
pub struct Cli {
    /// Configuration file path, overrides MIRAGE_CONFIG_FILE
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listener address, overrides app.addr
    #[arg(long)]
    pub addr: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log CDP traffic from the browser; implies --debug
    #[arg(long)]
    pub chromium_debug: bool,
}

impl Cli {
    /// Fold the flag overrides into a loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(addr) = &self.addr {
            config.app.addr = addr.clone();
        }
        if self.chromium_debug {
            config.renderer.chromium_debug = true;
        }
    }

    /// Default `RUST_LOG` filter implied by the flags.
    pub fn default_log_filter(&self, config: &AppConfig) -> &'static str {
        if self.chromium_debug || config.renderer.chromium_debug {
            "debug,chromiumoxide=debug"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
