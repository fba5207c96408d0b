//! Kindle Viewer
//!
//! Opens a window, brings up a Vulkan device on it and keeps a swapchain in
//! sync with the window size.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p kindle-viewer -- [OPTIONS]
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::Viewer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

/// Viewer options from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub width: u32,
    pub height: u32,
    pub validation: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            validation: cfg!(debug_assertions),
        }
    }
}

impl ViewerConfig {
    /// Parse from the process arguments.
    pub fn from_args() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--validation" => config.validation = true,
                "--no-validation" => config.validation = false,
                "--width" => {
                    if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                        config.width = v;
                    }
                }
                "--height" => {
                    if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                        config.height = v;
                    }
                }
                _ => {}
            }
        }

        config
    }
}

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ViewerConfig::from_args();
    info!("Kindle viewer starting ({config:?})");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut viewer = Viewer::new(config);
    if let Err(e) = event_loop.run_app(&mut viewer) {
        error!("Event loop error: {e}");
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        "Kindle Viewer

USAGE:
    cargo run -p kindle-viewer -- [OPTIONS]

OPTIONS:
    --validation            Enable Vulkan validation layers
    --no-validation         Disable Vulkan validation layers
                            Default: enabled in debug builds
    --width <N>             Initial window width (default: {WIDTH})
    --height <N>            Initial window height (default: {HEIGHT})
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ViewerConfig {
        ViewerConfig::parse(args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn defaults_without_arguments() {
        assert_eq!(parse(&[]), ViewerConfig::default());
    }

    #[test]
    fn size_and_validation_flags() {
        let config = parse(&["--width", "800", "--no-validation", "--height", "600"]);
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 600);
        assert!(!config.validation);

        assert!(parse(&["--no-validation", "--validation"]).validation);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let config = parse(&["--width", "wide", "--height"]);
        assert_eq!(config.width, WIDTH);
        assert_eq!(config.height, HEIGHT);
    }
}
