use clap::{Parser, ValueEnum};

use crate::frame::PixelFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PixelFormatArg {
    Mono8,
    Mono16,
    Rgb8,
    Bgr8,
}

impl From<PixelFormatArg> for PixelFormat {
    fn from(arg: PixelFormatArg) -> Self {
        match arg {
            PixelFormatArg::Mono8 => PixelFormat::Mono8,
            PixelFormatArg::Mono16 => PixelFormat::Mono16,
            PixelFormatArg::Rgb8 => PixelFormat::Rgb8,
            PixelFormatArg::Bgr8 => PixelFormat::Bgr8,
        }
    }
}

/// Values left unset keep whatever the config file (or the defaults) say.
#[derive(Parser, Debug)]
#[command(author, version, about = "Streams a camera into a latest-frame buffer and renders it", long_about = None)]
pub struct CliArgs {
    /// Index of the camera to open
    #[arg(long)]
    pub camera: Option<usize>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long)]
    pub offset_x: Option<u32>,

    #[arg(long)]
    pub offset_y: Option<u32>,

    /// Exposure time in microseconds
    #[arg(long)]
    pub exposure: Option<f32>,

    /// Camera acquisition frame rate
    #[arg(long)]
    pub fps: Option<f32>,

    #[arg(long)]
    pub gain_auto: bool,

    /// Render ticks per second
    #[arg(long)]
    pub display_fps: Option<f32>,

    /// Seconds to run, 0 for until the camera is lost
    #[arg(long)]
    pub duration: Option<f32>,

    /// Save the last rendered frame to this path (format from extension)
    #[arg(long)]
    pub snapshot: Option<String>,

    /// Pixel format produced by the simulated camera
    #[arg(long, value_enum)]
    pub pixel_format: Option<PixelFormatArg>,

    /// Report every n-th simulated frame as incomplete
    #[arg(long)]
    pub incomplete_every: Option<u32>,

    /// Number of simulated cameras to enumerate
    #[arg(long)]
    pub cameras: Option<usize>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Repeat for more verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long)]
    pub log_file: Option<String>,

    #[arg(long)]
    pub config: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "spinnaker-view",
            "--width",
            "320",
            "--pixel-format",
            "rgb8",
            "-vv",
            "--gain-auto",
        ]);
        assert_eq!(args.width, Some(320));
        assert_eq!(args.height, None);
        assert_eq!(args.pixel_format, Some(PixelFormatArg::Rgb8));
        assert_eq!(args.verbose, 2);
        assert!(args.gain_auto);
        assert!(!args.print_config);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
