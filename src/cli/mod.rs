mod args;

pub use args::{CliArgs, PixelFormatArg};
