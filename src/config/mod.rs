mod loader;

pub use loader::{Config, DisplayConfig};
