pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod state_machine;
pub mod traits;

pub use config::*;
pub use config_loader::{CONFIG_FILENAME, ConfigLoadOptions, ConfigLoader};
pub use error::*;
pub use events::*;
pub use state_machine::*;
pub use traits::*;
