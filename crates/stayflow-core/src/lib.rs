pub mod config;
pub mod definition;
pub mod error;
pub mod state;
pub mod traits;

pub use config::AppConfig;
pub use definition::*;
pub use error::{FlowError, Result};
pub use state::*;
