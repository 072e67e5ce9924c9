mod env;
mod settings;

pub use env::EnvConfig;
pub use settings::{Settings, DEFAULT_USER_AGENT};
