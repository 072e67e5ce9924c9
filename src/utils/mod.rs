pub mod logging;
pub mod validation;

pub use logging::LoggingConfig;
pub use validation::{is_private_ip, validate_url, TargetValidator};
