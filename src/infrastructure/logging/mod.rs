//! Structured logging setup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::infrastructure::config::LoggingConfigSection;

pub fn init(config: &LoggingConfigSection) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = fmt().with_env_filter(filter);
    if config.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
