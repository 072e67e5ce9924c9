use std::env;
use std::io;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tracing setup for the server process.
///
/// Output always goes to stderr; stdout belongs to the stdio protocol.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `OSINT_DEBUG` or `--verbose`: debug level plus source locations.
    pub verbose: bool,
    /// Raw `RUST_LOG` directive, if any.
    pub directive: Option<String>,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            verbose: lookup("OSINT_DEBUG").is_some_and(|raw| is_truthy(&raw)),
            directive: lookup("RUST_LOG").filter(|raw| !raw.trim().is_empty()),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose |= verbose;
        self
    }

    /// Directive used when `RUST_LOG` is unset or does not parse.
    pub fn default_directive(&self) -> &'static str {
        if self.verbose {
            "osintmcp=debug,info"
        } else {
            "osintmcp=info,warn"
        }
    }

    pub fn filter(&self) -> EnvFilter {
        self.directive
            .as_deref()
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new(self.default_directive()))
    }

    /// Installs the global subscriber. A second call is a no-op.
    ///
    /// ```no_run
    /// use osintmcp::utils::LoggingConfig;
    ///
    /// LoggingConfig::from_env().init();
    /// ```
    pub fn init(&self) {
        let layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(self.verbose)
            .with_file(self.verbose)
            .with_line_number(self.verbose)
            .with_thread_ids(self.verbose);

        let installed = tracing_subscriber::registry()
            .with(self.filter())
            .with(layer)
            .try_init()
            .is_ok();
        if installed && self.verbose {
            tracing::debug!("verbose logging enabled");
        }
    }
}

fn is_truthy(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "off" | "no"
    )
}
