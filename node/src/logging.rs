//! # Structured Logging
//!
//! One `tracing` subscriber per process, filtered by `RUST_LOG` when set and
//! by a per-role default otherwise. Output always goes to stderr: stdout is
//! the bank's and the ATM's console, and a log line there would land in the
//! middle of a customer transcript.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Accepts "json" in any case; everything else is `Pretty`.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Which process is logging. Picks the default filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Relay,
    Bank,
    /// Shares the terminal with a customer, so only warnings by default.
    Atm,
    Tool,
}

impl Role {
    pub fn default_directives(self) -> &'static str {
        match self {
            Role::Relay | Role::Tool => "bankwire_node=info",
            Role::Bank => "bankwire_node=info,bankwire_protocol=info",
            Role::Atm => "bankwire_node=warn,bankwire_protocol=warn",
        }
    }
}

/// Installs the global subscriber. Call once, first thing in `main()`.
///
/// `RUST_LOG` overrides the role default, e.g.
///
/// ```text
/// RUST_LOG=bankwire_protocol::channel=debug bankwire bank --key-file bankwire.key
/// ```
pub fn init_logging(role: Role, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(role.default_directives()));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .init(),
    }

    tracing::debug!(?role, ?format, "logging initialized");
}
