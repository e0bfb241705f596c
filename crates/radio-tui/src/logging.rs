//! File logging with a runtime on/off switch.
//!
//! The `EnvFilter` sits behind a `reload` layer; turning logging off swaps
//! in an `off` filter instead of touching process-wide logger state.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Noisy HTTP client internals are capped regardless of the configured level.
const QUIET_DEPS: &str = "hyper_util=warn,reqwest=warn,hyper=warn";

#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    directive: String,
}

impl LogHandle {
    /// Returns `false` if the subscriber has gone away.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let filter = if enabled {
            parse_filter(&self.directive)
        } else {
            EnvFilter::new("off")
        };
        self.handle.reload(filter).is_ok()
    }
}

fn parse_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Build the subscriber without installing it.
///
/// `RUST_LOG` overrides `level` when set.
pub fn build(
    path: &Path,
    level: &str,
    enabled: bool,
) -> anyhow::Result<(impl Subscriber + Send + Sync + 'static, LogHandle)> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let directive = std::env::var("RUST_LOG").unwrap_or_else(|_| format!("{},{}", level, QUIET_DEPS));
    let initial = if enabled {
        parse_filter(&directive)
    } else {
        EnvFilter::new("off")
    };
    let (filter, handle) = reload::Layer::new(initial);

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false),
    );
    Ok((subscriber, LogHandle { handle, directive }))
}

/// Install the file subscriber globally.
pub fn init(path: &Path, level: &str, enabled: bool) -> anyhow::Result<LogHandle> {
    let (subscriber, handle) = build(path, level, enabled)?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(handle)
}
