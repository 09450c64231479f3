//! Centralised tracing initialisation for formguard binaries.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber with an `EnvFilter` and optional JSON formatting. The filter is
//! installed behind a reload layer so the settings' debug flag can raise or
//! lower verbosity while the process runs.
//!
//! Calling it more than once is harmless: only the first call installs a
//! global subscriber.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::config::Settings;

/// Directive used while the debug flag is on.
pub const DEBUG_DIRECTIVE: &str = "debug";

/// Handle for adjusting the installed filter at runtime.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    base_directives: String,
}

impl std::fmt::Debug for LogControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogControl")
            .field("base_directives", &self.base_directives)
            .finish()
    }
}

impl LogControl {
    /// Filter directives in effect when debug mode is off.
    pub fn base_directives(&self) -> &str {
        &self.base_directives
    }

    /// Directives currently in effect, if the filter is still alive.
    pub fn current_directives(&self) -> Option<String> {
        self.handle.with_current(|filter| filter.to_string()).ok()
    }

    /// Switch between the debug directive and the base directives.
    pub fn set_debug(&self, enabled: bool) {
        let directives = if enabled {
            DEBUG_DIRECTIVE
        } else {
            self.base_directives.as_str()
        };
        match self.handle.reload(EnvFilter::new(directives)) {
            Ok(()) => debug!(debug_mode = enabled, "log filter updated"),
            Err(err) => warn!(error = %err, "failed to update log filter"),
        }
    }

    /// Apply the debug flag of `settings`.
    pub fn apply(&self, settings: &Settings) {
        self.set_debug(settings.debug_mode);
    }
}

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) -> LogControl {
    let (filter, control) = reloadable_filter(level);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }

    control
}

/// Filter layer honouring `RUST_LOG`, plus the control that reloads it.
///
/// The control stops working once the layer is dropped.
fn reloadable_filter(level: Level) -> (reload::Layer<EnvFilter, Registry>, LogControl) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let base_directives = env_filter.to_string();
    let (layer, handle) = reload::Layer::new(env_filter);
    (
        layer,
        LogControl {
            handle,
            base_directives,
        },
    )
}

/// Keep the log filter in step with the debug flag of published settings.
///
/// The current value is applied immediately. The task ends when the sender
/// side of the channel is dropped.
pub fn follow_debug_flag(control: LogControl, mut settings: watch::Receiver<Settings>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut debug_mode = settings.borrow_and_update().debug_mode;
        control.set_debug(debug_mode);

        while settings.changed().await.is_ok() {
            let next = settings.borrow_and_update().debug_mode;
            if next != debug_mode {
                debug_mode = next;
                control.set_debug(debug_mode);
            }
        }
    })
}
