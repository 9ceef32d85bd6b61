//! Host proxy boundary.
//!
//! The filter never touches the network or the request directly. The host
//! proxy owns both and exposes the primitives below, passing a handle into
//! every lifecycle entry point on [`FilterInstance`](crate::FilterInstance)
//! and [`RequestSession`](crate::RequestSession). Anything implementing
//! [`Host`] can embed the filter: a production proxy, the CLI dry-run
//! driver, or a test harness.

use tracing::{debug, error, info, trace, warn};

/// Pseudo-header carrying the request path.
pub const PATH_HEADER: &str = ":path";

/// Severity for host-bound diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Verdict handed back to the host after a header-processing pass.
///
/// The rewrite filter is fail-open and only ever returns [`Continue`]; the
/// other variants exist because the host contract allows a filter to hold or
/// terminate iteration.
///
/// [`Continue`]: FilterAction::Continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Hand the request to the next filter in the chain.
    Continue,
    /// Hold header iteration until resumed by the host.
    Pause,
    /// Terminate filter iteration for this request.
    Stop,
}

/// Errors surfaced by host primitives.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("header {0:?} not present")]
    HeaderNotFound(String),

    #[error("plugin configuration unavailable")]
    ConfigurationUnavailable,

    #[error("host failure: {0}")]
    Internal(String),
}

/// Primitives the host proxy exposes to the filter.
///
/// Every entry point receives the host handle for the duration of the call;
/// the filter holds no reference to it between calls.
pub trait Host {
    /// Raw configuration payload for the filter instance, at most `max_size`
    /// bytes. Fetched once per [`FilterInstance::on_start`] invocation.
    ///
    /// [`FilterInstance::on_start`]: crate::FilterInstance::on_start
    fn get_plugin_configuration(&self, max_size: usize) -> Result<Vec<u8>, HostError>;

    /// Value of a request header. Pseudo-headers such as
    /// [`PATH_HEADER`] are addressed by their `:`-prefixed names.
    fn get_request_header(&self, name: &str) -> Result<String, HostError>;

    /// Replace a request header in place.
    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), HostError>;

    /// Fire-and-forget diagnostics. Never affects control flow.
    ///
    /// The default forwards to the process-wide `tracing` dispatcher; hosts
    /// with their own log sink override this.
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => trace!("{message}"),
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
    }
}
