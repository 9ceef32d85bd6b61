//! Request-path rewriting filter.
//!
//! A host proxy drives the filter through two context tiers:
//!
//! - [`FilterInstance`]: one per loaded configuration. Owns the rewrite
//!   rule, compiled exactly once at startup and shared read-only with every
//!   session.
//! - [`RequestSession`]: one per in-flight request. Applies the rule to the
//!   request's `:path` pseudo-header in a single run-to-completion pass,
//!   replacing every occurrence of the pattern and expanding `$N` capture
//!   references in the replacement.
//!
//! The filter is fail-open throughout: configuration failures keep the
//! instance unready, header-access failures are logged and absorbed, and
//! every request continues down the filter chain regardless.
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "pattern": "banana/([0-9]*)",
//!   "replacement": "status/$1"
//! }
//! ```
//!
//! With that rule a request for `/banana/42/extra/banana/7` is forwarded as
//! `/status/42/extra/status/7`, while `/orange/99` passes through unchanged.

pub mod config;
pub mod filter;
pub mod host;
pub mod rewrite;
pub mod session;
pub mod template;

pub use config::{ConfigDecoder, ConfigError, JsonDecoder, RewriteConfig, YamlDecoder};
pub use filter::{FilterInstance, FilterStats, InstanceState};
pub use host::{FilterAction, Host, HostError, LogLevel, PATH_HEADER};
pub use rewrite::RewriteRule;
pub use session::{RequestSession, SessionState};
pub use template::ReplacementTemplate;
