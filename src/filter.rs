//! Filter instance: configuration ownership and lifecycle.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::config::{ConfigDecoder, JsonDecoder};
use crate::host::{Host, LogLevel};
use crate::rewrite::RewriteRule;

/// Lifecycle states of a [`FilterInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InstanceState {
    /// Created but not configured; sessions pass requests through untouched.
    Uninitialized = 0,
    /// Rule compiled and published; sessions rewrite.
    Ready = 1,
    /// Torn down by the host; terminal.
    ShutDown = 2,
}

impl InstanceState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Ready,
            2 => Self::ShutDown,
            _ => Self::Uninitialized,
        }
    }
}

/// Point-in-time counter snapshot for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterStats {
    /// Sessions that ran their header pass.
    pub sessions_total: u64,
    /// Header passes whose write-back changed the path.
    pub paths_rewritten: u64,
    /// Header fetch or write failures absorbed.
    pub header_errors: u64,
}

/// Root context of the filter, one per loaded configuration.
///
/// Owns the compiled rewrite rule and serves it read-only to every
/// [`RequestSession`] bound to it. All state is interior-mutable and
/// atomically published, so one instance can be shared across host worker
/// threads behind a plain `Arc`.
///
/// [`RequestSession`]: crate::session::RequestSession
pub struct FilterInstance {
    /// Host-assigned identity, for log correlation only.
    id: u32,
    /// Lifecycle state, stored as an [`InstanceState`] discriminant.
    state: AtomicU8,
    /// The published rule. `None` while unready or after shutdown.
    rule: ArcSwapOption<RewriteRule>,
    /// Decoder for the host's configuration payload.
    decoder: Box<dyn ConfigDecoder>,
    /// Metrics: sessions that ran their header pass.
    sessions_total: AtomicU64,
    /// Metrics: write-backs that changed the path.
    paths_rewritten: AtomicU64,
    /// Metrics: header fetch/write failures absorbed.
    header_errors: AtomicU64,
}

impl FilterInstance {
    /// Create an unconfigured instance with the default JSON decoder.
    pub fn new(id: u32) -> Self {
        Self::with_decoder(id, Box::new(JsonDecoder))
    }

    /// Create an unconfigured instance with a custom payload decoder.
    pub fn with_decoder(id: u32, decoder: Box<dyn ConfigDecoder>) -> Self {
        Self {
            id,
            state: AtomicU8::new(InstanceState::Uninitialized as u8),
            rule: ArcSwapOption::empty(),
            decoder,
            sessions_total: AtomicU64::new(0),
            paths_rewritten: AtomicU64::new(0),
            header_errors: AtomicU64::new(0),
        }
    }

    /// Host-assigned identity.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> InstanceState {
        InstanceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once a rule is published and the instance has not been torn down.
    pub fn is_ready(&self) -> bool {
        self.state() == InstanceState::Ready
    }

    /// Counter snapshot, for host-side reporting.
    pub fn stats(&self) -> FilterStats {
        FilterStats {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            paths_rewritten: self.paths_rewritten.load(Ordering::Relaxed),
            header_errors: self.header_errors.load(Ordering::Relaxed),
        }
    }

    /// Configure the instance: fetch the raw payload from the host, decode
    /// it, compile the rule, and publish it atomically.
    ///
    /// Returns `true` when the instance reached (or re-reached) the ready
    /// state. On any failure the instance keeps whatever rule it had before:
    /// a fresh instance stays unready and its sessions pass requests through
    /// untouched, while a re-configured instance keeps serving the previous
    /// rule. On success the previous rule (if any) is swapped out atomically;
    /// sessions that already loaded it finish with it.
    pub fn on_start<H: Host + ?Sized>(&self, host: &H, config_size: usize) -> bool {
        if self.state() == InstanceState::ShutDown {
            host.log(
                LogLevel::Warn,
                &format!("instance {}: on_start after shutdown ignored", self.id),
            );
            return false;
        }

        let payload = match host.get_plugin_configuration(config_size) {
            Ok(bytes) => bytes,
            Err(e) => {
                host.log(
                    LogLevel::Error,
                    &format!("instance {}: configuration fetch failed: {e}", self.id),
                );
                return false;
            }
        };

        let config = match self.decoder.decode(&payload) {
            Ok(config) => config,
            Err(e) => {
                host.log(
                    LogLevel::Error,
                    &format!("instance {}: configuration rejected: {e}", self.id),
                );
                return false;
            }
        };

        let rule = match RewriteRule::compile(&config) {
            Ok(rule) => rule,
            Err(e) => {
                host.log(
                    LogLevel::Error,
                    &format!(
                        "instance {}: pattern {:?} failed to compile: {e}",
                        self.id, config.pattern
                    ),
                );
                return false;
            }
        };

        self.rule.store(Some(Arc::new(rule)));
        self.state
            .store(InstanceState::Ready as u8, Ordering::Release);
        host.log(
            LogLevel::Info,
            &format!(
                "instance {}: ready, rewriting {:?} to {:?}",
                self.id, config.pattern, config.replacement
            ),
        );
        true
    }

    /// Host notification that the instance is being unloaded. Releases the
    /// published rule; in-flight sessions keep the `Arc` they already loaded
    /// and complete normally.
    pub fn on_shutdown<H: Host + ?Sized>(&self, host: &H) {
        self.rule.store(None);
        self.state
            .store(InstanceState::ShutDown as u8, Ordering::Release);
        let stats = self.stats();
        host.log(
            LogLevel::Info,
            &format!(
                "instance {}: shut down after {} sessions ({} rewritten, {} header errors)",
                self.id, stats.sessions_total, stats.paths_rewritten, stats.header_errors
            ),
        );
    }

    /// The currently published rule, if any. The returned `Arc` stays valid
    /// for the caller even if the rule is swapped or dropped concurrently.
    pub(crate) fn active_rule(&self) -> Option<Arc<RewriteRule>> {
        self.rule.load_full()
    }

    pub(crate) fn record_session(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rewrite(&self) {
        self.paths_rewritten.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_header_error(&self) {
        self.header_errors.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostError;

    struct MockHost {
        config: Vec<u8>,
        fail_fetch: bool,
    }

    impl MockHost {
        fn with_config(config: &[u8]) -> Self {
            Self {
                config: config.to_vec(),
                fail_fetch: false,
            }
        }
    }

    impl Host for MockHost {
        fn get_plugin_configuration(&self, max_size: usize) -> Result<Vec<u8>, HostError> {
            if self.fail_fetch {
                return Err(HostError::ConfigurationUnavailable);
            }
            if self.config.len() > max_size {
                return Err(HostError::Internal("payload too large".to_string()));
            }
            Ok(self.config.clone())
        }

        fn get_request_header(&self, name: &str) -> Result<String, HostError> {
            Err(HostError::HeaderNotFound(name.to_string()))
        }

        fn set_request_header(&mut self, _name: &str, _value: &str) -> Result<(), HostError> {
            Ok(())
        }

        fn log(&self, _level: LogLevel, _message: &str) {}
    }

    const CONFIG: &[u8] = br#"{"pattern": "banana/([0-9]*)", "replacement": "status/$1"}"#;

    #[test]
    fn test_new_instance_is_uninitialized() {
        let instance = FilterInstance::new(1);
        assert_eq!(instance.state(), InstanceState::Uninitialized);
        assert!(!instance.is_ready());
        assert!(instance.active_rule().is_none());
    }

    #[test]
    fn test_on_start_publishes_rule() {
        let host = MockHost::with_config(CONFIG);
        let instance = FilterInstance::new(1);
        assert!(instance.on_start(&host, CONFIG.len()));
        assert_eq!(instance.state(), InstanceState::Ready);
        let rule = instance.active_rule().unwrap();
        assert_eq!(rule.apply("/banana/42"), "/status/42");
    }

    #[test]
    fn test_invalid_pattern_keeps_instance_unready() {
        let host = MockHost::with_config(br#"{"pattern": "([", "replacement": "x"}"#);
        let instance = FilterInstance::new(1);
        assert!(!instance.on_start(&host, 64));
        assert_eq!(instance.state(), InstanceState::Uninitialized);
        assert!(instance.active_rule().is_none());
    }

    #[test]
    fn test_fetch_failure_keeps_instance_unready() {
        let mut host = MockHost::with_config(CONFIG);
        host.fail_fetch = true;
        let instance = FilterInstance::new(1);
        assert!(!instance.on_start(&host, CONFIG.len()));
        assert!(!instance.is_ready());
    }

    #[test]
    fn test_reconfigure_swaps_rule_atomically() {
        let instance = FilterInstance::new(1);
        assert!(instance.on_start(&MockHost::with_config(CONFIG), CONFIG.len()));
        let old = instance.active_rule().unwrap();

        let updated = br#"{"pattern": "banana/([0-9]*)", "replacement": "fruit/$1"}"#;
        assert!(instance.on_start(&MockHost::with_config(updated), updated.len()));

        // The old Arc stays usable for holders; new loads see the new rule.
        assert_eq!(old.apply("/banana/42"), "/status/42");
        let new = instance.active_rule().unwrap();
        assert_eq!(new.apply("/banana/42"), "/fruit/42");
    }

    #[test]
    fn test_failed_reconfigure_keeps_previous_rule() {
        let instance = FilterInstance::new(1);
        assert!(instance.on_start(&MockHost::with_config(CONFIG), CONFIG.len()));

        let broken = br#"{"pattern": "([", "replacement": "x"}"#;
        assert!(!instance.on_start(&MockHost::with_config(broken), broken.len()));

        assert!(instance.is_ready());
        let rule = instance.active_rule().unwrap();
        assert_eq!(rule.apply("/banana/42"), "/status/42");
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let host = MockHost::with_config(CONFIG);
        let instance = FilterInstance::new(1);
        assert!(instance.on_start(&host, CONFIG.len()));

        instance.on_shutdown(&host);
        assert_eq!(instance.state(), InstanceState::ShutDown);
        assert!(instance.active_rule().is_none());

        assert!(!instance.on_start(&host, CONFIG.len()));
        assert_eq!(instance.state(), InstanceState::ShutDown);
    }

    #[test]
    fn test_oversized_payload_is_a_fetch_failure() {
        let host = MockHost::with_config(CONFIG);
        let instance = FilterInstance::new(1);
        assert!(!instance.on_start(&host, CONFIG.len() - 1));
        assert!(!instance.is_ready());
    }
}
