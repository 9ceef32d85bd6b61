//! Per-request session: the single header-rewrite pass.

use std::sync::Arc;

use crate::filter::FilterInstance;
use crate::host::{FilterAction, Host, LogLevel, PATH_HEADER};

/// Lifecycle states of a [`RequestSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Bound to an instance; header pass not yet run.
    Created,
    /// Header pass ran, whether or not the path changed.
    Processed,
    /// Host signalled stream completion.
    Completed,
}

/// Per-request context bound to one [`FilterInstance`].
///
/// A session is a transient unit of work scoped to a single request's
/// header-processing pass. It never outlives its request and never mutates
/// its parent beyond counter bumps.
pub struct RequestSession {
    id: u32,
    parent: Arc<FilterInstance>,
    state: SessionState,
}

impl RequestSession {
    /// Bind a new session to `parent` for one in-flight request.
    pub fn new(parent: Arc<FilterInstance>, id: u32) -> Self {
        Self {
            id,
            parent,
            state: SessionState::Created,
        }
    }

    /// Host-assigned identity, for log correlation only.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Apply the parent's rewrite rule to this request's `:path` header.
    ///
    /// Fail-open: every failure is logged and absorbed, and the verdict is
    /// always [`FilterAction::Continue`]. A misconfigured or degraded
    /// rewrite filter must never block traffic.
    pub fn on_request_headers<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        header_count: u32,
        end_of_stream: bool,
    ) -> FilterAction {
        if self.state != SessionState::Created {
            host.log(
                LogLevel::Warn,
                &format!("session {}: repeated header pass ignored", self.id),
            );
            return FilterAction::Continue;
        }
        self.state = SessionState::Processed;
        self.parent.record_session();

        host.log(
            LogLevel::Debug,
            &format!(
                "session {}: headers received (count={header_count}, end_of_stream={end_of_stream})",
                self.id
            ),
        );

        let Some(rule) = self.parent.active_rule() else {
            host.log(
                LogLevel::Warn,
                &format!(
                    "session {}: instance {} has no compiled rule, passing through",
                    self.id,
                    self.parent.id()
                ),
            );
            return FilterAction::Continue;
        };

        let path = match host.get_request_header(PATH_HEADER) {
            Ok(value) => value,
            Err(e) => {
                self.parent.record_header_error();
                host.log(
                    LogLevel::Warn,
                    &format!("session {}: {PATH_HEADER} fetch failed: {e}", self.id),
                );
                return FilterAction::Continue;
            }
        };

        // The write-back is unconditional: a no-match writes the identical
        // value back.
        let rewritten = rule.apply(&path);
        let changed = rewritten != path;

        match host.set_request_header(PATH_HEADER, &rewritten) {
            Ok(()) => {
                if changed {
                    self.parent.record_rewrite();
                    host.log(
                        LogLevel::Info,
                        &format!("session {}: rewrote {path:?} to {rewritten:?}", self.id),
                    );
                } else {
                    host.log(
                        LogLevel::Debug,
                        &format!("session {}: no occurrence in {path:?}", self.id),
                    );
                }
            }
            Err(e) => {
                self.parent.record_header_error();
                host.log(
                    LogLevel::Warn,
                    &format!(
                        "session {}: {PATH_HEADER} write failed ({e}), continuing unmodified",
                        self.id
                    ),
                );
            }
        }

        FilterAction::Continue
    }

    /// Host notification that the request stream finished. Observability
    /// only; the session is discarded afterwards.
    pub fn on_stream_complete<H: Host + ?Sized>(&mut self, host: &H) {
        self.state = SessionState::Completed;
        host.log(
            LogLevel::Debug,
            &format!("session {}: stream complete", self.id),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostError;
    use std::collections::HashMap;

    struct MockHost {
        config: Vec<u8>,
        headers: HashMap<String, String>,
        writes: usize,
    }

    impl MockHost {
        fn with_path(path: &str) -> Self {
            let mut headers = HashMap::new();
            headers.insert(PATH_HEADER.to_string(), path.to_string());
            Self {
                config: br#"{"pattern": "banana/([0-9]*)", "replacement": "status/$1"}"#.to_vec(),
                headers,
                writes: 0,
            }
        }

        fn path(&self) -> &str {
            &self.headers[PATH_HEADER]
        }
    }

    impl Host for MockHost {
        fn get_plugin_configuration(&self, _max_size: usize) -> Result<Vec<u8>, HostError> {
            Ok(self.config.clone())
        }

        fn get_request_header(&self, name: &str) -> Result<String, HostError> {
            self.headers
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::HeaderNotFound(name.to_string()))
        }

        fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), HostError> {
            self.writes += 1;
            self.headers.insert(name.to_string(), value.to_string());
            Ok(())
        }

        fn log(&self, _level: LogLevel, _message: &str) {}
    }

    fn ready_instance(host: &MockHost) -> Arc<FilterInstance> {
        let instance = Arc::new(FilterInstance::new(1));
        assert!(instance.on_start(host, host.config.len()));
        instance
    }

    #[test]
    fn test_header_pass_rewrites_path() {
        let mut host = MockHost::with_path("/banana/42");
        let instance = ready_instance(&host);
        let mut session = RequestSession::new(instance, 7);

        assert_eq!(session.state(), SessionState::Created);
        let action = session.on_request_headers(&mut host, 1, true);

        assert_eq!(action, FilterAction::Continue);
        assert_eq!(session.state(), SessionState::Processed);
        assert_eq!(host.path(), "/status/42");
        assert_eq!(host.writes, 1);
    }

    #[test]
    fn test_unready_instance_passes_through() {
        let mut host = MockHost::with_path("/banana/42");
        let instance = Arc::new(FilterInstance::new(1));
        let mut session = RequestSession::new(instance, 7);

        let action = session.on_request_headers(&mut host, 1, true);

        assert_eq!(action, FilterAction::Continue);
        assert_eq!(host.path(), "/banana/42");
        assert_eq!(host.writes, 0);
    }

    #[test]
    fn test_repeated_header_pass_is_ignored() {
        let mut host = MockHost::with_path("/banana/42");
        let instance = ready_instance(&host);
        let mut session = RequestSession::new(instance, 7);

        session.on_request_headers(&mut host, 1, true);
        let action = session.on_request_headers(&mut host, 1, true);

        assert_eq!(action, FilterAction::Continue);
        assert_eq!(host.writes, 1);
    }

    #[test]
    fn test_missing_path_header_is_absorbed() {
        let mut host = MockHost::with_path("/banana/42");
        host.headers.clear();
        let instance = ready_instance(&host);
        let mut session = RequestSession::new(Arc::clone(&instance), 7);

        let action = session.on_request_headers(&mut host, 0, true);

        assert_eq!(action, FilterAction::Continue);
        assert_eq!(host.writes, 0);
        assert_eq!(instance.stats().header_errors, 1);
    }

    #[test]
    fn test_stream_complete_finishes_session() {
        let mut host = MockHost::with_path("/banana/42");
        let instance = ready_instance(&host);
        let mut session = RequestSession::new(instance, 7);

        session.on_request_headers(&mut host, 1, true);
        session.on_stream_complete(&host);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_sessions_share_one_compiled_rule() {
        let mut host = MockHost::with_path("/banana/1");
        let instance = ready_instance(&host);

        for id in 0..3 {
            host.headers
                .insert(PATH_HEADER.to_string(), format!("/banana/{id}"));
            let mut session = RequestSession::new(Arc::clone(&instance), id);
            session.on_request_headers(&mut host, 1, true);
            assert_eq!(host.path(), &format!("/status/{id}"));
        }
        assert_eq!(instance.stats().sessions_total, 3);
        assert_eq!(instance.stats().paths_rewritten, 3);
    }
}
