//! Scripted transport
//!
//! Records every call and answers from a queue of canned replies, or from a
//! responder closure when one is installed. Used to assert call order and
//! call counts without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{CommandSpec, ExecutionResult, RemoteTarget, Transport, TransportError};

type Responder = dyn Fn(&CommandSpec) -> Result<ExecutionResult, TransportError> + Send + Sync;

/// One call observed by the scripted transport
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub host: String,
    pub spec: CommandSpec,
}

#[derive(Default)]
struct State {
    replies: VecDeque<Result<ExecutionResult, TransportError>>,
    calls: Vec<RecordedCall>,
}

/// Test transport with scripted replies
///
/// When the reply queue is empty and no responder is set, calls succeed
/// with empty output.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
    responder: Option<Arc<Responder>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call through `responder` instead of the queue
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<ExecutionResult, TransportError> + Send + Sync + 'static,
    {
        Self {
            state: Arc::default(),
            responder: Some(Arc::new(responder)),
        }
    }

    /// Queue a reply for the next unanswered call
    pub fn push(&self, reply: Result<ExecutionResult, TransportError>) -> &Self {
        self.lock().replies.push_back(reply);
        self
    }

    pub fn push_ok(&self, stdout: &str) -> &Self {
        self.push(Ok(ExecutionResult::success(stdout)))
    }

    pub fn push_exit(&self, exit_code: i32, stderr: &str) -> &Self {
        self.push(Ok(ExecutionResult::failure(exit_code, stderr)))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Summaries of every call, in order
    pub fn summaries(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .map(|c| c.spec.summary.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        target: &RemoteTarget,
        spec: &CommandSpec,
    ) -> Result<ExecutionResult, TransportError> {
        let queued = {
            let mut state = self.lock();
            state.calls.push(RecordedCall {
                host: target.host.clone(),
                spec: spec.clone(),
            });
            state.replies.pop_front()
        };

        match (&self.responder, queued) {
            (Some(responder), _) => responder(spec),
            (None, Some(reply)) => reply,
            (None, None) => Ok(ExecutionResult::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> RemoteTarget {
        RemoteTarget::new("10.0.0.9", "root", "key")
    }

    #[tokio::test]
    async fn test_replies_in_order() {
        let transport = ScriptedTransport::new();
        transport.push_ok("first").push_exit(3, "second");

        let a = transport
            .execute(&target(), &CommandSpec::new("a", "a"))
            .await
            .unwrap();
        let b = transport
            .execute(&target(), &CommandSpec::new("b", "b"))
            .await
            .unwrap();
        let c = transport
            .execute(&target(), &CommandSpec::new("c", "c"))
            .await
            .unwrap();

        assert_eq!(a.stdout, "first");
        assert_eq!(b.exit_code, 3);
        assert_eq!(c, ExecutionResult::default());
        assert_eq!(transport.summaries(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_responder_sees_spec() {
        let transport = ScriptedTransport::with_responder(|spec| {
            Ok(ExecutionResult::success(spec.summary.to_uppercase()))
        });
        let result = transport
            .execute(&target(), &CommandSpec::new("x", "probe"))
            .await
            .unwrap();
        assert_eq!(result.stdout, "PROBE");
        assert_eq!(transport.calls()[0].host, "10.0.0.9");
    }

    #[tokio::test]
    async fn test_scripted_transport_error() {
        let transport = ScriptedTransport::new();
        transport.push(Err(TransportError::Connection("refused".into())));
        let result = transport
            .execute(&target(), &CommandSpec::new("x", "x"))
            .await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
        assert_eq!(transport.call_count(), 1);
    }
}
