//! Test generators — mock `Generator` implementations for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::generator::{
    Generator, GeneratorError, GeneratorIdentity, GeneratorReply, GeneratorRequest,
};

fn test_identity() -> GeneratorIdentity {
    GeneratorIdentity {
        provider: "test".to_owned(),
        model: "scripted".to_owned(),
    }
}

/// A generator that replays a predetermined sequence of replies and records
/// every request it receives. Returns a provider error once the script is
/// exhausted, so a test that over-consumes fails loudly.
#[derive(Debug)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<GeneratorReply>>,
    requests: Mutex<Vec<GeneratorRequest>>,
}

impl ScriptedGenerator {
    /// Create a scripted generator that will return the replies in order.
    #[must_use]
    pub fn new(replies: Vec<GeneratorReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience constructor for a single content-only reply.
    #[must_use]
    pub fn with_content(content: &str) -> Self {
        Self::new(vec![GeneratorReply {
            content: Some(content.to_owned()),
            tool_calls: vec![],
        }])
    }

    /// Returns a snapshot of the requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<GeneratorRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn identity(&self) -> GeneratorIdentity {
        test_identity()
    }

    async fn generate(
        &self,
        request: GeneratorRequest,
    ) -> Result<GeneratorReply, GeneratorError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GeneratorError::Provider("script exhausted".to_owned()))
    }
}

/// A generator that returns the same reply on every call. Used to exercise
/// tool-loop bounds.
#[derive(Debug)]
pub struct LoopingGenerator {
    reply: GeneratorReply,
}

impl LoopingGenerator {
    /// Create a looping generator that always returns `reply`.
    #[must_use]
    pub fn new(reply: GeneratorReply) -> Self {
        Self { reply }
    }
}

#[async_trait]
impl Generator for LoopingGenerator {
    fn identity(&self) -> GeneratorIdentity {
        test_identity()
    }

    async fn generate(
        &self,
        _request: GeneratorRequest,
    ) -> Result<GeneratorReply, GeneratorError> {
        Ok(self.reply.clone())
    }
}

/// A generator that always fails with a transport error. Used to exercise
/// error-handling paths.
#[derive(Debug)]
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn identity(&self) -> GeneratorIdentity {
        test_identity()
    }

    async fn generate(
        &self,
        _request: GeneratorRequest,
    ) -> Result<GeneratorReply, GeneratorError> {
        Err(GeneratorError::Transport("connection refused".to_owned()))
    }
}
