//! The per-turn generation pipeline.
//!
//! One turn is an explicit state machine: render the context, invoke the
//! generator, run the bounded tool loop, then commit exactly one message
//! event carrying the content and every accumulated diff. A turn that
//! fails commits nothing; events from earlier turns stand.

use chronicle_core::actor::Actor;
use chronicle_core::diff::StateDiff;
use chronicle_core::event::EventKind;
use chronicle_core::generator::{
    ChatMessage, ChatRole, Generator, GeneratorIdentity, GeneratorRequest, ToolCallRequest,
};
use chronicle_core::rng::DeterministicRng;
use chronicle_engine::EventLog;
use chronicle_tools::{ToolContext, ToolExecutor};
use serde_json::json;
use uuid::Uuid;

use crate::error::TurnError;
use crate::render::ContextRenderer;

/// Default bound on generator tool-call rounds within one turn.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 8;

/// The phases of one turn.
#[derive(Debug)]
enum Phase {
    Invoke(GeneratorRequest),
    Commit {
        content: Option<String>,
    },
}

/// The committed result of one completed turn.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Id of the committed message event.
    pub event_id: Uuid,
    /// Content produced by the generator, if any.
    pub content: Option<String>,
    /// Diffs committed with the event, in application order.
    pub diffs: Vec<StateDiff>,
    /// Identity of the generator that produced this turn.
    pub used_generator: GeneratorIdentity,
    /// Names of the tools invoked during the turn, in call order.
    pub tool_calls: Vec<String>,
}

/// Drives one actor turn from rendered context to committed event.
#[derive(Debug)]
pub struct TurnPipeline {
    renderer: ContextRenderer,
    max_tool_iterations: usize,
}

impl TurnPipeline {
    /// Creates a pipeline with the default tool-loop bound.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Template`] if the built-in templates fail to
    /// parse.
    pub fn new() -> Result<Self, TurnError> {
        Ok(Self {
            renderer: ContextRenderer::new()?,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        })
    }

    /// Sets the tool-loop bound.
    #[must_use]
    pub fn with_max_tool_iterations(mut self, limit: usize) -> Self {
        self.max_tool_iterations = limit;
        self
    }

    /// The renderer, for template overrides.
    pub fn renderer_mut(&mut self) -> &mut ContextRenderer {
        &mut self.renderer
    }

    /// Runs one complete turn for `actor` and commits its message event.
    ///
    /// Tool handlers read the pre-turn snapshot; their proposed diffs
    /// accumulate and apply only at commit, atomically with the message.
    ///
    /// # Errors
    ///
    /// [`TurnError::Generator`] if the backend fails,
    /// [`TurnError::ToolLoopExceeded`] if the generator requests tools past
    /// the bound, [`TurnError::Engine`] if the commit is rejected. In every
    /// error case zero events are committed for this turn.
    pub async fn run_turn(
        &self,
        generator: &dyn Generator,
        executor: &ToolExecutor,
        log: &mut EventLog,
        actor: &Actor,
        history: &[ChatMessage],
        rng: &mut dyn DeterministicRng,
    ) -> Result<TurnOutcome, TurnError> {
        // Render phase. Pure: no log mutation until commit.
        let specs = executor.registry().specs();
        let request = self.renderer.render(actor, log.current_state(), history, &specs)?;
        let pre_turn_state = log.current_state().tree.clone();

        let mut diffs: Vec<StateDiff> = Vec::new();
        let mut tool_calls: Vec<String> = Vec::new();
        let mut iterations = 0usize;
        let mut phase = Phase::Invoke(request);

        let (content, tool_call_names) = loop {
            match phase {
                Phase::Invoke(mut request) => {
                    let reply = generator.generate(request.clone()).await?;

                    if reply.tool_calls.is_empty() {
                        phase = Phase::Commit {
                            content: reply.content,
                        };
                        continue;
                    }

                    if iterations >= self.max_tool_iterations {
                        tracing::warn!(
                            actor_id = %actor.id,
                            limit = self.max_tool_iterations,
                            "tool loop exceeded, turn aborted"
                        );
                        return Err(TurnError::ToolLoopExceeded {
                            limit: self.max_tool_iterations,
                        });
                    }
                    iterations += 1;

                    request
                        .messages
                        .push(assistant_echo(reply.content.as_deref(), &reply.tool_calls));
                    for call in &reply.tool_calls {
                        let mut ctx = ToolContext {
                            state: &pre_turn_state,
                            actor_id: &actor.id,
                            rng,
                        };
                        let result = executor.execute(call, &mut ctx).await;
                        if let Ok(output) = &result.outcome {
                            diffs.extend(output.diffs.iter().cloned());
                        }
                        tool_calls.push(call.name.clone());
                        request.messages.push(result.to_chat_message());
                    }
                    phase = Phase::Invoke(request);
                }
                Phase::Commit { content } => break (content, tool_calls),
            }
        };

        let identity = generator.identity();
        let event = log.append(
            EventKind::Message,
            Some(&actor.id),
            json!({
                "sender_id": actor.id,
                "content": content,
                "generator": identity.to_string(),
                "tool_calls": tool_call_names,
            }),
            diffs,
        )?;

        tracing::info!(
            actor_id = %actor.id,
            event_id = %event.id,
            generator = %identity,
            tool_calls = tool_call_names.len(),
            "turn committed"
        );

        Ok(TurnOutcome {
            event_id: event.id,
            content,
            diffs: event.diffs.clone(),
            used_generator: identity,
            tool_calls: tool_call_names,
        })
    }
}

/// Echoes the generator's tool-call round back into the conversation so the
/// next invocation sees what it asked for.
fn assistant_echo(content: Option<&str>, calls: &[ToolCallRequest]) -> ChatMessage {
    let body = json!({
        "content": content,
        "tool_calls": calls,
    });
    ChatMessage::new(ChatRole::Assistant, body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chronicle_core::actor::{ActorControl, ActorRole};
    use chronicle_core::generator::GeneratorReply;
    use chronicle_test_support::{
        FailingGenerator, FixedClock, LoopingGenerator, ScriptedGenerator, SequenceRng,
    };
    use chronicle_tools::builtin::builtin_registry;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};

    fn gm() -> Actor {
        Actor {
            id: "gm".to_owned(),
            name: "The Keeper".to_owned(),
            role: ActorRole::Gm,
            control: ActorControl::Generated,
            description: None,
            persona: None,
        }
    }

    fn new_log(initial: Value) -> EventLog {
        let clock = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap(),
        ));
        EventLog::new(Uuid::new_v4(), initial, clock)
    }

    fn executor() -> ToolExecutor {
        ToolExecutor::new(builtin_registry())
    }

    fn tool_call(name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: Some("call_1".to_owned()),
            name: name.to_owned(),
            args,
        }
    }

    #[tokio::test]
    async fn test_content_only_turn_commits_one_message_event() {
        let pipeline = TurnPipeline::new().unwrap();
        let generator = ScriptedGenerator::with_content("The door creaks open.");
        let mut log = new_log(json!({}));
        let mut rng = SequenceRng::new(vec![]);

        let outcome = pipeline
            .run_turn(&generator, &executor(), &mut log, &gm(), &[], &mut rng)
            .await
            .unwrap();

        assert_eq!(outcome.content.as_deref(), Some("The door creaks open."));
        assert_eq!(outcome.used_generator.to_string(), "test/scripted");
        assert_eq!(log.history().len(), 1);
        assert_eq!(log.current_state().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_accumulates_diffs_into_single_commit() {
        let pipeline = TurnPipeline::new().unwrap();
        let generator = ScriptedGenerator::new(vec![
            GeneratorReply {
                content: None,
                tool_calls: vec![tool_call(
                    "update_state",
                    json!({ "path": "hp", "op": "subtract", "value": 5 }),
                )],
            },
            GeneratorReply {
                content: Some("You take the hit.".to_owned()),
                tool_calls: vec![],
            },
        ]);
        let mut log = new_log(json!({ "hp": 20 }));
        let mut rng = SequenceRng::new(vec![]);

        let outcome = pipeline
            .run_turn(&generator, &executor(), &mut log, &gm(), &[], &mut rng)
            .await
            .unwrap();

        // One atomic event: message plus the tool's diff.
        assert_eq!(log.history().len(), 1);
        assert_eq!(log.current_state().tree, json!({ "hp": 15 }));
        assert_eq!(outcome.diffs[0].previous_value, Some(json!(20)));
        assert_eq!(outcome.tool_calls, vec!["update_state"]);
    }

    #[tokio::test]
    async fn test_tool_result_is_fed_back_to_generator() {
        let pipeline = TurnPipeline::new().unwrap();
        let generator = ScriptedGenerator::new(vec![
            GeneratorReply {
                content: None,
                tool_calls: vec![tool_call("roll_dice", json!({ "sides": 20 }))],
            },
            GeneratorReply {
                content: Some("A 17!".to_owned()),
                tool_calls: vec![],
            },
        ]);
        let mut log = new_log(json!({}));
        let mut rng = SequenceRng::new(vec![17]);

        pipeline
            .run_turn(&generator, &executor(), &mut log, &gm(), &[], &mut rng)
            .await
            .unwrap();

        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        let last = &requests[1].messages;
        // Assistant echo plus the tool-result message were appended.
        assert!(last.len() >= 2);
        assert!(last.last().unwrap().content.contains("\"final\":17"));
    }

    #[tokio::test]
    async fn test_unbounded_tool_loop_commits_nothing() {
        let pipeline = TurnPipeline::new().unwrap().with_max_tool_iterations(3);
        let generator = LoopingGenerator::new(GeneratorReply {
            content: None,
            tool_calls: vec![tool_call(
                "update_state",
                json!({ "path": "hp", "op": "subtract", "value": 1 }),
            )],
        });
        let mut log = new_log(json!({ "hp": 20 }));
        let mut rng = SequenceRng::new(vec![]);

        let result = pipeline
            .run_turn(&generator, &executor(), &mut log, &gm(), &[], &mut rng)
            .await;

        assert!(matches!(result.unwrap_err(), TurnError::ToolLoopExceeded { limit: 3 }));
        assert!(log.history().is_empty());
        assert_eq!(log.current_state().tree, json!({ "hp": 20 }));
    }

    #[tokio::test]
    async fn test_generator_failure_commits_nothing() {
        let pipeline = TurnPipeline::new().unwrap();
        let mut log = new_log(json!({}));
        let mut rng = SequenceRng::new(vec![]);

        let result = pipeline
            .run_turn(&FailingGenerator, &executor(), &mut log, &gm(), &[], &mut rng)
            .await;

        assert!(matches!(result.unwrap_err(), TurnError::Generator(_)));
        assert!(log.history().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_surfaced_and_turn_continues() {
        let pipeline = TurnPipeline::new().unwrap();
        let generator = ScriptedGenerator::new(vec![
            GeneratorReply {
                content: None,
                tool_calls: vec![tool_call("summon_dragon", json!({}))],
            },
            GeneratorReply {
                content: Some("Never mind.".to_owned()),
                tool_calls: vec![],
            },
        ]);
        let mut log = new_log(json!({}));
        let mut rng = SequenceRng::new(vec![]);

        let outcome = pipeline
            .run_turn(&generator, &executor(), &mut log, &gm(), &[], &mut rng)
            .await
            .unwrap();

        assert_eq!(outcome.content.as_deref(), Some("Never mind."));
        assert!(outcome.diffs.is_empty());
        let requests = generator.requests();
        assert!(requests[1]
            .messages
            .last()
            .unwrap()
            .content
            .contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_tools_are_advertised_in_request() {
        let pipeline = TurnPipeline::new().unwrap();
        let generator = ScriptedGenerator::with_content("Quiet night.");
        let mut log = new_log(json!({}));
        let mut rng = SequenceRng::new(vec![]);

        pipeline
            .run_turn(&generator, &executor(), &mut log, &gm(), &[], &mut rng)
            .await
            .unwrap();

        let names: Vec<String> = generator.requests()[0]
            .tools
            .iter()
            .map(|spec| spec.name.clone())
            .collect();
        assert_eq!(names, vec!["roll_check", "roll_dice", "update_state"]);
    }
}
