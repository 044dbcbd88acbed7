//! Built-in tool handlers.

use async_trait::async_trait;
use chronicle_core::diff::{DiffOp, StateDiff};
use chronicle_core::generator::ToolSpec;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::executor::{ToolContext, ToolError, ToolOutput};
use crate::registry::{ToolHandler, ToolRegistry};

/// Path under which randomized handlers record their outcomes. Direct
/// rolls committed by the session facade append to the same list.
pub const DICE_LOG_PATH: &str = "dice.log";

fn parse_args<T: for<'de> Deserialize<'de>>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|err| ToolError::InvalidArgs(err.to_string()))
}

/// Builds a registry populated with the built-in handlers.
#[must_use]
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(RollDice);
    registry.register(UpdateState);
    registry.register(RollCheck);
    registry
}

// --- roll_dice ---

#[derive(Debug, Deserialize)]
struct RollDiceArgs {
    #[serde(default = "default_count")]
    count: u32,
    sides: u32,
    #[serde(default)]
    modifier: i64,
    #[serde(default)]
    reason: Option<String>,
}

fn default_count() -> u32 {
    1
}

/// Rolls `count` dice with `sides` sides and an optional flat modifier.
///
/// The outcome is recorded inside the returned diffs, so replaying the
/// committed event never re-rolls.
pub struct RollDice;

#[async_trait]
impl ToolHandler for RollDice {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "roll_dice".to_owned(),
            description: "Roll dice (count, sides, optional modifier)".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "count": { "type": "integer", "minimum": 1, "default": 1 },
                    "sides": { "type": "integer", "minimum": 2 },
                    "modifier": { "type": "integer", "default": 0 },
                    "reason": { "type": "string" }
                },
                "required": ["sides"]
            }),
        }
    }

    async fn call(
        &self,
        args: &Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let args: RollDiceArgs = parse_args(args)?;
        if args.sides < 2 {
            return Err(ToolError::InvalidArgs("sides must be at least 2".to_owned()));
        }
        if args.count == 0 || args.count > 100 {
            return Err(ToolError::InvalidArgs(
                "count must be between 1 and 100".to_owned(),
            ));
        }

        let rolls: Vec<u32> = (0..args.count)
            .map(|_| ctx.rng.next_u32_range(1, args.sides))
            .collect();
        let total: i64 = rolls.iter().map(|roll| i64::from(*roll)).sum();
        let final_result = total + args.modifier;

        let outcome = json!({
            "roller": ctx.actor_id,
            "count": args.count,
            "sides": args.sides,
            "rolls": rolls,
            "modifier": args.modifier,
            "total": total,
            "final": final_result,
            "reason": args.reason,
        });

        Ok(ToolOutput {
            result: outcome.clone(),
            diffs: vec![StateDiff::new(DICE_LOG_PATH, DiffOp::Append, outcome)],
        })
    }
}

// --- update_state ---

#[derive(Debug, Deserialize)]
struct UpdateStateArgs {
    path: String,
    op: DiffOp,
    value: Value,
}

/// Proposes a single state diff. The diff is applied by the engine when
/// the turn commits, not here.
pub struct UpdateState;

#[async_trait]
impl ToolHandler for UpdateState {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "update_state".to_owned(),
            description: "Update session state at a dot-addressed path".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "op": {
                        "type": "string",
                        "enum": ["set", "add", "subtract", "multiply", "append", "remove", "delete"]
                    },
                    "value": {}
                },
                "required": ["path", "op", "value"]
            }),
        }
    }

    async fn call(
        &self,
        args: &Value,
        _ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let args: UpdateStateArgs = parse_args(args)?;
        if args.path.trim().is_empty() {
            return Err(ToolError::InvalidArgs("path must not be empty".to_owned()));
        }

        let diff = StateDiff::new(args.path, args.op, args.value);
        let result = json!({ "ok": true, "path": diff.path.clone(), "op": diff.op });
        Ok(ToolOutput {
            result,
            diffs: vec![diff],
        })
    }
}

// --- roll_check ---

/// Difficulty tiers for percentile checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckDifficulty {
    /// Succeed on roll <= target.
    #[default]
    Regular,
    /// Succeed on roll <= target / 2.
    Hard,
    /// Succeed on roll <= target / 5.
    Extreme,
}

#[derive(Debug, Deserialize)]
struct RollCheckArgs {
    skill_name: String,
    skill_value: u32,
    #[serde(default)]
    difficulty: CheckDifficulty,
}

fn success_level(roll: u32, target: u32) -> Option<&'static str> {
    if roll <= target / 5 {
        Some("extreme")
    } else if roll <= target / 2 {
        Some("hard")
    } else if roll <= target {
        Some("regular")
    } else {
        None
    }
}

/// Rolls a percentile skill check against a target value.
pub struct RollCheck;

#[async_trait]
impl ToolHandler for RollCheck {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "roll_check".to_owned(),
            description: "Roll a percentile skill check against a target value".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "skill_name": { "type": "string" },
                    "skill_value": { "type": "integer", "minimum": 0 },
                    "difficulty": {
                        "type": "string",
                        "enum": ["regular", "hard", "extreme"],
                        "default": "regular"
                    }
                },
                "required": ["skill_name", "skill_value"]
            }),
        }
    }

    async fn call(
        &self,
        args: &Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let args: RollCheckArgs = parse_args(args)?;

        let roll = ctx.rng.next_u32_range(1, 100);
        let target = args.skill_value;
        let threshold = match args.difficulty {
            CheckDifficulty::Regular => target,
            CheckDifficulty::Hard => target / 2,
            CheckDifficulty::Extreme => target / 5,
        };
        let success = roll <= threshold;
        let critical_success = roll == 1;
        let critical_failure = roll == 100 || (target < 50 && roll >= 96);

        let outcome = json!({
            "roller": ctx.actor_id,
            "skill": args.skill_name,
            "target": target,
            "roll": roll,
            "success": success,
            "critical_success": critical_success,
            "critical_failure": critical_failure,
            "success_level": success_level(roll, target),
        });

        Ok(ToolOutput {
            result: outcome.clone(),
            diffs: vec![StateDiff::new(DICE_LOG_PATH, DiffOp::Append, outcome)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::diff::apply_diff;
    use chronicle_test_support::SequenceRng;
    use serde_json::json;

    async fn run(
        handler: &dyn ToolHandler,
        args: Value,
        rng_values: Vec<u32>,
    ) -> Result<ToolOutput, ToolError> {
        let state = json!({});
        let mut rng = SequenceRng::new(rng_values);
        let mut ctx = ToolContext {
            state: &state,
            actor_id: "ranger",
            rng: &mut rng,
        };
        handler.call(&args, &mut ctx).await
    }

    #[tokio::test]
    async fn test_roll_dice_records_outcome_in_diffs() {
        let output = run(&RollDice, json!({ "count": 2, "sides": 6, "modifier": 3 }), vec![4, 5])
            .await
            .unwrap();

        assert_eq!(output.result["rolls"], json!([4, 5]));
        assert_eq!(output.result["total"], json!(9));
        assert_eq!(output.result["final"], json!(12));

        // The outcome replays from the diff without touching the RNG.
        assert_eq!(output.diffs.len(), 1);
        assert_eq!(output.diffs[0].op, DiffOp::Append);
        let mut tree = json!({});
        apply_diff(&mut tree, &output.diffs[0]).unwrap();
        assert_eq!(tree["dice"]["log"][0]["final"], json!(12));
    }

    #[tokio::test]
    async fn test_roll_dice_rejects_bad_sides() {
        let result = run(&RollDice, json!({ "sides": 1 }), vec![]).await;

        assert!(matches!(result.unwrap_err(), ToolError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn test_update_state_proposes_diff_without_applying() {
        let output = run(
            &UpdateState,
            json!({ "path": "hp", "op": "subtract", "value": 5 }),
            vec![],
        )
        .await
        .unwrap();

        assert_eq!(output.diffs.len(), 1);
        assert_eq!(output.diffs[0].path, "hp");
        assert_eq!(output.diffs[0].op, DiffOp::Subtract);
        assert!(output.diffs[0].previous_value.is_none());
    }

    #[tokio::test]
    async fn test_update_state_rejects_unknown_op() {
        let result = run(
            &UpdateState,
            json!({ "path": "hp", "op": "divide", "value": 2 }),
            vec![],
        )
        .await;

        assert!(matches!(result.unwrap_err(), ToolError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn test_roll_check_regular_success() {
        let output = run(
            &RollCheck,
            json!({ "skill_name": "spot_hidden", "skill_value": 60 }),
            vec![45],
        )
        .await
        .unwrap();

        assert_eq!(output.result["success"], json!(true));
        assert_eq!(output.result["success_level"], json!("regular"));
    }

    #[tokio::test]
    async fn test_roll_check_hard_difficulty_halves_target() {
        // Roll 45 against 60 at hard difficulty: threshold 30, failure.
        let output = run(
            &RollCheck,
            json!({ "skill_name": "spot_hidden", "skill_value": 60, "difficulty": "hard" }),
            vec![45],
        )
        .await
        .unwrap();

        assert_eq!(output.result["success"], json!(false));
    }

    #[tokio::test]
    async fn test_roll_check_critical_failure_low_skill() {
        // Target below 50: rolls of 96+ are critical failures.
        let output = run(
            &RollCheck,
            json!({ "skill_name": "lore", "skill_value": 30 }),
            vec![97],
        )
        .await
        .unwrap();

        assert_eq!(output.result["critical_failure"], json!(true));
    }

    #[tokio::test]
    async fn test_roll_check_roll_of_one_is_critical_success() {
        let output = run(
            &RollCheck,
            json!({ "skill_name": "luck", "skill_value": 10 }),
            vec![1],
        )
        .await
        .unwrap();

        assert_eq!(output.result["critical_success"], json!(true));
        assert_eq!(output.result["success_level"], json!("extreme"));
    }

    #[test]
    fn test_builtin_registry_contains_all_handlers() {
        let registry = builtin_registry();

        assert_eq!(registry.names(), vec!["roll_check", "roll_dice", "update_state"]);
    }
}
