//! Plan response classifier
//!
//! Turns the coach's raw JSON into a [`PlanResponse`]. Anything that does not
//! match the response schema is a [`ParseError`]; nothing is coerced into an
//! empty plan.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{DEFAULT_QUEST_TITLE, TaskDraft, TaskType};
use crate::llm::strip_code_fences;

use super::error::ParseError;

/// A plan the coach proposed, waiting for the user to accept it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanProposal {
    pub quest_title: String,
    /// Ordered Daily, then Weekly, then Milestone
    pub tasks: Vec<TaskDraft>,
}

impl PlanProposal {
    pub fn total_xp(&self) -> u64 {
        self.tasks.iter().map(|t| u64::from(t.xp)).sum()
    }
}

/// Classified coach reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum PlanResponse {
    Clarification {
        chat_message: String,
        suggested_replies: Vec<String>,
    },
    Plan {
        chat_message: String,
        proposal: PlanProposal,
    },
    Refusal {
        chat_message: String,
    },
}

impl PlanResponse {
    pub fn chat_message(&self) -> &str {
        match self {
            Self::Clarification { chat_message, .. } | Self::Plan { chat_message, .. } | Self::Refusal { chat_message } => {
                chat_message
            }
        }
    }

    pub fn suggested_replies(&self) -> &[String] {
        match self {
            Self::Clarification { suggested_replies, .. } => suggested_replies,
            _ => &[],
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    response_type: String,
    chat_message: String,
    #[serde(default)]
    suggested_replies: Option<Vec<String>>,
    #[serde(default)]
    plan_data: Option<RawPlan>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    quest_title: Option<String>,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    title: String,
    task_type: String,
    xp: serde_json::Value,
}

/// Classify a raw coach reply
pub fn classify(raw: &str) -> Result<PlanResponse, ParseError> {
    debug!(len = raw.len(), "classify: called");
    let text = strip_code_fences(raw);
    let parsed: RawResponse = serde_json::from_str(&text).map_err(|e| ParseError::MalformedJson(e.to_string()))?;

    let response_type = parsed.response_type.trim().to_lowercase();
    match response_type.as_str() {
        "plan" => {
            let plan = parsed.plan_data.ok_or(ParseError::MissingPlanData)?;
            let proposal = validate_plan(plan)?;
            debug!(tasks = proposal.tasks.len(), "classify: plan");
            Ok(PlanResponse::Plan {
                chat_message: parsed.chat_message,
                proposal,
            })
        }
        "clarification" | "refusal" if parsed.plan_data.is_some() => Err(ParseError::UnexpectedPlanData),
        "clarification" => {
            debug!("classify: clarification");
            Ok(PlanResponse::Clarification {
                chat_message: parsed.chat_message,
                suggested_replies: parsed.suggested_replies.unwrap_or_default(),
            })
        }
        "refusal" => {
            debug!("classify: refusal");
            Ok(PlanResponse::Refusal {
                chat_message: parsed.chat_message,
            })
        }
        _ => Err(ParseError::UnknownResponseType(parsed.response_type)),
    }
}

fn validate_plan(plan: RawPlan) -> Result<PlanProposal, ParseError> {
    // Present but blank falls back to the default title; absent is malformed
    let quest_title = plan.quest_title.ok_or(ParseError::MissingQuestTitle)?;
    if plan.tasks.is_empty() {
        return Err(ParseError::EmptyTaskList);
    }

    let mut tasks = Vec::with_capacity(plan.tasks.len());
    let mut previous: Option<TaskType> = None;
    for (index, raw) in plan.tasks.into_iter().enumerate() {
        let title = raw.title.trim();
        if title.is_empty() {
            return Err(ParseError::EmptyTaskTitle { index });
        }
        let task_type: TaskType = raw.task_type.parse().map_err(|_| ParseError::UnknownTaskType {
            index,
            value: raw.task_type.clone(),
        })?;
        let xp = parse_xp(&raw.xp).ok_or_else(|| ParseError::InvalidXp {
            index,
            value: raw.xp.to_string(),
        })?;
        if let Some(previous) = previous
            && task_type < previous
        {
            return Err(ParseError::OutOfOrder {
                index,
                previous,
                found: task_type,
            });
        }
        previous = Some(task_type);
        tasks.push(TaskDraft::new(title, task_type, xp));
    }

    let quest_title = match quest_title.trim() {
        "" => DEFAULT_QUEST_TITLE.to_string(),
        title => title.to_string(),
    };

    Ok(PlanProposal { quest_title, tasks })
}

/// XP must be a positive whole number that fits in u32
fn parse_xp(value: &serde_json::Value) -> Option<u32> {
    let n = value.as_f64()?;
    if !n.is_finite() || n <= 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
        return None;
    }
    Some(n as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"{
        "response_type": "plan",
        "chat_message": "Here is your path.",
        "plan_data": {
            "quest_title": "Learn Guitar",
            "tasks": [
                {"title": "Tune the guitar", "task_type": "Daily", "xp": 10},
                {"title": "Practice chords", "task_type": "Daily", "xp": 15},
                {"title": "Learn a song", "task_type": "Weekly", "xp": 60},
                {"title": "Play for friends", "task_type": "Milestone", "xp": 180}
            ]
        }
    }"#;

    #[test]
    fn test_classify_plan() {
        let response = classify(PLAN).unwrap();
        let PlanResponse::Plan { chat_message, proposal } = response else {
            panic!("expected plan");
        };
        assert_eq!(chat_message, "Here is your path.");
        assert_eq!(proposal.quest_title, "Learn Guitar");
        assert_eq!(proposal.tasks.len(), 4);
        assert_eq!(proposal.tasks[3].task_type, TaskType::Milestone);
        assert_eq!(proposal.total_xp(), 265);
    }

    #[test]
    fn test_classify_fenced_plan() {
        let fenced = format!("```json\n{}\n```", PLAN);
        assert!(matches!(classify(&fenced), Ok(PlanResponse::Plan { .. })));
    }

    #[test]
    fn test_classify_clarification() {
        let raw = r#"{"response_type":"clarification","chat_message":"How often?","suggested_replies":["Daily","Weekly"]}"#;
        let response = classify(raw).unwrap();
        assert_eq!(response.chat_message(), "How often?");
        assert_eq!(response.suggested_replies(), ["Daily", "Weekly"]);
    }

    #[test]
    fn test_classify_clarification_without_suggestions() {
        let raw = r#"{"response_type":"clarification","chat_message":"Tell me more"}"#;
        assert!(classify(raw).unwrap().suggested_replies().is_empty());
    }

    #[test]
    fn test_classify_refusal() {
        let raw = r#"{"response_type":"refusal","chat_message":"I cannot help with that."}"#;
        assert!(matches!(classify(raw), Ok(PlanResponse::Refusal { .. })));
    }

    #[test]
    fn test_plan_without_plan_data() {
        let raw = r#"{"response_type":"plan","chat_message":"Here"}"#;
        assert_eq!(classify(raw), Err(ParseError::MissingPlanData));
    }

    #[test]
    fn test_clarification_with_plan_data() {
        let raw = r#"{"response_type":"clarification","chat_message":"Hm","plan_data":{"quest_title":"X","tasks":[]}}"#;
        assert_eq!(classify(raw), Err(ParseError::UnexpectedPlanData));
    }

    #[test]
    fn test_empty_task_list() {
        let raw = r#"{"response_type":"plan","chat_message":"Here","plan_data":{"quest_title":"X","tasks":[]}}"#;
        assert_eq!(classify(raw), Err(ParseError::EmptyTaskList));
    }

    #[test]
    fn test_invalid_xp_values() {
        for xp in ["0", "-5", "12.5", "\"ten\"", "null"] {
            let raw = format!(
                r#"{{"response_type":"plan","chat_message":"m","plan_data":{{"quest_title":"X","tasks":[{{"title":"t","task_type":"Daily","xp":{}}}]}}}}"#,
                xp
            );
            assert!(
                matches!(classify(&raw), Err(ParseError::InvalidXp { index: 0, .. })),
                "xp {} should be rejected",
                xp
            );
        }
    }

    #[test]
    fn test_whole_float_xp_accepted() {
        let raw = r#"{"response_type":"plan","chat_message":"m","plan_data":{"quest_title":"X","tasks":[{"title":"t","task_type":"Daily","xp":20.0}]}}"#;
        let PlanResponse::Plan { proposal, .. } = classify(raw).unwrap() else {
            panic!("expected plan");
        };
        assert_eq!(proposal.tasks[0].xp, 20);
    }

    #[test]
    fn test_unknown_task_type() {
        let raw = r#"{"response_type":"plan","chat_message":"m","plan_data":{"quest_title":"X","tasks":[{"title":"t","task_type":"Monthly","xp":20}]}}"#;
        assert!(matches!(classify(raw), Err(ParseError::UnknownTaskType { index: 0, .. })));
    }

    #[test]
    fn test_out_of_order_tasks() {
        let raw = r#"{"response_type":"plan","chat_message":"m","plan_data":{"quest_title":"X","tasks":[
            {"title":"a","task_type":"Weekly","xp":50},
            {"title":"b","task_type":"Daily","xp":10}
        ]}}"#;
        assert_eq!(
            classify(raw),
            Err(ParseError::OutOfOrder {
                index: 1,
                previous: TaskType::Weekly,
                found: TaskType::Daily
            })
        );
    }

    #[test]
    fn test_blank_title_defaults() {
        let raw = r#"{"response_type":"plan","chat_message":"m","plan_data":{"quest_title":"  ","tasks":[{"title":"t","task_type":"Daily","xp":10}]}}"#;
        let PlanResponse::Plan { proposal, .. } = classify(raw).unwrap() else {
            panic!("expected plan");
        };
        assert_eq!(proposal.quest_title, "New Quest");
    }

    #[test]
    fn test_missing_title_is_parse_error() {
        let raw = r#"{"response_type":"plan","chat_message":"m","plan_data":{"tasks":[{"title":"t","task_type":"Daily","xp":10}]}}"#;
        assert_eq!(classify(raw), Err(ParseError::MissingQuestTitle));
    }

    #[test]
    fn test_run_5k_plan() {
        let raw = r#"{"response_type":"plan","chat_message":"ok","plan_data":{"quest_title":"Run 5k","tasks":[{"title":"Walk 10 min","task_type":"Daily","xp":10}]}}"#;
        let response = classify(raw).unwrap();
        assert_eq!(
            response,
            PlanResponse::Plan {
                chat_message: "ok".to_string(),
                proposal: PlanProposal {
                    quest_title: "Run 5k".to_string(),
                    tasks: vec![TaskDraft::new("Walk 10 min", TaskType::Daily, 10)],
                },
            }
        );

        let raw = r#"{"response_type":"plan","chat_message":"ok"}"#;
        assert_eq!(classify(raw), Err(ParseError::MissingPlanData));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(classify("not json"), Err(ParseError::MalformedJson(_))));
        assert!(matches!(classify(r#"{"chat_message":"no type"}"#), Err(ParseError::MalformedJson(_))));
    }

    #[test]
    fn test_unknown_response_type() {
        let raw = r#"{"response_type":"poem","chat_message":"roses"}"#;
        assert_eq!(classify(raw), Err(ParseError::UnknownResponseType("poem".to_string())));
    }
}
