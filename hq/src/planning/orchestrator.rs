//! PlanOrchestrator - model resolution and rate-limit aware generation
//!
//! Candidates are tried strictly in priority order. Each gets a fixed attempt
//! budget; a 429 costs an attempt plus a backoff, a 400/404 abandons the model,
//! anything else costs an attempt. The first non-empty reply wins.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::llm::{
    ConversationTurn, FailureKind, GenerateRequest, GenerativeClient, LlmError, create_client, strip_code_fences,
    supports_structured_output,
};

use super::error::{ModelFailure, PlanError};
use super::prompt::coach_system_prompt;

/// Prefix the provider puts on model names in listings
const MODEL_NAME_PREFIX: &str = "models/";

/// Orchestrator tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Candidate models, highest priority first
    pub candidates: Vec<String>,
    /// Name fragments for the fallback model
    pub family_markers: Vec<String>,
    pub attempts_per_model: u32,
    pub backoff: Duration,
}

impl From<&AiConfig> for OrchestratorConfig {
    fn from(config: &AiConfig) -> Self {
        Self {
            candidates: config.models.clone(),
            family_markers: config.family_markers.clone(),
            attempts_per_model: config.attempts_per_model,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&AiConfig::default())
    }
}

/// Outcome of exhausting one model
enum AttemptError {
    /// Stop everything; no other model can do better
    Fatal(PlanError),
    /// Move on to the next candidate
    Failed(ModelFailure),
}

/// Drives plan generation across candidate models
pub struct PlanOrchestrator {
    client: Arc<dyn GenerativeClient>,
    config: OrchestratorConfig,
}

impl PlanOrchestrator {
    pub fn new(client: Arc<dyn GenerativeClient>, config: OrchestratorConfig) -> Self {
        debug!(candidates = ?config.candidates, "PlanOrchestrator::new: called");
        Self { client, config }
    }

    /// Build the production orchestrator; a missing API key is a configuration error
    pub fn from_config(config: &AiConfig) -> Result<Self, PlanError> {
        debug!("PlanOrchestrator::from_config: called");
        let client = create_client(config).map_err(|e| PlanError::Configuration(e.to_string()))?;
        Ok(Self::new(client, OrchestratorConfig::from(config)))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Candidate models to try, in order
    ///
    /// Intersects the provider's listing with the static candidates. When
    /// nothing matches, falls back to the first listed model carrying a family
    /// marker. When listing fails or yields nothing usable, the static list is
    /// used as is.
    pub async fn resolve_models(&self) -> Vec<String> {
        debug!("resolve_models: called");
        let available = match self.client.list_models().await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => {
                debug!("resolve_models: provider listed no models");
                return self.config.candidates.clone();
            }
            Err(e) => {
                warn!(error = %e, "Model listing failed, using static candidates");
                return self.config.candidates.clone();
            }
        };

        let available: Vec<String> = available
            .into_iter()
            .map(|name| name.strip_prefix(MODEL_NAME_PREFIX).map(String::from).unwrap_or(name))
            .collect();

        let matched: Vec<String> = self
            .config
            .candidates
            .iter()
            .filter(|c| available.contains(*c))
            .cloned()
            .collect();
        if !matched.is_empty() {
            debug!(?matched, "resolve_models: matched candidates");
            return matched;
        }

        let fallback = available
            .iter()
            .find(|name| self.config.family_markers.iter().any(|marker| name.contains(marker.as_str())));
        match fallback {
            Some(model) => {
                info!(%model, "No candidate served, falling back to family match");
                vec![model.clone()]
            }
            None => {
                debug!("resolve_models: no family match, using static candidates");
                self.config.candidates.clone()
            }
        }
    }

    /// Generate a coach reply for the conversation so far
    ///
    /// Returns the reply text with code fences stripped.
    pub async fn generate(&self, turns: &[ConversationTurn]) -> Result<String, PlanError> {
        debug!(turns = turns.len(), "generate: called");
        if self.config.attempts_per_model == 0 {
            return Err(PlanError::Configuration("attempts-per-model must be at least 1".to_string()));
        }

        let models = self.resolve_models().await;
        info!(?models, "Plan generation will try these models");

        let mut failures = Vec::new();
        for model in &models {
            match self.try_model(model, turns).await {
                Ok(text) => {
                    info!(%model, "Plan generation succeeded");
                    return Ok(text);
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Failed(failure)) => {
                    warn!(%failure, "Model exhausted, advancing");
                    failures.push(failure);
                }
            }
        }

        warn!(tried = failures.len(), "All candidate models failed");
        Err(PlanError::Exhausted { failures })
    }

    async fn try_model(&self, model: &str, turns: &[ConversationTurn]) -> Result<String, AttemptError> {
        debug!(%model, "try_model: called");
        let request = GenerateRequest {
            system_prompt: coach_system_prompt(),
            turns: turns.to_vec(),
            structured_output: supports_structured_output(model),
        };

        let max_attempts = self.config.attempts_per_model;
        let mut attempts = 0;
        let mut last_failure = ModelFailure {
            model: model.to_string(),
            kind: FailureKind::Transport,
            message: "no attempt made".to_string(),
        };

        while attempts < max_attempts {
            let error = match self.client.generate(model, &request).await {
                Ok(text) => {
                    let text = strip_code_fences(&text);
                    if !text.is_empty() {
                        return Ok(text);
                    }
                    debug!(%model, attempts, "try_model: empty reply");
                    LlmError::InvalidResponse("Empty response".to_string())
                }
                Err(LlmError::MissingApiKey(var)) => {
                    return Err(AttemptError::Fatal(PlanError::Configuration(format!(
                        "API key not found. Set the {} environment variable.",
                        var
                    ))));
                }
                Err(e) => e,
            };

            let kind = error.kind();
            last_failure = ModelFailure {
                model: model.to_string(),
                kind,
                message: error.to_string(),
            };

            match kind {
                FailureKind::RateLimited => {
                    // Every 429 backs off, the last one included
                    attempts += 1;
                    warn!(%model, attempts, backoff = ?self.config.backoff, "Rate limited, backing off");
                    tokio::time::sleep(self.config.backoff).await;
                }
                FailureKind::ModelIncompatible => {
                    debug!(%model, "try_model: model incompatible, abandoning");
                    break;
                }
                FailureKind::Transport => {
                    attempts += 1;
                    debug!(%model, attempts, error = %last_failure.message, "try_model: transport failure");
                }
            }
        }

        Err(AttemptError::Failed(last_failure))
    }
}
