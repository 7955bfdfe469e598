//! PlanningSession - multi-turn conversation with the AI coach
//!
//! Keeps the transcript, stages the latest plan proposal and persists it only
//! when the user accepts.

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::Quest;
use crate::llm::{ConversationTurn, Role};
use crate::quest::QuestManager;

use super::classifier::{PlanProposal, PlanResponse, classify};
use super::error::PlanError;
use super::orchestrator::PlanOrchestrator;
use super::prompt::{COACH_GREETING, COACH_QUICK_REPLIES, GARBLED_NOTICE, SILENT_NOTICE, quest_accepted_message};

/// One line of the session transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub turn: ConversationTurn,
    /// Quick replies offered with an assistant turn
    pub suggestions: Vec<String>,
    /// Local notices (errors, confirmations) are shown but never sent to the model
    pub notice: bool,
}

impl TranscriptEntry {
    fn said(turn: ConversationTurn, suggestions: Vec<String>) -> Self {
        Self {
            turn,
            suggestions,
            notice: false,
        }
    }

    fn notice(content: impl Into<String>) -> Self {
        Self {
            turn: ConversationTurn::assistant(content),
            suggestions: Vec::new(),
            notice: true,
        }
    }
}

/// A quest saved by an accept that did not finish
#[derive(Debug, Clone, PartialEq, Eq)]
enum Leftover {
    /// Quest row written, task batch not
    TasksMissing(String),
    /// Quest and tasks written, equip not
    NotEquipped(String),
}

impl Leftover {
    fn quest_id(&self) -> &str {
        match self {
            Self::TasksMissing(id) | Self::NotEquipped(id) => id,
        }
    }
}

/// A coach conversation for one user
pub struct PlanningSession {
    orchestrator: PlanOrchestrator,
    quests: QuestManager,
    user_id: String,
    transcript: Vec<TranscriptEntry>,
    staged: Option<PlanProposal>,
    /// Resumed by the next accept of the same proposal
    leftover: Option<Leftover>,
}

impl PlanningSession {
    /// Start a session seeded with the coach's greeting
    pub fn new(orchestrator: PlanOrchestrator, quests: QuestManager, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        debug!(%user_id, "PlanningSession::new: called");
        let greeting = TranscriptEntry::said(
            ConversationTurn::assistant(COACH_GREETING),
            COACH_QUICK_REPLIES.iter().map(|s| s.to_string()).collect(),
        );
        Self {
            orchestrator,
            quests,
            user_id,
            transcript: vec![greeting],
            staged: None,
            leftover: None,
        }
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn staged(&self) -> Option<&PlanProposal> {
        self.staged.as_ref()
    }

    /// Conversation as the model sees it: every spoken turn, no notices
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.transcript
            .iter()
            .filter(|entry| !entry.notice)
            .map(|entry| entry.turn.clone())
            .collect()
    }

    /// Send a user message and record the coach's classified reply
    ///
    /// A `Plan` reply replaces any previously staged proposal. Generation and
    /// parse failures are recorded as notices and returned as distinct errors.
    pub async fn send(&mut self, text: &str) -> Result<PlanResponse, PlanError> {
        debug!(len = text.len(), "send: called");
        let text = text.trim();
        if text.is_empty() {
            return Err(PlanError::EmptyMessage);
        }
        self.transcript
            .push(TranscriptEntry::said(ConversationTurn::user(text), Vec::new()));

        let raw = match self.orchestrator.generate(&self.history()).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Coach generation failed");
                self.transcript.push(TranscriptEntry::notice(SILENT_NOTICE));
                return Err(e);
            }
        };

        let response = match classify(&raw) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Coach reply did not parse");
                self.transcript.push(TranscriptEntry::notice(GARBLED_NOTICE));
                return Err(PlanError::Parse(e));
            }
        };

        self.transcript.push(TranscriptEntry::said(
            ConversationTurn::assistant(response.chat_message()),
            response.suggested_replies().to_vec(),
        ));
        if let PlanResponse::Plan { proposal, .. } = &response {
            info!(title = %proposal.quest_title, tasks = proposal.tasks.len(), "Plan proposal staged");
            self.drop_leftover().await;
            self.staged = Some(proposal.clone());
        }
        Ok(response)
    }

    /// Persist the staged proposal as a new quest and equip it
    ///
    /// On failure the proposal stays staged so the user can try again. A
    /// retry resumes from the step that failed instead of creating a second
    /// quest.
    pub async fn accept_proposal(&mut self) -> Result<Quest, PlanError> {
        debug!(leftover = ?self.leftover, "accept_proposal: called");
        let proposal = self.staged.take().ok_or(PlanError::NoProposal)?;

        let saved = match self.leftover.take() {
            Some(Leftover::TasksMissing(quest_id)) => {
                info!(%quest_id, "Retrying task batch of partially saved quest");
                self.quests
                    .retry_task_batch(&self.user_id, &quest_id, proposal.tasks.clone())
                    .await
                    .map(|_| quest_id)
            }
            Some(Leftover::NotEquipped(quest_id)) => Ok(quest_id),
            None => self
                .quests
                .create_quest(&self.user_id, &proposal.quest_title, proposal.tasks.clone())
                .await
                .map(|quest| quest.id),
        };
        let quest_id = match saved {
            Ok(quest_id) => quest_id,
            Err(e) => {
                warn!(error = %e, "Saving proposal failed");
                self.leftover = e.orphaned_quest().map(|id| Leftover::TasksMissing(id.to_string()));
                self.staged = Some(proposal);
                return Err(PlanError::Persistence(e));
            }
        };

        // Accepted quests start active; equip is the only way to get there
        let quest = match self.quests.equip(&self.user_id, &quest_id).await {
            Ok(quest) => quest,
            Err(e) => {
                warn!(%quest_id, error = %e, "Equipping accepted quest failed");
                self.leftover = Some(Leftover::NotEquipped(quest_id));
                self.staged = Some(proposal);
                return Err(PlanError::Persistence(e));
            }
        };

        self.transcript
            .push(TranscriptEntry::notice(quest_accepted_message(&quest.title)));
        info!(quest_id = %quest.id, "Plan accepted");
        Ok(quest)
    }

    /// Drop the staged proposal, if any, along with anything a failed accept saved
    pub async fn discard_proposal(&mut self) -> Option<PlanProposal> {
        debug!("discard_proposal: called");
        self.drop_leftover().await;
        self.staged.take()
    }

    /// Delete the quest a failed accept left behind
    async fn drop_leftover(&mut self) {
        let Some(leftover) = self.leftover.take() else {
            return;
        };
        let quest_id = leftover.quest_id();
        match self.quests.delete_quest(&self.user_id, quest_id).await {
            Ok(removed) => info!(%quest_id, removed, "Removed quest left by a failed accept"),
            Err(e) => warn!(%quest_id, error = %e, "Could not remove quest left by a failed accept"),
        }
    }

    /// Run the session at the terminal until the user quits or accepts a plan
    ///
    /// Returns the accepted quest, or `None` if the user left without one.
    pub async fn run_interactive(&mut self) -> Result<Option<Quest>> {
        info!(user_id = %self.user_id, "Starting planning session");
        if let Some(greeting) = self.transcript.first() {
            print_entry(greeting);
        }

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let input = match rl.readline(&format!("{} ", ">".bold())) {
                Ok(line) => line.trim().to_string(),
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C abandons the line, not the session
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("\nSession ended.");
                    return Ok(None);
                }
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            };
            if input.is_empty() {
                continue;
            }
            let _ = rl.add_history_entry(input.as_str());

            match input.to_lowercase().as_str() {
                "/quit" | "/exit" | "quit" | "exit" | "q" => {
                    println!("Session ended.");
                    return Ok(None);
                }
                "/help" => {
                    print_help();
                    continue;
                }
                "/discard" => {
                    match self.discard_proposal().await {
                        Some(p) => println!("Discarded \"{}\".", p.quest_title),
                        None => println!("Nothing to discard."),
                    }
                    continue;
                }
                "/accept" => {
                    match self.accept_proposal().await {
                        Ok(quest) => {
                            if let Some(entry) = self.transcript.last() {
                                print_entry(entry);
                            }
                            return Ok(Some(quest));
                        }
                        Err(e) => println!("{} {}", "error:".red().bold(), e),
                    }
                    continue;
                }
                _ => {}
            }

            // A bare number picks one of the last suggestions
            let message = self.pick_suggestion(&input).unwrap_or_else(|| input.clone());
            match self.send(&message).await {
                Ok(response) => {
                    if let Some(entry) = self.transcript.last() {
                        print_entry(entry);
                    }
                    if let PlanResponse::Plan { proposal, .. } = &response {
                        print_proposal(proposal);
                    }
                }
                Err(e) => {
                    if let Some(entry) = self.transcript.last() {
                        print_entry(entry);
                    }
                    debug!(error = %e, "run_interactive: send failed");
                }
            }
        }
    }

    fn pick_suggestion(&self, input: &str) -> Option<String> {
        let index: usize = input.parse().ok()?;
        let last = self
            .transcript
            .iter()
            .rev()
            .find(|e| e.turn.role == Role::Assistant && !e.notice)?;
        last.suggestions.get(index.checked_sub(1)?).cloned()
    }
}

fn print_entry(entry: &TranscriptEntry) {
    let speaker = match entry.turn.role {
        Role::User => "you".green().bold(),
        Role::Assistant => "coach".magenta().bold(),
    };
    if entry.notice {
        println!("\n{} {}", speaker, entry.turn.content.dimmed());
    } else {
        println!("\n{} {}", speaker, entry.turn.content);
    }
    for (i, suggestion) in entry.suggestions.iter().enumerate() {
        println!("  {} {}", format!("[{}]", i + 1).cyan(), suggestion);
    }
    println!();
}

fn print_proposal(proposal: &PlanProposal) {
    println!("{} {}", "Quest:".bold(), proposal.quest_title.yellow().bold());
    for task in &proposal.tasks {
        println!("  {:<10} {:>4} XP  {}", task.task_type.to_string(), task.xp, task.title);
    }
    println!("\nType /accept to begin this quest or /discard to drop it.\n");
}

fn print_help() {
    println!("Commands:");
    println!("  /accept   save the proposed quest and equip it");
    println!("  /discard  drop the proposed quest");
    println!("  /quit     leave the session");
    println!("  <n>       send suggestion number n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskDraft, TaskType};
    use crate::llm::client::mock::{Scripted, ScriptedClient};
    use crate::quest::QuestError;
    use crate::planning::OrchestratorConfig;
    use crate::state::StateManager;
    use std::sync::Arc;
    use std::time::Duration;

    const CLARIFY: &str =
        r#"{"response_type":"clarification","chat_message":"How many minutes a day?","suggested_replies":["10","30"]}"#;
    const PLAN: &str = r#"{"response_type":"plan","chat_message":"Behold your path.","plan_data":{"quest_title":"Morning Runner","tasks":[
        {"title":"Put on shoes","task_type":"Daily","xp":10},
        {"title":"Run 3 times","task_type":"Weekly","xp":60},
        {"title":"Run a 5k","task_type":"Milestone","xp":180}]}}"#;

    fn session(replies: Vec<Scripted>) -> (PlanningSession, QuestManager) {
        let client = Arc::new(ScriptedClient::new(None).script("m1", replies));
        let config = OrchestratorConfig {
            candidates: vec!["m1".to_string()],
            family_markers: vec![],
            attempts_per_model: 2,
            backoff: Duration::ZERO,
        };
        let orchestrator = PlanOrchestrator::new(client, config);
        let state = StateManager::spawn_in_memory().unwrap();
        let quests = QuestManager::new(Arc::new(state));
        (PlanningSession::new(orchestrator, quests.clone(), "u1"), quests)
    }

    #[tokio::test]
    async fn test_new_session_has_greeting() {
        let (session, _) = session(vec![]);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].turn.content, COACH_GREETING);
        assert_eq!(session.transcript()[0].suggestions.len(), 3);
    }

    #[tokio::test]
    async fn test_clarification_appends_turns() {
        let (mut session, _) = session(vec![Scripted::Text(CLARIFY.to_string())]);
        let response = session.send("I want to run").await.unwrap();

        assert!(matches!(response, PlanResponse::Clarification { .. }));
        assert_eq!(session.history().len(), 3);
        assert_eq!(session.transcript()[2].suggestions, vec!["10", "30"]);
        assert!(session.staged().is_none());
    }

    #[tokio::test]
    async fn test_plan_is_staged_not_saved() {
        let (mut session, quests) = session(vec![Scripted::Text(PLAN.to_string())]);
        session.send("Help me run").await.unwrap();

        assert_eq!(session.staged().unwrap().quest_title, "Morning Runner");
        assert!(quests.quests("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accept_creates_and_equips() {
        let (mut session, quests) = session(vec![Scripted::Text(PLAN.to_string())]);
        session.send("Help me run").await.unwrap();

        let quest = session.accept_proposal().await.unwrap();
        assert!(quest.is_active);
        assert_eq!(quests.active_quest("u1").await.unwrap().unwrap().id, quest.id);
        assert_eq!(quests.tasks("u1").await.unwrap().len(), 3);
        assert!(session.staged().is_none());

        let last = session.transcript().last().unwrap();
        assert!(last.notice);
        assert!(last.turn.content.contains("Morning Runner"));
    }

    /// Stage a proposal whose last task the store will reject
    fn stage_rejected(session: &mut PlanningSession) {
        session.staged = Some(PlanProposal {
            quest_title: "Runner".to_string(),
            tasks: vec![
                TaskDraft::new("Put on shoes", TaskType::Daily, 10),
                TaskDraft::new("Worthless", TaskType::Milestone, 0),
            ],
        });
    }

    #[tokio::test]
    async fn test_retried_accept_reuses_saved_quest() {
        let (mut session, quests) = session(vec![]);
        stage_rejected(&mut session);

        let err = session.accept_proposal().await.unwrap_err();
        assert!(matches!(err, PlanError::Persistence(QuestError::PartialPersistence { .. })));
        assert_eq!(quests.quests("u1").await.unwrap().len(), 1);
        assert!(session.staged().is_some());

        // The failure clears up; accept again
        if let Some(staged) = session.staged.as_mut() {
            staged.tasks[1].xp = 180;
        }
        let quest = session.accept_proposal().await.unwrap();

        let saved = quests.quests("u1").await.unwrap();
        assert_eq!(saved.len(), 1, "No second quest is created");
        assert_eq!(saved[0].id, quest.id);
        assert!(saved[0].is_active);
        assert_eq!(quests.tasks("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_failing_again_keeps_one_quest() {
        let (mut session, quests) = session(vec![]);
        stage_rejected(&mut session);

        assert!(session.accept_proposal().await.is_err());
        assert!(session.accept_proposal().await.is_err());
        assert_eq!(quests.quests("u1").await.unwrap().len(), 1);
        assert!(quests.tasks("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discard_removes_partially_saved_quest() {
        let (mut session, quests) = session(vec![]);
        stage_rejected(&mut session);
        assert!(session.accept_proposal().await.is_err());

        assert!(session.discard_proposal().await.is_some());
        assert!(quests.quests("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_plan_replaces_partially_saved_quest() {
        let (mut session, quests) = session(vec![Scripted::Text(PLAN.to_string())]);
        stage_rejected(&mut session);
        assert!(session.accept_proposal().await.is_err());

        session.send("Try something else").await.unwrap();
        assert!(quests.quests("u1").await.unwrap().is_empty());

        let quest = session.accept_proposal().await.unwrap();
        assert_eq!(quest.title, "Morning Runner");
        assert_eq!(quests.quests("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_accept_without_proposal() {
        let (mut session, _) = session(vec![]);
        assert!(matches!(session.accept_proposal().await, Err(PlanError::NoProposal)));
    }

    #[tokio::test]
    async fn test_discard_proposal() {
        let (mut session, quests) = session(vec![Scripted::Text(PLAN.to_string())]);
        session.send("Help me run").await.unwrap();

        assert!(session.discard_proposal().await.is_some());
        assert!(session.staged().is_none());
        assert!(quests.quests("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_garbled_reply_is_parse_error() {
        let (mut session, _) = session(vec![Scripted::Text("definitely not json".to_string())]);
        let err = session.send("hello").await.unwrap_err();

        assert!(matches!(err, PlanError::Parse(_)));
        let last = session.transcript().last().unwrap();
        assert!(last.notice);
        assert_eq!(last.turn.content, GARBLED_NOTICE);
        assert!(session.staged().is_none());
    }

    #[tokio::test]
    async fn test_generation_failure_is_distinct() {
        let (mut session, _) = session(vec![Scripted::Status(503), Scripted::Status(503)]);
        let err = session.send("hello").await.unwrap_err();

        assert!(matches!(err, PlanError::Exhausted { .. }));
        assert_eq!(session.transcript().last().unwrap().turn.content, SILENT_NOTICE);
    }

    #[tokio::test]
    async fn test_notices_not_sent_to_model() {
        let (mut session, _) = session(vec![
            Scripted::Text("garbage".to_string()),
            Scripted::Text(CLARIFY.to_string()),
        ]);
        let _ = session.send("first").await;
        session.send("second").await.unwrap();

        let history = session.history();
        assert!(history.iter().all(|t| t.content != GARBLED_NOTICE));
        // greeting, first, second, reply
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (mut session, _) = session(vec![]);
        assert!(matches!(session.send("   ").await, Err(PlanError::EmptyMessage)));
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_pick_suggestion() {
        let (session, _) = session(vec![]);
        assert_eq!(session.pick_suggestion("2").as_deref(), Some("Plan my Goals"));
        assert_eq!(session.pick_suggestion("0"), None);
        assert_eq!(session.pick_suggestion("9"), None);
        assert_eq!(session.pick_suggestion("run"), None);
    }
}
