//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::TaskType;

/// HabitQuest - gamified habit building from the terminal
#[derive(Parser)]
#[command(
    name = "hq",
    about = "Quests, XP and an AI coach for building habits",
    version = env!("CARGO_PKG_VERSION"),
    after_help = generate_after_help(),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// User whose records the command acts on
    #[arg(short, long, global = true, default_value = "local")]
    pub user: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show profile, level and badges
    Profile {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Set your display name
    Rename {
        /// New display name
        name: String,
    },

    /// Set your avatar (image URL or preset name)
    Avatar {
        avatar: String,
    },

    /// List quests, newest first
    Quests {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List tasks with their lock state
    Tasks {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a task to a quest, or a general task without one
    AddTask {
        /// Task title
        title: String,

        /// Quest ID to attach the task to
        #[arg(short, long)]
        quest: Option<String>,

        /// Task type (daily, weekly, milestone)
        #[arg(short = 't', long = "type", default_value = "daily")]
        task_type: TaskType,

        /// XP awarded on completion
        #[arg(short, long, default_value_t = crate::quest::QUICK_ADD_XP)]
        xp: u32,
    },

    /// Complete a task and collect its XP
    Complete {
        /// Task ID
        id: String,
    },

    /// Make a quest the active one
    Equip {
        /// Quest ID
        id: String,
    },

    /// Deactivate a quest
    Unequip {
        /// Quest ID
        id: String,
    },

    /// Delete a quest and all of its tasks
    DeleteQuest {
        /// Quest ID
        id: String,
    },

    /// Delete a single task
    DeleteTask {
        /// Task ID
        id: String,
    },

    /// Reopen completed daily tasks
    ResetDaily,

    /// Show the top adventurers by XP
    Leaderboard {
        /// Number of entries (defaults to storage.leaderboard-size)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Plan a new quest with the AI coach (interactive)
    Plan,

    /// Manage your guild party
    Guild {
        #[command(subcommand)]
        command: GuildCommand,
    },

    /// Onboarding honor code
    Onboarding {
        #[command(subcommand)]
        command: OnboardingCommand,
    },

    /// Delete your profile and every record you own
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Follow the dashboard live, printing every refresh
    Watch,
}

/// Guild subcommands
#[derive(Debug, Subcommand)]
pub enum GuildCommand {
    /// Create a party and get its invite code
    Create {
        /// Party name
        name: String,
    },

    /// Join a party by invite code
    Join {
        /// Invite code (case-insensitive)
        code: String,
    },

    /// Leave your party
    Leave,

    /// Show your party and its members
    Show,
}

/// Onboarding subcommands
#[derive(Debug, Subcommand)]
pub enum OnboardingCommand {
    /// Acknowledge the honor code
    Ack,

    /// Show the onboarding again next time
    Reset,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("habitquest")
        .join("logs")
        .join("habitquest.log")
}

/// Help footer listing where logs go
pub fn generate_after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}

/// Output format for listing commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json.", s)),
        }
    }
}
