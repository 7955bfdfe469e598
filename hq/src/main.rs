//! HabitQuest - gamified habit building
//!
//! CLI entry point for quests, progression, the guild and the AI coach.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use habitquest::cli::{Cli, Command, GuildCommand, OnboardingCommand, OutputFormat};
use habitquest::config::Config;
use habitquest::domain::{Quest, TaskDraft, TaskType};
use habitquest::feed::{DashboardView, FeedHandle};
use habitquest::guild::GuildManager;
use habitquest::locking::LockState;
use habitquest::planning::{PlanOrchestrator, PlanningSession};
use habitquest::profile::ProfileService;
use habitquest::quest::QuestManager;
use habitquest::state::{Persistence, StateManager};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("habitquest")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("habitquest.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Services sharing one state actor
struct App {
    config: Config,
    user: String,
    state: Arc<dyn Persistence>,
    quests: QuestManager,
    profiles: ProfileService,
    guild: GuildManager,
}

impl App {
    fn open(config: Config, user: String) -> Result<Self> {
        debug!(db = %config.storage.database_path.display(), %user, "App::open: called");
        let state: Arc<dyn Persistence> = Arc::new(
            StateManager::spawn(&config.storage.database_path).context("Failed to open the HabitQuest database")?,
        );
        Ok(Self {
            quests: QuestManager::new(state.clone()),
            profiles: ProfileService::new(state.clone()),
            guild: GuildManager::new(state.clone()),
            state,
            config,
            user,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    info!(db = %config.storage.database_path.display(), "HabitQuest loaded config");

    let Some(command) = cli.command else {
        debug!("main: no command, showing profile");
        let app = App::open(config, cli.user)?;
        app.profiles.ensure_profile(&app.user, None).await?;
        return cmd_profile(&app, OutputFormat::Text).await;
    };

    let app = App::open(config, cli.user)?;
    if !matches!(command, Command::DeleteAccount { .. } | Command::Leaderboard { .. }) {
        app.profiles.ensure_profile(&app.user, None).await?;
    }

    debug!(?command, "main: dispatching command");
    match command {
        Command::Profile { format } => cmd_profile(&app, format).await,
        Command::Rename { name } => {
            let profile = app.profiles.set_display_name(&app.user, &name).await?;
            println!("You are now known as {}.", profile.name_or_default().bold());
            Ok(())
        }
        Command::Avatar { avatar } => {
            app.profiles.set_avatar(&app.user, &avatar).await?;
            println!("Avatar updated.");
            Ok(())
        }
        Command::Quests { format } => cmd_quests(&app, format).await,
        Command::Tasks { format } => cmd_tasks(&app, format).await,
        Command::AddTask {
            title,
            quest,
            task_type,
            xp,
        } => cmd_add_task(&app, &title, quest.as_deref(), task_type, xp).await,
        Command::Complete { id } => cmd_complete(&app, &id).await,
        Command::Equip { id } => {
            let quest = app.quests.equip(&app.user, &id).await?;
            println!("{} {}", "Equipped".green().bold(), quest.title);
            Ok(())
        }
        Command::Unequip { id } => {
            let quest = app.quests.unequip(&app.user, &id).await?;
            println!("Unequipped {}", quest.title);
            Ok(())
        }
        Command::DeleteQuest { id } => {
            let removed = app.quests.delete_quest(&app.user, &id).await?;
            println!("Quest deleted along with {} task(s).", removed);
            Ok(())
        }
        Command::DeleteTask { id } => {
            app.quests.delete_task(&app.user, &id).await?;
            println!("Task deleted.");
            Ok(())
        }
        Command::ResetDaily => {
            let reopened = app.quests.reset_daily(&app.user).await?;
            println!("{} daily task(s) reopened.", reopened);
            Ok(())
        }
        Command::Leaderboard { limit, format } => {
            let limit = limit.unwrap_or(app.config.storage.leaderboard_size);
            cmd_leaderboard(&app, limit, format).await
        }
        Command::Plan => cmd_plan(&app).await,
        Command::Guild { command } => cmd_guild(&app, command).await,
        Command::Onboarding { command } => {
            match command {
                OnboardingCommand::Ack => {
                    app.profiles.acknowledge_onboarding(&app.user).await?;
                    println!("Honor code acknowledged. Your quest begins.");
                }
                OnboardingCommand::Reset => {
                    app.profiles.reset_onboarding(&app.user).await?;
                    println!("Onboarding will be shown again.");
                }
            }
            Ok(())
        }
        Command::DeleteAccount { yes } => cmd_delete_account(&app, yes).await,
        Command::Watch => cmd_watch(&app).await,
    }
}

async fn cmd_profile(app: &App, format: OutputFormat) -> Result<()> {
    debug!(user = %app.user, "cmd_profile: called");
    let stats = app.profiles.stats(&app.user).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let p = &stats.progression;
    println!("{}", stats.profile.name_or_default().bold());
    println!(
        "Level {}  {} / {} XP  ({:.0}%)",
        p.level.to_string().yellow().bold(),
        p.xp,
        p.next_level_xp,
        p.progress * 100.0
    );
    if p.badges.is_empty() {
        println!("Badges: none yet (first at level {})", p.next_badge_level);
    } else {
        let badges: Vec<String> = p.badges.iter().map(|l| format!("Lv{}", l)).collect();
        println!("Badges: {}", badges.join(" ").cyan());
    }
    println!(
        "Tasks: {}/{} complete ({}%)",
        stats.completed_tasks, stats.total_tasks, stats.completion_rate
    );

    if app.profiles.needs_display_name(&app.user).await? {
        println!("\nChoose a name with {}", "hq rename <name>".bold());
    }
    if !app.profiles.preferences(&app.user).await?.onboarding_acknowledged {
        println!("Accept the honor code with {}", "hq onboarding ack".bold());
    }
    Ok(())
}

async fn cmd_quests(app: &App, format: OutputFormat) -> Result<()> {
    debug!(user = %app.user, "cmd_quests: called");
    let quests = app.quests.quests(&app.user).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&quests)?);
        return Ok(());
    }
    if quests.is_empty() {
        println!("No quests yet. Start one with {}", "hq plan".bold());
        return Ok(());
    }
    for quest in &quests {
        print_quest(quest);
    }
    Ok(())
}

fn print_quest(quest: &Quest) {
    let marker = if quest.is_active {
        "*".green().bold()
    } else {
        " ".normal()
    };
    println!(
        "{} {}  {}  {}",
        marker,
        quest.id.dimmed(),
        quest.title,
        quest.created_at_utc().format("%Y-%m-%d").to_string().dimmed()
    );
}

async fn cmd_tasks(app: &App, format: OutputFormat) -> Result<()> {
    debug!(user = %app.user, "cmd_tasks: called");
    let views = app.quests.task_views(&app.user, Utc::now()).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    if views.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for view in &views {
        let task = &view.task;
        let status = if task.is_complete {
            "[x]".green()
        } else if let LockState::Locked { unlocks_in_days } = view.lock {
            format!("[locked {}d]", unlocks_in_days).red()
        } else {
            "[ ]".normal()
        };
        println!(
            "{:<14} {:<10} {:>4} XP  {}  {}",
            status,
            task.task_type.to_string(),
            task.xp,
            task.title,
            task.id.dimmed()
        );
    }
    Ok(())
}

async fn cmd_add_task(app: &App, title: &str, quest: Option<&str>, task_type: TaskType, xp: u32) -> Result<()> {
    debug!(%title, ?quest, %task_type, xp, "cmd_add_task: called");
    let task = app
        .quests
        .add_task_with(&app.user, quest, TaskDraft::new(title, task_type, xp))
        .await?;
    println!("Added {} ({})", task.title.bold(), task.id.dimmed());
    Ok(())
}

async fn cmd_complete(app: &App, id: &str) -> Result<()> {
    debug!(%id, "cmd_complete: called");
    let outcome = app.quests.complete_task(&app.user, id).await?;
    println!("{} +{} XP", "Quest progress!".green().bold(), outcome.xp_awarded);
    if outcome.leveled_up() {
        println!(
            "{} You reached level {}!",
            "LEVEL UP!".yellow().bold(),
            outcome.level_after()
        );
    }
    Ok(())
}

async fn cmd_leaderboard(app: &App, limit: usize, format: OutputFormat) -> Result<()> {
    debug!(limit, "cmd_leaderboard: called");
    let board = app.profiles.leaderboard(limit).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }
    for entry in &board {
        let line = format!(
            "{:>3}. {:<24} Lv{:<4} {:>8} XP",
            entry.rank, entry.display_name, entry.level, entry.xp
        );
        if entry.user_id == app.user {
            println!("{}", line.bold());
        } else {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn cmd_plan(app: &App) -> Result<()> {
    debug!(user = %app.user, "cmd_plan: called");
    app.config.validate()?;
    let orchestrator = PlanOrchestrator::from_config(&app.config.ai)?;
    let mut session = PlanningSession::new(orchestrator, app.quests.clone(), &app.user);

    if let Some(quest) = session.run_interactive().await? {
        println!("Run {} to see your tasks.", "hq tasks".bold());
        info!(quest_id = %quest.id, "cmd_plan: quest accepted");
    }
    Ok(())
}

async fn cmd_guild(app: &App, command: GuildCommand) -> Result<()> {
    debug!(?command, "cmd_guild: called");
    match command {
        GuildCommand::Create { name } => {
            let party = app.guild.create_party(&app.user, &name).await?;
            println!("Party {} founded.", party.name.bold());
            println!("Invite code: {}", party.invite_code.yellow().bold());
        }
        GuildCommand::Join { code } => {
            let party = app.guild.join_party(&app.user, &code).await?;
            println!("Welcome to {}!", party.name.bold());
        }
        GuildCommand::Leave => {
            app.guild.leave_party(&app.user).await?;
            println!("You left the guild.");
        }
        GuildCommand::Show => match app.guild.overview(&app.user).await? {
            Some(overview) => {
                println!(
                    "{}  (invite code {})",
                    overview.party.name.bold(),
                    overview.party.invite_code.yellow()
                );
                for member in &overview.members {
                    println!(
                        "  {:<24} Lv{:<4} {:>8} XP",
                        member.display_name, member.level, member.xp
                    );
                }
            }
            None => println!("You are not in a party. Create one or join with an invite code."),
        },
    }
    Ok(())
}

async fn cmd_delete_account(app: &App, yes: bool) -> Result<()> {
    debug!(user = %app.user, yes, "cmd_delete_account: called");
    if !yes {
        print!("Delete every record for '{}'? Type 'yes' to confirm: ", app.user);
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if answer.trim() != "yes" {
            println!("Aborted.");
            return Ok(());
        }
    }
    app.profiles.delete_account(&app.user).await?;
    println!("Account deleted.");
    Ok(())
}

async fn cmd_watch(app: &App) -> Result<()> {
    debug!(user = %app.user, "cmd_watch: called");
    let feed = FeedHandle::spawn(app.state.clone(), &app.user).await?;
    let mut updates = feed.subscribe();
    print_dashboard(&feed.view());
    println!("{}", "Watching for changes (Ctrl+C to stop)".dimmed());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("cmd_watch: interrupted");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                print_dashboard(&view);
            }
        }
    }

    feed.shutdown().await;
    Ok(())
}

fn print_dashboard(view: &DashboardView) {
    let name = view
        .profile
        .as_ref()
        .map(|p| p.name_or_default().to_string())
        .unwrap_or_default();
    let open = view.tasks.iter().filter(|t| !t.is_complete).count();
    let active = view.active_quest().map(|q| q.title.as_str()).unwrap_or("none");
    let provisional = if view.is_provisional() { " (pending)" } else { "" };
    println!(
        "[rev {}] {}  Lv{}  {} XP  active: {}  open tasks: {}{}",
        view.revision,
        name.bold(),
        view.progression.level,
        view.xp(),
        active,
        open,
        provisional
    );
}
