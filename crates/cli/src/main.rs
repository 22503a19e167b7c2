//! Nourish CLI - operate challenge progression over a local store.

mod definition;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use nourish_core::{
    ChallengeId, CheckinPayload, GoalId, GoalStatus, ParticipantId, PatientRef, PhaseStatus,
};
use nourish_progress::{Clock, FixedClock, ProgressError, ProgressionEngine, SystemClock};
use nourish_storage::{ChallengeRepository, JsonStorage, ParticipantRepository, Storage};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::definition::ChallengeDefinition;

#[derive(Parser)]
#[command(name = "nourish")]
#[command(about = "Challenge progression for nutrition habit programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Storage directory
    #[arg(long, global = true, default_value = ".nourish")]
    store: PathBuf,

    /// Act as if today were this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    on: Option<NaiveDate>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a challenge definition from a JSON file
    Import {
        /// Definition file
        file: PathBuf,
    },
    /// List challenges
    Challenges,
    /// Show a challenge's phases and goals in progression order
    Show {
        /// Challenge ID
        challenge: String,
    },
    /// Enroll a patient
    Enroll {
        /// Challenge ID
        challenge: String,
        /// Patient reference
        patient: String,
    },
    /// List participants of a challenge
    Participants {
        /// Challenge ID
        challenge: String,
    },
    /// Check in for today
    Checkin {
        /// Participant ID
        participant: String,
        /// Goal ID
        goal: String,
        /// Record the day as not done
        #[arg(long)]
        missed: bool,
        /// Measured value for metric goals
        #[arg(long)]
        metric: Option<f64>,
        /// Evidence reference for photo goals
        #[arg(long)]
        evidence: Option<String>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show a participant's progress
    Progress {
        /// Participant ID
        participant: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a participant's achievements
    Achievements {
        /// Participant ID
        participant: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let storage = Arc::new(
        JsonStorage::new(&cli.store)
            .await
            .with_context(|| format!("opening store at {}", cli.store.display()))?,
    );
    let clock: Arc<dyn Clock> = match cli.on {
        Some(date) => {
            debug!("Using fixed date {}", date);
            Arc::new(FixedClock::at_date(date))
        }
        None => Arc::new(SystemClock),
    };
    let engine = ProgressionEngine::new(storage.clone()).with_clock(clock);

    match cli.command {
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let imported = ChallengeDefinition::from_json(&text)?.build();
            imported.save(storage.as_ref()).await?;
            info!(
                "Imported challenge {} with {} phases and {} goals",
                imported.challenge.id,
                imported.phases.len(),
                imported.goals.len()
            );
            println!("Imported challenge: {} - {}", imported.challenge.id, imported.challenge.title);
        }
        Commands::Challenges => {
            let challenges = storage.list_challenges().await?;
            println!("Challenges ({})", challenges.len());
            for challenge in challenges {
                println!(
                    "  {} | {:?} | {} to {} - {}",
                    challenge.id, challenge.status, challenge.start_date, challenge.end_date, challenge.title
                );
            }
        }
        Commands::Show { challenge } => {
            let challenge_id: ChallengeId = parse_id(&challenge, "challenge")?;
            let Some(plan) = storage.load_plan(challenge_id).await? else {
                println!("Challenge not found");
                return Ok(());
            };

            println!("Challenge: {} - {}", plan.challenge.id, plan.challenge.title);
            for phase in plan.phases() {
                println!("  Phase {} ({}%): {}", phase.id, phase.completion_threshold, phase.name);
                for goal in plan.goals_in_phase(phase.id) {
                    println!("    {} | {} | {} days - {}", goal.id, goal.goal_type.as_str(), goal.duration_days, goal.title);
                }
            }
            for goal in plan.direct_goals() {
                println!("  {} | {} | {} days - {}", goal.id, goal.goal_type.as_str(), goal.duration_days, goal.title);
            }
        }
        Commands::Enroll { challenge, patient } => {
            let challenge_id: ChallengeId = parse_id(&challenge, "challenge")?;
            let participant = engine.enroll(challenge_id, PatientRef::new(patient)).await?;
            println!("Enrolled participant: {}", participant.id);
        }
        Commands::Participants { challenge } => {
            let challenge_id: ChallengeId = parse_id(&challenge, "challenge")?;
            let participants = storage.list_participants(challenge_id).await?;
            println!("Participants ({})", participants.len());
            for p in participants {
                println!(
                    "  {} | {} | streak {} (best {}){}",
                    p.id,
                    p.patient,
                    p.streak_count,
                    p.best_streak,
                    if p.badge_earned { " | BADGE" } else { "" }
                );
            }
        }
        Commands::Checkin { participant, goal, missed, metric, evidence, notes } => {
            let participant_id: ParticipantId = parse_id(&participant, "participant")?;
            let goal_id: GoalId = parse_id(&goal, "goal")?;
            let payload = CheckinPayload {
                completed: !missed,
                metric_value: metric,
                evidence_ref: evidence,
                notes,
            };

            match engine.submit_checkin(participant_id, goal_id, payload).await {
                Ok(outcome) => {
                    println!("Checked in: {} on {}", outcome.checkin.id, outcome.checkin.checkin_date);
                    println!("  Streak: {} (best {})", outcome.streak.current, outcome.streak.best);
                    if outcome.goal_completed {
                        println!("  Goal completed");
                    }
                    if outcome.phase_completed {
                        println!("  Phase completed");
                    }
                    if outcome.challenge_completed {
                        println!("  Challenge completed - badge earned");
                    }
                    for achievement in outcome.new_achievements {
                        println!("  Unlocked: {}", achievement);
                    }
                }
                Err(e @ ProgressError::DuplicateCheckin { .. }) => {
                    println!("Already checked in: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Progress { participant, json } => {
            let participant_id: ParticipantId = parse_id(&participant, "participant")?;
            let snapshot = engine.get_progress_snapshot(participant_id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }

            println!("Participant: {}", snapshot.participant_id);
            println!("  Streak: {} (best {})", snapshot.streak.current, snapshot.streak.best);
            if let Some(at) = snapshot.completed_at {
                println!("  Badge earned: {}", at);
            }
            for phase in &snapshot.phases {
                println!(
                    "  Phase {} | {} | {}/{} goals - {}",
                    phase.phase_id,
                    format_phase_status(phase.progress.status),
                    phase.progress.completed_goals,
                    phase.progress.total_goals,
                    phase.name
                );
            }
            for goal in &snapshot.goals {
                println!(
                    "    {} | {} | {}/{} days - {}",
                    goal.goal_id,
                    format_goal_status(goal.status),
                    goal.completed_days,
                    goal.duration_days,
                    goal.title
                );
            }
        }
        Commands::Achievements { participant } => {
            let participant_id: ParticipantId = parse_id(&participant, "participant")?;
            let snapshot = engine.get_progress_snapshot(participant_id).await?;
            println!("Achievements ({})", snapshot.achievements.len());
            for achievement in snapshot.achievements {
                println!("  {} | {}", achievement.earned_at, achievement.achievement_type);
            }
        }
    }

    Ok(())
}

fn parse_id<T: std::str::FromStr>(s: &str, what: &str) -> Result<T> {
    s.parse().map_err(|_| anyhow::anyhow!("Invalid {} ID: {}", what, s))
}

fn format_phase_status(status: PhaseStatus) -> &'static str {
    match status {
        PhaseStatus::Locked => "LOCKED",
        PhaseStatus::Active => "ACTIVE",
        PhaseStatus::Completed => "COMPLETED",
    }
}

fn format_goal_status(status: GoalStatus) -> &'static str {
    match status {
        GoalStatus::Locked => "LOCKED",
        GoalStatus::Active => "ACTIVE",
        GoalStatus::Completed => "COMPLETED",
        GoalStatus::Closed => "CLOSED",
    }
}
