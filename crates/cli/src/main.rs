//! Stella CLI - Command-line client for Stella job coordination

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::sync::Arc;
use stella_sdk::{
    ChatSession, ChatState, EnqueueRequest, HttpTransport, JobState, JobTransport, MessageRole,
    MissionClient, SdkError,
};
use tabled::{Table, Tabled};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8787";

#[derive(Parser)]
#[command(name = "stella")]
#[command(about = "Stella Academy job CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Job API base URL
    #[arg(long, env = "STELLA_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question and wait for the answer
    Ask {
        /// Question text
        prompt: String,

        /// Lesson context sent along with the question
        #[arg(short, long)]
        context: Option<String>,

        /// Print the job id and return without waiting
        #[arg(long)]
        no_wait: bool,
    },

    /// Generate the mission plan for a role
    Mission {
        /// Learner role (e.g. explorer)
        #[arg(short, long)]
        role: String,

        /// Mission date, YYYY-MM-DD (default: today, UTC)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Show the status of a job
    Status {
        /// Job ID
        job_id: String,
    },

    /// Check that the daemon is up
    Health,
}

#[derive(Tabled)]
struct StatusRow {
    job_id: String,
    state: String,
    error: String,
}

#[derive(Tabled)]
struct TopicRow {
    #[tabled(rename = "#")]
    index: usize,
    title: String,
    summary: String,
    images: usize,
}

#[derive(Deserialize)]
struct HealthBody {
    status: String,
    version: String,
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

async fn ask(transport: Arc<HttpTransport>, prompt: String, context: Option<String>) -> Result<()> {
    let session = ChatSession::new(transport);
    let mut updates = session.subscribe();
    let mut task = session.send_message(prompt, context);
    let mut last_state: Option<JobState> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.stop();
                println!("{}", "✗ Stopped".yellow());
                return Ok(());
            }
            joined = &mut task => {
                joined.context("Poll task failed")?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let job_state = updates.borrow_and_update().job_state;
                if job_state.is_some() && job_state != last_state {
                    if let Some(state) = job_state {
                        println!("  {} {}", "…".dimmed(), state.to_string().dimmed());
                    }
                    last_state = job_state;
                }
            }
        }
    }

    let answer = final_answer(&session.state())?;
    println!("{}", answer);
    Ok(())
}

/// Answer text of a finished session, or the job's error
fn final_answer(state: &ChatState) -> Result<String> {
    match state.messages.last() {
        Some(m) if m.role == MessageRole::Assistant => Ok(m.content.clone()),
        Some(m) if m.role == MessageRole::Error => Err(anyhow::anyhow!("{}", m.content))
            .context("Question could not be answered"),
        _ => anyhow::bail!("No answer received"),
    }
}

async fn mission(transport: Arc<HttpTransport>, role: String, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    println!(
        "{}",
        format!("Generating mission for {} on {}...", role, date).cyan().bold()
    );

    let plan = match MissionClient::new(transport).generate(&role, date).await {
        Ok(plan) => plan,
        Err(SdkError::Duplicate(_)) => {
            println!(
                "{}",
                "○ This mission was triggered recently; try again later".yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("Mission generation failed"),
    };

    println!();
    println!("{}", plan.mission_title.green().bold());
    println!("{}", plan.introduction);
    println!();

    let rows: Vec<TopicRow> = plan
        .topics
        .iter()
        .enumerate()
        .map(|(i, t)| TopicRow {
            index: i + 1,
            title: t.title.clone(),
            summary: truncate(&t.summary, 60),
            images: t.images.len(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let transport = Arc::new(
        HttpTransport::new(&cli.api_url).context("Invalid API URL")?,
    );

    match cli.command {
        Commands::Ask {
            prompt,
            context,
            no_wait,
        } => {
            if no_wait {
                let mut request = EnqueueRequest::ask(prompt);
                request.context = context;
                let job_id = transport.enqueue(&request).await?;
                println!("{}", "✓ Job enqueued".green().bold());
                println!("  {} {}", "Job ID:".bold(), job_id);
            } else {
                ask(transport, prompt, context).await?;
            }
        }

        Commands::Mission { role, date } => {
            mission(transport, role, date).await?;
        }

        Commands::Status { job_id } => {
            let status = transport.status(&job_id).await?;
            let state = match status.state {
                JobState::Completed => status.state.to_string().green().to_string(),
                JobState::Failed => status.state.to_string().red().to_string(),
                _ => status.state.to_string().yellow().to_string(),
            };
            let row = StatusRow {
                job_id,
                state,
                error: status.error.clone().unwrap_or_default(),
            };
            println!("{}", Table::new(vec![row]));

            if let Some(result) = status.result {
                println!();
                println!("{}", "Result:".bold());
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }

        Commands::Health => {
            println!("{}", "Daemon Health".cyan().bold());
            println!();

            let url = format!("{}/health", transport.base_url());
            match reqwest::get(&url).await {
                Ok(response) => {
                    let body: HealthBody =
                        response.json().await.context("Failed to parse response")?;
                    println!("  {} {}", "API URL:".bold(), cli.api_url);
                    println!("  {} {}", "Status:".bold(), body.status.to_uppercase().green());
                    println!("  {} {}", "Version:".bold(), body.version);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "OFFLINE".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
