//! Terminal view over the plenary votes proxy.

use anyhow::{anyhow, Context};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plenary_votes::client::{
    DetailSession, DetailState, FanOut, IdentityResolver, SubResource, ViewClient, VoteCategory,
    DEFAULT_PROXY_URL,
};

/// Browse recent plenary sittings and how members voted
#[derive(Parser)]
#[command(name = "plenary")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base URL of the caching proxy
    #[arg(long, env = "PLENARY_PROXY_URL", default_value = DEFAULT_PROXY_URL)]
    proxy: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the most recent meetings of a year, newest first
    Meetings {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value_t = 20)]
        window: u64,
    },

    /// Show one meeting with all of its sub-resources
    Detail { meeting_id: String },

    /// List the members behind one vote category of a decision
    Voters {
        meeting_id: String,
        decision_id: String,
        category: VoteCategory,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plenary_votes=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let client = ViewClient::new(cli.proxy.as_str())?;

    match cli.command {
        Command::Meetings { year, window } => {
            let year = year.unwrap_or_else(|| chrono::Utc::now().year());
            let meetings = client
                .recent_meetings(year, window)
                .await
                .map_err(|e| anyhow!(e.user_message()))
                .with_context(|| format!("loading meetings for {}", year))?;

            for meeting in meetings {
                println!(
                    "{:<24} {:<20} {:<12} {}",
                    meeting.id, meeting.date, meeting.location, meeting.title
                );
            }
        }
        Command::Detail { meeting_id } => {
            let mut session = DetailSession::new();
            let ticket = session.select(&meeting_id);
            let outcome = client.meeting_detail(&meeting_id).await;
            session.accept(&ticket, outcome);

            match session.state() {
                DetailState::Ready(detail) => {
                    let summary = detail.summary();
                    println!("{} ({})", summary.title, summary.id);
                    println!("{} · {} · {}", summary.date, summary.location, summary.activity_type);
                    for resource in SubResource::ALL.into_iter().skip(1) {
                        println!("  {:<20} {}", resource.to_string(), detail.count(resource));
                    }
                    for decision in detail.vote_decisions() {
                        println!(
                            "  [{}] {} (+{} -{} ={})",
                            decision.id,
                            decision.label,
                            decision.favor.len(),
                            decision.against.len(),
                            decision.abstain.len()
                        );
                    }
                }
                DetailState::Error(message) => return Err(anyhow!(message.clone())),
                DetailState::Idle | DetailState::Loading => {}
            }
        }
        Command::Voters {
            meeting_id,
            decision_id,
            category,
        } => {
            let detail = match client.meeting_detail(&meeting_id).await {
                FanOut::Complete(detail) => detail,
                FanOut::Failed { resource, error } => {
                    return Err(anyhow!(
                        "loading {} of {}: {}",
                        resource,
                        meeting_id,
                        error.user_message()
                    ));
                }
            };

            let decision = detail
                .vote_decisions()
                .into_iter()
                .find(|decision| decision.id == decision_id)
                .ok_or_else(|| anyhow!("No decision {} in meeting {}", decision_id, meeting_id))?;

            let resolver = IdentityResolver::new(client.clone());
            let mut session = DetailSession::new();
            session.select(&meeting_id);
            let rows = session
                .expand_decision(&resolver, &decision, category)
                .await
                .unwrap_or_default();

            println!("{} · {} ({})", decision.label, category, rows.len());
            for row in rows {
                let marker = if row.resolved { " " } else { "?" };
                println!("{} {:<10} {}", marker, row.id, row.name);
            }
        }
    }

    Ok(())
}
