//! Simulation driver for the tenman PUG core.
//!
//! Spins up an in-memory channel, queues a roster of bot players, and runs
//! a full session end to end: setup menus, ready check, team and map
//! selection, score settlement, loser policy. Useful for eyeballing the
//! whole flow without a chat platform attached.

use clap::Parser;
use std::sync::Arc;

use tenman::application::events::SessionEvent;
use tenman::commands::parse;
use tenman::domain::{MapMethod, Participant, SessionConfig, TeamMethod};
use tenman::infra::memory_channel::{AutoResponder, MemoryHub};
use tenman::infra::store::{SettingsStore, TomlFileStore};
use tenman::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "tenman", about = "Simulate a PUG session end to end")]
struct Cli {
    /// Number of bot players to queue (at least 10)
    #[arg(long, default_value_t = 12)]
    players: u64,

    /// Team selection method the owner picks: captains or random
    #[arg(long, default_value = "captains")]
    team_method: TeamMethod,

    /// Map selection method the owner picks: veto or vote
    #[arg(long, default_value = "veto")]
    map_method: MapMethod,

    /// Keep losers in the queue after the match
    #[arg(long)]
    losers_stay: bool,

    /// Print the full channel transcript at the end
    #[arg(long)]
    transcript: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if cli.players < 10 {
        anyhow::bail!("a PUG needs at least 10 players, got {}", cli.players);
    }

    let hub = MemoryHub::new();
    let store: Arc<dyn SettingsStore> = Arc::new(TomlFileStore::open());
    // Short timings: the bots answer instantly, so nothing waits a minute.
    let state = AppState::new(hub.clone(), store, SessionConfig::scaled(400));
    let dispatcher = state.dispatcher();

    let players: Vec<Participant> = (1..=cli.players)
        .map(|i| Participant::new(i, format!("player-{i}")))
        .collect();
    let owner = players[0].clone();

    let session = state.registry.start_session(owner.clone()).await?;
    let channel_id = session.id();
    let channel = hub
        .get(&channel_id)
        .ok_or_else(|| anyhow::anyhow!("hub lost {channel_id}"))?;
    AutoResponder::new(channel.clone())
        .prefer(cli.team_method.to_string())
        .prefer(cli.map_method.to_string())
        .prefer(if cli.losers_stay {
            "Losers Stay"
        } else {
            "Losers Leave"
        })
        .spawn();
    let mut events = session.subscribe();
    println!("PUG started in {channel_id} by {owner}");

    for member in &players[1..] {
        let reply = dispatcher
            .dispatch(&channel_id, member, parse("pug join")?)
            .await;
        log::info!("{member} joins: {reply}");
    }

    let teams = loop {
        match events.recv().await? {
            SessionEvent::QuorumReached { .. } => println!("Quorum reached, ready check underway"),
            SessionEvent::MatchStarted { map, teams, .. } => {
                println!("Match starting on {map}");
                for (team, name) in teams.iter().zip(["Blue", "Orange"]) {
                    let roster: Vec<&str> = team.iter().map(|p| p.name.as_str()).collect();
                    println!("  {name}: {}", roster.join(", "));
                }
                break teams;
            }
            _ => {}
        }
    };

    // Both teams report the same match from their own side.
    for (reporter, report) in [(&teams[0][0], "pug submit 13 7"), (&teams[1][0], "pug submit 7 13")]
    {
        let reply = dispatcher
            .dispatch(&channel_id, reporter, parse(report)?)
            .await;
        println!("{} reports: {reply}", reporter.name);
    }

    loop {
        if let SessionEvent::MatchEnded { score, .. } = events.recv().await? {
            match score {
                Some(score) => println!("Match settled: {score}"),
                None => println!("Match ended without a settled score"),
            }
            break;
        }
    }
    println!(
        "Queue after the match: {} players, phase {}",
        session.queue_len(),
        session.phase()
    );

    let reply = dispatcher
        .dispatch(&channel_id, &owner, parse("pug stop")?)
        .await;
    println!("Stopping: {reply}");
    state.registry.shutdown().await;

    if cli.transcript {
        println!("--- transcript of {channel_id} ---");
        for message in channel.transcript() {
            println!("{message}\n");
        }
    }
    Ok(())
}
