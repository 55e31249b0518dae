use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use cribbage_scoreboard::constants::{
    is_supported_player_count, ADVANCE_OPTIONS, COMMIT_DELAY_MS, MAX_PLAYERS, MAX_SCORE,
    MIN_PLAYERS,
};
use cribbage_scoreboard::engine::{GameEngine, GameEngineOptions, MonotonicClock};
use cribbage_scoreboard::types::{CommitCause, ScoreEvent, Snapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 4)]
    sessions: usize,
    #[arg(long, default_value_t = 2_000)]
    actions: usize,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    seed: u64,
    #[serde(rename = "playerCount")]
    player_count: usize,
    actions: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
struct SessionCounters {
    commits: usize,
    #[serde(rename = "timerCommits")]
    timer_commits: usize,
    settlements: usize,
    cancels: usize,
    undos: usize,
    resets: usize,
    wins: usize,
    rejected: usize,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u64,
    actions: usize,
    #[serde(rename = "finalScores")]
    final_scores: Vec<u32>,
    winner: Option<usize>,
    counters: SessionCounters,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    action: usize,
    message: String,
}

#[derive(Clone, Debug)]
struct ScenarioRunResult {
    result: ScenarioResultLine,
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "totalWins")]
    total_wins: usize,
    scenarios: Vec<ScenarioResultLine>,
}

fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let cli = Cli::parse();
    let clock = MonotonicClock::new();
    let run_started_at_ms = clock.now_ms();
    let scenarios = resolve_scenarios(&cli, run_started_at_ms);
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));

    let mut scenario_results = Vec::new();
    let mut total_anomalies = 0usize;
    for scenario in scenarios {
        info!(
            match_id,
            scenario = scenario.name,
            seed = scenario.seed,
            player_count = scenario.player_count,
            actions = scenario.actions,
            "scenario started"
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            warn!(
                match_id,
                scenario = scenario.name,
                seed = scenario.seed,
                action = anomaly.action,
                message = anomaly.message,
                "anomaly detected"
            );
        }
        total_anomalies += scenario_run.anomaly_records.len();

        info!(
            match_id,
            scenario = scenario.name,
            wins = scenario_run.result.counters.wins,
            commits = scenario_run.result.counters.commits,
            anomaly_count = scenario_run.anomaly_records.len(),
            "scenario finished"
        );
        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => error!(%error, "failed to serialize scenario result"),
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        clock.now_ms(),
        scenario_results,
        total_anomalies,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            error!(match_id, path = %path.display(), %error, "summary write failed");
            std::process::exit(2);
        }
    }

    info!(
        match_id,
        scenario_count = summary.scenario_count,
        anomaly_count = summary.anomaly_count,
        total_wins = summary.total_wins,
        "run finished"
    );

    if summary.anomaly_count > 0 {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let mut engine = GameEngine::new(GameEngineOptions {
        player_count: scenario.player_count,
        ..GameEngineOptions::default()
    });

    let mut counters = SessionCounters::default();
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut now_ms = 0u64;

    for action in 0..scenario.actions {
        now_ms += rng.random_range(0..=COMMIT_DELAY_MS / 2);
        engine.step(now_ms);

        let player = rng.random_range(0..engine.player_count());
        let roll = rng.random_range(0..100);
        let result = if roll < 70 {
            let value = ADVANCE_OPTIONS[rng.random_range(0..ADVANCE_OPTIONS.len())];
            engine.advance(player, value, now_ms)
        } else if roll < 82 {
            engine.undo(player)
        } else if roll < 92 {
            engine.commit_now(player)
        } else if roll < 97 {
            engine.reset();
            Ok(())
        } else {
            engine.set_player_count(rng.random_range(MIN_PLAYERS..=MAX_PLAYERS))
        };
        if result.is_err() {
            counters.rejected += 1;
        }

        let snapshot = engine.build_snapshot(now_ms, true);
        count_events(&mut counters, &snapshot.events);
        for message in collect_snapshot_anomalies(&snapshot) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                action,
                message,
            );
        }
    }

    engine.step(now_ms + COMMIT_DELAY_MS);
    let snapshot = engine.build_snapshot(now_ms + COMMIT_DELAY_MS, true);
    count_events(&mut counters, &snapshot.events);
    if snapshot.players.iter().any(|player| player.pending) {
        push_anomaly(
            &mut anomalies,
            &mut anomaly_records,
            &mut anomaly_seen,
            scenario.actions,
            "buffer still pending after its countdown".to_string(),
        );
    }

    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            actions: scenario.actions,
            final_scores: snapshot.players.iter().map(|player| player.score).collect(),
            winner: snapshot.winner,
            counters,
            anomalies,
        },
        anomaly_records,
    }
}

fn count_events(counters: &mut SessionCounters, events: &[ScoreEvent]) {
    for event in events {
        match event {
            ScoreEvent::BatchCommitted { cause, .. } => {
                counters.commits += 1;
                match cause {
                    CommitCause::Timer => counters.timer_commits += 1,
                    CommitCause::Settlement => counters.settlements += 1,
                    CommitCause::Explicit => {}
                }
            }
            ScoreEvent::BufferCancelled { .. } => counters.cancels += 1,
            ScoreEvent::BatchUndone { .. } => counters.undos += 1,
            ScoreEvent::GameReset => counters.resets += 1,
            ScoreEvent::PlayerWon { .. } => counters.wins += 1,
            _ => {}
        }
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot) -> Vec<String> {
    let mut anomalies = Vec::new();
    if !is_supported_player_count(snapshot.player_count)
        || snapshot.players.len() != snapshot.player_count
    {
        anomalies.push(format!(
            "invalid player configuration: count {} with {} players",
            snapshot.player_count,
            snapshot.players.len()
        ));
    }

    let mut pending = 0;
    for player in &snapshot.players {
        let sum: u32 = player.batches.iter().map(|batch| batch.value).sum();
        if sum != player.score {
            anomalies.push(format!(
                "player {} score {} differs from batch sum {sum}",
                player.index, player.score
            ));
        }
        if player.score > MAX_SCORE {
            anomalies.push(format!("player {} score above max: {}", player.index, player.score));
        }
        let mut running = 0u32;
        for batch in &player.batches {
            running += batch.value;
            if batch.value == 0 || batch.score_after != running {
                anomalies.push(format!("player {} has a batch that does not replay", player.index));
                break;
            }
        }
        if player.pending != (player.buffer > 0)
            || player.pending != player.buffer_started_at_ms.is_some()
            || player.pending != player.commit_due_at_ms.is_some()
        {
            anomalies.push(format!("player {} pending flags disagree", player.index));
        }
        if player.pending {
            pending += 1;
        }
    }
    if pending > 1 {
        anomalies.push(format!("{pending} players pending at once"));
    }

    if let Some(winner) = snapshot.winner {
        let finished = snapshot
            .players
            .get(winner)
            .is_some_and(|player| player.score == MAX_SCORE);
        if !finished {
            anomalies.push(format!("winner {winner} is not at the finish"));
        }
        if pending > 0 {
            anomalies.push("buffer pending after the game was won".to_string());
        }
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli, fallback_seed: u64) -> Vec<Scenario> {
    let seed = cli.seed.unwrap_or(fallback_seed);
    (0..cli.sessions.max(1))
        .map(|index| {
            let player_count = MIN_PLAYERS + index % (MAX_PLAYERS - MIN_PLAYERS + 1);
            Scenario {
                name: format!("soak-{player_count}p-{}", index + 1),
                seed: seed.wrapping_add(index as u64),
                player_count,
                actions: cli.actions,
            }
        })
        .collect()
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    action: usize,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        action,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u64, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    anomaly_count: usize,
) -> RunSummary {
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        scenario_count: scenarios.len(),
        anomaly_count,
        total_wins: scenarios.iter().map(|scenario| scenario.counters.wins).sum(),
        scenarios,
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_scenario_result(wins: usize) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            actions: 10,
            final_scores: vec![0, 0],
            winner: None,
            counters: SessionCounters {
                wins,
                ..SessionCounters::default()
            },
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn resolve_scenarios_alternates_player_counts() {
        let cli = Cli {
            seed: Some(7),
            sessions: 3,
            actions: 50,
            match_id: None,
            summary_out: None,
        };
        let scenarios = resolve_scenarios(&cli, 0);
        let counts: Vec<usize> = scenarios.iter().map(|scenario| scenario.player_count).collect();
        assert_eq!(counts, vec![2, 3, 2]);
        assert_eq!(scenarios[1].seed, 8);
    }

    #[test]
    fn build_run_summary_totals_wins() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![make_scenario_result(2), make_scenario_result(3)],
            0,
        );
        assert_eq!(summary.total_wins, 5);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn soak_run_finds_no_anomalies() {
        for (index, player_count) in [2usize, 3].into_iter().enumerate() {
            let run = run_scenario(&Scenario {
                name: "test".to_string(),
                seed: 1_234 + index as u64,
                player_count,
                actions: 3_000,
            });
            assert!(
                run.anomaly_records.is_empty(),
                "anomalies: {:?}",
                run.result.anomalies
            );
            assert!(run.result.counters.commits > 0);
        }
    }

    #[test]
    fn collect_snapshot_anomalies_flags_tampered_snapshot() {
        let mut engine = GameEngine::new(GameEngineOptions::default());
        engine.advance(0, 5, 0).expect("advance");
        engine.advance(1, 2, 10).expect("advance");
        let mut snapshot = engine.build_snapshot(10, false);
        assert!(collect_snapshot_anomalies(&snapshot).is_empty());

        snapshot.players[0].score += 1;
        snapshot.players[0].pending = true;
        snapshot.players[0].buffer = 3;
        snapshot.players[0].buffer_started_at_ms = Some(0);
        snapshot.players[0].commit_due_at_ms = Some(2_000);
        let anomalies = collect_snapshot_anomalies(&snapshot);
        assert!(anomalies.iter().any(|message| message.contains("batch sum")));
        assert!(anomalies.iter().any(|message| message.contains("pending at once")));
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("scoreboard-missing-{}", rand::random::<u64>()))
            .join("summary.json");
        let summary = build_run_summary("sim-1-1".to_string(), 1, 2, Vec::new(), 0);
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same".to_string());

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, 10);
        assert_eq!(records[1].action, 11);
    }
}
