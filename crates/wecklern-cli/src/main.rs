//! CLI for wecklern.
//!
//! Records alarm dismissals, runs training steps, replays dismissal logs and
//! simulates sleepers. It is the external caller around the learning core: the
//! agent snapshot, the outcome store, the ingest cursor and the episode history
//! live as files in the data directory between invocations.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wecklern_core::event::DismissalEvent;
use wecklern_core::{
    Learner, MelodyDescriptor, Outcome, OutcomeStore, SharedOutcomeStore, StateKey, StepReport,
};
use wecklern_feedback::{EpisodeAnalyzer, EpisodeRecord, ExplorationProposal};
use wecklern_qlearn::env::{run_episodes, SimulatedSleeper};
use wecklern_qlearn::{AgentConfig, MelodyAgent};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory for agent snapshot, outcome store, history and ingest cursor
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Log debug output to stderr (RUST_LOG is honored otherwise)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an alarm dismissal
    Dismiss {
        /// Seconds between alarm and dismissal
        #[arg(long)]
        snooze: u32,

        /// Melody that was playing (default: the currently offered melody)
        #[arg(long)]
        melody: Option<MelodyDescriptor>,
    },
    /// Run one training step on the latest dismissal and publish the next melody
    Step {
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Replay dismissal events from a JSONL file, one training step per event
    Ingest {
        /// Input file path
        #[arg(long)]
        path: PathBuf,

        /// Start from line number (0-based) - overrides the saved cursor
        #[arg(long)]
        line_offset: Option<u64>,

        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Train a fresh in-memory agent against a simulated sleeper
    Simulate {
        /// Number of simulated alarms
        #[arg(long, default_value = "200")]
        episodes: usize,

        /// Pitch the simulated sleeper reacts to fastest
        #[arg(long, default_value = "67")]
        preferred_pitch: i32,

        /// Leave the per-episode curve out of the output
        #[arg(long)]
        summary_only: bool,

        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Analyze the episode history and propose exploration changes
    Analyze {
        /// Minimum number of episodes before anything is proposed
        #[arg(long, default_value = "10")]
        min_episodes: usize,

        /// Minimum confidence for a proposal
        #[arg(long, default_value = "0.5")]
        min_confidence: f32,
    },
    /// Show the offered melody and the agent's state
    Show,
}

/// Agent configuration. Only used when no agent snapshot exists yet; a
/// snapshot carries its own configuration.
#[derive(Args, Debug, Default, Clone)]
struct AgentArgs {
    /// JSON file with an agent configuration (missing fields take defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    action_size: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    discount_factor: Option<f64>,

    #[arg(long)]
    exploration_rate: Option<f64>,

    #[arg(long)]
    exploration_decay: Option<f64>,

    #[arg(long)]
    max_snooze_seconds: Option<u32>,

    /// Seed for the exploration RNG
    #[arg(long)]
    seed: Option<u64>,
}

impl AgentArgs {
    fn resolve(&self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => read_json::<AgentConfig>(path)?
                .with_context(|| format!("Config file {:?} does not exist", path))?,
            None => AgentConfig::default(),
        };

        if let Some(v) = self.action_size {
            config.action_size = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = self.discount_factor {
            config.discount_factor = v;
        }
        if let Some(v) = self.exploration_rate {
            config.exploration_rate = v;
        }
        if let Some(v) = self.exploration_decay {
            config.exploration_decay = v;
        }
        if let Some(v) = self.max_snooze_seconds {
            config.max_snooze_seconds = v;
        }

        config.validate().context("Invalid agent configuration")?;
        Ok(config)
    }

    fn build(&self) -> Result<MelodyAgent> {
        let config = self.resolve()?;
        let agent = match self.seed {
            Some(seed) => MelodyAgent::seeded(config, seed),
            None => MelodyAgent::new(config),
        };
        agent.context("Failed to create agent")
    }
}

struct DataFiles {
    agent: PathBuf,
    store: PathBuf,
    history: PathBuf,
    ingest_state: PathBuf,
}

impl DataFiles {
    fn new(dir: &Path) -> Self {
        Self {
            agent: dir.join("wecklern.agent.json"),
            store: dir.join("wecklern.store.json"),
            history: dir.join("wecklern.history.jsonl"),
            ingest_state: dir.join("wecklern.ingest.state.json"),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_agent(files: &DataFiles, args: &AgentArgs) -> Result<MelodyAgent> {
    let mut agent = args.build()?;
    if let Some(snapshot) = read_json::<Value>(&files.agent)? {
        agent
            .load(snapshot)
            .with_context(|| format!("Agent snapshot {:?} is not usable", files.agent))?;
        info!(steps = agent.steps(), "resumed agent from snapshot");
    }
    Ok(agent)
}

fn save_agent(files: &DataFiles, agent: &MelodyAgent) -> Result<()> {
    write_json(&files.agent, &agent.snapshot()).context("Failed to save agent")
}

fn load_store(files: &DataFiles) -> Result<SharedOutcomeStore> {
    let state = read_json(&files.store)?.unwrap_or_default();
    Ok(SharedOutcomeStore::from_state(state))
}

fn save_store(files: &DataFiles, store: &SharedOutcomeStore) -> Result<()> {
    write_json(&files.store, &store.state()).context("Failed to save outcome store")
}

fn append_history(path: &Path, record: &EpisodeRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open history {:?}", path))?;
    serde_json::to_writer(&mut file, record)?;
    writeln!(file)?;
    Ok(())
}

fn read_history(path: &Path) -> Result<Vec<EpisodeRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("Invalid history record on line {}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// One training step plus its history record.
fn run_step(
    agent: &mut MelodyAgent,
    store: &SharedOutcomeStore,
    history: &Path,
) -> Result<StepReport> {
    let snooze_seconds = store
        .latest_outcome()
        .map(|o| o.snooze_seconds)
        .unwrap_or(agent.config().default_snooze_seconds);
    let report = agent.step(store);
    append_history(history, &EpisodeRecord::from_step(&report, snooze_seconds))?;
    Ok(report)
}

#[derive(Serialize, Deserialize, Debug)]
struct IngestState {
    cursor: u64,
    source: PathBuf,
    #[serde(with = "time::serde::iso8601::option")]
    last_ok: Option<OffsetDateTime>,
    last_error: Option<String>,
}

impl IngestState {
    fn load(path: &Path, expected_source: &Path) -> Result<Option<Self>> {
        let Some(state) = read_json::<IngestState>(path)? else {
            return Ok(None);
        };

        if state.source.as_path() != expected_source {
            anyhow::bail!(
                "Ingest state belongs to {:?}, not {:?}",
                state.source,
                expected_source
            );
        }

        Ok(Some(state))
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

fn record_state_error(state_file: &Path, source: &Path, cursor: u64, err_msg: &str) -> Result<()> {
    // Keep the previous last_ok
    let old_last_ok = if let Ok(Some(s)) = IngestState::load(state_file, source) {
        s.last_ok
    } else {
        None
    };

    let state = IngestState {
        cursor,
        source: source.to_path_buf(),
        last_ok: old_last_ok,
        last_error: Some(err_msg.to_string()),
    };

    if let Err(e) = state.save(state_file) {
        error!(
            ?state_file,
            error = err_msg,
            save_error = %e,
            "failed to save ingest error state"
        );
        return Err(e);
    }

    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct IngestProgress {
    cursor: u64,
    steps: usize,
}

/// Replays events from `reader`, skipping lines before `progress.cursor`.
/// `progress` covers every line the agent has trained on, also when an error
/// stops the run.
fn ingest_lines(
    reader: impl BufRead,
    agent: &mut MelodyAgent,
    store: &SharedOutcomeStore,
    history: &Path,
    progress: &mut IngestProgress,
) -> Result<()> {
    let offset = progress.cursor;
    for (idx, line) in reader.lines().enumerate() {
        let idx = idx as u64;
        if idx < offset {
            continue;
        }
        let next_cursor = idx.checked_add(1).context("Cursor overflow")?;
        let line = line?;
        if line.trim().is_empty() {
            progress.cursor = next_cursor;
            continue;
        }

        let event: DismissalEvent = serde_json::from_str(&line)
            .with_context(|| format!("Invalid dismissal event on line {}", idx))?;
        let outcome = event
            .to_outcome(|| store.offered_melody())
            .with_context(|| format!("Invalid melody on line {}", idx))?;
        let snooze_seconds = outcome.snooze_seconds;
        store.record_outcome(outcome);

        let report = agent.step(store);
        // The agent has learned from this line; a resumed run must not repeat it.
        progress.cursor = next_cursor;
        progress.steps += 1;
        append_history(history, &EpisodeRecord::from_step(&report, snooze_seconds))
            .with_context(|| format!("Failed to record history for line {}", idx))?;
    }
    Ok(())
}

fn ingest(
    files: &DataFiles,
    path: &Path,
    line_offset: Option<u64>,
    args: &AgentArgs,
) -> Result<IngestProgress> {
    let mut progress = IngestProgress::default();
    match line_offset {
        Some(offset) => progress.cursor = offset,
        None => {
            if let Some(state) = IngestState::load(&files.ingest_state, path)? {
                progress.cursor = state.cursor;
                info!(cursor = state.cursor, "resuming from saved cursor");
            }
        }
    }

    let mut agent = load_agent(files, args)?;
    let store = load_store(files)?;

    let result = File::open(path)
        .context("Failed to open input file")
        .and_then(|f| ingest_lines(BufReader::new(f), &mut agent, &store, &files.history, &mut progress));

    // Everything up to the cursor has been learned, keep it either way.
    save_agent(files, &agent)?;
    save_store(files, &store)?;

    match result {
        Ok(()) => {
            IngestState {
                cursor: progress.cursor,
                source: path.to_path_buf(),
                last_ok: Some(OffsetDateTime::now_utc()),
                last_error: None,
            }
            .save(&files.ingest_state)
            .context("Failed to save ingest state")?;
            Ok(progress)
        }
        Err(e) => {
            let err_msg = format!("{e:#}");
            error!(cursor = progress.cursor, "ingest failed: {}", err_msg);
            if let Err(save_err) =
                record_state_error(&files.ingest_state, path, progress.cursor, &err_msg)
            {
                error!("failed to record error state: {}", save_err);
            }
            Err(e.context("Ingestion stopped"))
        }
    }
}

#[derive(Debug, Serialize)]
struct CurvePoint {
    episode: usize,
    played: String,
    snooze_seconds: u32,
    reward: f64,
    action: usize,
    melody_action: usize,
    explored: bool,
}

#[derive(Debug, Serialize)]
struct SimulationSummary {
    seed: u64,
    episodes: usize,
    preferred_pitch: i32,
    mean_snooze_first: f64,
    mean_snooze_last: f64,
    final_exploration_rate: f64,
    known_states: usize,
    offered_melody: String,
    /// Greedy action for the last visited state
    final_greedy_action: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    curve: Option<Vec<CurvePoint>>,
}

/// Window of episodes averaged at the start and end of a simulation.
const SUMMARY_WINDOW: usize = 10;

fn mean_snooze(snoozes: &[u32]) -> f64 {
    if snoozes.is_empty() {
        return 0.0;
    }
    snoozes.iter().map(|s| f64::from(*s)).sum::<f64>() / snoozes.len() as f64
}

fn simulate(
    episodes: usize,
    preferred_pitch: i32,
    curve: bool,
    args: &AgentArgs,
) -> Result<SimulationSummary> {
    let config = args.resolve()?;
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut agent = MelodyAgent::seeded(config, seed).context("Failed to create agent")?;
    let sleeper = SimulatedSleeper {
        preferred_pitch,
        ..SimulatedSleeper::default()
    };
    let store = SharedOutcomeStore::new();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));

    let played = run_episodes(&mut agent, &sleeper, &store, episodes, &mut rng);
    let snoozes: Vec<u32> = played.iter().map(|e| e.snooze_seconds).collect();
    let window = SUMMARY_WINDOW.min(snoozes.len());

    Ok(SimulationSummary {
        seed,
        episodes,
        preferred_pitch,
        mean_snooze_first: mean_snooze(&snoozes[..window]),
        mean_snooze_last: mean_snooze(&snoozes[snoozes.len() - window..]),
        final_exploration_rate: agent.exploration_rate(),
        known_states: agent.table().len(),
        offered_melody: store.offered_melody().to_string(),
        final_greedy_action: played
            .last()
            .map(|e| agent.greedy_action(&e.report.state_key)),
        curve: curve.then(|| {
            played
                .iter()
                .enumerate()
                .map(|(i, e)| CurvePoint {
                    episode: i + 1,
                    played: e.played.to_string(),
                    snooze_seconds: e.snooze_seconds,
                    reward: e.report.reward,
                    action: e.report.action,
                    melody_action: e.report.melody_action,
                    explored: e.report.explored,
                })
                .collect()
        }),
    })
}

#[derive(Debug, Serialize)]
struct ActionSummary {
    action: usize,
    total: usize,
    mean_reward: f32,
    mean_snooze_seconds: f32,
    exploration_share: f32,
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    episodes: usize,
    by_action: Vec<ActionSummary>,
    patterns: Vec<String>,
    proposal: Option<ExplorationProposal>,
}

fn analyze(files: &DataFiles, min_episodes: usize, min_confidence: f32) -> Result<AnalysisReport> {
    let history = read_history(&files.history)?;
    let analyzer = EpisodeAnalyzer::new(min_episodes, min_confidence);

    let by_action = analyzer
        .aggregate_by_action(&history)
        .into_iter()
        .map(|(action, stats)| ActionSummary {
            action,
            total: stats.total,
            mean_reward: stats.average_reward(),
            mean_snooze_seconds: stats.average_snooze_seconds(),
            exploration_share: stats.exploration_share(),
        })
        .collect();

    Ok(AnalysisReport {
        episodes: history.len(),
        by_action,
        patterns: analyzer.analyze_patterns(&history),
        proposal: analyzer.propose_adjustment("melody-agent", &history),
    })
}

#[derive(Debug, Serialize)]
struct ShowReport {
    offered_melody: String,
    latest_outcome: Option<Outcome>,
    steps: u64,
    exploration_rate: f64,
    known_states: usize,
    /// Melody the agent would pick without exploring for the latest outcome
    greedy_melody: Option<String>,
}

fn show(files: &DataFiles) -> Result<ShowReport> {
    let store = load_store(files)?;
    let agent = load_agent(files, &AgentArgs::default())?;
    let latest_outcome = store.latest_outcome();
    let greedy_melody = latest_outcome.as_ref().map(|outcome| {
        let action = agent.greedy_action(&StateKey::from_outcome(outcome));
        agent.config().palette.melody_for(action).to_string()
    });

    Ok(ShowReport {
        offered_melody: store.offered_melody().to_string(),
        latest_outcome,
        steps: agent.steps(),
        exploration_rate: agent.exploration_rate(),
        known_states: agent.table().len(),
        greedy_melody,
    })
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let files = DataFiles::new(&cli.data_dir);

    match cli.command {
        Commands::Dismiss { snooze, melody } => {
            let store = load_store(&files)?;
            let outcome = match melody {
                Some(melody) => {
                    let outcome = Outcome::new(snooze, melody);
                    store.record_outcome(outcome.clone());
                    outcome
                }
                None => store.record_dismissal(snooze),
            };
            save_store(&files, &store)?;
            print_json(&outcome)?;
        }
        Commands::Step { agent: args } => {
            let mut agent = load_agent(&files, &args)?;
            let store = load_store(&files)?;
            let report = run_step(&mut agent, &store, &files.history)?;
            save_agent(&files, &agent)?;
            save_store(&files, &store)?;
            print_json(&report)?;
        }
        Commands::Ingest {
            path,
            line_offset,
            agent,
        } => {
            let progress = ingest(&files, &path, line_offset, &agent)?;
            print_json(&progress)?;
        }
        Commands::Simulate {
            episodes,
            preferred_pitch,
            summary_only,
            agent,
        } => {
            print_json(&simulate(episodes, preferred_pitch, !summary_only, &agent)?)?;
        }
        Commands::Analyze {
            min_episodes,
            min_confidence,
        } => {
            print_json(&analyze(&files, min_episodes, min_confidence)?)?;
        }
        Commands::Show => {
            print_json(&show(&files)?)?;
        }
    }

    Ok(())
}
