//! Round-robin and edge-restricted tournaments
//!
//! Configuration is built programmatically with [`TournamentConfig::new()`]
//! or read from the environment with [`TournamentConfig::from_env()`].
//!
//! # Environment Variables
//!
//! - `ARENA_TURNS`: turns per match (default: `200`)
//! - `ARENA_REPETITIONS`: repetitions of every matchup (default: `10`)
//! - `ARENA_NOISE`: probability of flipping each action (default: `0`)
//! - `ARENA_PROB_END`: probability of a match ending after each turn (default: unset)
//! - `ARENA_PROCESSES`: worker threads; unset plays serially
//! - `ARENA_SEED`: tournament seed; unset draws one per play
//!
//! Unset or unparsable values fall back to the defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{info, instrument, trace, warn};

use crate::cache::{lock_cache, DeterministicCache, SharedCache};
use crate::error::{ArenaError, Result};
use crate::game::Match;
use crate::interaction::InteractionRow;
use crate::pairing::{build_chunks, round_robin_pairs, validate_edges, Chunk};
use crate::payoff::Game;
use crate::player::PlayerSpec;
use crate::progress::{LogProgress, NoProgress, ProgressObserver};
use crate::random::{stream_seed, Probability, SeededRng};
use crate::result_set::ResultSet;
use crate::sink::{FileSink, InteractionSink, MemorySink, TempFileSink};

/// Where tournament rows go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Output {
    /// JSON-lines file at the given path, kept after play
    File(PathBuf),
    /// JSON-lines temporary file, removed after play
    #[default]
    Temporary,
    /// Rows kept in memory, see [`Tournament::rows`]
    Memory,
}

/// Configuration for a tournament.
#[derive(Debug, Clone)]
pub struct TournamentConfig {
    pub(crate) turns: Option<u32>,
    pub(crate) repetitions: usize,
    pub(crate) noise: f64,
    pub(crate) prob_end: Option<f64>,
    pub(crate) processes: Option<usize>,
    pub(crate) seed: Option<u64>,
    pub(crate) game: Game,
    pub(crate) edges: Option<Vec<(usize, usize)>>,
    pub(crate) output: Output,
    pub(crate) build_results: bool,
    pub(crate) progress: bool,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TournamentConfig {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Matches last 200 turns with no noise and no random ending.
    /// - Every matchup is repeated 10 times.
    /// - Matches are played serially.
    /// - Rows go to a temporary file and a ResultSet is built from them.
    pub fn new() -> Self {
        Self {
            turns: Some(200),
            repetitions: 10,
            noise: 0.0,
            prob_end: None,
            processes: None,
            seed: None,
            game: Game::default(),
            edges: None,
            output: Output::Temporary,
            build_results: true,
            progress: false,
        }
    }

    /// Create configuration from `ARENA_*` environment variables.
    pub fn from_env() -> Self {
        fn get_env<T: FromStr>(var: &str) -> Option<T> {
            std::env::var(var).ok()?.trim().parse().ok()
        }

        let defaults = Self::new();
        Self {
            turns: get_env("ARENA_TURNS").or(defaults.turns),
            repetitions: get_env("ARENA_REPETITIONS").unwrap_or(defaults.repetitions),
            noise: get_env("ARENA_NOISE").unwrap_or(defaults.noise),
            prob_end: get_env("ARENA_PROB_END"),
            processes: get_env("ARENA_PROCESSES"),
            seed: get_env("ARENA_SEED"),
            ..defaults
        }
    }

    pub fn with_turns(mut self, turns: u32) -> Self {
        self.turns = Some(turns);
        self
    }

    /// Let matches run until `prob_end` stops them
    pub fn without_turn_cap(mut self) -> Self {
        self.turns = None;
        self
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_prob_end(mut self, prob_end: f64) -> Self {
        self.prob_end = Some(prob_end);
        self
    }

    /// Worker threads to use. Values outside `2..=available CPUs` use every
    /// available CPU.
    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = Some(processes);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_game(mut self, game: Game) -> Self {
        self.game = game;
        self
    }

    /// Play only these matchups
    pub fn with_edges(mut self, edges: Vec<(usize, usize)>) -> Self {
        self.edges = Some(edges);
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn with_build_results(mut self, build_results: bool) -> Self {
        self.build_results = build_results;
        self
    }

    /// Log progress through `tracing` while playing
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn turns(&self) -> Option<u32> {
        self.turns
    }

    pub fn repetitions(&self) -> usize {
        self.repetitions
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn processes(&self) -> Option<usize> {
        self.processes
    }
}

/// Match settings shared by every match of a tournament
#[derive(Debug, Clone)]
struct MatchParams {
    turns: Option<u32>,
    prob_end: Option<f64>,
    noise: f64,
    game: Game,
}

impl MatchParams {
    fn build(
        &self,
        first: &PlayerSpec,
        second: &PlayerSpec,
        cache: &SharedCache,
        seed: u64,
    ) -> Result<Match> {
        let mut builder = Match::builder(first.clone(), second.clone())
            .game(self.game)
            .noise(self.noise)?
            .cache(cache.clone())
            .seed(seed);
        if let Some(turns) = self.turns {
            builder = builder.turns(turns);
        }
        if let Some(prob_end) = self.prob_end {
            builder = builder.prob_end(prob_end)?;
        }
        builder.build()
    }
}

/// Play every repetition of one chunk
fn play_chunk(
    chunk: &Chunk,
    players: &[PlayerSpec],
    params: &MatchParams,
    cache: &SharedCache,
    seed: u64,
) -> Result<Vec<InteractionRow>> {
    let (i, j) = chunk.players;
    let (first, second) = (&players[i], &players[j]);
    let names = (first.name(), second.name());
    let mut rows = Vec::with_capacity(chunk.repetitions);
    for repetition in 0..chunk.repetitions {
        let seed = stream_seed(seed, chunk.stream_index(repetition));
        let mut game = params.build(first, second, cache, seed)?;
        let record = game.play()?;
        rows.push(InteractionRow::new(
            chunk.players,
            repetition,
            names.clone(),
            record,
        ));
    }
    Ok(rows)
}

enum Job {
    Chunk(Chunk),
    Stop,
}

enum WorkerMessage {
    Rows(Vec<InteractionRow>),
    Failed(String),
    Done,
}

fn worker(
    id: usize,
    jobs: Arc<Mutex<Receiver<Job>>>,
    results: Sender<WorkerMessage>,
    players: Arc<Vec<PlayerSpec>>,
    params: MatchParams,
    cache: DeterministicCache,
    seed: u64,
) {
    let cache = cache.shared();
    loop {
        let job = jobs.lock().unwrap_or_else(PoisonError::into_inner).recv();
        match job {
            Ok(Job::Chunk(chunk)) => {
                trace!(worker = id, chunk = chunk.index, "playing chunk");
                match play_chunk(&chunk, &players, &params, &cache, seed) {
                    Ok(rows) => {
                        if results.send(WorkerMessage::Rows(rows)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = results.send(WorkerMessage::Failed(format!(
                            "chunk {} {:?}: {}",
                            chunk.index, chunk.players, e
                        )));
                        break;
                    }
                }
            }
            Ok(Job::Stop) | Err(_) => break,
        }
    }
    let _ = results.send(WorkerMessage::Done);
}

/// Worker count for a requested number of processes
fn worker_count(requested: usize) -> usize {
    let available = num_cpus::get();
    if (2..=available).contains(&requested) {
        requested
    } else {
        available
    }
}

/// A tournament between a fixed list of players
pub struct Tournament {
    name: String,
    players: Vec<PlayerSpec>,
    config: TournamentConfig,
    pairs: Vec<(usize, usize)>,
    cache: SharedCache,
    observer: Option<Box<dyn ProgressObserver>>,
    rows: Option<Vec<InteractionRow>>,
}

impl Tournament {
    /// Validate the configuration and build the schedule.
    pub fn new(name: &str, players: Vec<PlayerSpec>, config: TournamentConfig) -> Result<Self> {
        for player in &players {
            player.classifier()?;
        }
        Probability::new(config.noise)?;
        let ends = match config.prob_end {
            Some(p) => Probability::new(p)?.value() > 0.0,
            None => false,
        };
        if config.turns == Some(0) {
            return Err(ArenaError::InvalidConfig("turns must be positive".into()));
        }
        if config.turns.is_none() && !ends {
            return Err(ArenaError::InvalidConfig(
                "a tournament needs turns or a positive prob_end".into(),
            ));
        }

        let pairs = match &config.edges {
            Some(edges) => {
                validate_edges(players.len(), edges)?;
                edges.clone()
            }
            None => round_robin_pairs(players.len()),
        };

        Ok(Self {
            name: name.to_string(),
            players,
            config,
            pairs,
            cache: DeterministicCache::new().shared(),
            observer: None,
            rows: None,
        })
    }

    /// Use `cache` instead of a private one
    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_progress_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn players(&self) -> &[PlayerSpec] {
        &self.players
    }

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    /// Matchups in schedule order
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Rows of the last play when output goes to memory
    pub fn rows(&self) -> Option<&[InteractionRow]> {
        self.rows.as_deref()
    }

    fn params(&self) -> MatchParams {
        MatchParams {
            turns: self.config.turns,
            prob_end: self.config.prob_end,
            noise: self.config.noise,
            game: self.config.game,
        }
    }

    fn open_sink(&self) -> Result<Box<dyn InteractionSink>> {
        Ok(match &self.config.output {
            Output::File(path) => Box::new(FileSink::create(path)?),
            Output::Temporary => Box::new(TempFileSink::new()?),
            Output::Memory => Box::new(MemorySink::new()),
        })
    }

    /// Play every matchup `repetitions` times.
    ///
    /// Returns the aggregated results unless `build_results` is off.
    #[instrument(skip_all, fields(tournament = %self.name))]
    pub fn play(&mut self) -> Result<Option<ResultSet>> {
        if !self.config.build_results && self.config.output == Output::Temporary {
            warn!("Tournament results will not be accessible since build_results is off and no output file or memory sink is set");
        }

        let seed = self
            .config
            .seed
            .unwrap_or_else(|| SeededRng::from_entropy().next_u64());
        let chunks = build_chunks(&self.pairs, self.config.repetitions);
        let total = chunks.len() * self.config.repetitions;
        let mut observer: Box<dyn ProgressObserver> = match self.observer.take() {
            Some(observer) => observer,
            None if self.config.progress => Box::new(LogProgress::new(total)),
            None => Box::new(NoProgress),
        };
        let mut sink = self.open_sink()?;
        self.rows = None;

        info!(
            players = self.players.len(),
            matchups = chunks.len(),
            repetitions = self.config.repetitions,
            seed,
            "playing tournament"
        );

        let outcome = match self.config.processes {
            None => self.play_serial(&chunks, seed, sink.as_mut(), observer.as_mut()),
            Some(requested) => self.play_parallel(
                chunks,
                worker_count(requested),
                seed,
                sink.as_mut(),
                observer.as_mut(),
            ),
        };
        observer.close();
        self.observer = Some(observer);
        outcome?;
        sink.finish()?;

        info!(matches = total, "tournament finished");

        if self.config.output == Output::Memory {
            self.rows = Some(sink.read_back()?);
        }
        if !self.config.build_results {
            return Ok(None);
        }
        let rows = match &self.rows {
            Some(rows) => rows.clone(),
            None => sink.read_back()?,
        };
        let names = self.players.iter().map(PlayerSpec::name).collect();
        Ok(Some(ResultSet::from_rows(names, rows, &self.config.game)?))
    }

    fn play_serial(
        &self,
        chunks: &[Chunk],
        seed: u64,
        sink: &mut dyn InteractionSink,
        observer: &mut dyn ProgressObserver,
    ) -> Result<()> {
        let params = self.params();
        for chunk in chunks {
            for row in play_chunk(chunk, &self.players, &params, &self.cache, seed)? {
                sink.write_row(&row)?;
                observer.advance();
            }
        }
        Ok(())
    }

    fn play_parallel(
        &self,
        chunks: Vec<Chunk>,
        workers: usize,
        seed: u64,
        sink: &mut dyn InteractionSink,
        observer: &mut dyn ProgressObserver,
    ) -> Result<()> {
        info!(workers, "starting workers");
        let (job_tx, job_rx) = mpsc::channel();
        for chunk in chunks {
            let _ = job_tx.send(Job::Chunk(chunk));
        }
        for _ in 0..workers {
            let _ = job_tx.send(Job::Stop);
        }
        drop(job_tx);

        let jobs = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel();
        let players = Arc::new(self.players.clone());
        let read_only = lock_cache(&self.cache).read_only();
        let params = self.params();

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|id| {
                let jobs = Arc::clone(&jobs);
                let results = result_tx.clone();
                let players = Arc::clone(&players);
                let params = params.clone();
                let cache = read_only.clone();
                thread::spawn(move || worker(id, jobs, results, players, params, cache, seed))
            })
            .collect();
        drop(result_tx);

        let mut failure: Option<String> = None;
        let mut finished = 0;
        for message in result_rx {
            match message {
                WorkerMessage::Rows(rows) => {
                    for row in rows {
                        if failure.is_none() {
                            if let Err(e) = sink.write_row(&row) {
                                failure = Some(e.to_string());
                            }
                        }
                        observer.advance();
                    }
                }
                WorkerMessage::Failed(message) => {
                    failure.get_or_insert(message);
                }
                WorkerMessage::Done => finished += 1,
            }
        }

        for (id, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                failure.get_or_insert_with(|| format!("worker {} panicked", id));
            }
        }
        trace!(finished, workers, "workers joined");

        match failure {
            Some(message) => Err(ArenaError::WorkerFailed(message)),
            None => Ok(()),
        }
    }
}
