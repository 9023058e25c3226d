//! Run counters, phase timings and the run result.

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Outcome counts for one run. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCounters {
    pub published: usize,
    pub unpublished: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl RunCounters {
    pub fn total(&self) -> usize {
        self.published + self.unpublished + self.ignored + self.failed
    }
}

impl AddAssign for RunCounters {
    fn add_assign(&mut self, other: Self) {
        self.published += other.published;
        self.unpublished += other.unpublished;
        self.ignored += other.ignored;
        self.failed += other.failed;
    }
}

/// Min/max/avg summary of a set of samples.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Aggregate {
    pub max: f64,
    pub min: f64,
    pub avg: f64,
    pub n: usize,
}

/// Summarize samples; an empty set yields all zeros.
pub fn aggregate(values: &[f64]) -> Aggregate {
    if values.is_empty() {
        return Aggregate::default();
    }
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    Aggregate {
        max,
        min,
        avg,
        n: values.len(),
    }
}

/// Named phase durations in milliseconds.
#[derive(Debug, Clone)]
pub struct Timings {
    started: Instant,
    last: Instant,
    measures: BTreeMap<String, f64>,
}

impl Timings {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last: now,
            measures: BTreeMap::new(),
        }
    }

    /// Record the time since the previous sample under `name`.
    pub fn sample(&mut self, name: &str) -> &mut Self {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64() * 1000.0;
        self.measures.insert(name.to_string(), elapsed);
        self.last = now;
        self
    }

    /// Record an explicit value under `name`.
    pub fn sample_value(&mut self, name: &str, elapsed_ms: f64) -> &mut Self {
        self.measures.insert(name.to_string(), elapsed_ms);
        self.last = Instant::now();
        self
    }

    /// Milliseconds since this instance was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn measures(&self) -> &BTreeMap<String, f64> {
        &self.measures
    }

    pub fn into_measures(self) -> BTreeMap<String, f64> {
        self.measures
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate per-locale phase timings by phase name.
pub fn aggregate_measures<I>(per_locale: I) -> BTreeMap<String, Aggregate>
where
    I: IntoIterator<Item = BTreeMap<String, f64>>,
{
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for measures in per_locale {
        for (name, value) in measures {
            grouped.entry(name).or_default().push(value);
        }
    }
    grouped
        .into_iter()
        .map(|(name, values)| (name, aggregate(&values)))
        .collect()
}

/// Whether the run did work or stepped aside for a concurrent run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Completed,
    Skipped,
}

/// Structured result returned to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub state: RunState,

    /// Wall-clock duration in milliseconds
    #[serde(default)]
    pub elapsed: u64,

    #[serde(default)]
    pub status: RunCounters,

    #[serde(default)]
    pub timings: BTreeMap<String, Aggregate>,
}

impl RunResult {
    pub fn skipped() -> Self {
        Self {
            state: RunState::Skipped,
            elapsed: 0,
            status: RunCounters::default(),
            timings: BTreeMap::new(),
        }
    }
}
