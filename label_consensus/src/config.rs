// ********* Input data structures ***********

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::Display;

/// The status of a label.
///
/// A label only moves from `Pending` to `Completed`, never back.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum LabelStatus {
    Pending,
    Completed,
}

/// One submission by one worker.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Instance {
    pub user_id: String,
    pub created: DateTime<Utc>,
}

/// A distinct raw answer submitted for a label.
///
/// `votes` is the number of workers who produced this exact string. It is
/// normally the number of instances, but the input is trusted on this point.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Version {
    /// The raw value. An absent or empty value means "no answer".
    pub value: Option<String>,
    pub votes: u64,
    pub instances: Vec<Instance>,
}

impl Version {
    /// The submitted answer, if there is one.
    pub fn answer(&self) -> Option<&str> {
        match self.value.as_deref() {
            Some(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// One crowd-annotated field needing consensus.
///
/// The identity and the submitted versions never change after construction.
/// The status and the resolved value are written by the engine when a
/// consensus is accepted. The analysis is replaced on every evaluation.
#[derive(PartialEq, Debug, Clone)]
pub struct Label {
    id: String,
    name: String,
    versions: Vec<Version>,
    pub(crate) status: LabelStatus,
    pub(crate) value: Option<String>,
    pub(crate) analysis: Option<LabelAnalysis>,
}

impl Label {
    pub fn new(
        id: &str,
        name: &str,
        status: LabelStatus,
        value: Option<String>,
        versions: Vec<Version>,
    ) -> Label {
        Label {
            id: id.to_string(),
            name: name.to_string(),
            versions,
            status,
            value,
            analysis: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn status(&self) -> LabelStatus {
        self.status
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The outcome of the last evaluation of this label, if it was evaluated.
    pub fn analysis(&self) -> Option<&LabelAnalysis> {
        self.analysis.as_ref()
    }

    /// The agreement ratio of the last evaluation.
    pub fn ratio(&self) -> Option<f64> {
        self.analysis.as_ref().map(|a| a.ratio)
    }

    /// Sum of the votes of all the versions carrying an answer.
    pub fn total_votes(&self) -> u64 {
        self.versions
            .iter()
            .filter(|v| v.answer().is_some())
            .map(|v| v.votes)
            .sum()
    }

    /// True if at least one worker submitted a non-empty answer.
    pub fn has_answers(&self) -> bool {
        self.versions.iter().any(|v| v.answer().is_some())
    }
}

/// A collection of labels that belong to the same page (subject).
#[derive(PartialEq, Debug, Clone)]
pub struct Page {
    pub id: String,
    pub labels: Vec<Label>,
}

// ******** Output data structures *********

/// A group of normalized answers judged equivalent.
///
/// `entries` keeps the insertion order of the keys. When the lossy pass merges
/// two spellings, the votes of the new spelling are also credited to the key it
/// matched, so the sum of the entries may exceed `total`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FrequencyGroup {
    pub total: u64,
    pub entries: Vec<(String, u64)>,
}

impl FrequencyGroup {
    pub fn weight(&self, key: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, w)| *w)
    }
}

/// The majority found in a list of frequency groups.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Majority {
    /// The majority value(s). More than one value means a tie.
    pub entries: Vec<String>,
    /// Total of the majority group(s).
    pub max_votes: u64,
    /// Total of the second group, if there is more than one group.
    pub runner_up: Option<u64>,
    /// Every key of the majority group(s): the values that voted for the majority.
    pub group_keys: Vec<String>,
}

/// Which matching pass produced an analysis.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MatchingPass {
    Lossless,
    Lossy,
}

/// Everything derived from a label during one evaluation.
#[derive(PartialEq, Debug, Clone)]
pub struct LabelAnalysis {
    /// Raw answer -> normalized answer, in submission order.
    pub normalized_versions: Vec<(String, String)>,
    pub frequency_groups: Vec<FrequencyGroup>,
    pub majority: Majority,
    pub total_votes: u64,
    pub ratio: f64,
    pub pass: MatchingPass,
    /// True if the ratio met the threshold with a non-empty candidate.
    pub reaches_consensus: bool,
}

impl LabelAnalysis {
    /// The normalized form of a raw answer.
    pub fn normalized(&self, raw: &str) -> Option<&str> {
        self.normalized_versions
            .iter()
            .find(|(r, _)| r == raw)
            .map(|(_, n)| n.as_str())
    }
}

/// Statistics for one page.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PageStats {
    pub page_id: String,
    pub label_count: u64,
    pub labels_with_values: u64,
    pub consensus_count: u64,
}

/// Statistics accumulated over all the pages of a run.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct EngineStats {
    pub label_count: u64,
    pub labels_with_values: u64,
    pub consensus_count: u64,
}

impl EngineStats {
    /// Labels that reached consensus over labels that had any answer.
    pub fn consensus_rate(&self) -> Option<f64> {
        if self.labels_with_values == 0 {
            None
        } else {
            Some(self.consensus_count as f64 / self.labels_with_values as f64)
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConsensusResult {
    pub page_stats: Vec<PageStats>,
    pub stats: EngineStats,
}

/// Errors that prevent the engine from running.
#[derive(PartialEq, Debug, Clone)]
pub enum ConsensusErrors {
    InvalidThreshold { name: &'static str, value: f64 },
    EmptyLabelId,
    InvalidSweep { start: f64, end: f64, step: f64 },
}

impl Error for ConsensusErrors {}

impl Display for ConsensusErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsensusErrors::InvalidThreshold { name, value } => {
                write!(f, "invalid value for {}: {}", name, value)
            }
            ConsensusErrors::EmptyLabelId => write!(f, "a label must have a non-empty id"),
            ConsensusErrors::InvalidSweep { start, end, step } => write!(
                f,
                "invalid threshold sweep: start {} end {} step {}",
                start, end, step
            ),
        }
    }
}

// ********* Configuration **********

/// How the agreement ratio is computed.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RatioMode {
    /// Majority group total over all the votes of the label.
    Proportion,
    /// Majority group total over the majority and runner-up totals.
    TopTwo,
}

/// When the lossy comparison is used to merge answers.
///
/// - Disabled: only exact matches of the lossless forms are grouped.
/// - WhenNoConsensus: a second pass with lossy matching is run for the labels
/// that did not reach a consensus with the lossless pass.
/// - Always: lossy matching is used from the start.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum LossyPass {
    Disabled,
    WhenNoConsensus,
    Always,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ConsensusRules {
    /// Acceptance threshold on the ratio (inclusive).
    pub threshold: f64,
    /// Below this number of votes, the ratio is forced to 0.
    pub min_votes: u64,
    pub ratio_mode: RatioMode,
    /// Similarity required by the approximate comparison.
    pub lossy_ratio_threshold: f64,
    pub lossy_pass: LossyPass,
}

impl ConsensusRules {
    pub const DEFAULT_RULES: ConsensusRules = ConsensusRules {
        threshold: 0.5,
        min_votes: 1,
        ratio_mode: RatioMode::Proportion,
        lossy_ratio_threshold: 0.9,
        lossy_pass: LossyPass::Disabled,
    };

    /// Checks the numeric options.
    ///
    /// The acceptance threshold may be above 1 (nothing is then accepted), which
    /// is useful when sweeping thresholds.
    pub fn validate(&self) -> Result<(), ConsensusErrors> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ConsensusErrors::InvalidThreshold {
                name: "threshold",
                value: self.threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.lossy_ratio_threshold) {
            return Err(ConsensusErrors::InvalidThreshold {
                name: "lossy_ratio_threshold",
                value: self.lossy_ratio_threshold,
            });
        }
        Ok(())
    }
}

impl Default for ConsensusRules {
    fn default() -> Self {
        ConsensusRules::DEFAULT_RULES
    }
}
