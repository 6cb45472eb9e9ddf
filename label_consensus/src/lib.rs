pub mod builder;
pub mod compare;
mod config;
pub mod contributors;
pub mod manual;
pub mod normalize;

use log::{debug, info};

use std::ops::{Add, AddAssign};

pub use crate::config::*;

use crate::compare::{Comparator, SequenceComparator};
use crate::normalize::{DefaultNormalizer, Normalizer};

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteWeight(u64);

impl VoteWeight {
    const EMPTY: VoteWeight = VoteWeight(0);
}

impl std::iter::Sum for VoteWeight {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteWeight(iter.map(|vw| vw.0).sum())
    }
}

impl AddAssign for VoteWeight {
    fn add_assign(&mut self, rhs: VoteWeight) {
        self.0 += rhs.0;
    }
}

impl Add for VoteWeight {
    type Output = VoteWeight;
    fn add(self: VoteWeight, rhs: VoteWeight) -> VoteWeight {
        VoteWeight(self.0 + rhs.0)
    }
}

// A distinct raw answer of a label, with its lossless form and all the votes
// for this raw answer.
#[derive(Eq, PartialEq, Debug, Clone)]
struct NormalizedAnswer {
    raw: String,
    normalized: String,
    votes: VoteWeight,
}

// A group of equivalent answers being built.
// Invariant: the keys are distinct and stay in insertion order.
#[derive(Eq, PartialEq, Debug, Clone)]
struct AggMap {
    total: VoteWeight,
    entries: Vec<(String, VoteWeight)>,
}

impl AggMap {
    fn singleton(key: &str, votes: VoteWeight) -> AggMap {
        AggMap {
            total: votes,
            entries: vec![(key.to_string(), votes)],
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    // Credits the key, without touching the total.
    fn credit(&mut self, key: &str, votes: VoteWeight) {
        if let Some(idx) = self.position(key) {
            self.entries[idx].1 += votes;
        } else {
            self.entries.push((key.to_string(), votes));
        }
    }

    fn to_group(&self) -> FrequencyGroup {
        FrequencyGroup {
            total: self.total.0,
            entries: self
                .entries
                .iter()
                .map(|(k, vw)| (k.clone(), vw.0))
                .collect(),
        }
    }
}

/// The consensus engine.
///
/// It holds the rules and the strategies used to clean and compare the answers.
/// The default strategies keep the answers as they are for the lossless form,
/// strip the punctuation and fold the case for the lossy form, and compare the
/// lossy forms with a sequence similarity ratio.
///
/// ```
/// use label_consensus::builder::LabelBuilder;
/// use label_consensus::*;
///
/// let mut builder = LabelBuilder::new("label-1", "city")?;
/// builder.add_version(&Version { value: Some("Paris".to_string()), votes: 5, instances: vec![] })?;
/// builder.add_version(&Version { value: Some("paris".to_string()), votes: 4, instances: vec![] })?;
/// let mut label = builder.build();
///
/// let engine = ConsensusEngine::new(&ConsensusRules::DEFAULT_RULES)?;
/// assert!(engine.resolve_label(&mut label));
/// assert_eq!(label.status(), LabelStatus::Completed);
/// assert_eq!(label.value(), Some("Paris"));
///
/// # Ok::<(), ConsensusErrors>(())
/// ```
pub struct ConsensusEngine {
    rules: ConsensusRules,
    normalizer: Box<dyn Normalizer + Send + Sync>,
    comparator: Box<dyn Comparator + Send + Sync>,
}

impl ConsensusEngine {
    pub fn new(rules: &ConsensusRules) -> Result<ConsensusEngine, ConsensusErrors> {
        rules.validate()?;
        Ok(ConsensusEngine {
            rules: rules.clone(),
            normalizer: Box::new(DefaultNormalizer::default()),
            comparator: Box::new(SequenceComparator),
        })
    }

    pub fn with_normalizer<N>(self, normalizer: N) -> ConsensusEngine
    where
        N: Normalizer + Send + Sync + 'static,
    {
        ConsensusEngine {
            normalizer: Box::new(normalizer),
            ..self
        }
    }

    pub fn with_comparator<C>(self, comparator: C) -> ConsensusEngine
    where
        C: Comparator + Send + Sync + 'static,
    {
        ConsensusEngine {
            comparator: Box::new(comparator),
            ..self
        }
    }

    pub fn rules(&self) -> &ConsensusRules {
        &self.rules
    }

    /// Evaluates a label without modifying it.
    ///
    /// Everything is recomputed from the versions of the label, so calling it
    /// twice gives the same analysis.
    pub fn analyze(&self, label: &Label) -> LabelAnalysis {
        let answers = normalize_label(label, self.normalizer.as_ref());
        match self.rules.lossy_pass {
            LossyPass::Disabled => self.analyze_pass(label, &answers, MatchingPass::Lossless),
            LossyPass::Always => self.analyze_pass(label, &answers, MatchingPass::Lossy),
            LossyPass::WhenNoConsensus => {
                let lossless = self.analyze_pass(label, &answers, MatchingPass::Lossless);
                if lossless.reaches_consensus {
                    lossless
                } else {
                    debug!(
                        "analyze: label {:?}: no consensus with ratio {}, trying the lossy pass",
                        label.id(),
                        lossless.ratio
                    );
                    self.analyze_pass(label, &answers, MatchingPass::Lossy)
                }
            }
        }
    }

    /// Evaluates a label and records the decision on it.
    ///
    /// Returns true if a consensus was accepted. In that case the label is
    /// completed and its value is the first majority value. Otherwise the status
    /// and the value of the label are left as they were. The analysis is stored
    /// in both cases.
    pub fn resolve_label(&self, label: &mut Label) -> bool {
        let analysis = self.analyze(label);
        let accepted = analysis.reaches_consensus;
        if accepted {
            label.status = LabelStatus::Completed;
            label.value = analysis.majority.entries.first().cloned();
        }
        label.analysis = Some(analysis);
        accepted
    }

    /// Resolves all the labels of a page.
    pub fn resolve_page(&self, page: &mut Page) -> PageStats {
        let mut stats = PageStats {
            page_id: page.id.clone(),
            label_count: page.labels.len() as u64,
            labels_with_values: 0,
            consensus_count: 0,
        };
        for label in page.labels.iter_mut() {
            if label.has_answers() {
                stats.labels_with_values += 1;
            }
            if self.resolve_label(label) {
                stats.consensus_count += 1;
            }
        }
        debug!("resolve_page: {:?}", stats);
        stats
    }

    /// Resolves all the pages. Every label is evaluated once.
    pub fn run(&self, pages: &mut [Page]) -> ConsensusResult {
        info!(
            "Processing {:?} pages, rules: {:?}",
            pages.len(),
            self.rules
        );
        let total_pages = pages.len();
        let mut page_stats: Vec<PageStats> = Vec::new();
        for (idx, page) in pages.iter_mut().enumerate() {
            page_stats.push(self.resolve_page(page));
            if (idx + 1) % 1000 == 0 {
                info!("Completed {} out of {} pages", idx + 1, total_pages);
            }
        }

        let mut stats = EngineStats::default();
        for ps in page_stats.iter() {
            stats.label_count += ps.label_count;
            stats.labels_with_values += ps.labels_with_values;
            stats.consensus_count += ps.consensus_count;
        }
        info!(
            "Consensus for {} labels out of {} labels with values ({} labels)",
            stats.consensus_count, stats.labels_with_values, stats.label_count
        );
        ConsensusResult { page_stats, stats }
    }

    /// Runs the consensus for a range of acceptance thresholds.
    ///
    /// Each run starts from a fresh copy of the pages. Returns the threshold and
    /// the consensus rate of each run, for thresholds from `start` (included) to
    /// `end` (excluded) by increments of `step`. The threshold of the engine is
    /// restored afterwards.
    pub fn sweep(
        &mut self,
        pages: &[Page],
        start: f64,
        end: f64,
        step: f64,
    ) -> Result<Vec<(f64, Option<f64>)>, ConsensusErrors> {
        if !step.is_finite()
            || step <= 0.0
            || !start.is_finite()
            || !end.is_finite()
            || start < 0.0
            || start >= end
        {
            return Err(ConsensusErrors::InvalidSweep { start, end, step });
        }
        let initial_threshold = self.rules.threshold;
        let mut res: Vec<(f64, Option<f64>)> = Vec::new();
        let mut idx: u32 = 0;
        loop {
            let threshold = start + step * idx as f64;
            // Absorbs the rounding of the increments.
            if threshold >= end - step * 1e-9 {
                break;
            }
            self.rules.threshold = threshold;
            let mut sweep_pages = pages.to_vec();
            let result = self.run(&mut sweep_pages);
            info!(
                "sweep: threshold {}: consensus rate {:?}",
                threshold,
                result.stats.consensus_rate()
            );
            res.push((threshold, result.stats.consensus_rate()));
            idx += 1;
        }
        self.rules.threshold = initial_threshold;
        Ok(res)
    }

    fn analyze_pass(
        &self,
        label: &Label,
        answers: &[NormalizedAnswer],
        pass: MatchingPass,
    ) -> LabelAnalysis {
        let lossy_threshold = match pass {
            MatchingPass::Lossless => None,
            MatchingPass::Lossy => Some(self.rules.lossy_ratio_threshold),
        };
        let groups = build_frequency_list(
            answers,
            self.normalizer.as_ref(),
            self.comparator.as_ref(),
            lossy_threshold,
        );
        let majority = majority_from_frequency_list(&groups);
        let total_votes: VoteWeight = answers.iter().map(|a| a.votes).sum();
        let ratio = compute_ratio(&majority, total_votes, &self.rules);
        let has_candidate = majority
            .entries
            .first()
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        let reaches_consensus = has_candidate && ratio >= self.rules.threshold;
        debug!(
            "analyze_pass: label {:?} pass {:?}: groups: {:?} majority: {:?} ratio: {} consensus: {}",
            label.id(),
            pass,
            groups,
            majority.entries,
            ratio,
            reaches_consensus
        );

        LabelAnalysis {
            normalized_versions: answers
                .iter()
                .map(|a| (a.raw.clone(), a.normalized.clone()))
                .collect(),
            frequency_groups: groups.iter().map(|g| g.to_group()).collect(),
            majority,
            total_votes: total_votes.0,
            ratio,
            pass,
            reaches_consensus,
        }
    }
}

/// Runs the consensus engine with the default strategies over all the pages.
///
/// Arguments:
/// * `pages` the pages to process. The labels are updated in place.
/// * `rules` the rules that govern the consensus.
pub fn run_consensus(
    pages: &mut [Page],
    rules: &ConsensusRules,
) -> Result<ConsensusResult, ConsensusErrors> {
    let engine = ConsensusEngine::new(rules)?;
    Ok(engine.run(pages))
}

/// Runs the consensus for a range of acceptance thresholds, with the default
/// strategies.
///
/// See [ConsensusEngine::sweep].
pub fn sweep_thresholds(
    pages: &[Page],
    rules: &ConsensusRules,
    start: f64,
    end: f64,
    step: f64,
) -> Result<Vec<(f64, Option<f64>)>, ConsensusErrors> {
    let mut engine = ConsensusEngine::new(rules)?;
    engine.sweep(pages, start, end, step)
}

// Lossless forms of the answers of a label, in submission order.
// Versions without an answer are dropped. Versions sharing a raw value are
// merged and their votes pooled.
fn normalize_label(label: &Label, normalizer: &dyn Normalizer) -> Vec<NormalizedAnswer> {
    let mut res: Vec<NormalizedAnswer> = Vec::new();
    for version in label.versions() {
        let raw = match version.answer() {
            Some(s) => s,
            None => continue,
        };
        if let Some(existing) = res.iter_mut().find(|a| a.raw == raw) {
            existing.votes += VoteWeight(version.votes);
            continue;
        }
        res.push(NormalizedAnswer {
            raw: raw.to_string(),
            normalized: normalizer.clean(label.name(), raw),
            votes: VoteWeight(version.votes),
        });
    }
    res
}

/// Groups the answers. Only answers in the same group are considered when
/// looking for the majority value.
///
/// The groups are scanned in creation order, and the keys of a group in
/// insertion order. For each key, an exact match folds the answer into that
/// key. Otherwise, when `lossy_threshold` is provided, a key whose lossy form
/// matches approximately (or exactly) the lossy form of the answer takes it in:
/// the answer becomes a key of that group and the matched key is credited the
/// same votes. The first hit wins. Without any hit the answer starts a new
/// group.
fn build_frequency_list(
    answers: &[NormalizedAnswer],
    normalizer: &dyn Normalizer,
    comparator: &dyn Comparator,
    lossy_threshold: Option<f64>,
) -> Vec<AggMap> {
    let mut groups: Vec<AggMap> = Vec::new();
    for answer in answers.iter() {
        let lossy_answer = lossy_threshold.map(|_| normalizer.lossy_clean(&answer.normalized));
        let mut hit: Option<(usize, usize, MatchingPass)> = None;
        'groups: for (gidx, group) in groups.iter().enumerate() {
            for (kidx, (key, _)) in group.entries.iter().enumerate() {
                if comparator.exact_match(key, &answer.normalized) {
                    hit = Some((gidx, kidx, MatchingPass::Lossless));
                    break 'groups;
                }
                if let (Some(threshold), Some(lossy_answer)) = (lossy_threshold, &lossy_answer) {
                    let lossy_key = normalizer.lossy_clean(key);
                    if comparator.approx_match(&lossy_key, lossy_answer, threshold)
                        || comparator.exact_match(&lossy_key, lossy_answer)
                    {
                        hit = Some((gidx, kidx, MatchingPass::Lossy));
                        break 'groups;
                    }
                }
            }
        }

        match hit {
            Some((gidx, kidx, MatchingPass::Lossless)) => {
                let group = &mut groups[gidx];
                group.entries[kidx].1 += answer.votes;
                group.total += answer.votes;
            }
            Some((gidx, kidx, MatchingPass::Lossy)) => {
                let group = &mut groups[gidx];
                let matched_key = group.entries[kidx].0.clone();
                debug!(
                    "build_frequency_list: {:?} merged with {:?}",
                    answer.normalized, matched_key
                );
                group.credit(&answer.normalized, answer.votes);
                if matched_key != answer.normalized {
                    group.credit(&matched_key, answer.votes);
                }
                group.total += answer.votes;
            }
            None => groups.push(AggMap::singleton(&answer.normalized, answer.votes)),
        }
    }
    groups
}

/// Finds the majority group(s) and the majority value(s) in them.
///
/// Groups tied at the maximum are all kept. Within them, keys are considered
/// from the longest to the shortest and the keys tied at the highest weight
/// are all kept, the longest first.
fn majority_from_frequency_list(groups: &[AggMap]) -> Majority {
    let mut max_votes: Option<VoteWeight> = None;
    let mut runner_up: Option<VoteWeight> = None;
    let mut major_groups: Vec<&AggMap> = Vec::new();
    for group in groups.iter() {
        match max_votes {
            None => {
                max_votes = Some(group.total);
                major_groups = vec![group];
            }
            Some(max) if group.total == max => {
                runner_up = Some(max);
                major_groups.push(group);
            }
            Some(max) if group.total > max => {
                runner_up = Some(max);
                max_votes = Some(group.total);
                major_groups = vec![group];
            }
            Some(_) => {
                if runner_up.map(|r| group.total > r).unwrap_or(true) {
                    runner_up = Some(group.total);
                }
            }
        }
    }

    // Stable: keys of the same length keep the group order, then the insertion order.
    let mut sorted_keys: Vec<&(String, VoteWeight)> =
        major_groups.iter().copied().flat_map(|g| g.entries.iter()).collect();
    sorted_keys.sort_by_key(|(key, _)| std::cmp::Reverse(key.chars().count()));

    let mut current_max: Option<VoteWeight> = None;
    let mut entries: Vec<String> = Vec::new();
    for (key, weight) in sorted_keys {
        match current_max {
            Some(m) if *weight == m => entries.push(key.clone()),
            Some(m) if *weight < m => {}
            _ => {
                current_max = Some(*weight);
                entries = vec![key.clone()];
            }
        }
    }

    let group_keys: Vec<String> = major_groups
        .iter()
        .flat_map(|g| g.entries.iter().map(|(k, _)| k.clone()))
        .collect();

    Majority {
        entries,
        max_votes: max_votes.unwrap_or(VoteWeight::EMPTY).0,
        runner_up: runner_up.map(|r| r.0),
        group_keys,
    }
}

fn compute_ratio(majority: &Majority, total_votes: VoteWeight, rules: &ConsensusRules) -> f64 {
    // It only makes sense to compute a ratio with enough votes.
    if total_votes == VoteWeight::EMPTY || total_votes.0 < rules.min_votes {
        return 0.0;
    }
    let max_votes = majority.max_votes as f64;
    match rules.ratio_mode {
        RatioMode::Proportion => max_votes / total_votes.0 as f64,
        RatioMode::TopTwo => match majority.runner_up {
            Some(r) if majority.max_votes + r > 0 => {
                max_votes / (majority.max_votes + r) as f64
            }
            Some(_) => 0.0,
            None => 1.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LabelBuilder;
    use crate::compare::ExactComparator;
    use crate::normalize::NormalizerSettings;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn version(value: &str, votes: u64) -> Version {
        Version {
            value: Some(value.to_string()),
            votes,
            instances: vec![],
        }
    }

    fn label(id: &str, versions: &[(&str, u64)]) -> Label {
        let mut b = LabelBuilder::new(id, "name").unwrap();
        for (value, votes) in versions {
            b.add_version(&version(value, *votes)).unwrap();
        }
        b.build()
    }

    fn rules() -> ConsensusRules {
        ConsensusRules::DEFAULT_RULES
    }

    fn close(x: f64, y: f64) -> bool {
        (x - y).abs() < 1e-9
    }

    fn group_totals(analysis: &LabelAnalysis) -> Vec<u64> {
        analysis.frequency_groups.iter().map(|g| g.total).collect()
    }

    #[test]
    fn case_sensitive_without_lossy_pass() {
        init();
        let engine = ConsensusEngine::new(&rules()).unwrap();
        let mut l = label("l1", &[("Paris", 5), ("paris", 4)]);
        assert!(engine.resolve_label(&mut l));
        let a = l.analysis().unwrap();
        assert_eq!(group_totals(a), vec![5, 4]);
        assert_eq!(a.majority.entries, vec!["Paris".to_string()]);
        assert!(close(a.ratio, 5.0 / 9.0));
        assert_eq!(a.pass, MatchingPass::Lossless);
        assert_eq!(l.value(), Some("Paris"));
        assert_eq!(l.status(), LabelStatus::Completed);
    }

    #[test]
    fn similar_names_below_the_lossy_threshold() {
        init();
        let r = ConsensusRules {
            lossy_pass: LossyPass::Always,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();
        let mut l = label("l1", &[("Smith", 3), ("Smyth", 2), ("Jones", 1)]);
        assert!(engine.resolve_label(&mut l));
        let a = l.analysis().unwrap();
        assert_eq!(group_totals(a), vec![3, 2, 1]);
        assert_eq!(a.majority.entries, vec!["Smith".to_string()]);
        assert!(close(a.ratio, 0.5));
        assert_eq!(l.value(), Some("Smith"));
    }

    #[test]
    fn lossy_pass_merges_spellings() {
        init();
        let r = ConsensusRules {
            lossy_pass: LossyPass::Always,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();
        let l = label("l1", &[("Paris", 5), ("paris", 4), ("Lyon", 2)]);
        let a = engine.analyze(&l);
        assert_eq!(group_totals(&a), vec![9, 2]);
        let merged = &a.frequency_groups[0];
        // The new spelling gets its votes, and the matched key gets them too.
        assert_eq!(merged.weight("Paris"), Some(9));
        assert_eq!(merged.weight("paris"), Some(4));
        assert_eq!(a.majority.entries, vec!["Paris".to_string()]);
        assert_eq!(
            a.majority.group_keys,
            vec!["Paris".to_string(), "paris".to_string()]
        );
        assert!(close(a.ratio, 9.0 / 11.0));
    }

    #[test]
    fn lossy_pass_only_when_needed() {
        init();
        let r = ConsensusRules {
            lossy_pass: LossyPass::WhenNoConsensus,
            threshold: 0.6,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();

        let clear = label("l1", &[("Paris", 5), ("paris", 1)]);
        let a = engine.analyze(&clear);
        assert_eq!(a.pass, MatchingPass::Lossless);
        assert!(a.reaches_consensus);

        let mut split = label("l2", &[("Paris", 5), ("paris", 4)]);
        assert!(engine.resolve_label(&mut split));
        let a = split.analysis().unwrap();
        assert_eq!(a.pass, MatchingPass::Lossy);
        assert!(close(a.ratio, 1.0));
    }

    #[test]
    fn lossy_match_in_an_earlier_group_comes_first() {
        init();
        let r = ConsensusRules {
            lossy_pass: LossyPass::Always,
            lossy_ratio_threshold: 0.5,
            ..rules()
        };
        let settings = NormalizerSettings::default().with_translation_table("name", &[("q", "wxyz")]);
        let engine = ConsensusEngine::new(&r)
            .unwrap()
            .with_normalizer(DefaultNormalizer::new(&settings));
        let l = label("l1", &[("abcd", 1), ("wxyz", 1), ("abcdxyz", 1), ("q", 1)]);
        let a = engine.analyze(&l);
        // "wxyz" is similar enough to "abcdxyz" (6/11), which sits in the
        // first group, so "q" (translated to "wxyz") lands there.
        assert_eq!(group_totals(&a), vec![3, 1]);
        assert_eq!(a.frequency_groups[0].weight("wxyz"), Some(1));
        assert_eq!(a.frequency_groups[1].weight("wxyz"), Some(1));
        assert!(close(a.ratio, 0.75));
    }

    #[test]
    fn failed_lossy_pass_is_recorded() {
        let r = ConsensusRules {
            lossy_pass: LossyPass::WhenNoConsensus,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();
        let mut l = label("l1", &[("Anna", 1), ("Bob", 1), ("Carl", 1)]);
        assert!(!engine.resolve_label(&mut l));
        let a = l.analysis().unwrap();
        assert_eq!(a.pass, MatchingPass::Lossy);
        assert!(close(a.ratio, 1.0 / 3.0));
        assert_eq!(l.status(), LabelStatus::Pending);
        assert_eq!(l.value(), None);
    }

    #[test]
    fn exact_comparator_never_merges() {
        let r = ConsensusRules {
            lossy_pass: LossyPass::Always,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r)
            .unwrap()
            .with_comparator(ExactComparator);
        // The lossy forms are still compared for equality.
        let a = engine.analyze(&label("l1", &[("Paris", 5), ("paris!", 4), ("Pariss", 1)]));
        assert_eq!(group_totals(&a), vec![9, 1]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let engine = ConsensusEngine::new(&rules()).unwrap();
        let mut l = label("l1", &[("A", 5), ("B", 3), ("C", 2)]);
        assert!(engine.resolve_label(&mut l));
        assert!(close(l.ratio().unwrap(), 0.5));
        assert_eq!(l.value(), Some("A"));
    }

    #[test]
    fn below_threshold_keeps_the_label() {
        let engine = ConsensusEngine::new(&rules()).unwrap();
        let mut l = Label::new(
            "l1",
            "name",
            LabelStatus::Pending,
            Some("previous".to_string()),
            vec![version("A", 4), version("B", 3), version("C", 3)],
        );
        assert!(!engine.resolve_label(&mut l));
        assert!(close(l.ratio().unwrap(), 0.4));
        assert_eq!(l.status(), LabelStatus::Pending);
        assert_eq!(l.value(), Some("previous"));
    }

    #[test]
    fn completed_labels_stay_completed() {
        let engine = ConsensusEngine::new(&rules()).unwrap();
        let mut l = Label::new(
            "l1",
            "name",
            LabelStatus::Completed,
            Some("A".to_string()),
            vec![version("A", 1), version("B", 1), version("C", 1)],
        );
        assert!(!engine.resolve_label(&mut l));
        assert_eq!(l.status(), LabelStatus::Completed);
        assert_eq!(l.value(), Some("A"));
    }

    #[test]
    fn minimum_votes() {
        let r = ConsensusRules {
            min_votes: 3,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();
        let mut l = label("l1", &[("A", 2)]);
        assert!(!engine.resolve_label(&mut l));
        assert!(close(l.ratio().unwrap(), 0.0));
        assert_eq!(l.status(), LabelStatus::Pending);

        let mut l = label("l2", &[("A", 3)]);
        assert!(engine.resolve_label(&mut l));
    }

    #[test]
    fn label_without_versions() {
        let r = ConsensusRules {
            min_votes: 0,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();
        let mut l = label("l1", &[]);
        assert!(!engine.resolve_label(&mut l));
        let a = l.analysis().unwrap();
        assert!(a.frequency_groups.is_empty());
        assert!(a.majority.entries.is_empty());
        assert!(close(a.ratio, 0.0));
    }

    #[test]
    fn empty_answers_are_ignored() {
        let engine = ConsensusEngine::new(&rules()).unwrap();
        let mut b = LabelBuilder::new("l1", "name").unwrap();
        b.add_version(&version("", 7)).unwrap();
        b.add_version(&Version {
            value: None,
            votes: 2,
            instances: vec![],
        })
        .unwrap();
        b.add_version(&version("Anna", 2)).unwrap();
        b.add_version(&version("Ana", 1)).unwrap();
        let mut l = b.build();
        assert!(engine.resolve_label(&mut l));
        let a = l.analysis().unwrap();
        assert_eq!(a.total_votes, 3);
        assert_eq!(a.normalized_versions.len(), 2);
        assert_eq!(a.normalized("Anna"), Some("Anna"));
        assert_eq!(a.normalized(""), None);
        assert!(close(a.ratio, 2.0 / 3.0));
    }

    #[test]
    fn top_two_ratio() {
        let r = ConsensusRules {
            ratio_mode: RatioMode::TopTwo,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();
        let a = engine.analyze(&label("l1", &[("A", 10), ("B", 6), ("C", 4)]));
        assert_eq!(a.majority.runner_up, Some(6));
        assert!(close(a.ratio, 0.625));

        // The runner-up does not depend on the order of the groups.
        let a = engine.analyze(&label("l2", &[("C", 4), ("A", 10), ("B", 6)]));
        assert!(close(a.ratio, 0.625));

        let a = engine.analyze(&label("l3", &[("A", 3)]));
        assert_eq!(a.majority.runner_up, None);
        assert!(close(a.ratio, 1.0));
    }

    #[test]
    fn tied_groups_are_all_kept() {
        let engine = ConsensusEngine::new(&rules()).unwrap();
        let mut l = label("l1", &[("Bob", 2), ("Robert", 2)]);
        assert!(engine.resolve_label(&mut l));
        let a = l.analysis().unwrap();
        // Longer values come first among the tied ones.
        assert_eq!(
            a.majority.entries,
            vec!["Robert".to_string(), "Bob".to_string()]
        );
        assert_eq!(a.majority.runner_up, Some(2));
        assert!(close(a.ratio, 0.5));
        assert_eq!(l.value(), Some("Robert"));
    }

    #[test]
    fn single_group_has_full_ratio() {
        let engine = ConsensusEngine::new(&rules()).unwrap();
        let a = engine.analyze(&label("l1", &[("Anna", 1), ("Anna", 2)]));
        assert_eq!(group_totals(&a), vec![3]);
        assert!(close(a.ratio, 1.0));
        assert_eq!(a.normalized_versions.len(), 1);
    }

    #[test]
    fn votes_are_conserved() {
        let r = ConsensusRules {
            lossy_pass: LossyPass::Always,
            lossy_ratio_threshold: 0.6,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();
        let l = label(
            "l1",
            &[
                ("Smith", 3),
                ("", 4),
                ("Smyth", 2),
                ("smith.", 1),
                ("Jones", 1),
                ("Jonas", 5),
            ],
        );
        let a = engine.analyze(&l);
        let total: u64 = a.frequency_groups.iter().map(|g| g.total).sum();
        assert_eq!(total, l.total_votes());
        assert_eq!(total, 12);
    }

    #[test]
    fn identical_answers_share_a_group_in_any_order() {
        let normalizer = DefaultNormalizer::new(
            &NormalizerSettings::default().with_translation_table("name", &[("wm", "William")]),
        );
        let engine = ConsensusEngine::new(&rules())
            .unwrap()
            .with_normalizer(normalizer);
        let forward = engine.analyze(&label("l1", &[("Wm", 1), ("Ann", 2), ("William", 3)]));
        let backward = engine.analyze(&label("l1", &[("William", 3), ("Ann", 2), ("Wm", 1)]));
        assert_eq!(group_totals(&forward), vec![4, 2]);
        assert_eq!(group_totals(&backward), vec![4, 2]);
        assert_eq!(forward.majority.entries, vec!["William".to_string()]);
        assert_eq!(forward.normalized("Wm"), Some("William"));
    }

    #[test]
    fn analysis_is_repeatable() {
        let r = ConsensusRules {
            lossy_pass: LossyPass::WhenNoConsensus,
            ..rules()
        };
        let engine = ConsensusEngine::new(&r).unwrap();
        let mut l = label("l1", &[("Smith", 3), ("smith", 3), ("Jones", 4)]);
        let first = engine.analyze(&l);
        engine.resolve_label(&mut l);
        let second = engine.analyze(&l);
        assert_eq!(first, second);
        assert_eq!(l.analysis(), Some(&second));
    }

    #[test]
    fn pages_and_rates() {
        init();
        let mut pages = vec![
            Page {
                id: "p1".to_string(),
                labels: vec![
                    label("l1", &[("A", 3), ("B", 1)]),
                    label("l2", &[("A", 1), ("B", 1), ("C", 1)]),
                    label("l3", &[("", 2)]),
                ],
            },
            Page {
                id: "p2".to_string(),
                labels: vec![label("l4", &[("Z", 2)])],
            },
        ];
        let res = run_consensus(&mut pages, &rules()).unwrap();
        assert_eq!(
            res.page_stats[0],
            PageStats {
                page_id: "p1".to_string(),
                label_count: 3,
                labels_with_values: 2,
                consensus_count: 1,
            }
        );
        assert_eq!(res.page_stats[1].consensus_count, 1);
        assert_eq!(res.stats.label_count, 4);
        assert_eq!(res.stats.labels_with_values, 3);
        assert_eq!(res.stats.consensus_count, 2);
        assert!(close(res.stats.consensus_rate().unwrap(), 2.0 / 3.0));
        assert_eq!(pages[1].labels[0].value(), Some("Z"));
        assert!(pages[0].labels[2].analysis().is_some());
    }

    #[test]
    fn no_labels_no_rate() {
        let res = run_consensus(&mut [], &rules()).unwrap();
        assert_eq!(res.stats.consensus_rate(), None);
    }

    #[test]
    fn invalid_rules() {
        let r = ConsensusRules {
            lossy_ratio_threshold: 1.5,
            ..rules()
        };
        assert!(matches!(
            ConsensusEngine::new(&r),
            Err(ConsensusErrors::InvalidThreshold { .. })
        ));
        let r = ConsensusRules {
            threshold: -0.1,
            ..rules()
        };
        assert!(run_consensus(&mut [], &r).is_err());
    }

    #[test]
    fn threshold_sweep() {
        let pages = vec![Page {
            id: "p1".to_string(),
            labels: vec![
                label("l1", &[("A", 19), ("B", 1)]),
                label("l2", &[("A", 8), ("B", 2)]),
                label("l3", &[("A", 5), ("B", 5)]),
            ],
        }];
        let sweep = sweep_thresholds(&pages, &rules(), 0.5, 1.0, 0.2).unwrap();
        assert_eq!(sweep.len(), 3);
        assert!(close(sweep[0].0, 0.5));
        assert!(close(sweep[0].1.unwrap(), 1.0));
        assert!(close(sweep[1].0, 0.7));
        assert!(close(sweep[1].1.unwrap(), 2.0 / 3.0));
        assert!(close(sweep[2].0, 0.9));
        assert!(close(sweep[2].1.unwrap(), 1.0 / 3.0));
        // The input pages are untouched.
        assert!(pages[0].labels[0].analysis().is_none());

        assert!(sweep_thresholds(&pages, &rules(), 0.5, 0.4, 0.1).is_err());
        assert!(sweep_thresholds(&pages, &rules(), 0.5, 1.0, 0.0).is_err());
    }

    #[test]
    fn sweep_restores_the_threshold() {
        let pages = vec![Page {
            id: "p1".to_string(),
            labels: vec![label("l1", &[("A", 3), ("B", 1)])],
        }];
        let mut engine = ConsensusEngine::new(&rules()).unwrap();
        let sweep = engine.sweep(&pages, 0.7, 0.8, 0.1).unwrap();
        assert_eq!(sweep.len(), 1);
        assert!(close(sweep[0].1.unwrap(), 1.0));
        assert!(close(engine.rules().threshold, rules().threshold));
    }
}
