use crate::consensus::*;

use log::{debug, warn};
use snafu::prelude::*;

use label_consensus::normalize::NormalizerSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The options of a run, as read from the configuration file.
///
/// Every option is optional: the defaults of the engine apply.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// The acceptance threshold.
    pub seuil: Option<f64>,
    #[serde(rename = "minVotes")]
    pub min_votes: Option<u64>,
    pub top2: Option<bool>,
    #[serde(rename = "lossyRatioThreshold")]
    pub lossy_ratio_threshold: Option<f64>,
    #[serde(rename = "lossyPass")]
    pub lossy_pass: Option<String>,
    #[serde(rename = "useTranslationNormalizer")]
    pub use_translation_normalizer: Option<bool>,
    #[serde(rename = "translationTables")]
    pub translation_tables: Option<HashMap<String, HashMap<String, String>>>,
    #[serde(rename = "ignoreDefaults")]
    pub ignore_defaults: Option<bool>,
    #[serde(rename = "stripStopwords")]
    pub strip_stopwords: Option<bool>,
    #[serde(rename = "outputFolder")]
    pub output_folder: Option<String>,
}

pub fn read_config(path: &str) -> ConsensusAppResult<ConsensusConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read config: {:?}", contents);
    let config: ConsensusConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

/// The command line takes precedence over the configuration file.
pub fn merge_args(config: &ConsensusConfig, args: &Args) -> ConsensusConfig {
    ConsensusConfig {
        seuil: args.threshold.or(config.seuil),
        min_votes: args.min_votes.or(config.min_votes),
        top2: if args.top2 { Some(true) } else { config.top2 },
        lossy_ratio_threshold: args.lossy_ratio_threshold.or(config.lossy_ratio_threshold),
        lossy_pass: args.lossy_pass.clone().or_else(|| config.lossy_pass.clone()),
        output_folder: args
            .output_folder
            .clone()
            .or_else(|| config.output_folder.clone()),
        ..config.clone()
    }
}

pub fn validate_rules(config: &ConsensusConfig) -> ConsensusAppResult<ConsensusRules> {
    let defaults = ConsensusRules::DEFAULT_RULES;
    let res = ConsensusRules {
        threshold: config.seuil.unwrap_or(defaults.threshold),
        min_votes: config.min_votes.unwrap_or(defaults.min_votes),
        ratio_mode: match config.top2 {
            Some(true) => RatioMode::TopTwo,
            _ => RatioMode::Proportion,
        },
        lossy_ratio_threshold: config
            .lossy_ratio_threshold
            .unwrap_or(defaults.lossy_ratio_threshold),
        lossy_pass: match config.lossy_pass.as_deref() {
            None | Some("disabled") => LossyPass::Disabled,
            Some("whenNoConsensus") => LossyPass::WhenNoConsensus,
            Some("always") => LossyPass::Always,
            Some(x) => {
                whatever!(
                    "Cannot use lossy pass {:?}: expected disabled, whenNoConsensus or always",
                    x
                )
            }
        },
    };
    res.validate().context(ConsensusSnafu {})?;
    Ok(res)
}

pub fn normalizer_settings(config: &ConsensusConfig) -> NormalizerSettings {
    let translation_tables = config.translation_tables.clone().unwrap_or_default();
    if config.use_translation_normalizer == Some(true) && translation_tables.is_empty() {
        warn!("The translation normalizer is enabled but no translation table was provided");
    }
    NormalizerSettings {
        use_translation: config.use_translation_normalizer.unwrap_or(false),
        translation_tables,
        replace_defaults: config.ignore_defaults.unwrap_or(false),
        strip_stopwords: config.strip_stopwords.unwrap_or(false),
    }
}

/// Parses a threshold range: `start,end,step`.
pub fn parse_sweep(s: &str) -> ConsensusAppResult<(f64, f64, f64)> {
    let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
    if parts.len() != 3 {
        whatever!("Failed to understand the sweep {:?}: expected start,end,step", s)
    }
    let mut values: Vec<f64> = Vec::new();
    for p in parts {
        match p.parse::<f64>() {
            Ok(x) => values.push(x),
            Err(_) => whatever!("Failed to understand the sweep {:?}: {:?} is not a number", s, p),
        }
    }
    Ok((values[0], values[1], values[2]))
}
