use log::{debug, info, warn};

use label_consensus::contributors::ContributorIndex;
use label_consensus::normalize::DefaultNormalizer;
use label_consensus::*;
use snafu::{prelude::*, ErrorCompat, Snafu};

use std::fs;

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::consensus::config_reader::*;
use crate::consensus::io_common::*;
use crate::consensus::io_json::*;

pub mod config_reader;
pub mod io_common;
pub mod io_json;

#[derive(Debug, Snafu)]
pub enum ConsensusAppError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Missing field: {what}"))]
    MissingField { what: String },
    #[snafu(display("Invalid timestamp {value:?}"))]
    InvalidTimestamp {
        source: chrono::ParseError,
        value: String,
    },
    #[snafu(display("{source}"))]
    Consensus { source: ConsensusErrors },
    #[snafu(display("Difference detected between the computed output and the reference output"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ConsensusAppResult<T> = Result<T, ConsensusAppError>;

fn read_reference(path: &str) -> ConsensusAppResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

fn consensus_count_text(result: &ConsensusResult) -> String {
    let mut res = String::new();
    for ps in result.page_stats.iter() {
        res.push_str(&format!("{} / {}\n", ps.consensus_count, ps.label_count));
    }
    res
}

fn print_sweep(rates: &[(f64, Option<f64>)]) {
    println!("threshold\tconsensus rate");
    for (threshold, rate) in rates.iter() {
        match rate {
            Some(r) => println!("{:.3}\t{:.4}", threshold, r),
            None => println!("{:.3}\t-", threshold),
        }
    }
}

/// Runs the consensus on the input document, with the options of the
/// configuration file overridden by the command line.
pub fn run_job(args: &Args) -> ConsensusAppResult<()> {
    let input_path = match args.input.clone() {
        Some(p) => p,
        None => whatever!("No input file provided, use the --input option"),
    };

    let file_config = match args.config.clone() {
        Some(config_path) => read_config(&config_path)?,
        None => ConsensusConfig::default(),
    };
    let config = merge_args(&file_config, args);
    info!("config: {:?}", config);

    let rules = validate_rules(&config)?;
    let settings = normalizer_settings(&config);

    let mut doc = read_document(&input_path)?;
    let mut pages = build_pages(&doc)?;
    info!(
        "Read {} pages and {} labels from {}",
        pages.len(),
        pages.iter().map(|p| p.labels.len()).sum::<usize>(),
        input_path
    );

    let mut engine = ConsensusEngine::new(&rules)
        .context(ConsensusSnafu {})?
        .with_normalizer(DefaultNormalizer::new(&settings));

    if let Some(sweep) = args.sweep.clone() {
        let (start, end, step) = parse_sweep(&sweep)?;
        let rates = engine
            .sweep(&pages, start, end, step)
            .context(ConsensusSnafu {})?;
        print_sweep(&rates);
        return Ok(());
    }

    let result = engine.run(&mut pages);
    match result.stats.consensus_rate() {
        Some(rate) => info!("Consensus rate: {:.4}", rate),
        None => warn!("No label has a value, the consensus rate is undefined"),
    }

    update_document(&mut doc, &pages)?;
    let result_js = serde_json::to_value(&doc).context(ParsingJsonSnafu {})?;
    let pretty_js = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    let output_folder = match config.output_folder.clone() {
        Some(folder) => folder,
        None => default_output_folder(&input_path),
    };
    debug!("output folder: {:?}", output_folder);
    match args.out.as_deref() {
        Some("stdout") => println!("{}", pretty_js),
        Some(out_path) if !out_path.is_empty() => write_output(out_path, &pretty_js)?,
        _ => write_output(&output_path(&output_folder, RESULT_FILE), &pretty_js)?,
    }
    write_output(
        &output_path(&output_folder, CONSENSUS_COUNT_FILE),
        &consensus_count_text(&result),
    )?;

    if let Some(contributors_path) = args.contributors.clone() {
        let index = ContributorIndex::build(&pages);
        info!("Writing the contributions of {} workers", index.len());
        let js = contributors_to_json(&index);
        let pretty = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
        write_output(&contributors_path, &pretty)?;
    }

    // The reference output, if provided for comparison
    if let Some(reference_path) = args.reference.clone() {
        let reference = read_reference(&reference_path)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js {
            warn!("Found differences with the reference output");
            print_diff(pretty_js_reference.as_str(), pretty_js.as_ref(), "\n");
            return ReferenceMismatchSnafu {}.fail();
        }
        info!("The output matches the reference {}", reference_path);
    }

    Ok(())
}

fn test_output_folder(test_name: &str) -> String {
    std::env::temp_dir()
        .join("labelcons")
        .join(test_name)
        .display()
        .to_string()
}

fn run_consensus_test(test_name: &str, input_lpath: &str, config_lpath: &str, expected_lpath: &str) {
    let test_dir = option_env!("CONSENSUS_TEST_DIR")
        .unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data"));
    info!("Running test {}", test_name);
    let args = Args {
        input: Some(format!("{}/{}/{}", test_dir, test_name, input_lpath)),
        config: Some(format!("{}/{}/{}", test_dir, test_name, config_lpath)),
        reference: Some(format!("{}/{}/{}", test_dir, test_name, expected_lpath)),
        out: Some("stdout".to_string()),
        output_folder: Some(test_output_folder(test_name)),
        ..Args::default()
    };
    let res = run_job(&args);
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        panic!("test {} failed: {}", test_name, e);
    }
}

pub fn test_wrapper(test_name: &str) {
    run_consensus_test(
        test_name,
        format!("{}_input.json", test_name).as_str(),
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected.json", test_name).as_str(),
    )
}
