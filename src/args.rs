use clap::Parser;

/// This is a consensus finding program for crowd-sourced transcriptions.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON document with the subjects and their transcriptions.
    /// For more information about the file format, read the manual of the label_consensus crate.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, optional) A JSON file with the consensus options (seuil, minVotes, top2, ...).
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the expected output in JSON format. If provided, labelcons will
    /// check that the computed output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the resolved document will be written in JSON format to the given
    /// location. Otherwise it is written as result.json in the output folder.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (directory, optional) Where result.json and ConsensusCount.txt are written. Setting this option overrides
    /// the outputFolder that may be specified with the --config option. Defaults to the folder of the input.
    #[clap(long, value_parser)]
    pub output_folder: Option<String>,

    /// (default 0.5) The acceptance threshold on the agreement ratio.
    #[clap(short, long, value_parser)]
    pub threshold: Option<f64>,

    /// (default 1) The minimum number of votes for a label to reach a consensus.
    #[clap(long, value_parser)]
    pub min_votes: Option<u64>,

    /// If passed as an argument, the ratio is computed over the two best groups only.
    #[clap(long, takes_value = false)]
    pub top2: bool,

    /// (default 0.9) The similarity required to merge two answers in the lossy pass.
    #[clap(long, value_parser)]
    pub lossy_ratio_threshold: Option<f64>,

    /// (disabled, whenNoConsensus or always) When answers are compared with their lossy forms.
    #[clap(long, value_parser)]
    pub lossy_pass: Option<String>,

    /// (start,end,step) Runs the consensus for each threshold in the range and prints the consensus rates.
    #[clap(long, value_parser)]
    pub sweep: Option<String>,

    /// (file path, optional) If specified, the contributions of each worker are written in JSON format to the
    /// given location.
    #[clap(long, value_parser)]
    pub contributors: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
