use crate::consensus::*;

use log::info;
use snafu::prelude::*;
use std::path::Path;

pub const RESULT_FILE: &str = "result.json";
pub const CONSENSUS_COUNT_FILE: &str = "ConsensusCount.txt";

/// The folder of the input file, or the current folder.
pub fn default_output_folder(input_path: &str) -> String {
    match Path::new(input_path).parent() {
        Some(p) if !p.as_os_str().is_empty() => p.display().to_string(),
        _ => ".".to_string(),
    }
}

pub fn output_path(folder: &str, file_name: &str) -> String {
    Path::new(folder).join(file_name).display().to_string()
}

/// Writes the file, creating the missing folders.
pub fn write_output(path: &str, contents: &str) -> ConsensusAppResult<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(WritingOutputSnafu { path })?;
        }
    }
    fs::write(path, contents).context(WritingOutputSnafu { path })?;
    info!("Wrote {}", path);
    Ok(())
}
