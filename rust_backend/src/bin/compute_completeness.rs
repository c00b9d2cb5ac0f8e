//! Compute a completeness map from a TOML run configuration.
//!
//! Usage: `compute_completeness [config.toml]`
//!
//! Without an argument, `completeness.toml` is looked up in the current directory.
//! The estimate is written as JSON to `output.path`, or to stdout when unset.
//! Set `RUST_LOG=info` (or `debug` for fit iterations) to see progress.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};

use kepler_completeness::config::RunConfig;
use kepler_completeness::io::SurveyLoader;
use kepler_completeness::report::DiagnosticsReport;
use kepler_completeness::services::get_completeness;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RunConfig::from_file(&path)
            .with_context(|| format!("Failed to load run configuration {}", path))?,
        None => RunConfig::from_default_location().context("Failed to load run configuration")?,
    };
    let request = config.to_request()?;

    let survey = SurveyLoader::load(&config.inputs).context("Failed to load survey inputs")?;
    let estimate = get_completeness(&survey, &request).context("Completeness computation failed")?;

    if config.output.verbose {
        eprintln!("{}", DiagnosticsReport::new(&estimate));
    }

    match &config.output.path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &estimate)
                .context("Failed to serialise completeness estimate")?;
            writer.flush()?;
            log::info!("Wrote completeness estimate to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &estimate)
                .context("Failed to serialise completeness estimate")?;
            writeln!(writer)?;
        }
    }

    Ok(())
}
