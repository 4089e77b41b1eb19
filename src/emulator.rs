//! Invocation of the external emulator.
//!
//! The emulator is an R package run as a blocking subprocess. It writes its
//! projections to [`EMULATOR_OUTPUT_FILE`] inside the requested directory.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::extract::IceSource;

/// File name of the emulator's CSV output.
pub const EMULATOR_OUTPUT_FILE: &str = "projections_FAIR_FACTS.csv";

/// Errors that can occur while running the emulator.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Emulator exited with {status}")]
    Failed { status: String },
    #[error("Emulator output '{0}' not found")]
    MissingOutput(PathBuf),
    #[error("No emulator dataset configured")]
    MissingDataset,
}

/// Parameters of one emulator run.
#[derive(Debug, Clone, PartialEq)]
pub struct EmulatorRequest {
    /// Forcing dataset; required only when the emulator actually runs.
    pub dataset: Option<PathBuf>,
    pub nsamps: usize,
    pub source: IceSource,
    pub output_dir: PathBuf,
}

impl EmulatorRequest {
    /// Path the emulator writes its projections to.
    pub fn output_file(&self) -> PathBuf {
        self.output_dir.join(EMULATOR_OUTPUT_FILE)
    }

    /// R expression that runs the emulator for this request.
    pub fn r_expression(&self) -> Result<String, EmulatorError> {
        let dataset = self.dataset.as_ref().ok_or(EmulatorError::MissingDataset)?;
        Ok(format!(
            "library(emulandice);emulandice::main('decades', dataset='{}', N_FACTS={}, outdir='{}', ice_sources=c('{}'))",
            r_quote(&dataset.to_string_lossy()),
            self.nsamps,
            r_quote(&self.output_dir.to_string_lossy()),
            r_quote(self.source.label()),
        ))
    }
}

/// Escapes a value for use inside a single-quoted R string literal.
fn r_quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Produces the emulator CSV for a request.
pub trait EmulatorRunner: Send + Sync {
    /// Runs (or locates) the emulator output and returns its path.
    fn run(&self, request: &EmulatorRequest) -> Result<PathBuf, EmulatorError>;
}

/// Runs the emulator through `R -q --no-save -e <expr>`.
#[derive(Debug, Clone)]
pub struct RscriptEmulator {
    /// R executable; must be on `PATH` unless absolute.
    pub program: String,
}

impl Default for RscriptEmulator {
    fn default() -> Self {
        Self {
            program: "R".to_string(),
        }
    }
}

impl EmulatorRunner for RscriptEmulator {
    fn run(&self, request: &EmulatorRequest) -> Result<PathBuf, EmulatorError> {
        let expression = request.r_expression()?;
        std::fs::create_dir_all(&request.output_dir).map_err(|source| EmulatorError::OutputDir {
            path: request.output_dir.display().to_string(),
            source,
        })?;

        info!(program = %self.program, source = %request.source, nsamps = request.nsamps, "running emulator");
        debug!(%expression, "emulator expression");

        let status = Command::new(&self.program)
            .args(["-q", "--no-save", "-e"])
            .arg(&expression)
            .status()
            .map_err(|source| EmulatorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(EmulatorError::Failed {
                status: status.to_string(),
            });
        }
        debug!("emulator subprocess complete");

        let output = request.output_file();
        if !output.is_file() {
            return Err(EmulatorError::MissingOutput(output));
        }
        Ok(output)
    }
}

/// Uses emulator output that already exists on disk.
#[derive(Debug, Clone)]
pub struct ExistingOutput {
    pub path: PathBuf,
}

impl ExistingOutput {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl EmulatorRunner for ExistingOutput {
    fn run(&self, _request: &EmulatorRequest) -> Result<PathBuf, EmulatorError> {
        if !self.path.is_file() {
            return Err(EmulatorError::MissingOutput(self.path.clone()));
        }
        info!(path = %self.path.display(), "using existing emulator output");
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(dir: &Path) -> EmulatorRequest {
        EmulatorRequest {
            dataset: Some(PathBuf::from("/data/FACTS_climate_forcing.csv")),
            nsamps: 500,
            source: IceSource::Gris,
            output_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_r_expression() {
        let req = request(Path::new("/out"));
        assert_eq!(
            req.r_expression().unwrap(),
            "library(emulandice);emulandice::main('decades', dataset='/data/FACTS_climate_forcing.csv', \
             N_FACTS=500, outdir='/out', ice_sources=c('GrIS'))"
        );
        assert_eq!(req.output_file(), PathBuf::from("/out/projections_FAIR_FACTS.csv"));
    }

    #[test]
    fn test_r_quote_escapes_quotes() {
        assert_eq!(r_quote(r"it's"), r"it\'s");
        assert_eq!(r_quote(r"a\b"), r"a\\b");
        let mut req = request(Path::new("/out"));
        req.dataset = Some(PathBuf::from("x'); system('rm"));
        assert!(req.r_expression().unwrap().contains(r"dataset='x\'); system(\'rm'"));
    }

    #[test]
    fn test_dataset_required_to_run() {
        let mut req = request(Path::new("/out"));
        req.dataset = None;
        assert!(matches!(req.r_expression(), Err(EmulatorError::MissingDataset)));
    }

    #[test]
    fn test_existing_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(EMULATOR_OUTPUT_FILE);
        let runner = ExistingOutput::new(&path);
        assert!(matches!(
            runner.run(&request(dir.path())),
            Err(EmulatorError::MissingOutput(_))
        ));

        std::fs::write(&path, "header\n").unwrap();
        assert_eq!(runner.run(&request(dir.path())).unwrap(), path);
    }

    #[test]
    fn test_spawn_failure() {
        let dir = tempdir().unwrap();
        let runner = RscriptEmulator {
            program: "emulandice-no-such-program".to_string(),
        };
        assert!(matches!(
            runner.run(&request(dir.path())),
            Err(EmulatorError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_fatal() {
        let dir = tempdir().unwrap();
        let runner = RscriptEmulator {
            program: "false".to_string(),
        };
        assert!(matches!(
            runner.run(&request(dir.path())),
            Err(EmulatorError::Failed { .. })
        ));
    }
}
