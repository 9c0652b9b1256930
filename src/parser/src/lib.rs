use std::{
    error::Error,
    ffi::OsStr,
    fmt::{self, Display, Formatter},
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use located_error::*;
use log::debug;
use serde::{Deserialize, Serialize};

mod error;
pub use error::ParserError;

#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(name = "tsinfer-rs", author, version, about, long_about = None)]
#[clap(propagate_version = true)]
/// tsinfer-rs: infer tree-sequence genealogies from binary haplotype matrices
pub struct Cli {
    /// Set the verbosity level (-v -vv -vvv)
    ///
    /// -v: Info  |  -vv: Debug  |  -vvv: Trace. {n}
    /// The program still emits warnings by default, even without this flag. Use
    /// --quiet to disable them.
    #[clap(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable warnings. Only errors will be displayed.
    #[clap(short = 'q', long, global = true)]
    pub quiet: bool,

    #[clap(subcommand)]
    pub commands: Commands,
}

impl Cli {
    /// Serialize command line arguments to a timestamped `.yaml` file under the
    /// invocation's output directory, for provenance and later `from-yaml` reruns.
    ///
    /// # Errors
    /// Returns an error if `serde_yaml` fails to serialize `Self`, or if the
    /// output directory cannot be written to.
    pub fn serialize(&self) -> Result<(), Box<dyn Error>> {
        let serialized = serde_yaml::to_string(&self)
            .map_err(|err| format!("failed to serialize command line arguments, got [{err}]"))?;
        debug!("\n---- Command line args ----\n{serialized}\n---");

        let current_time = chrono::offset::Local::now().format("%Y-%m-%dT%H%M%S").to_string();
        let output_dir = match &self.commands {
            Commands::BuildAncestors { common, .. }
            | Commands::MatchAncestors { common, .. }
            | Commands::MatchSamples { common, .. }
            | Commands::Infer { common, .. } => &common.output_dir,
            Commands::FromYaml { .. } | Commands::Cite => return Ok(()),
        };

        let subcommand = match &self.commands {
            Commands::BuildAncestors { .. } => "build-ancestors",
            Commands::MatchAncestors { .. } => "match-ancestors",
            Commands::MatchSamples { .. } => "match-samples",
            Commands::Infer { .. } => "infer",
            Commands::FromYaml { .. } | Commands::Cite => unreachable!(),
        };

        let output_file = output_dir.join(format!("{current_time}-{subcommand}.yaml"));
        std::fs::write(&output_file, serialized)
            .map_err(|e| format!("unable to serialize arguments into {}: [{e}]", output_file.display()))?;
        Ok(())
    }

    /// Deserialize a previously-serialized `.yaml` invocation back into [`Cli`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or does not deserialize to
    /// a valid [`Cli`].
    pub fn deserialize(yaml: &Path) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_reader(File::open(yaml)?)?)
    }
}

#[derive(Subcommand, Debug, Serialize, Deserialize)]
pub enum Commands {
    /// Group inference sites into ancestor descriptors and materialize their haplotypes.
    BuildAncestors {
        #[clap(flatten)]
        common: Common,
        #[clap(flatten)]
        args: BuildAncestorsArgs,
    },
    /// Match previously-built ancestors against each other, oldest-to-youngest, into a tree sequence.
    MatchAncestors {
        #[clap(flatten)]
        common: Common,
        #[clap(flatten)]
        args: MatchAncestorsArgs,
    },
    /// Match samples against the ancestors tree sequence, completing the genealogy.
    MatchSamples {
        #[clap(flatten)]
        common: Common,
        #[clap(flatten)]
        args: MatchSamplesArgs,
    },
    /// Run `build-ancestors`, `match-ancestors` and `match-samples` in one pass.
    Infer {
        #[clap(flatten)]
        common: Common,
        #[clap(flatten)]
        args: InferArgs,
    },
    /// Re-run a previously serialized invocation from its `.yaml` provenance file.
    FromYaml { yaml: PathBuf },
    /// Print citation/about text for this project.
    Cite,
}

#[derive(Parser, Debug, Default, Serialize, Deserialize)]
pub struct Common {
    /// Output directory where results and the provenance `.yaml` are written.
    ///
    /// Created if it does not already exist.
    #[clap(short, long, default_value("tsinfer-output"), value_parser = valid_output_dir)]
    pub output_dir: PathBuf,

    /// Overwrite existing output files.
    #[clap(short = 'w', long)]
    pub overwrite: bool,

    /// Number of worker threads for ancestor generation and within-epoch matching.
    ///
    /// `0` uses rayon's default (one per logical core).
    #[clap(short = '@', long, default_value("0"))]
    pub threads: usize,

    /// Disable path compression during `add_path`. Path compression is on by
    /// default; pass this flag to turn it off.
    #[clap(long = "no-path-compression", action(ArgAction::SetFalse))]
    pub path_compression: bool,
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct BuildAncestorsArgs {
    /// Input sample-data artifact (JSON/YAML-backed in-memory format).
    #[clap(value_parser = valid_input_file)]
    pub input: PathBuf,

    /// Output ancestors artifact. Defaults to the input path with its extension
    /// replaced by `.ancestors`.
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct MatchAncestorsArgs {
    /// Input sample-data artifact the ancestors were built against.
    #[clap(value_parser = valid_input_file)]
    pub samples: PathBuf,

    /// Input ancestors artifact produced by `build-ancestors`.
    #[clap(value_parser = valid_input_file)]
    pub ancestors: PathBuf,

    /// Output tree-sequence artifact. Defaults to the ancestors path with its
    /// extension replaced by `.trees`.
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// A previously-dumped tree-sequence artifact to restore from and resume matching.
    #[clap(long, value_parser = valid_input_file)]
    pub restore: Option<PathBuf>,
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct MatchSamplesArgs {
    /// Input sample-data artifact carrying the samples to match.
    #[clap(value_parser = valid_input_file)]
    pub samples: PathBuf,

    /// Input ancestors tree-sequence artifact produced by `match-ancestors`.
    #[clap(value_parser = valid_input_file)]
    pub ancestors_trees: PathBuf,

    /// Output tree-sequence artifact. Defaults to the input samples path with
    /// its extension replaced by `.trees`.
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct InferArgs {
    /// Input sample-data artifact.
    #[clap(value_parser = valid_input_file)]
    pub input: PathBuf,

    /// Output tree-sequence artifact. Defaults to the input path with its
    /// extension replaced by `.trees`.
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl Common {
    /// Check whether `path` can be written, honoring `--overwrite`.
    ///
    /// # Errors
    /// If `path` already exists and `--overwrite` was not given.
    pub fn can_write_file(&self, path: &Path) -> Result<(), ParserError> {
        if !self.overwrite && path.exists() {
            return Err(ParserError::CannotOverwrite(path.display().to_string()));
        }
        Ok(())
    }
}

/// Derive a default output path by swapping `input`'s extension for `new_ext`,
/// following the `.samples` -> `.ancestors` -> `.trees` convention.
///
/// # Errors
/// If `input` has no file stem to build a sibling path from.
pub fn derive_output_path(input: &Path, new_ext: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .ok_or_else(|| anyhow!(ParserError::NoFileStem(input.display().to_string())))
        .loc("While deriving a default output path")?;
    let mut output = input.to_path_buf();
    output.set_file_name(stem);
    output.set_extension(new_ext);
    Ok(output)
}

#[derive(Debug, Clone, Copy)]
pub enum FileEntity {
    File,
    Directory,
}

impl Display for FileEntity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::File => write!(f, "File"),
            Self::Directory => write!(f, "Directory"),
        }
    }
}

impl FileEntity {
    fn validate(&self, path: &Path) -> Result<(), ParserError> {
        let valid = match self {
            Self::File => path.is_file(),
            Self::Directory => path.is_dir(),
        };
        if valid {
            Ok(())
        } else {
            Err(ParserError::InvalidFileEntity(*self, path.display().to_string()))
        }
    }
}

fn assert_filesystem_entity_is_valid(s: &OsStr, entity: &FileEntity) -> Result<()> {
    let path = Path::new(s);
    if !path.exists() {
        return Err(ParserError::MissingFileEntity(*entity, path.display().to_string())).loc("While parsing arguments");
    }
    entity.validate(path).loc("While parsing arguments")
}

fn valid_input_file(s: &OsStr) -> Result<PathBuf> {
    assert_filesystem_entity_is_valid(s, &FileEntity::File).loc("While checking for file validity")?;
    Ok(PathBuf::from(s))
}

fn valid_output_dir(s: &OsStr) -> Result<PathBuf> {
    if !Path::new(s).exists() {
        std::fs::create_dir_all(s)?;
    }
    assert_filesystem_entity_is_valid(s, &FileEntity::Directory).loc("While checking for directory validity")?;
    Ok(PathBuf::from(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_ancestors_path_from_samples_input() {
        let input = PathBuf::from("/tmp/example.samples");
        let output = derive_output_path(&input, "ancestors").unwrap();
        assert_eq!(output, PathBuf::from("/tmp/example.ancestors"));
    }

    #[test]
    fn derives_trees_path_from_ancestors_input() {
        let input = PathBuf::from("run/chr1.ancestors");
        let output = derive_output_path(&input, "trees").unwrap();
        assert_eq!(output, PathBuf::from("run/chr1.trees"));
    }

    #[test]
    fn can_write_file_rejects_existing_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.trees");
        std::fs::write(&file, b"x").unwrap();

        let common = Common { output_dir: dir.path().to_path_buf(), overwrite: false, threads: 0, path_compression: true };
        let err = common.can_write_file(&file).unwrap_err();
        assert!(matches!(err, ParserError::CannotOverwrite(_)));

        let common = Common { overwrite: true, ..common };
        assert!(common.can_write_file(&file).is_ok());
    }
}
