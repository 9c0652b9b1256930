extern crate parser;
extern crate logger;

use parser::{Cli, Commands};

#[macro_use]
extern crate log;

use std::error::Error;

use orchestrator::Provenance;

fn provenance_for(cli: &Cli, subcommand: &str) -> Provenance {
    let parameters = serde_yaml::to_string(cli).unwrap_or_default();
    let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    Provenance::new(subcommand, parameters, timestamp)
}

/// Dispatch a parsed [`Cli`] to the orchestrator. Cancellation is always a
/// fresh, never-tripped flag: this crate runs one invocation per process and
/// has no signal handler wired in yet.
pub fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let cancel = std::sync::atomic::AtomicBool::new(false);

    match &cli.commands {
        Commands::BuildAncestors { common, args } => {
            let output = match &args.output {
                Some(output) => output.clone(),
                None => parser::derive_output_path(&args.input, "ancestors")?,
            };
            common.can_write_file(&output)?;
            let provenance = provenance_for(&cli, "build-ancestors");
            orchestrator::build_ancestors(&args.input, &output, common.threads, provenance, &cancel)?;
            info!("wrote ancestors artifact to {}", output.display());
        }

        Commands::MatchAncestors { common, args } => {
            let output = match &args.output {
                Some(output) => output.clone(),
                None => parser::derive_output_path(&args.ancestors, "trees")?,
            };
            common.can_write_file(&output)?;
            let provenance = provenance_for(&cli, "match-ancestors");
            orchestrator::run_match_ancestors(
                &args.samples,
                &args.ancestors,
                &output,
                args.restore.as_deref(),
                common.threads,
                common.path_compression,
                provenance,
                &cancel,
            )?;
            info!("wrote tree-sequence artifact to {}", output.display());
        }

        Commands::MatchSamples { common, args } => {
            let output = match &args.output {
                Some(output) => output.clone(),
                None => parser::derive_output_path(&args.samples, "trees")?,
            };
            common.can_write_file(&output)?;
            let provenance = provenance_for(&cli, "match-samples");
            orchestrator::run_match_samples(
                &args.samples,
                &args.ancestors_trees,
                &output,
                common.threads,
                common.path_compression,
                provenance,
                &cancel,
            )?;
            info!("wrote tree-sequence artifact to {}", output.display());
        }

        Commands::Infer { common, args } => {
            let output = match &args.output {
                Some(output) => output.clone(),
                None => parser::derive_output_path(&args.input, "trees")?,
            };
            common.can_write_file(&output)?;
            let provenance = provenance_for(&cli, "infer");
            orchestrator::infer(&args.input, &output, common.threads, common.path_compression, provenance, &cancel)?;
            info!("wrote tree-sequence artifact to {}", output.display());
        }

        Commands::FromYaml { yaml } => {
            let replayed = Cli::deserialize(yaml)?;
            run(replayed)?;
        }

        Commands::Cite => {
            println!(
                "{} {}\n{}\n{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                env!("CARGO_PKG_DESCRIPTION"),
                env!("CARGO_PKG_REPOSITORY")
            );
        }
    };

    Ok(())
}
