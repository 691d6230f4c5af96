use clap::Parser;
use custver::{Config, Host, SourceDocument};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

/// Resolve `custver` blocks in reStructuredText sources.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Source files to process.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// JSON object of configuration variables.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override a variable, NAME=VALUE (VALUE is JSON or a plain string).
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    defines: Vec<String>,
    /// Client to build for; without one every block is annotated.
    #[arg(long)]
    client: Option<String>,
    /// Builder name exposed to expressions as `builder`.
    #[arg(short, long, default_value = custver::config::DEFAULT_BUILDER)]
    builder: String,
    /// Write outputs into this directory instead of stdout.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    /// Write the per-document resolution reports as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    // Parse CLI arguments.
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), custver::Error> {
    // Build configuration.
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::new(),
    };
    for define in &args.defines {
        config.define(define)?;
    }
    if let Some(client) = &args.client {
        config.set("client", Value::String(client.clone()));
    }
    let config = config.with_builder(args.builder.clone());
    debug!(?config, "configuration loaded");

    let sources = args
        .inputs
        .iter()
        .map(|p| SourceDocument::load(p))
        .collect::<Result<Vec<_>, _>>()?;

    let targets = match &args.out_dir {
        Some(dir) => Some(output_targets(dir, &args.inputs)?),
        None => None,
    };

    let host = Host::with_custver(config);
    let built = host.build_all(&sources);

    match (&args.out_dir, targets) {
        (Some(dir), Some(targets)) => {
            for (doc, target) in built.iter().zip(&targets) {
                write_file(dir, target, &doc.output)?;
            }
        }
        _ => built.iter().for_each(|doc| print!("{}", doc.output)),
    }

    if let Some(report) = &args.report {
        let resolutions: Vec<_> = built.iter().flat_map(|d| &d.resolutions).collect();
        let json = serde_json::to_string_pretty(&resolutions)?;
        write_file(report.parent().unwrap_or(Path::new(".")), report, &json)?;
    }
    Ok(())
}

/// One file per input inside `dir`, named after the input. Two inputs with
/// the same file name would overwrite each other and are rejected.
fn output_targets(dir: &Path, inputs: &[PathBuf]) -> Result<Vec<PathBuf>, custver::Error> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .map(|path| {
            let name = path.file_name().unwrap_or(path.as_os_str());
            if !seen.insert(name.to_os_string()) {
                return Err(custver::Error::Config(format!(
                    "more than one input is named {:?}; outputs would overwrite each other in {}",
                    name,
                    dir.display()
                )));
            }
            Ok(dir.join(name))
        })
        .collect()
}

fn write_file(dir: &Path, target: &Path, content: &str) -> Result<(), custver::Error> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| custver::Error::Io { path, source }
    };
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    fs::write(target, content).map_err(io_err(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn targets_are_named_after_inputs() {
        let inputs = [PathBuf::from("docs/index.rst"), PathBuf::from("guide.rst")];
        let targets = output_targets(Path::new("out"), &inputs).unwrap();
        assert_eq!(targets, vec![PathBuf::from("out/index.rst"), PathBuf::from("out/guide.rst")]);
    }

    #[test]
    fn duplicate_file_names_are_rejected() {
        let inputs = [PathBuf::from("a/index.rst"), PathBuf::from("b/index.rst")];
        let err = output_targets(Path::new("out"), &inputs).unwrap_err();
        assert!(matches!(err, custver::Error::Config(_)));
        assert!(err.to_string().contains("index.rst"), "{err}");
    }
}
