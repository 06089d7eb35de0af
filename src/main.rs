//! Beamline - accelerator lattice tool
//!
//! Loads an elegant-style `.lte` lattice and expands, addresses, edits or
//! re-renders its beamlines.
//!
//! # Usage
//!
//! ```bash
//! beamline linac.lte expand BL --extend
//! beamline linac.lte select BL QUAD "0,2"
//! beamline linac.lte mutate BL QUAD all K1 +10% -o linac_scaled.lte
//! ```

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use beamline_core::{
    dsl::{Loader, LoaderConfig},
    error::{BeamlineError, Result},
    lattice::{validate_namespace, OrderingRecord},
    output::{render, to_json, RenderConfig},
};

/// Accelerator lattice parser and beamline editor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the lattice file (.lte)
    #[arg(value_name = "LATTICE_FILE")]
    lattice_file: PathBuf,

    /// Prefix of control annotation lines
    #[arg(long, default_value = beamline_core::dsl::DEFAULT_ANNOTATION_MARKER)]
    annotation_marker: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the namespace as a JSON document
    Json,
    /// Expand a beamline into element names
    Expand {
        beamline: String,
        /// Materialize every repetition
        #[arg(long)]
        extend: bool,
    },
    /// Number the elements of a beamline within their type
    Order {
        beamline: String,
        /// Only show elements of this type
        #[arg(long = "type")]
        element_type: Option<String>,
    },
    /// Select elements of one type by occurrence ("all", "3", "0,2", "1:5:2")
    Select {
        beamline: String,
        element_type: String,
        selector: String,
    },
    /// Edit a numeric parameter of the selected elements
    Mutate {
        beamline: String,
        element_type: String,
        selector: String,
        property: String,
        /// "+10%", "+0.5", "-0.5", "*2" or "/2"
        #[arg(allow_hyphen_values = true)]
        op: String,
        /// Write the edited beamline as lattice text
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render a beamline back into lattice text
    Render {
        beamline: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Start the beamline with the CHARGE element
        #[arg(long)]
        charge: bool,
        /// Emit resolved variables
        #[arg(long)]
        variables: bool,
    },
    /// Report load diagnostics and broken beamlines
    Check,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = LoaderConfig::new().with_annotation_marker(args.annotation_marker.as_str());
    let loader = Loader::new(config);
    let mut namespace = loader.load_file(&args.lattice_file)?;
    for diagnostic in namespace.diagnostics() {
        warn!("{}", diagnostic);
    }

    match args.command {
        Command::Json => {
            println!("{}", serde_json::to_string_pretty(&to_json(&namespace)?)?);
        }
        Command::Expand { beamline, extend } => {
            for name in namespace.expand(&beamline, extend)? {
                println!("{}", name);
            }
        }
        Command::Order { beamline, element_type } => {
            let records = namespace.order(&beamline)?;
            print_records(records.iter().filter(|r| {
                element_type
                    .as_deref()
                    .map_or(true, |t| r.element_type.eq_ignore_ascii_case(t))
            }));
        }
        Command::Select {
            beamline,
            element_type,
            selector,
        } => {
            let records = namespace.select(&beamline, &element_type, &selector)?;
            print_records(records.iter());
        }
        Command::Mutate {
            beamline,
            element_type,
            selector,
            property,
            op,
            output,
        } => {
            let edits = namespace.mutate(&beamline, &element_type, &selector, &property, &op)?;
            for edit in &edits {
                println!("{:<10} {:<6} {} -> {}", edit.element, edit.property, edit.old, edit.new);
            }
            if let Some(path) = output {
                write_output(&path, &render(&namespace, &beamline, &RenderConfig::default())?)?;
            }
        }
        Command::Render {
            beamline,
            output,
            charge,
            variables,
        } => {
            let config = RenderConfig::new().with_charge_element(charge).with_variables(variables);
            let text = render(&namespace, &beamline, &config)?;
            match output {
                Some(path) => write_output(&path, &text)?,
                None => print!("{}", text),
            }
        }
        Command::Check => {
            for diagnostic in namespace.diagnostics() {
                println!("{}", diagnostic);
            }
            let errors = validate_namespace(&namespace);
            for err in &errors {
                println!("{}", err);
            }
            if let Some(first) = errors.into_iter().next() {
                return Err(first);
            }
            println!(
                "{} definitions, {} beamlines, {} diagnostics",
                namespace.len(),
                namespace.beamline_names().count(),
                namespace.diagnostics().len()
            );
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_records<'a>(records: impl Iterator<Item = &'a OrderingRecord>) {
    for record in records {
        println!("{}", record);
    }
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).map_err(|e| BeamlineError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    info!(path = %path.display(), bytes = text.len(), "lattice written");
    Ok(())
}
