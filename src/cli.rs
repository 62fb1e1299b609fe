use crate::config::load_config;
use crate::dataset::parse_dataset;
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "pedlay", version, about = "Pedigree diagram layout engine")]
pub struct Args {
    /// Dataset file (JSON or JSON5 array of person records) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Layout JSON output. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file (dimensions, routing, filtering)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Id of the individual to lay out from (defaults to the proband)
    #[arg(long = "root")]
    pub root: Option<String>,

    /// Leave individuals unrelated to the root out of the diagram
    #[arg(long = "filter-unrelated")]
    pub filter_unrelated: bool,

    /// Restrict and order the disease legend; may be repeated
    #[arg(long = "visible-disease")]
    pub visible_diseases: Vec<String>,

    /// Drop malformed records instead of failing
    #[arg(long = "skip-malformed")]
    pub skip_malformed: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(root) = args.root.clone() {
        config.root_id = Some(root);
    }
    if args.filter_unrelated {
        config.filter_unrelated_individuals = true;
    }
    if !args.visible_diseases.is_empty() {
        config.visible_diseases = Some(args.visible_diseases.clone());
    }
    if args.skip_malformed {
        config.skip_malformed_records = true;
    }

    let input = read_input(args.input.as_deref())?;
    let records = parse_dataset(&input)?;
    let layout = compute_layout(&records, &config).context("pedigree unavailable")?;
    write_layout_dump(
        args.output.as_deref(),
        &layout,
        config.dimensions.corner_radius,
    )?;
    Ok(())
}

fn init_logging(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .parse_default_env()
        .init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
