// Command-line entry point for Constable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use constable::domain::ast::SourceFile;
use constable::domain::options::{OptionValue, TraceOptions};
use constable::domain::report::RewriteReport;
use constable::infrastructure::config::load_options;
use constable::infrastructure::project_loader::ProjectLoader;
use constable::infrastructure::rewrite_cache::RewriteCache;
use constable::infrastructure::{JsonReportExporter, TextReportExporter};
use constable::api::dto::RewriteReportDto;
use constable::ports::ReportExporter;
use constable::TraceUsecase;

#[derive(Parser, Debug)]
#[command(author, version, about = "Trace assignments inside one Rust function", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Rewrite a function and print the instrumented source
    Instrument {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        trace: TraceArgs,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = Format::Rust)]
        format: Format,

        /// Keep rewrite results in this directory between runs
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Show where a function lives and which statements would be traced
    Locate {
        #[command(flatten)]
        target: TargetArgs,

        /// Variables to watch
        #[arg(short, long, value_delimiter = ',')]
        watch: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Input source file
    #[arg(short, long, conflicts_with = "workspace", required_unless_present = "workspace")]
    input: Option<PathBuf>,

    /// Workspace Cargo.toml
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Function to trace: `name` or `Type::method`
    #[arg(long = "fn", value_name = "NAME")]
    function: String,
}

#[derive(Args, Debug)]
struct TraceArgs {
    /// Variables to watch
    #[arg(short, long, value_delimiter = ',')]
    watch: Vec<String>,

    /// constable.toml with a [trace] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// One line per assignment instead of a block
    #[arg(long)]
    terse: bool,

    /// No blank line before each diagnostic
    #[arg(long)]
    no_spacing: bool,

    /// No summary block after the call
    #[arg(long)]
    no_summary: bool,

    #[arg(long)]
    show_args: Option<bool>,

    #[arg(long)]
    show_result: Option<bool>,

    #[arg(long)]
    show_timing: Option<bool>,

    /// Truncate rendered values to N characters
    #[arg(long, value_name = "N")]
    max_len: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Rust,
    Json,
}

impl TraceArgs {
    /// Config file first, then flags on top.
    fn options(&self) -> Result<TraceOptions> {
        let mut options = match &self.config {
            Some(path) => load_options(path)?,
            None => TraceOptions::default(),
        };

        let mut flags: Vec<(&str, OptionValue)> = Vec::new();
        if !self.watch.is_empty() {
            flags.push(("watch", OptionValue::List(self.watch.clone())));
        }
        if self.terse {
            flags.push(("verbose", OptionValue::Bool(false)));
        }
        if self.no_spacing {
            flags.push(("use_spaces", OptionValue::Bool(false)));
        }
        if self.no_summary {
            flags.push(("exec_info", OptionValue::Bool(false)));
        }
        for (key, value) in [
            ("show_args", self.show_args),
            ("show_result", self.show_result),
            ("show_timing", self.show_timing),
        ] {
            if let Some(on) = value {
                flags.push((key, OptionValue::Bool(on)));
            }
        }
        if let Some(raw) = &self.max_len {
            flags.push(("max_len", OptionValue::parse_cli(raw)));
        }

        for (key, value) in flags {
            options
                .apply(key, value)
                .with_context(|| format!("Invalid --{}", key.replace('_', "-")))?;
        }
        Ok(options)
    }
}

fn load_sources(target: &TargetArgs) -> Result<Vec<SourceFile>> {
    match (&target.input, &target.workspace) {
        (Some(input), _) => {
            let file = SourceFile::read(input)
                .with_context(|| format!("Cannot read input file {}", input.display()))?;
            Ok(vec![file])
        }
        (None, Some(manifest)) => ProjectLoader::load_workspace(manifest),
        (None, None) => bail!("Please provide --input <file> or --workspace <Cargo.toml>"),
    }
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Cannot write {}", path.display()))?;
            tracing::info!("output written to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Cmd::Instrument {
            target,
            trace,
            output,
            format,
            cache_dir,
        } => {
            let options = trace.options()?;
            let files = load_sources(&target)?;

            let cache = match &cache_dir {
                Some(dir) => Some(RewriteCache::open(dir)?),
                None => None,
            };
            let usecase = match &cache {
                Some(cache) => TraceUsecase::with_cache(cache),
                None => TraceUsecase::default(),
            };

            let result = match files.as_slice() {
                [file] => usecase.instrument_source(file, &target.function, &options)?,
                _ => usecase.instrument_workspace(&files, &target.function, &options)?.1,
            };

            let text = match format {
                Format::Rust => result.source,
                Format::Json => JsonReportExporter.export(&result.report)?,
            };
            write_output(output.as_deref(), &text)?;
        }

        Cmd::Locate { target, watch } => {
            let files = load_sources(&target)?;
            let usecase = TraceUsecase::default();
            let file = match files.as_slice() {
                [file] => file,
                _ => {
                    let (index, _) = constable::infrastructure::SynSourceLocator
                        .locate_in(&files, &target.function)?;
                    &files[index]
                }
            };

            let located = usecase.locate(file, &target.function)?;
            let options = TraceOptions::watching(watch);
            let body = usecase.rewriter.rewrite(&located, &options)?;
            let report = RewriteReport::new(
                located.qualified_name(),
                located.start_line,
                located.end_line,
                located.def_line,
                &body,
            );

            println!("{}", file.path.display());
            print!("{}", TextReportExporter.export(&RewriteReportDto::from(&report))?);
        }
    }

    Ok(())
}
