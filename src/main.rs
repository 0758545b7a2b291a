use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

use kin::filter::{FilterTable, ResolutionPolicy};
use kin::logging::{init_logging, LogConfig, LogFormat};
use kin::mapper::MapperTable;
use kin::profile::{parse_delimiter, Profile};
use kin::{ErrorStrategy, PipelineConfig, PublishPipeline, WriterSink};

#[derive(Parser)]
#[command(name = "kin")]
#[command(about = "Publish rows of delimited files as JSON records")]
#[command(version)]
struct Cli {
    /// More diagnostics (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Diagnostic output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and publish every accepted row
    Publish(PublishArgs),
}

#[derive(Args)]
struct PublishArgs {
    /// Directory containing the files to scan
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,

    /// Topic records are published to
    #[arg(long)]
    topic: Option<String>,

    /// Routing key sent with every record
    #[arg(long)]
    key: Option<String>,

    /// Filter expression: filename<op>value or column:<index><op>value
    #[arg(short = 'f', long = "filter", action = ArgAction::Append, value_name = "EXPR")]
    filters: Vec<String>,

    /// Rename expression: field=name or column:<index>=name
    #[arg(short = 'm', long = "mapper", action = ArgAction::Append, value_name = "EXPR")]
    mappers: Vec<String>,

    /// Files have no header line; columns are addressed by ordinal
    #[arg(long)]
    no_header: bool,

    /// Field delimiter (single character, or "tab")
    #[arg(short = 'd', long)]
    delimiter: Option<String>,

    /// Only files with this extension are scanned [default: csv]
    #[arg(long)]
    extension: Option<String>,

    /// Reject rows when a column filter cannot be resolved or applied
    #[arg(long)]
    fail_closed: bool,

    /// Stop on the first malformed row or publish error
    #[arg(long)]
    fail_fast: bool,

    /// Exit with an error on any invalid filter or mapper expression
    #[arg(long)]
    strict_expressions: bool,

    /// YAML profile with default settings, filters and mappers
    #[arg(short = 'p', long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Maximum line length
    #[arg(long)]
    max_line_length: Option<usize>,

    /// Write records to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,

    /// Buffer size for output
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose, cli.quiet).with_format(cli.log_format));

    let result = match cli.command {
        Command::Publish(args) => publish(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn publish(args: PublishArgs) -> anyhow::Result<()> {
    let profile = match &args.profile {
        Some(path) => Profile::from_file(path)?,
        None => Profile::default(),
    };

    let mut config = PipelineConfig::default();
    profile.apply(&mut config)?;
    apply_args(&args, &mut config)?;

    if config.topic.is_empty() {
        bail!("a topic is required (--topic or 'topic' in the profile)");
    }

    let filter_exprs = profile.filters.iter().chain(args.filters.iter());
    let mapper_exprs = profile.mappers.iter().chain(args.mappers.iter());
    let (filters, mappers) = if args.strict_expressions {
        (
            FilterTable::try_parse(filter_exprs).context("invalid filter")?,
            MapperTable::try_parse(mapper_exprs, config.has_header).context("invalid mapper")?,
        )
    } else {
        (
            FilterTable::parse(filter_exprs),
            MapperTable::parse(mapper_exprs, config.has_header),
        )
    };

    let output: Box<dyn Write> = match &args.output_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
            Box::new(io::BufWriter::with_capacity(args.buffer_size, file))
        }
        None => Box::new(io::BufWriter::with_capacity(args.buffer_size, io::stdout())),
    };

    let mut pipeline = PublishPipeline::new(config, filters, mappers);
    let stats = pipeline
        .run(&args.directory, WriterSink::new(output))
        .context("Processing failed")?;

    info!(
        "published {} of {} rows from {} file(s) ({} skipped by suffix, {} by filename filter); \
         {} filtered, {} malformed, {} publish errors in {:?}",
        stats.rows_published,
        stats.rows_read,
        stats.files_scanned,
        stats.files_unsupported,
        stats.files_filtered,
        stats.rows_filtered,
        stats.rows_malformed,
        stats.publish_errors,
        stats.processing_time
    );

    Ok(())
}

/// Command-line flags override the profile.
fn apply_args(args: &PublishArgs, config: &mut PipelineConfig) -> anyhow::Result<()> {
    if let Some(topic) = &args.topic {
        config.topic = topic.clone();
    }
    if let Some(key) = &args.key {
        config.key = key.clone();
    }
    if args.no_header {
        config.has_header = false;
    }
    if let Some(delimiter) = &args.delimiter {
        config.delimiter = parse_delimiter(delimiter)?;
    }
    if let Some(extension) = &args.extension {
        config.extension = extension.clone();
    }
    if args.fail_closed {
        config.resolution = ResolutionPolicy::FailClosed;
    }
    if args.fail_fast {
        config.error_strategy = ErrorStrategy::FailFast;
    }
    if let Some(max_line_length) = args.max_line_length {
        config.max_line_length = max_line_length;
    }
    Ok(())
}
