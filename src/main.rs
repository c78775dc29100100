use anyhow::{Context, Result};
use biblio_resolver::config::{
    find_config_file, load_config, user_config_path, ResolverConfig, CONFIG_TEMPLATE,
};
use biblio_resolver::models::{BookRecord, SourceAttempt};
use biblio_resolver::sources::SourceCapabilities;
use biblio_resolver::utils::{deduplicate_records, isbn, DuplicateStrategy};
use biblio_resolver::Resolver;
use clap::{Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status when an ISBN lookup exhausted every source
const EXIT_NOT_FOUND: i32 = 2;

/// Biblio Resolver - Look up book metadata by ISBN or keyword
#[derive(Parser, Debug)]
#[command(name = "biblio-resolver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Look up book metadata by ISBN or keyword across storefronts and Google Books", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve one ISBN through the source fallback chain
    #[command(alias = "i")]
    Isbn {
        /// ISBN-10 or ISBN-13, hyphens allowed
        isbn: String,

        /// Also report every source consulted and what it returned
        #[arg(long)]
        trace: bool,
    },

    /// Search every keyword source concurrently
    #[command(alias = "s")]
    Search {
        /// Free-text keyword
        keyword: String,

        /// Drop candidates whose titles match loosely, keeping the first
        #[arg(long)]
        dedup: bool,

        /// Also report each source's outcome
        #[arg(long)]
        trace: bool,
    },

    /// List the enabled sources in ISBN priority order
    Sources {
        /// Show capabilities for each source
        #[arg(long, short)]
        detailed: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Write a commented configuration template to the user config path
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file when used with --init
        #[arg(long, requires = "init")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    let config = load_config(config_path.as_deref())
        .with_context(|| match &config_path {
            Some(path) => format!("loading {}", path.display()),
            None => "loading configuration from the environment".to_string(),
        })?;

    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    match cli.command {
        Commands::Isbn {
            isbn: raw_isbn,
            trace,
        } => {
            let cleaned = isbn::clean(&raw_isbn);
            if !cleaned.is_empty() && !isbn::is_valid(&cleaned) && !cli.quiet {
                eprintln!("Warning: {} does not have a valid ISBN checksum", raw_isbn);
            }

            let resolver = Resolver::from_config(&config)?;
            let resolution = resolver.resolve_isbn_traced(&raw_isbn).await?;
            let format = cli.output.resolve();
            let found = resolution.is_found();

            if trace {
                if format == OutputFormat::Json {
                    print_json(&resolution)?;
                } else {
                    output_attempts(&resolution.attempts, format);
                    output_records(resolution.record.as_slice(), format)?;
                }
            } else {
                let record = resolution.into_record();
                if format == OutputFormat::Json {
                    print_json(&record)?;
                } else if record.found {
                    output_records(std::slice::from_ref(&record), format)?;
                }
            }

            if !found {
                if !cli.quiet {
                    eprintln!("No source had a record for {}", cleaned);
                }
                std::process::exit(EXIT_NOT_FOUND);
            }
        }

        Commands::Search {
            keyword,
            dedup,
            trace,
        } => {
            let resolver = Resolver::from_config(&config)?;
            let mut search = resolver.search_keyword_traced(&keyword).await?;
            let format = cli.output.resolve();

            if dedup {
                search.records = deduplicate_records(search.records, DuplicateStrategy::First);
            }
            if !cli.quiet {
                eprintln!(
                    "Found {} candidates from {} sources",
                    search.records.len(),
                    search.attempts.iter().filter(|a| a.outcome.is_match()).count()
                );
            }

            match (format, trace) {
                (OutputFormat::Json, true) => print_json(&search)?,
                (OutputFormat::Json, false) => print_json(&search.records)?,
                (_, true) => {
                    output_attempts(&search.attempts, format);
                    output_records(&search.records, format)?;
                }
                (_, false) => output_records(&search.records, format)?,
            }
        }

        Commands::Sources { detailed } => {
            let resolver = Resolver::from_config(&config)?;
            for src in resolver.registry().all() {
                if detailed {
                    println!("{} ({})", src.name(), src.id());
                    println!("  Capabilities: {}", capability_names(src.capabilities()));
                } else {
                    println!("{} - {}", src.id(), src.name());
                }
            }
        }

        Commands::Config { init, force } => {
            if init {
                let path = user_config_path().context("no user configuration directory")?;
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, CONFIG_TEMPLATE)?;
                if !cli.quiet {
                    eprintln!("Wrote {}", path.display());
                }
            } else {
                print!("{}", config.to_toml()?);
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise -q/-v, then the configured level
fn init_tracing(cli: &Cli, config: &ResolverConfig) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("biblio_resolver={}", level)),
    );
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_deref() == Some("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn capability_names(caps: SourceCapabilities) -> String {
    caps.iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cut to `max` characters, never inside a multi-byte character
fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn format_date(record: &BookRecord) -> String {
    match (record.year, record.month) {
        (Some(year), Some(month)) => format!("{}-{:02}", year, month),
        (Some(year), None) => year.to_string(),
        _ => String::new(),
    }
}

fn source_label(record: &BookRecord) -> String {
    record.source.as_ref().map(|s| s.to_string()).unwrap_or_default()
}

fn output_records(records: &[BookRecord], format: OutputFormat) -> Result<()> {
    match format.resolve() {
        OutputFormat::Json => print_json(records)?,
        OutputFormat::Plain => {
            for record in records {
                let author = if record.author.is_empty() {
                    "unknown"
                } else {
                    record.author.as_str()
                };
                println!("{} - {} ({})", record.title, author, source_label(record));
                if let Some(ref publisher) = record.publisher {
                    println!("  Publisher: {}", publisher);
                }
                if let Some(ref isbn) = record.isbn {
                    println!("  ISBN: {}", isbn);
                }
                let date = format_date(record);
                if !date.is_empty() {
                    println!("  Published: {}", date);
                }
                if let Some(ref cover) = record.cover_url {
                    println!("  Cover: {}", cover);
                }
                println!();
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Title", "Author", "Publisher", "Date", "Source"]);

            for record in records {
                table.add_row(vec![
                    Cell::new(ellipsize(&record.title, 40)).add_attribute(Attribute::Bold),
                    Cell::new(ellipsize(&record.author, 24)),
                    Cell::new(ellipsize(record.publisher.as_deref().unwrap_or_default(), 20)),
                    Cell::new(format_date(record)),
                    Cell::new(source_label(record)),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn output_attempts(attempts: &[SourceAttempt], format: OutputFormat) {
    use biblio_resolver::AdapterOutcome;

    let describe = |outcome: &AdapterOutcome| match outcome {
        AdapterOutcome::Matched => "matched".to_string(),
        AdapterOutcome::NoMatch => "no match".to_string(),
        AdapterOutcome::FetchFailed(reason) => format!("fetch failed: {}", reason),
        AdapterOutcome::ParseFailed(reason) => format!("parse failed: {}", reason),
    };

    if format.resolve() == OutputFormat::Plain {
        for attempt in attempts {
            println!(
                "[{}] {} ({} ms)",
                attempt.source.id(),
                describe(&attempt.outcome),
                attempt.elapsed.as_millis()
            );
        }
        println!();
        return;
    }

    use comfy_table::{Cell, Table};
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Source", "Outcome", "Elapsed"]);
    for attempt in attempts {
        table.add_row(vec![
            Cell::new(attempt.source.id()),
            Cell::new(ellipsize(&describe(&attempt.outcome), 60)),
            Cell::new(format!("{} ms", attempt.elapsed.as_millis())),
        ]);
    }
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_version() {
        let version = env!("CARGO_PKG_VERSION");
        assert!(!version.is_empty());
        let parts: Vec<&str> = version.split('.').collect();
        assert!(parts.len() >= 2);
        assert!(parts[0].parse::<u32>().is_ok());
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["biblio-resolver", "sources"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Auto);
        assert!(cli.config.is_none());
        assert!(matches!(cli.command, Commands::Sources { detailed: false }));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["biblio-resolver"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["biblio-resolver", "-v", "sources"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["biblio-resolver", "sources", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_output_format() {
        let cli = Cli::parse_from(["biblio-resolver", "--output", "json", "sources"]);
        assert_eq!(cli.output, OutputFormat::Json);

        let cli = Cli::parse_from(["biblio-resolver", "sources", "-o", "plain"]);
        assert_eq!(cli.output, OutputFormat::Plain);
    }

    #[test]
    fn test_cli_config_flag() {
        let cli = Cli::parse_from(["biblio-resolver", "--config", "/tmp/br.toml", "config"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/br.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                init: false,
                force: false
            }
        ));
    }

    #[test]
    fn test_cli_force_requires_init() {
        assert!(Cli::try_parse_from(["biblio-resolver", "config", "--force"]).is_err());
        assert!(Cli::try_parse_from(["biblio-resolver", "config", "--init", "--force"]).is_ok());
    }

    #[test]
    fn test_cli_isbn_command() {
        let cli = Cli::parse_from(["biblio-resolver", "isbn", "978-986-479-166-8", "--trace"]);
        match cli.command {
            Commands::Isbn { isbn, trace } => {
                assert_eq!(isbn, "978-986-479-166-8");
                assert!(trace);
            }
            _ => panic!("Expected Isbn command"),
        }
    }

    #[test]
    fn test_cli_search_command() {
        let cli = Cli::parse_from(["biblio-resolver", "s", "三體", "--dedup"]);
        match cli.command {
            Commands::Search {
                keyword,
                dedup,
                trace,
            } => {
                assert_eq!(keyword, "三體");
                assert!(dedup);
                assert!(!trace);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_ellipsize_counts_characters() {
        assert_eq!(ellipsize("short", 10), "short");
        assert_eq!(ellipsize("哈利波特與神秘的魔法石", 8), "哈利波特與...");
    }

    #[test]
    fn test_format_date() {
        let mut record = BookRecord::not_found("1");
        assert_eq!(format_date(&record), "");
        record.year = Some(2019);
        assert_eq!(format_date(&record), "2019");
        record.month = Some(3);
        assert_eq!(format_date(&record), "2019-03");
    }

    #[test]
    fn test_capability_names() {
        let caps = SourceCapabilities::ISBN_LOOKUP | SourceCapabilities::KEYWORD_SEARCH;
        assert_eq!(capability_names(caps), "isbn_lookup, keyword_search");
    }
}
