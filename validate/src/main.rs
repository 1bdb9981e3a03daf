//! Offline checker for rule files.
//!
//! ```text
//! npcinv-validate check <rule-dir> [--custom <folder>]
//! npcinv-validate eval '<expression>' --field Rarity=Rare --prefixes 1
//! npcinv-validate settings
//! ```

mod item;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use npcinv_core::affix::AffixCounter;
use npcinv_core::config;
use npcinv_core::filter::preprocess;
use npcinv_core::item::ItemKind;
use npcinv_core::{RuleDirectory, RuleSource, RuleSourceProvider, Session};
use npcinv_types::{PluginSettings, RuleDescriptor};
use tracing_subscriber::filter::EnvFilter;

use crate::item::CliItem;

#[derive(Parser)]
#[command(version, about = "Validate NPC inventory rule files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess and compile every rule file in a folder
    Check {
        dir: PathBuf,
        /// Custom rule folder, relative to the parent of `dir`
        #[arg(long)]
        custom: Option<String>,
        /// Print the canonical expression of every rule
        #[arg(short, long)]
        verbose: bool,
    },
    /// Evaluate one rule against a synthetic item
    Eval {
        expression: String,
        /// Item field as NAME=VALUE; repeatable
        #[arg(short, long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
        #[arg(long, default_value = "Metadata/Items/Rings/Ring1")]
        path: String,
        #[arg(long, default_value = "Rare")]
        rarity: String,
        /// Prefixes already on the item
        #[arg(long, default_value_t = 0)]
        prefixes: i64,
        /// Suffixes already on the item
        #[arg(long, default_value_t = 0)]
        suffixes: i64,
        /// Tab index; -1/-2 are the vendor lists
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        tab: i32,
    },
    /// Show the settings file location and contents
    Settings,
}

/// Initialize logging, writing to NPCINV_LOG_PATH if set, otherwise stderr.
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    if let Ok(path) = std::env::var("NPCINV_LOG_PATH") {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            dir,
            custom,
            verbose,
        } => check(dir, custom, verbose),
        Commands::Eval {
            expression,
            fields,
            path,
            rarity,
            prefixes,
            suffixes,
            tab,
        } => CliItem::new(&path, &rarity, prefixes, suffixes)
            .with_fields(&fields)
            .and_then(|item| eval(&expression, item, tab)),
        Commands::Settings => show_settings(),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether every rule compiled.
fn check(dir: PathBuf, custom: Option<String>, verbose: bool) -> Result<bool, String> {
    let mut provider = RuleDirectory::new(dir);
    if let Some(custom) = custom.as_deref() {
        provider = provider.with_custom_dir(custom);
    }

    // Discovery yields new files disabled; enable them all and load again
    let discovered = provider.load(&[]).map_err(|e| e.to_string())?;
    let all: Vec<RuleDescriptor> = discovered
        .descriptors
        .into_iter()
        .map(|d| RuleDescriptor { enabled: true, ..d })
        .collect();
    let loaded = provider.load(&all).map_err(|e| e.to_string())?;

    println!("{} rule file(s) in {}", loaded.sources.len(), loaded.directory.display());
    for error in &loaded.errors {
        println!("  warning: {error}");
    }

    let mut ok = true;
    for source in &loaded.sources {
        let name = &source.descriptor.name;
        let text = match &source.text {
            Some(Ok(text)) => text,
            Some(Err(message)) => {
                println!("  FAIL {name}: {message}");
                ok = false;
                continue;
            }
            None => continue,
        };

        let pre = preprocess(text);
        let mut session = Session::new(PluginSettings::default());
        let errors = session.load_sources(std::slice::from_ref(source));
        if let Some(error) = errors.first() {
            println!("  FAIL {name}: {error}");
            ok = false;
        } else {
            println!(
                "  ok   {name}{}{}",
                threshold_note("prefixes", pre.min_open_prefixes),
                threshold_note("suffixes", pre.min_open_suffixes),
            );
        }
        if verbose {
            println!("       {}", pre.expression);
        }
    }

    Ok(ok)
}

fn threshold_note(what: &str, min: Option<u32>) -> String {
    min.map(|n| format!(" (open {what} >= {n})")).unwrap_or_default()
}

/// Returns whether the rule matched.
fn eval(expression: &str, item: CliItem, tab: i32) -> Result<bool, String> {
    let pre = preprocess(expression);
    println!("expression: {}", pre.expression);
    println!("min open prefixes: {:?}", pre.min_open_prefixes);
    println!("min open suffixes: {:?}", pre.min_open_suffixes);

    let mut session = Session::new(PluginSettings::default());
    let source = RuleSource::new(RuleDescriptor::new("eval", "", true), expression);
    if let Some(error) = session.load_sources(&[source]).into_iter().next() {
        return Err(error.to_string());
    }

    let record = item.into_record(ItemKind::ShopItem, tab);
    let counter = AffixCounter::new(session.settings().affix_limits);
    println!("open prefixes: {}", counter.open_prefixes(&record));
    println!("open suffixes: {}", counter.open_suffixes(&record));

    let matched = session.matches(&record);
    println!("matched: {matched}");
    Ok(matched)
}

fn show_settings() -> Result<bool, String> {
    let path = config::settings_path().map_err(|e| e.to_string())?;
    let settings = config::load_settings().map_err(|e| e.to_string())?;
    let rule_dir = config::default_rule_dir().map_err(|e| e.to_string())?;

    println!("settings file: {}", path.display());
    println!("rule folder:   {}", rule_dir.display());
    println!();
    print!("{}", toml::to_string_pretty(&settings).map_err(|e| e.to_string())?);
    Ok(true)
}
