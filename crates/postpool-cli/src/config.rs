use crate::settings::Settings;
use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use postpool::{CommandProcessor, DEFAULT_POLL_INTERVAL, WorkerCount};
use std::path::PathBuf;

/// The post-processing categories handled when no items are given.
pub const DEFAULT_ITEMS: [&str; 8] = [
    "additional",
    "nfos",
    "movies",
    "music",
    "games",
    "anime",
    "tv",
    "books",
];

/// Settings key holding the worker count when `--threads` is absent.
pub const DEFAULT_THREADS_KEY: &str = "POSTTHREADS";

/// Command-line configuration for the `postpool` binary.
///
/// Every value can also come from the environment (or a `.env` file). The
/// worker count is taken from `--threads` first and from the settings file
/// second; a run without either is rejected.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "postpool",
    version,
    about = "Runs each work item through an external command on a fixed pool of threads"
)]
pub struct CliArgs {
    /// Number of worker threads. Must be greater than 0.
    ///
    /// Environment variable: `POSTPOOL_THREADS`
    #[arg(long, env = "POSTPOOL_THREADS", allow_negative_numbers = true)]
    pub threads: Option<i64>,

    /// PHP settings file scanned for `define('NAME', 'value');` lines.
    ///
    /// Environment variable: `POSTPOOL_SETTINGS`
    #[arg(long, env = "POSTPOOL_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Settings name holding the worker count.
    #[arg(long, default_value_t = String::from(DEFAULT_THREADS_KEY))]
    pub threads_key: String,

    /// Comma-separated work items, one external invocation each.
    ///
    /// Environment variable: `POSTPOOL_ITEMS`
    #[arg(long, env = "POSTPOOL_ITEMS", value_delimiter = ',', default_values = DEFAULT_ITEMS)]
    pub items: Vec<String>,

    /// Program launched once per item.
    ///
    /// Environment variable: `POSTPOOL_PROGRAM`
    #[arg(long, env = "POSTPOOL_PROGRAM", default_value_t = String::from("php"))]
    pub program: String,

    /// Fixed argument passed before the item name. Repeatable.
    #[arg(
        long = "arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        default_value = "postprocess.php"
    )]
    pub args: Vec<String>,

    /// Pass no fixed arguments, only the item name.
    #[arg(long, default_value_t = false, conflicts_with = "args")]
    pub no_default_args: bool,

    /// Kill an item's process after this many seconds.
    ///
    /// Environment variable: `POSTPOOL_ITEM_TIMEOUT_SECS`
    #[arg(long, env = "POSTPOOL_ITEM_TIMEOUT_SECS")]
    pub item_timeout_secs: Option<u64>,

    /// How long an idle worker waits for an item before re-checking for
    /// shutdown, in milliseconds.
    ///
    /// Environment variable: `POSTPOOL_POLL_INTERVAL_MS`
    #[arg(long, env = "POSTPOOL_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workers: WorkerCount,
    pub items: Vec<String>,
    pub program: String,
    pub args: Vec<String>,
    pub item_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl RunConfig {
    pub fn processor(&self) -> CommandProcessor {
        let processor = CommandProcessor::new(&self.program).args(&self.args);
        match self.item_timeout {
            Some(timeout) => processor.with_timeout(timeout),
            None => processor,
        }
    }
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let threads = match args.threads {
            Some(threads) => threads,
            None => resolve_threads(args.settings.as_deref(), &args.threads_key)?,
        };
        let workers = WorkerCount::try_from(threads).context("invalid worker count")?;

        let items: Vec<String> = args
            .items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect();
        if items.is_empty() {
            bail!("POSTPOOL_ITEMS must name at least one item");
        }

        if args.program.trim().is_empty() {
            bail!("POSTPOOL_PROGRAM must not be empty");
        }

        let item_timeout = match args.item_timeout_secs {
            Some(0) => bail!("POSTPOOL_ITEM_TIMEOUT_SECS must be greater than 0"),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        if args.poll_interval_ms == 0 {
            bail!("POSTPOOL_POLL_INTERVAL_MS must be greater than 0");
        }

        Ok(Self {
            workers,
            items,
            program: args.program,
            args: if args.no_default_args {
                Vec::new()
            } else {
                args.args
            },
            item_timeout,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        })
    }
}

fn resolve_threads(settings: Option<&std::path::Path>, key: &str) -> anyhow::Result<i64> {
    let Some(path) = settings else {
        bail!("no worker count: pass --threads or point --settings at a file defining {key}");
    };
    Settings::load(path)?
        .get_i64(key)?
        .with_context(|| format!("{} does not define {key}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> anyhow::Result<RunConfig> {
        let cli = CliArgs::try_parse_from(std::iter::once("postpool").chain(args.iter().copied()))?;
        RunConfig::try_from(cli)
    }

    fn settings_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_match_the_postprocess_batch() {
        let config = parse(&["--threads", "4"]).unwrap();
        assert_eq!(config.workers.get(), 4);
        assert_eq!(config.items, DEFAULT_ITEMS.map(String::from).to_vec());
        assert_eq!(config.program, "php");
        assert_eq!(config.args, vec!["postprocess.php".to_string()]);
        assert_eq!(config.item_timeout, None);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn zero_and_negative_threads_are_rejected() {
        assert!(parse(&["--threads", "0"]).is_err());
        let err = parse(&["--threads", "-2"]).unwrap_err();
        assert!(format!("{err:#}").contains("-2"));
    }

    #[test]
    fn missing_thread_count_is_rejected() {
        let err = parse(&[]).unwrap_err();
        assert!(err.to_string().contains("no worker count"));
    }

    #[test]
    fn threads_come_from_settings_file() {
        let file = settings_file("<?php\ndefine('POSTTHREADS', '3');\n");
        let path = file.path().to_str().unwrap();
        let config = parse(&["--settings", path]).unwrap();
        assert_eq!(config.workers.get(), 3);
    }

    #[test]
    fn flag_wins_over_settings_file() {
        let file = settings_file("define('POSTTHREADS', '3');\n");
        let path = file.path().to_str().unwrap();
        let config = parse(&["--settings", path, "--threads", "5"]).unwrap();
        assert_eq!(config.workers.get(), 5);
    }

    #[test]
    fn custom_threads_key() {
        let file = settings_file("define('MAX_WORKERS', '7');\n");
        let path = file.path().to_str().unwrap();
        let config = parse(&["--settings", path, "--threads-key", "MAX_WORKERS"]).unwrap();
        assert_eq!(config.workers.get(), 7);
    }

    #[test]
    fn settings_without_key_or_with_zero_is_rejected() {
        let file = settings_file("define('DB_HOST', 'localhost');\n");
        let path = file.path().to_str().unwrap();
        let err = parse(&["--settings", path]).unwrap_err();
        assert!(err.to_string().contains("POSTTHREADS"));

        let file = settings_file("define('POSTTHREADS', '0');\n");
        let path = file.path().to_str().unwrap();
        assert!(parse(&["--settings", path]).is_err());
    }

    #[test]
    fn items_are_split_and_trimmed() {
        let config = parse(&["--threads", "1", "--items", "tv, movies,,tv"]).unwrap();
        assert_eq!(config.items, vec!["tv", "movies", "tv"]);
    }

    #[test]
    fn blank_items_are_rejected() {
        assert!(parse(&["--threads", "1", "--items", " , "]).is_err());
    }

    #[test]
    fn program_and_args_override_defaults() {
        let config = parse(&[
            "--threads", "2", "--program", "sh", "--arg", "-c", "--arg", "exit 0",
        ])
        .unwrap();
        assert_eq!(config.program, "sh");
        assert_eq!(config.args, vec!["-c", "exit 0"]);
    }

    #[test]
    fn default_args_can_be_dropped() {
        let config =
            parse(&["--threads", "1", "--program", "/usr/local/bin/postprocess", "--no-default-args"])
                .unwrap();
        assert!(config.args.is_empty());
        assert_eq!(config.program, "/usr/local/bin/postprocess");
    }

    #[test]
    fn explicit_args_conflict_with_dropping_defaults() {
        assert!(parse(&["--threads", "1", "--no-default-args", "--arg", "x.php"]).is_err());
    }

    #[test]
    fn timeouts_and_poll_interval_are_validated() {
        let config =
            parse(&["--threads", "1", "--item-timeout-secs", "90", "--poll-interval-ms", "10"])
                .unwrap();
        assert_eq!(config.item_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.processor().timeout(), Some(Duration::from_secs(90)));

        assert!(parse(&["--threads", "1", "--item-timeout-secs", "0"]).is_err());
        assert!(parse(&["--threads", "1", "--poll-interval-ms", "0"]).is_err());
    }
}
