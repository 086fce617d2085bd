//! Logging setup on `log` + `log4rs`.
//!
//! Third-party crates are silenced unless the filter expression opts
//! them in: the bridge crates run at the expression's bare level
//! (default info), `<module>=<level>` entries pin individual modules,
//! and `root=<level>` lifts the gate for everything else.

use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            policy::compound::{roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy},
            RollingFileAppender,
        },
    },
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    Config,
};
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::Path;

const BRIDGE_CRATES: &[&str] = &["zkbridge_core", "zkbridge_service"];

const LOG_FILE: &str = "zkbridge.log";
const MAX_LOG_SIZE_BYTES: u64 = 32 * 1024 * 1024;
const KEEP_ROLLED_FILES: u32 = 5;

const PLAIN_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3f)} {l:<5} {t} {m}{n}";
const TTY_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3f)} {h({l:<5})} {t} {m}{n}";

/// Parsed form of a filter expression such as
/// `"debug,ethers=warn,root=error"`.
#[derive(Debug, Eq, PartialEq)]
struct FilterSpec {
    /// Level applied to the bridge crates; from the bare entry.
    bridge_level: LevelFilter,
    /// Level for everything unlisted; `root=<level>` opt-in.
    fallback_level: Option<LevelFilter>,
    /// Per-module pins, later entries winning.
    pinned: Vec<(String, LevelFilter)>,
}

impl FilterSpec {
    fn parse(expression: &str) -> Self {
        let mut spec = Self { bridge_level: LevelFilter::Info, fallback_level: None, pinned: Vec::new() };
        for entry in expression.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            match entry.split_once('=') {
                None => {
                    if let Ok(level) = entry.parse() {
                        spec.bridge_level = level;
                    }
                }
                Some((module, level)) => {
                    let module = module.trim();
                    let Ok(level) = level.trim().parse() else { continue };
                    if module == "root" {
                        spec.fallback_level = Some(level);
                    } else if !module.is_empty() {
                        spec.pinned.push((module.to_string(), level));
                    }
                }
            }
        }
        spec
    }

    /// Effective per-module levels: the bridge crates at their level
    /// unless pinned, then every pin on top.
    fn module_levels(&self) -> BTreeMap<String, LevelFilter> {
        let mut levels: BTreeMap<String, LevelFilter> =
            BRIDGE_CRATES.iter().map(|name| (name.to_string(), self.bridge_level)).collect();
        for (module, level) in &self.pinned {
            levels.insert(module.clone(), *level);
        }
        levels
    }
}

fn console_appender() -> ConsoleAppender {
    let pattern = if std::io::stderr().is_terminal() { TTY_PATTERN } else { PLAIN_PATTERN };
    ConsoleAppender::builder().target(Target::Stderr).encoder(Box::new(PatternEncoder::new(pattern))).build()
}

fn file_appender(dir: &Path) -> Option<RollingFileAppender> {
    let archives = dir.join(format!("{LOG_FILE}.{{}}.gz"));
    let roller = FixedWindowRoller::builder().base(1).build(archives.to_str()?, KEEP_ROLLED_FILES).ok()?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(MAX_LOG_SIZE_BYTES)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PLAIN_PATTERN)))
        .build(dir.join(LOG_FILE), Box::new(policy))
        .ok()
}

/// Install the global logger; a second call is a no-op. Output goes
/// to stderr, and to a size-rolled gzip-archived file when `log_dir`
/// is given.
pub fn init_logger(log_dir: Option<&str>, filters: &str) {
    let spec = FilterSpec::parse(filters);

    let mut named: Vec<(String, Box<dyn log4rs::append::Append>)> = vec![("console".to_string(), Box::new(console_appender()))];
    if let Some(dir) = log_dir.map(str::trim).filter(|dir| !dir.is_empty()) {
        if let Some(appender) = file_appender(Path::new(dir)) {
            named.push(("file".to_string(), Box::new(appender)));
        }
    }
    let sinks: Vec<String> = named.iter().map(|(name, _)| name.clone()).collect();

    let mut builder = Config::builder();
    for (name, appender) in named {
        builder = builder.appender(Appender::builder().build(name, appender));
    }
    for (module, level) in spec.module_levels() {
        builder = builder.logger(Logger::builder().appenders(sinks.clone()).additive(false).build(module, level));
    }

    let root = Root::builder().appenders(sinks).build(spec.fallback_level.unwrap_or(LevelFilter::Off));
    if let Ok(config) = builder.build(root) {
        let _ = log4rs::init_config(config);
    }
}
