use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::{
    roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const LOG_FILE_SIZE: u64 = 5 * 1024 * 1024;
const KEPT_LOG_FILES: u32 = 3;

/// Parse a configured level name, defaulting to `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::Info)
}

/// Console plus rolling file logging under `<log_dir>/logs/projection.log`.
pub fn setup_logging(log_dir: &Path, level: LevelFilter) -> Result<()> {
    let logs = log_dir.join("logs");
    fs::create_dir_all(&logs).context("Failed to create logs directory")?;

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{h({l})} {d(%Y-%m-%d %H:%M:%S)} {M} - {m}{n}",
        )))
        .build();

    let roll_pattern = logs.join("projection.{}.log.gz");
    let roll_pattern = roll_pattern
        .to_str()
        .ok_or_else(|| anyhow!("Log directory is not valid UTF-8: {}", logs.display()))?;
    let roller = FixedWindowRoller::builder()
        .base(1)
        .build(roll_pattern, KEPT_LOG_FILES)?;

    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(LOG_FILE_SIZE)),
        Box::new(roller),
    );

    let file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} {l}::{m}{n}")))
        .build(logs.join("projection.log"), Box::new(policy))
        .context("Failed to open log file")?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(level),
        )?;

    log4rs::init_config(config)?;
    Ok(())
}
