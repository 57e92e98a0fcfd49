use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::fmt;

pub const LOG_LEVEL_ENV: &str = "SLIDE_TRANSLATOR_LOG";

// Warnings only, unless --verbose or SLIDE_TRANSLATOR_LOG asks for more.
pub fn init(verbose: bool) -> Result<()> {
    let level = match std::env::var(LOG_LEVEL_ENV) {
        Ok(value) if !value.trim().is_empty() => parse_level(&value)?,
        _ if verbose => Level::DEBUG,
        _ => Level::WARN,
    };
    let _ = fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
    Ok(())
}

fn parse_level(value: &str) -> Result<Level> {
    value
        .trim()
        .parse::<Level>()
        .map_err(|_| anyhow!("invalid {} value: {}", LOG_LEVEL_ENV, value.trim()))
}
