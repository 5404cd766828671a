//!
//! Module to initialize tracing logs.
//!
//! The library itself only emits events; applications (and tests) that want
//! them printed can install a subscriber configured from the `[logging]`
//! section. `RUST_LOG` takes precedence when set.
//!

use tracing_subscriber::EnvFilter;

use crate::config::LoggingToml;

/// Initialize a tracing fmt subscriber based on the `[logging]` config section.
///
/// Calling it again after a subscriber was installed is an error, which callers
/// that may initialize twice (tests) can ignore.
pub fn init_tracing_logs_with_config(config: &LoggingToml) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let mut filter = EnvFilter::new("").add_directive(config.level.to_owned().into());
            for target in &config.module_levels {
                filter = filter.add_directive(target.directive()?);
            }
            filter
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
