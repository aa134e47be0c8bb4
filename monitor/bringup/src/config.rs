//! Platform boot configuration

use log::{warn, LevelFilter};
use vboot::BootMode;

/// Bring-up configuration resolved from the firmware-provided boot arguments.
#[derive(Debug, Clone, Copy)]
pub struct PlatformConfig {
    pub boot_mode: BootMode,
    pub log_level: LevelFilter,
}

impl PlatformConfig {
    pub const fn default_config() -> Self {
        Self {
            boot_mode: BootMode::DirectKernel,
            log_level: LevelFilter::Info,
        }
    }

    /// Parses `vboot=` and `loglevel=` tokens from the boot arguments. Unknown tokens are
    /// ignored, they belong to other subsystems.
    pub fn from_bootargs(args: &str) -> Self {
        let mut config = Self::default_config();
        for token in args.split_whitespace() {
            if let Some(value) = token.strip_prefix("vboot=") {
                match BootMode::parse(value) {
                    Some(mode) => config.boot_mode = mode,
                    None => warn!("unknown boot mode '{}', keeping default", value),
                }
            } else if let Some(value) = token.strip_prefix("loglevel=") {
                match value.parse::<LevelFilter>() {
                    Ok(level) => config.log_level = level,
                    Err(_) => warn!("unknown log level '{}', keeping default", value),
                }
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PlatformConfig::from_bootargs("");
        assert_eq!(config.boot_mode, BootMode::DirectKernel);
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn parses_mode_and_level() {
        let config = PlatformConfig::from_bootargs("console=ttyS0 vboot=firmware loglevel=debug");
        assert_eq!(config.boot_mode, BootMode::Firmware);
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn ignores_unknown_tokens() {
        let config = PlatformConfig::from_bootargs("vboot=multiboot2 loglevel=chatty");
        assert_eq!(config.boot_mode, BootMode::DirectKernel);
        assert_eq!(config.log_level, LevelFilter::Info);
    }
}
