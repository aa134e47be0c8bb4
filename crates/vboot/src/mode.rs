//! Boot mode selection

/// Identifies which guest-launch protocol applies.
///
/// The mode is resolved from platform or firmware configuration before the registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum BootMode {
    /// Protocol-less direct guest-kernel loading.
    DirectKernel = 0,
    /// Boot through a firmware stage. No provider ships with the hypervisor core.
    Firmware = 1,
}

impl BootMode {
    pub const COUNT: usize = 2;

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Parses a boot mode token from the platform boot arguments.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "direct" => Some(BootMode::DirectKernel),
            "firmware" => Some(BootMode::Firmware),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        assert_eq!(BootMode::parse("direct"), Some(BootMode::DirectKernel));
        assert_eq!(BootMode::parse("firmware"), Some(BootMode::Firmware));
        assert_eq!(BootMode::parse("multiboot2"), None);
    }
}
