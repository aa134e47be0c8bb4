//! Boot provider registry

use crate::errors::BootError;
use crate::mode::BootMode;
use crate::ops::VbootOperations;

/// Maps a boot mode to the operations of a concrete provider.
///
/// Populated during single-threaded initialization, then used through shared references only:
/// the registry follows a publish-once-read-many discipline, so lookups need no synchronization
/// once the other cores are released. At most one provider per mode; looking up an unregistered
/// mode fails rather than defaulting.
pub struct BootProviderRegistry {
    providers: [Option<&'static dyn VbootOperations>; BootMode::COUNT],
}

impl BootProviderRegistry {
    pub const fn new() -> Self {
        Self {
            providers: [None; BootMode::COUNT],
        }
    }

    /// Registers the provider for a boot mode. Fails if the mode already has one.
    pub fn register(
        &mut self,
        mode: BootMode,
        ops: &'static dyn VbootOperations,
    ) -> Result<(), BootError> {
        if self.providers[mode.index()].is_some() {
            return Err(BootError::AlreadyRegistered(mode));
        }
        self.providers[mode.index()] = Some(ops);
        Ok(())
    }

    /// Returns the operations registered for `mode`, or `NotSupported`.
    pub fn get_operations(
        &self,
        mode: BootMode,
    ) -> Result<&'static dyn VbootOperations, BootError> {
        self.providers[mode.index()].ok_or(BootError::NotSupported(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DIRECT_BOOT;

    #[test]
    fn unregistered_mode_fails() {
        let registry = BootProviderRegistry::new();
        assert!(matches!(
            registry.get_operations(BootMode::DirectKernel),
            Err(BootError::NotSupported(BootMode::DirectKernel))
        ));
        assert!(matches!(
            registry.get_operations(BootMode::Firmware),
            Err(BootError::NotSupported(BootMode::Firmware))
        ));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = BootProviderRegistry::new();
        registry
            .register(BootMode::DirectKernel, &DIRECT_BOOT)
            .unwrap();
        assert!(matches!(
            registry.register(BootMode::DirectKernel, &DIRECT_BOOT),
            Err(BootError::AlreadyRegistered(BootMode::DirectKernel))
        ));
    }

    #[test]
    fn lookups_return_the_same_provider() {
        let mut registry = BootProviderRegistry::new();
        registry
            .register(BootMode::DirectKernel, &DIRECT_BOOT)
            .unwrap();
        let first = registry.get_operations(BootMode::DirectKernel).unwrap();
        let second = registry.get_operations(BootMode::DirectKernel).unwrap();
        assert!(core::ptr::eq(first, second));
        assert_eq!(first.name(), "direct");
    }
}
