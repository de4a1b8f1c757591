//! Registered drivers and their health checks.

use permissions::PermissionRegistryBuilder;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::descriptor::ProtocolDescriptor;
use crate::error::{CatalogError, Result};
use crate::health::HealthCheck;

#[derive(Clone)]
pub(crate) struct RegisteredDriver {
    pub(crate) descriptor: Arc<ProtocolDescriptor>,
    pub(crate) health: Arc<dyn HealthCheck>,
}

/// Drivers registered during bootstrap, keyed by protocol id.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, RegisteredDriver>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: ProtocolDescriptor,
        health: Arc<dyn HealthCheck>,
    ) -> Result<()> {
        if self.drivers.contains_key(&descriptor.id) {
            return Err(CatalogError::DuplicateDriver(descriptor.id));
        }

        info!(
            "Registered driver {} ({}) from module {}",
            descriptor.id, descriptor.title, descriptor.module
        );
        self.drivers.insert(
            descriptor.id.clone(),
            RegisteredDriver {
                descriptor: Arc::new(descriptor),
                health,
            },
        );
        Ok(())
    }

    /// Registers every driver's declared permissions. Must run before the
    /// builder is sealed.
    pub fn contribute_permissions(&self, builder: &mut PermissionRegistryBuilder) -> Result<usize> {
        let mut count = 0;
        for driver in self.drivers.values() {
            for definition in &driver.descriptor.permissions {
                debug!(
                    "Driver {} contributes permission {}",
                    driver.descriptor.id, definition.id
                );
                builder.register(definition.clone())?;
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn descriptor(&self, id: &str) -> Option<Arc<ProtocolDescriptor>> {
        self.drivers.get(id).map(|d| d.descriptor.clone())
    }

    /// Descriptors ordered by identifier.
    pub fn descriptors(&self) -> Vec<Arc<ProtocolDescriptor>> {
        self.drivers.values().map(|d| d.descriptor.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.drivers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub(crate) fn drivers(&self) -> impl Iterator<Item = &RegisteredDriver> {
        self.drivers.values()
    }
}
