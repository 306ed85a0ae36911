//! Supported-zone lookup and round-robin zone assignment.

use super::error::{ErrorKind, MigrationContext, MigrationError, Step};
use crate::azure::CloudProvider;
use crate::models::{ResourceId, ZoneAssignment};
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};

/// What the assigner needs to know about a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    pub size: String,
    pub location: String,
}

/// Computes supported zones and spreads a batch of resources across them.
pub struct ZoneAssigner<'a> {
    provider: &'a dyn CloudProvider,
}

impl<'a> ZoneAssigner<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> ZoneAssigner<'a> {
        ZoneAssigner { provider }
    }

    /// Supported zones for one size/region, failing with `ZoneUnsupported` when empty.
    pub fn supported_zones(
        &self,
        resource: &ResourceDescriptor,
    ) -> Result<Vec<u8>, MigrationError> {
        let zones: BTreeSet<u8> = self
            .provider
            .list_supported_zones(&resource.size, &resource.location)
            .migration_err(ErrorKind::ProviderFailure, &resource.id.to_ref(), Step::Validate)?;
        if zones.is_empty() {
            return Err(MigrationError::new(
                ErrorKind::ZoneUnsupported,
                resource.id.to_ref(),
                Step::Validate,
                format!(
                    "{} offers no availability zones in {}",
                    resource.size, resource.location
                ),
            ));
        }
        Ok(zones.into_iter().collect())
    }

    /// Assign zones round-robin in input order.
    ///
    /// The i-th resource gets the `(i mod Z)`-th supported zone in ascending order,
    /// which is zone `(i mod Z) + 1` when the supported set is `{1..Z}`. The catalog
    /// is queried once per distinct size/region; any empty set fails the whole batch.
    pub fn assign_zones(
        &self,
        resources: &[ResourceDescriptor],
    ) -> Result<Vec<ZoneAssignment>, MigrationError> {
        let mut catalog: HashMap<(String, String), Vec<u8>> = HashMap::new();
        let mut assignments = Vec::with_capacity(resources.len());

        for (i, resource) in resources.iter().enumerate() {
            let catalog_key = (
                resource.size.to_ascii_lowercase(),
                resource.location.to_ascii_lowercase(),
            );
            if !catalog.contains_key(&catalog_key) {
                let zones = self.supported_zones(resource)?;
                catalog.insert(catalog_key.clone(), zones);
            }
            let zones = &catalog[&catalog_key];
            let zone = zones[i % zones.len()];
            log::info!(
                "Assigned {name} ({size}) to zone {zone} of [{all}]",
                name = resource.id.name,
                size = resource.size,
                all = zones.iter().join(",")
            );
            assignments.push(ZoneAssignment {
                resource: resource.id.clone(),
                zone,
            });
        }
        Ok(assignments)
    }
}
