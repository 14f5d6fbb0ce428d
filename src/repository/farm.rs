//! Farm storage: CRUD, search, and flock-membership maintenance.
//!
//! The farm record owns only the *membership* set of flock ids. Flock
//! objects themselves live in the flock store; a farm invariant is that
//! every member id refers to a flock whose `farm_id` points back here,
//! which the service layer maintains when flocks are created and deleted.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::Farm;
use crate::store::JsonStore;

use super::generate_id;

const FARMS_FILE: &str = "farms.json";

/// Fields for creating a farm. The repository assigns the id.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFarm {
    pub name: String,
    pub location: String,
    pub owner: String,
    pub capacity: u32,
    /// Defaults to the current time when omitted.
    #[serde(default)]
    pub established_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FarmUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub owner: Option<String>,
    pub capacity: Option<u32>,
    pub established_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl FarmUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.location.is_none()
            && self.owner.is_none()
            && self.capacity.is_none()
            && self.established_date.is_none()
            && self.notes.is_none()
    }
}

#[derive(Clone)]
pub struct FarmRepository {
    store: Arc<JsonStore<Farm>>,
}

impl FarmRepository {
    /// Open (or create) the farm store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let store = JsonStore::open(data_dir.join(FARMS_FILE))?;
        Ok(FarmRepository {
            store: Arc::new(store),
        })
    }

    pub fn add(&self, new: NewFarm) -> Result<Farm> {
        if new.name.trim().is_empty() {
            return Err(Error::validation("Farm name is required."));
        }
        if new.location.trim().is_empty() {
            return Err(Error::validation("Farm location is required."));
        }
        if new.owner.trim().is_empty() {
            return Err(Error::validation("Farm owner is required."));
        }

        let farm = Farm {
            id: generate_id("farm"),
            name: new.name,
            location: new.location,
            owner: new.owner,
            capacity: new.capacity,
            established_date: new.established_date.unwrap_or_else(Utc::now),
            notes: new.notes,
            flock_ids: Default::default(),
        };

        let stored = farm.clone();
        self.store.mutate(move |farms| {
            farms.insert(stored.id.clone(), stored);
            Ok(())
        })?;

        info!(farm_id = %farm.id, name = %farm.name, "Added farm");
        Ok(farm)
    }

    pub fn get(&self, id: &str) -> Result<Farm> {
        self.store
            .get(id)
            .ok_or_else(|| Error::not_found("Farm", id))
    }

    /// All farms, sorted by name for stable listings.
    pub fn list(&self) -> Vec<Farm> {
        let mut farms = self.store.read(|farms| farms.values().cloned().collect::<Vec<_>>());
        farms.sort_by(|a, b| a.name.cmp(&b.name));
        farms
    }

    pub fn update(&self, id: &str, update: FarmUpdate) -> Result<Farm> {
        if update.is_empty() {
            return Err(Error::validation("No update fields provided"));
        }
        if matches!(&update.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::validation("Farm name cannot be empty."));
        }

        let id_owned = id.to_string();
        let updated = self.store.mutate(move |farms| {
            let farm = farms
                .get_mut(&id_owned)
                .ok_or_else(|| Error::not_found("Farm", id_owned.clone()))?;

            if let Some(name) = update.name {
                farm.name = name;
            }
            if let Some(location) = update.location {
                farm.location = location;
            }
            if let Some(owner) = update.owner {
                farm.owner = owner;
            }
            if let Some(capacity) = update.capacity {
                farm.capacity = capacity;
            }
            if let Some(established_date) = update.established_date {
                farm.established_date = established_date;
            }
            if let Some(notes) = update.notes {
                farm.notes = notes;
            }
            Ok(farm.clone())
        })?;

        info!(farm_id = %id, "Updated farm");
        Ok(updated)
    }

    /// Hard delete. Returns false when the id is unknown. Dependent-flock
    /// conflict checks live in the service layer.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let id_owned = id.to_string();
        let removed = self
            .store
            .mutate(move |farms| Ok(farms.remove(&id_owned).is_some()))?;
        if removed {
            info!(farm_id = %id, "Deleted farm");
        }
        Ok(removed)
    }

    /// Case-insensitive substring search across name, location, and owner.
    /// An empty term returns all farms.
    pub fn search(&self, term: &str) -> Vec<Farm> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.list();
        }
        let mut farms = self.store.read(|farms| {
            farms
                .values()
                .filter(|farm| {
                    farm.name.to_lowercase().contains(&term)
                        || farm.location.to_lowercase().contains(&term)
                        || farm.owner.to_lowercase().contains(&term)
                })
                .cloned()
                .collect::<Vec<_>>()
        });
        farms.sort_by(|a, b| a.name.cmp(&b.name));
        farms
    }

    /// Link a flock id into the farm's membership set.
    ///
    /// Idempotent-safe: returns false without error when already linked.
    pub fn add_flock_to_farm(&self, farm_id: &str, flock_id: &str) -> Result<bool> {
        let farm_id_owned = farm_id.to_string();
        let flock_id_owned = flock_id.to_string();
        let linked = self.store.mutate(move |farms| {
            let farm = farms
                .get_mut(&farm_id_owned)
                .ok_or_else(|| Error::not_found("Farm", farm_id_owned.clone()))?;
            Ok(farm.flock_ids.insert(flock_id_owned))
        })?;

        if linked {
            info!(farm_id = %farm_id, flock_id = %flock_id, "Linked flock to farm");
        }
        Ok(linked)
    }

    /// Unlink a flock id. Returns false when the flock was not a member.
    pub fn remove_flock_from_farm(&self, farm_id: &str, flock_id: &str) -> Result<bool> {
        let farm_id_owned = farm_id.to_string();
        let flock_id_owned = flock_id.to_string();
        let removed = self.store.mutate(move |farms| {
            let farm = farms
                .get_mut(&farm_id_owned)
                .ok_or_else(|| Error::not_found("Farm", farm_id_owned.clone()))?;
            Ok(farm.flock_ids.remove(&flock_id_owned))
        })?;

        if removed {
            info!(farm_id = %farm_id, flock_id = %flock_id, "Unlinked flock from farm");
        }
        Ok(removed)
    }
}
