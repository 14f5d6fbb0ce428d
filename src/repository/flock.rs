//! Flock storage: CRUD, derived age group, and lineage traversal.
//!
//! Parent links are weak references by id. Nothing enforces acyclicity at
//! write time (matching the source system); the family-tree walk is bounded
//! by `max_depth`, so a cycle terminates but under-reports ancestors.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{FamilyTreeNode, Flock};
use crate::store::JsonStore;

use super::generate_id;

const FLOCKS_FILE: &str = "flocks.json";

/// Fields for creating a flock under a farm. The repository assigns the id
/// and starts `current_count` at `initial_count`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFlock {
    pub breed: String,
    pub acquisition_date: NaiveDate,
    #[serde(default)]
    pub source_supplier: String,
    pub initial_count: u32,
    #[serde(default)]
    pub parent_flock_id_male: Option<String>,
    #[serde(default)]
    pub parent_flock_id_female: Option<String>,
    #[serde(default)]
    pub notes: String,
}

/// Partial update; absent fields keep their current value. The farm
/// back-reference is fixed at creation and not updatable here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlockUpdate {
    pub breed: Option<String>,
    pub acquisition_date: Option<NaiveDate>,
    pub source_supplier: Option<String>,
    pub current_count: Option<u32>,
    pub parent_flock_id_male: Option<String>,
    pub parent_flock_id_female: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct FlockRepository {
    store: Arc<JsonStore<Flock>>,
}

impl FlockRepository {
    /// Open (or create) the flock store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let store = JsonStore::open(data_dir.join(FLOCKS_FILE))?;
        Ok(FlockRepository {
            store: Arc::new(store),
        })
    }

    pub fn add(&self, farm_id: &str, new: NewFlock) -> Result<Flock> {
        if new.breed.trim().is_empty() {
            return Err(Error::validation("Flock breed is required."));
        }
        if new.initial_count == 0 {
            return Err(Error::validation("Initial count must be positive."));
        }

        let flock = Flock {
            id: generate_id("flock"),
            farm_id: farm_id.to_string(),
            breed: new.breed,
            acquisition_date: new.acquisition_date,
            source_supplier: new.source_supplier,
            initial_count: new.initial_count,
            current_count: new.initial_count,
            parent_flock_id_male: new.parent_flock_id_male,
            parent_flock_id_female: new.parent_flock_id_female,
            notes: new.notes,
        };

        let stored = flock.clone();
        self.store.mutate(move |flocks| {
            flocks.insert(stored.id.clone(), stored);
            Ok(())
        })?;

        info!(flock_id = %flock.id, farm_id = %farm_id, breed = %flock.breed, "Added flock");
        Ok(flock)
    }

    pub fn get(&self, id: &str) -> Result<Flock> {
        self.store
            .get(id)
            .ok_or_else(|| Error::not_found("Flock", id))
    }

    pub fn list(&self) -> Vec<Flock> {
        let mut flocks = self
            .store
            .read(|flocks| flocks.values().cloned().collect::<Vec<_>>());
        flocks.sort_by(|a, b| a.id.cmp(&b.id));
        flocks
    }

    pub fn flocks_for_farm(&self, farm_id: &str) -> Vec<Flock> {
        let mut flocks = self.store.read(|flocks| {
            flocks
                .values()
                .filter(|flock| flock.farm_id == farm_id)
                .cloned()
                .collect::<Vec<_>>()
        });
        flocks.sort_by(|a, b| a.id.cmp(&b.id));
        flocks
    }

    pub fn update(&self, id: &str, update: FlockUpdate) -> Result<Flock> {
        if matches!(&update.breed, Some(breed) if breed.trim().is_empty()) {
            return Err(Error::validation("Flock breed cannot be empty."));
        }

        let id_owned = id.to_string();
        let updated = self.store.mutate(move |flocks| {
            let flock = flocks
                .get_mut(&id_owned)
                .ok_or_else(|| Error::not_found("Flock", id_owned.clone()))?;

            if let Some(breed) = update.breed {
                flock.breed = breed;
            }
            if let Some(acquisition_date) = update.acquisition_date {
                flock.acquisition_date = acquisition_date;
            }
            if let Some(source_supplier) = update.source_supplier {
                flock.source_supplier = source_supplier;
            }
            if let Some(current_count) = update.current_count {
                flock.current_count = current_count;
            }
            if let Some(parent_male) = update.parent_flock_id_male {
                flock.parent_flock_id_male = Some(parent_male);
            }
            if let Some(parent_female) = update.parent_flock_id_female {
                flock.parent_flock_id_female = Some(parent_female);
            }
            if let Some(notes) = update.notes {
                flock.notes = notes;
            }
            Ok(flock.clone())
        })?;

        info!(flock_id = %id, "Updated flock");
        Ok(updated)
    }

    /// Apply a signed delta to `current_count`, clamping at zero. Used by
    /// the service layer to couple mortality records to the live count.
    pub fn adjust_count(&self, id: &str, delta: i64) -> Result<Flock> {
        let id_owned = id.to_string();
        let updated = self.store.mutate(move |flocks| {
            let flock = flocks
                .get_mut(&id_owned)
                .ok_or_else(|| Error::not_found("Flock", id_owned.clone()))?;
            let next = i64::from(flock.current_count) + delta;
            flock.current_count = u32::try_from(next.max(0)).unwrap_or(u32::MAX);
            Ok(flock.clone())
        })?;

        info!(flock_id = %id, delta, current_count = updated.current_count, "Adjusted flock count");
        Ok(updated)
    }

    /// Hard delete. Returns false when the id is unknown.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let id_owned = id.to_string();
        let removed = self
            .store
            .mutate(move |flocks| Ok(flocks.remove(&id_owned).is_some()))?;
        if removed {
            info!(flock_id = %id, "Deleted flock");
        }
        Ok(removed)
    }

    /// Case-insensitive substring search over breed, notes, and id,
    /// optionally scoped to one farm. An empty term returns the scope.
    pub fn search(&self, farm_id: Option<&str>, term: &str) -> Vec<Flock> {
        let scope = match farm_id {
            Some(farm_id) => self.flocks_for_farm(farm_id),
            None => self.list(),
        };

        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return scope;
        }
        scope
            .into_iter()
            .filter(|flock| {
                flock.breed.to_lowercase().contains(&term)
                    || flock.notes.to_lowercase().contains(&term)
                    || flock.id.to_lowercase().contains(&term)
            })
            .collect()
    }

    /// Build the breeding ancestry tree for `flock_id`, following the two
    /// parent links recursively.
    ///
    /// The target flock sits at depth 1; parents are expanded only while
    /// the current depth is below `max_depth`, which bounds the recursion
    /// and guarantees termination even if the parent graph has a cycle. A
    /// parent id that no longer resolves becomes a node annotated with
    /// "Parent flock not found" rather than failing the traversal.
    pub fn family_tree(&self, flock_id: &str, max_depth: usize) -> Result<FamilyTreeNode> {
        self.store.read(|flocks| {
            if !flocks.contains_key(flock_id) {
                return Err(Error::not_found("Flock", flock_id));
            }
            Ok(build_tree(flocks, flock_id, 1, max_depth))
        })
    }
}

fn build_tree(
    flocks: &HashMap<String, Flock>,
    id: &str,
    depth: usize,
    max_depth: usize,
) -> FamilyTreeNode {
    let Some(flock) = flocks.get(id) else {
        return FamilyTreeNode::dangling(id);
    };

    let mut node = FamilyTreeNode::resolved(flock);
    if depth < max_depth {
        if let Some(male_id) = &flock.parent_flock_id_male {
            node.male_parent = Some(Box::new(build_tree(flocks, male_id, depth + 1, max_depth)));
        }
        if let Some(female_id) = &flock.parent_flock_id_female {
            node.female_parent =
                Some(Box::new(build_tree(flocks, female_id, depth + 1, max_depth)));
        }
    }
    node
}
