//! Operations that span more than one repository: farm/flock membership,
//! dependent-record checks on delete, and the coupling between mortality
//! records and a flock's live bird count.
//!
//! The stores lock independently, so a multi-store operation is not atomic
//! across files. The ordering here is chosen so a crash mid-operation
//! leaves the dependent side consistent with what was persisted first.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{Farm, Flock, HealthRecord, HealthRecordKind};
use crate::repository::farm::FarmRepository;
use crate::repository::flock::{FlockRepository, NewFlock};
use crate::repository::tracking::{HealthRecordUpdate, NewHealthRecord, TrackingRepository};

/// Repositories plus the cross-cutting operations. Cheap to clone; all
/// clones share the same stores.
#[derive(Clone)]
pub struct FarmService {
    pub farms: FarmRepository,
    pub flocks: FlockRepository,
    pub tracking: TrackingRepository,
}

impl FarmService {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(FarmService {
            farms: FarmRepository::open(data_dir)?,
            flocks: FlockRepository::open(data_dir)?,
            tracking: TrackingRepository::open(data_dir)?,
        })
    }

    /// Create a flock under an existing farm and link it into the farm's
    /// membership set. Fails before any write if the farm is unknown.
    pub fn create_flock(&self, farm_id: &str, new: NewFlock) -> Result<Flock> {
        self.farms.get(farm_id)?;
        let flock = self.flocks.add(farm_id, new)?;
        self.farms.add_flock_to_farm(farm_id, &flock.id)?;
        Ok(flock)
    }

    /// Delete a farm. Refused while flocks are still assigned to it.
    pub fn delete_farm(&self, farm_id: &str) -> Result<()> {
        let farm = self.farms.get(farm_id)?;
        if !farm.flock_ids.is_empty() {
            return Err(Error::conflict(format!(
                "Cannot delete farm {farm_id}: {} flock(s) still assigned. \
                 Delete or reassign the flocks first.",
                farm.flock_ids.len()
            )));
        }
        self.farms.delete(farm_id)?;
        Ok(())
    }

    /// Delete a flock. Refused while any health, production, feed, growth,
    /// or environment records reference it. On success the flock is also
    /// unlinked from its farm.
    pub fn delete_flock(&self, flock_id: &str) -> Result<()> {
        let flock = self.flocks.get(flock_id)?;
        if self.tracking.has_records_for_flock(flock_id) {
            return Err(Error::conflict(format!(
                "Cannot delete flock {flock_id}: tracking records still \
                 reference it. Delete the records first."
            )));
        }
        self.flocks.delete(flock_id)?;
        match self.farms.remove_flock_from_farm(&flock.farm_id, flock_id) {
            Ok(_) => {}
            // The farm may already be gone; the flock is deleted either way.
            Err(Error::NotFound { .. }) => {
                warn!(flock_id = %flock_id, farm_id = %flock.farm_id,
                      "Deleted flock referenced a missing farm");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Add a health record for an existing flock. A mortality record also
    /// decrements the flock's `current_count` by the number of deaths,
    /// clamped at zero.
    pub fn add_health_record(&self, flock_id: &str, new: NewHealthRecord) -> Result<HealthRecord> {
        self.flocks.get(flock_id)?;
        let record = self.tracking.add_health_record(flock_id, new)?;
        if let HealthRecordKind::Mortality {
            number_of_deaths, ..
        } = record.kind
        {
            let flock = self
                .flocks
                .adjust_count(flock_id, -i64::from(number_of_deaths))?;
            info!(flock_id = %flock_id, deaths = number_of_deaths,
                  current_count = flock.current_count,
                  "Applied mortality to flock count");
        }
        Ok(record)
    }

    /// Update a health record. When a mortality record's death count
    /// changes, the difference is applied to the flock's `current_count`.
    pub fn update_health_record(
        &self,
        record_id: &str,
        update: HealthRecordUpdate,
    ) -> Result<HealthRecord> {
        let before = self.tracking.get_health_record(record_id)?;
        let after = self.tracking.update_health_record(record_id, update)?;

        if let (
            HealthRecordKind::Mortality {
                number_of_deaths: old_deaths,
                ..
            },
            HealthRecordKind::Mortality {
                number_of_deaths: new_deaths,
                ..
            },
        ) = (&before.kind, &after.kind)
        {
            let delta = i64::from(*old_deaths) - i64::from(*new_deaths);
            if delta != 0 {
                let flock = self.flocks.adjust_count(&after.flock_id, delta)?;
                info!(flock_id = %after.flock_id, delta,
                      current_count = flock.current_count,
                      "Adjusted flock count after mortality update");
            }
        }
        Ok(after)
    }

    /// Delete a health record. Removing a mortality record restores its
    /// deaths to the flock's `current_count`.
    pub fn delete_health_record(&self, record_id: &str) -> Result<()> {
        let record = self.tracking.get_health_record(record_id)?;
        self.tracking.delete_health_record(record_id)?;
        if let HealthRecordKind::Mortality {
            number_of_deaths, ..
        } = record.kind
        {
            self.flocks
                .adjust_count(&record.flock_id, i64::from(number_of_deaths))?;
            info!(flock_id = %record.flock_id, restored = number_of_deaths,
                  "Restored flock count after mortality record deletion");
        }
        Ok(())
    }

    /// All flocks assigned to a farm. Fails if the farm is unknown, so an
    /// empty list means "farm with no flocks", never "no such farm".
    pub fn flocks_for_farm(&self, farm_id: &str) -> Result<Vec<Flock>> {
        self.farms.get(farm_id)?;
        Ok(self.flocks.flocks_for_farm(farm_id))
    }

    /// Farm lookup used by nested routes to 404 before touching children.
    pub fn require_farm(&self, farm_id: &str) -> Result<Farm> {
        self.farms.get(farm_id)
    }

    pub fn require_flock(&self, flock_id: &str) -> Result<Flock> {
        self.flocks.get(flock_id)
    }

    /// Mortality alert for a flock using explicit parameters. Verifies the
    /// flock exists first.
    pub fn mortality_alert(
        &self,
        flock_id: &str,
        period_days: i64,
        threshold_deaths: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        self.flocks.get(flock_id)?;
        Ok(self
            .tracking
            .check_high_mortality_events(flock_id, period_days, threshold_deaths, now))
    }

    /// Disease-outbreak alert for a flock. Verifies the flock exists first.
    pub fn disease_alert(
        &self,
        flock_id: &str,
        period_days: i64,
        disease_name: &str,
        min_incidents: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        self.flocks.get(flock_id)?;
        Ok(self.tracking.check_disease_outbreak(
            flock_id,
            period_days,
            disease_name,
            min_incidents,
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Symptom;
    use crate::repository::farm::NewFarm;
    use std::collections::BTreeSet;

    fn service() -> (tempfile::TempDir, FarmService) {
        let dir = tempfile::tempdir().unwrap();
        let service = FarmService::open(dir.path()).unwrap();
        (dir, service)
    }

    fn seeded_flock(service: &FarmService, initial_count: u32) -> (String, String) {
        let farm = service
            .farms
            .add(NewFarm {
                name: "Hilltop".to_string(),
                location: "Valley Road".to_string(),
                owner: "R. Achebe".to_string(),
                capacity: 5000,
                established_date: None,
                notes: String::new(),
            })
            .unwrap();
        let flock = service
            .create_flock(
                &farm.id,
                NewFlock {
                    breed: "Rhode Island Red".to_string(),
                    acquisition_date: Utc::now().date_naive(),
                    source_supplier: "Valley Hatchery".to_string(),
                    initial_count,
                    parent_flock_id_male: None,
                    parent_flock_id_female: None,
                    notes: String::new(),
                },
            )
            .unwrap();
        (farm.id, flock.id)
    }

    fn mortality(deaths: u32) -> NewHealthRecord {
        NewHealthRecord {
            record_date: Utc::now(),
            details: "Overnight losses".to_string(),
            veterinarian: String::new(),
            cost: 0.0,
            kind: HealthRecordKind::Mortality {
                cause_of_death: "Unknown".to_string(),
                number_of_deaths: deaths,
                post_mortem_findings: String::new(),
            },
        }
    }

    #[test]
    fn create_flock_links_farm_membership() {
        let (_dir, service) = service();
        let (farm_id, flock_id) = seeded_flock(&service, 50);
        let farm = service.farms.get(&farm_id).unwrap();
        assert!(farm.flock_ids.contains(&flock_id));
    }

    #[test]
    fn create_flock_rejects_unknown_farm() {
        let (_dir, service) = service();
        let result = service.create_flock(
            "farm-missing",
            NewFlock {
                breed: "Leghorn".to_string(),
                acquisition_date: Utc::now().date_naive(),
                source_supplier: String::new(),
                initial_count: 10,
                parent_flock_id_male: None,
                parent_flock_id_female: None,
                notes: String::new(),
            },
        );
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn mortality_record_decrements_flock_count() {
        let (_dir, service) = service();
        let (_farm_id, flock_id) = seeded_flock(&service, 50);

        service.add_health_record(&flock_id, mortality(3)).unwrap();
        assert_eq!(service.flocks.get(&flock_id).unwrap().current_count, 47);
    }

    #[test]
    fn mortality_update_applies_death_delta() {
        let (_dir, service) = service();
        let (_farm_id, flock_id) = seeded_flock(&service, 50);
        let record = service.add_health_record(&flock_id, mortality(3)).unwrap();

        service
            .update_health_record(
                &record.id,
                HealthRecordUpdate {
                    number_of_deaths: Some(7),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(service.flocks.get(&flock_id).unwrap().current_count, 43);

        service
            .update_health_record(
                &record.id,
                HealthRecordUpdate {
                    number_of_deaths: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(service.flocks.get(&flock_id).unwrap().current_count, 48);
    }

    #[test]
    fn mortality_deletion_restores_flock_count() {
        let (_dir, service) = service();
        let (_farm_id, flock_id) = seeded_flock(&service, 50);
        let record = service.add_health_record(&flock_id, mortality(5)).unwrap();
        assert_eq!(service.flocks.get(&flock_id).unwrap().current_count, 45);

        service.delete_health_record(&record.id).unwrap();
        assert_eq!(service.flocks.get(&flock_id).unwrap().current_count, 50);
    }

    #[test]
    fn mortality_never_drives_count_negative() {
        let (_dir, service) = service();
        let (_farm_id, flock_id) = seeded_flock(&service, 4);

        service.add_health_record(&flock_id, mortality(9)).unwrap();
        assert_eq!(service.flocks.get(&flock_id).unwrap().current_count, 0);
    }

    #[test]
    fn farm_delete_blocked_by_assigned_flocks() {
        let (_dir, service) = service();
        let (farm_id, flock_id) = seeded_flock(&service, 50);

        let blocked = service.delete_farm(&farm_id);
        assert!(matches!(blocked, Err(Error::Conflict(_))));

        service.delete_flock(&flock_id).unwrap();
        service.delete_farm(&farm_id).unwrap();
        assert!(matches!(
            service.farms.get(&farm_id),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn flock_delete_blocked_by_tracking_records() {
        let (_dir, service) = service();
        let (farm_id, flock_id) = seeded_flock(&service, 50);
        let record = service.add_health_record(&flock_id, mortality(1)).unwrap();

        let blocked = service.delete_flock(&flock_id);
        assert!(matches!(blocked, Err(Error::Conflict(_))));

        service.delete_health_record(&record.id).unwrap();
        service.delete_flock(&flock_id).unwrap();
        let farm = service.farms.get(&farm_id).unwrap();
        assert!(!farm.flock_ids.contains(&flock_id));
    }

    #[test]
    fn non_mortality_records_leave_count_alone() {
        let (_dir, service) = service();
        let (_farm_id, flock_id) = seeded_flock(&service, 50);

        service
            .add_health_record(
                &flock_id,
                NewHealthRecord {
                    record_date: Utc::now(),
                    details: "Routine inspection".to_string(),
                    veterinarian: "Dr. Mensah".to_string(),
                    cost: 25.0,
                    kind: HealthRecordKind::DiseaseIncident {
                        disease_name: "Coccidiosis".to_string(),
                        symptoms: BTreeSet::from([Symptom::Diarrhea, Symptom::Lethargy]),
                        treatment_administered: "Amprolium".to_string(),
                        affected_count: 4,
                    },
                },
            )
            .unwrap();
        assert_eq!(service.flocks.get(&flock_id).unwrap().current_count, 50);
    }

    #[test]
    fn alerts_require_known_flock() {
        let (_dir, service) = service();
        let now = Utc::now();
        assert!(matches!(
            service.mortality_alert("flock-missing", 7, 5, now),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            service.disease_alert("flock-missing", 14, "Avian Flu", 2, now),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn mortality_alert_end_to_end() {
        let (_dir, service) = service();
        let (_farm_id, flock_id) = seeded_flock(&service, 50);
        let now = Utc::now();

        service.add_health_record(&flock_id, mortality(3)).unwrap();
        assert!(service
            .mortality_alert(&flock_id, 7, 5, now)
            .unwrap()
            .is_none());

        service.add_health_record(&flock_id, mortality(4)).unwrap();
        let alert = service.mortality_alert(&flock_id, 7, 5, now).unwrap();
        assert!(alert.expect("7 deaths should alert").contains("7 deaths"));
        assert_eq!(service.flocks.get(&flock_id).unwrap().current_count, 43);
    }
}
