//! Time-series record storage for flocks: health, production, feed,
//! growth, and environment stores, plus the rolling-window alert checks.
//!
//! Each store is an independent JSON file keyed by record id. Validation
//! happens at construction and again after updates; a violated constraint
//! surfaces as a validation error, never a silent coercion.
//!
//! The alert checks rescan the flock's full history on every call,
//! filtering by date. Fine at this scale; a time-ordered index or
//! pre-aggregated rollups would be needed before the stores grow large.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{
    EnvironmentRecord, FeedConsumptionRecord, GrowthRecord, HealthRecord, HealthRecordKind,
    MortalityTrend, ProductionRecord, RecordType, Symptom,
};
use crate::store::JsonStore;

use super::generate_id;

const HEALTH_RECORDS_FILE: &str = "health_records.json";
const PRODUCTION_RECORDS_FILE: &str = "production_records.json";
const FEED_RECORDS_FILE: &str = "feed_records.json";
const GROWTH_RECORDS_FILE: &str = "growth_records.json";
const ENVIRONMENT_RECORDS_FILE: &str = "environment_records.json";

/// Conventional alert policy used by callers; the check methods themselves
/// always take explicit parameters.
pub const DEFAULT_MORTALITY_PERIOD_DAYS: i64 = 7;
pub const DEFAULT_MORTALITY_THRESHOLD_DEATHS: u32 = 5;
pub const DEFAULT_DISEASE_PERIOD_DAYS: i64 = 14;
pub const DEFAULT_DISEASE_MIN_INCIDENTS: u32 = 2;

/// Fields for creating a health record; the variant payload rides on the
/// same `record_type` tag the store uses.
#[derive(Debug, Clone, Deserialize)]
pub struct NewHealthRecord {
    pub record_date: DateTime<Utc>,
    pub details: String,
    #[serde(default)]
    pub veterinarian: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(flatten)]
    pub kind: HealthRecordKind,
}

/// Partial update for a health record. Common fields apply to every
/// variant; variant fields apply only when they match the record's
/// `record_type` and are ignored otherwise. The record type itself is
/// immutable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthRecordUpdate {
    pub record_date: Option<DateTime<Utc>>,
    pub details: Option<String>,
    pub veterinarian: Option<String>,
    pub cost: Option<f64>,

    // DiseaseIncident
    pub disease_name: Option<String>,
    pub symptoms: Option<BTreeSet<Symptom>>,
    pub treatment_administered: Option<String>,
    pub affected_count: Option<u32>,

    // Vaccination
    pub vaccine_name: Option<String>,
    pub administered_by: Option<String>,
    pub dosage: Option<String>,
    pub vaccinated_count: Option<u32>,

    // Mortality
    pub cause_of_death: Option<String>,
    pub number_of_deaths: Option<u32>,
    pub post_mortem_findings: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProductionRecord {
    pub record_date: NaiveDate,
    pub total_eggs_laid: u32,
    #[serde(default)]
    pub damaged_eggs: u32,
    #[serde(default)]
    pub average_egg_weight_gm: f64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductionRecordUpdate {
    pub record_date: Option<NaiveDate>,
    pub total_eggs_laid: Option<u32>,
    pub damaged_eggs: Option<u32>,
    pub average_egg_weight_gm: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedRecord {
    pub record_date: NaiveDate,
    pub feed_type: String,
    pub quantity_kg: f64,
    #[serde(default)]
    pub cost_per_kg: f64,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedRecordUpdate {
    pub record_date: Option<NaiveDate>,
    pub feed_type: Option<String>,
    pub quantity_kg: Option<f64>,
    pub cost_per_kg: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGrowthRecord {
    pub record_date: NaiveDate,
    pub average_weight_grams: f64,
    pub number_of_birds_weighed: u32,
    #[serde(default)]
    pub feed_conversion_ratio: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrowthRecordUpdate {
    pub record_date: Option<NaiveDate>,
    pub average_weight_grams: Option<f64>,
    pub number_of_birds_weighed: Option<u32>,
    pub feed_conversion_ratio: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEnvironmentRecord {
    pub record_date: DateTime<Utc>,
    #[serde(default)]
    pub temperature_celsius: Option<f64>,
    #[serde(default)]
    pub humidity_percent: Option<f64>,
    #[serde(default)]
    pub ammonia_ppm: Option<f64>,
    #[serde(default)]
    pub carbon_dioxide_ppm: Option<f64>,
    #[serde(default)]
    pub light_intensity_lux: Option<f64>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub sensor_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentRecordUpdate {
    pub record_date: Option<DateTime<Utc>>,
    pub temperature_celsius: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub ammonia_ppm: Option<f64>,
    pub carbon_dioxide_ppm: Option<f64>,
    pub light_intensity_lux: Option<f64>,
    pub notes: Option<String>,
    pub sensor_id: Option<String>,
}

#[derive(Clone)]
pub struct TrackingRepository {
    health: Arc<JsonStore<HealthRecord>>,
    production: Arc<JsonStore<ProductionRecord>>,
    feed: Arc<JsonStore<FeedConsumptionRecord>>,
    growth: Arc<JsonStore<GrowthRecord>>,
    environment: Arc<JsonStore<EnvironmentRecord>>,
}

impl TrackingRepository {
    /// Open (or create) all five record stores under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(TrackingRepository {
            health: Arc::new(JsonStore::open(data_dir.join(HEALTH_RECORDS_FILE))?),
            production: Arc::new(JsonStore::open(data_dir.join(PRODUCTION_RECORDS_FILE))?),
            feed: Arc::new(JsonStore::open(data_dir.join(FEED_RECORDS_FILE))?),
            growth: Arc::new(JsonStore::open(data_dir.join(GROWTH_RECORDS_FILE))?),
            environment: Arc::new(JsonStore::open(data_dir.join(ENVIRONMENT_RECORDS_FILE))?),
        })
    }

    /// True when any store holds a record for the flock. Used by the
    /// service layer to block flock deletion with live dependents.
    pub fn has_records_for_flock(&self, flock_id: &str) -> bool {
        self.health
            .read(|records| records.values().any(|r| r.flock_id == flock_id))
            || self
                .production
                .read(|records| records.values().any(|r| r.flock_id == flock_id))
            || self
                .feed
                .read(|records| records.values().any(|r| r.flock_id == flock_id))
            || self
                .growth
                .read(|records| records.values().any(|r| r.flock_id == flock_id))
            || self
                .environment
                .read(|records| records.values().any(|r| r.flock_id == flock_id))
    }

    // --- Health records ---

    pub fn add_health_record(&self, flock_id: &str, new: NewHealthRecord) -> Result<HealthRecord> {
        let record = HealthRecord {
            id: generate_id(new.kind.id_prefix()),
            flock_id: flock_id.to_string(),
            record_date: new.record_date,
            details: new.details,
            veterinarian: new.veterinarian,
            cost: new.cost,
            kind: new.kind,
        };
        validate_health(&record)?;

        let stored = record.clone();
        self.health.mutate(move |records| {
            records.insert(stored.id.clone(), stored);
            Ok(())
        })?;

        info!(record_id = %record.id, flock_id = %flock_id,
              record_type = ?record.kind.record_type(), "Added health record");
        Ok(record)
    }

    pub fn get_health_record(&self, id: &str) -> Result<HealthRecord> {
        self.health
            .get(id)
            .ok_or_else(|| Error::not_found("Health record", id))
    }

    /// Health records for a flock, newest first, optionally filtered by
    /// record type.
    pub fn health_records_for_flock(
        &self,
        flock_id: &str,
        record_type: Option<RecordType>,
    ) -> Vec<HealthRecord> {
        let mut records = self.health.read(|records| {
            records
                .values()
                .filter(|r| r.flock_id == flock_id)
                .filter(|r| record_type.is_none_or(|t| r.kind.record_type() == t))
                .cloned()
                .collect::<Vec<_>>()
        });
        records.sort_by(|a, b| b.record_date.cmp(&a.record_date));
        records
    }

    pub fn update_health_record(
        &self,
        id: &str,
        update: HealthRecordUpdate,
    ) -> Result<HealthRecord> {
        let id_owned = id.to_string();
        let updated = self.health.mutate(move |records| {
            let record = records
                .get_mut(&id_owned)
                .ok_or_else(|| Error::not_found("Health record", id_owned.clone()))?;
            apply_health_update(record, update);
            validate_health(record)?;
            Ok(record.clone())
        })?;

        info!(record_id = %id, "Updated health record");
        Ok(updated)
    }

    pub fn delete_health_record(&self, id: &str) -> Result<bool> {
        let id_owned = id.to_string();
        let removed = self
            .health
            .mutate(move |records| Ok(records.remove(&id_owned).is_some()))?;
        if removed {
            info!(record_id = %id, "Deleted health record");
        }
        Ok(removed)
    }

    // --- Production records ---

    pub fn add_production_record(
        &self,
        flock_id: &str,
        new: NewProductionRecord,
    ) -> Result<ProductionRecord> {
        let record = ProductionRecord {
            id: generate_id("prod"),
            flock_id: flock_id.to_string(),
            record_date: new.record_date,
            total_eggs_laid: new.total_eggs_laid,
            damaged_eggs: new.damaged_eggs,
            average_egg_weight_gm: new.average_egg_weight_gm,
            notes: new.notes,
        };
        validate_production(&record)?;

        let stored = record.clone();
        self.production.mutate(move |records| {
            records.insert(stored.id.clone(), stored);
            Ok(())
        })?;

        info!(record_id = %record.id, flock_id = %flock_id, "Added production record");
        Ok(record)
    }

    pub fn get_production_record(&self, id: &str) -> Result<ProductionRecord> {
        self.production
            .get(id)
            .ok_or_else(|| Error::not_found("Production record", id))
    }

    pub fn production_records_for_flock(
        &self,
        flock_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Vec<ProductionRecord> {
        let mut records = self.production.read(|records| {
            records
                .values()
                .filter(|r| r.flock_id == flock_id)
                .filter(|r| in_date_range(r.record_date, start_date, end_date))
                .cloned()
                .collect::<Vec<_>>()
        });
        records.sort_by(|a, b| b.record_date.cmp(&a.record_date));
        records
    }

    pub fn update_production_record(
        &self,
        id: &str,
        update: ProductionRecordUpdate,
    ) -> Result<ProductionRecord> {
        let id_owned = id.to_string();
        let updated = self.production.mutate(move |records| {
            let record = records
                .get_mut(&id_owned)
                .ok_or_else(|| Error::not_found("Production record", id_owned.clone()))?;

            if let Some(record_date) = update.record_date {
                record.record_date = record_date;
            }
            if let Some(total) = update.total_eggs_laid {
                record.total_eggs_laid = total;
            }
            if let Some(damaged) = update.damaged_eggs {
                record.damaged_eggs = damaged;
            }
            if let Some(weight) = update.average_egg_weight_gm {
                record.average_egg_weight_gm = weight;
            }
            if let Some(notes) = update.notes {
                record.notes = notes;
            }
            validate_production(record)?;
            Ok(record.clone())
        })?;

        info!(record_id = %id, "Updated production record");
        Ok(updated)
    }

    pub fn delete_production_record(&self, id: &str) -> Result<bool> {
        let id_owned = id.to_string();
        let removed = self
            .production
            .mutate(move |records| Ok(records.remove(&id_owned).is_some()))?;
        if removed {
            info!(record_id = %id, "Deleted production record");
        }
        Ok(removed)
    }

    // --- Feed consumption records ---

    pub fn add_feed_record(
        &self,
        flock_id: &str,
        new: NewFeedRecord,
    ) -> Result<FeedConsumptionRecord> {
        let record = FeedConsumptionRecord {
            id: generate_id("feed"),
            flock_id: flock_id.to_string(),
            record_date: new.record_date,
            feed_type: new.feed_type,
            quantity_kg: new.quantity_kg,
            cost_per_kg: new.cost_per_kg,
            notes: new.notes,
        };
        validate_feed(&record)?;

        let stored = record.clone();
        self.feed.mutate(move |records| {
            records.insert(stored.id.clone(), stored);
            Ok(())
        })?;

        info!(record_id = %record.id, flock_id = %flock_id, "Added feed record");
        Ok(record)
    }

    pub fn get_feed_record(&self, id: &str) -> Result<FeedConsumptionRecord> {
        self.feed
            .get(id)
            .ok_or_else(|| Error::not_found("Feed record", id))
    }

    pub fn feed_records_for_flock(
        &self,
        flock_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Vec<FeedConsumptionRecord> {
        let mut records = self.feed.read(|records| {
            records
                .values()
                .filter(|r| r.flock_id == flock_id)
                .filter(|r| in_date_range(r.record_date, start_date, end_date))
                .cloned()
                .collect::<Vec<_>>()
        });
        records.sort_by(|a, b| b.record_date.cmp(&a.record_date));
        records
    }

    pub fn update_feed_record(
        &self,
        id: &str,
        update: FeedRecordUpdate,
    ) -> Result<FeedConsumptionRecord> {
        let id_owned = id.to_string();
        let updated = self.feed.mutate(move |records| {
            let record = records
                .get_mut(&id_owned)
                .ok_or_else(|| Error::not_found("Feed record", id_owned.clone()))?;

            if let Some(record_date) = update.record_date {
                record.record_date = record_date;
            }
            if let Some(feed_type) = update.feed_type {
                record.feed_type = feed_type;
            }
            if let Some(quantity_kg) = update.quantity_kg {
                record.quantity_kg = quantity_kg;
            }
            if let Some(cost_per_kg) = update.cost_per_kg {
                record.cost_per_kg = cost_per_kg;
            }
            if let Some(notes) = update.notes {
                record.notes = notes;
            }
            validate_feed(record)?;
            Ok(record.clone())
        })?;

        info!(record_id = %id, "Updated feed record");
        Ok(updated)
    }

    pub fn delete_feed_record(&self, id: &str) -> Result<bool> {
        let id_owned = id.to_string();
        let removed = self
            .feed
            .mutate(move |records| Ok(records.remove(&id_owned).is_some()))?;
        if removed {
            info!(record_id = %id, "Deleted feed record");
        }
        Ok(removed)
    }

    // --- Growth records ---

    pub fn add_growth_record(&self, flock_id: &str, new: NewGrowthRecord) -> Result<GrowthRecord> {
        let record = GrowthRecord {
            id: generate_id("growth"),
            flock_id: flock_id.to_string(),
            record_date: new.record_date,
            average_weight_grams: new.average_weight_grams,
            number_of_birds_weighed: new.number_of_birds_weighed,
            feed_conversion_ratio: new.feed_conversion_ratio,
            notes: new.notes,
        };
        validate_growth(&record)?;

        let stored = record.clone();
        self.growth.mutate(move |records| {
            records.insert(stored.id.clone(), stored);
            Ok(())
        })?;

        info!(record_id = %record.id, flock_id = %flock_id, "Added growth record");
        Ok(record)
    }

    pub fn get_growth_record(&self, id: &str) -> Result<GrowthRecord> {
        self.growth
            .get(id)
            .ok_or_else(|| Error::not_found("Growth record", id))
    }

    pub fn growth_records_for_flock(
        &self,
        flock_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Vec<GrowthRecord> {
        let mut records = self.growth.read(|records| {
            records
                .values()
                .filter(|r| r.flock_id == flock_id)
                .filter(|r| in_date_range(r.record_date, start_date, end_date))
                .cloned()
                .collect::<Vec<_>>()
        });
        records.sort_by(|a, b| b.record_date.cmp(&a.record_date));
        records
    }

    pub fn update_growth_record(
        &self,
        id: &str,
        update: GrowthRecordUpdate,
    ) -> Result<GrowthRecord> {
        let id_owned = id.to_string();
        let updated = self.growth.mutate(move |records| {
            let record = records
                .get_mut(&id_owned)
                .ok_or_else(|| Error::not_found("Growth record", id_owned.clone()))?;

            if let Some(record_date) = update.record_date {
                record.record_date = record_date;
            }
            if let Some(weight) = update.average_weight_grams {
                record.average_weight_grams = weight;
            }
            if let Some(birds) = update.number_of_birds_weighed {
                record.number_of_birds_weighed = birds;
            }
            if let Some(ratio) = update.feed_conversion_ratio {
                record.feed_conversion_ratio = Some(ratio);
            }
            if let Some(notes) = update.notes {
                record.notes = notes;
            }
            validate_growth(record)?;
            Ok(record.clone())
        })?;

        info!(record_id = %id, "Updated growth record");
        Ok(updated)
    }

    pub fn delete_growth_record(&self, id: &str) -> Result<bool> {
        let id_owned = id.to_string();
        let removed = self
            .growth
            .mutate(move |records| Ok(records.remove(&id_owned).is_some()))?;
        if removed {
            info!(record_id = %id, "Deleted growth record");
        }
        Ok(removed)
    }

    // --- Environment records ---

    pub fn add_environment_record(
        &self,
        flock_id: &str,
        new: NewEnvironmentRecord,
    ) -> Result<EnvironmentRecord> {
        let record = EnvironmentRecord {
            id: generate_id("env"),
            flock_id: flock_id.to_string(),
            record_date: new.record_date,
            temperature_celsius: new.temperature_celsius,
            humidity_percent: new.humidity_percent,
            ammonia_ppm: new.ammonia_ppm,
            carbon_dioxide_ppm: new.carbon_dioxide_ppm,
            light_intensity_lux: new.light_intensity_lux,
            notes: new.notes,
            sensor_id: new.sensor_id,
        };

        let stored = record.clone();
        self.environment.mutate(move |records| {
            records.insert(stored.id.clone(), stored);
            Ok(())
        })?;

        info!(record_id = %record.id, flock_id = %flock_id, "Added environment record");
        Ok(record)
    }

    pub fn get_environment_record(&self, id: &str) -> Result<EnvironmentRecord> {
        self.environment
            .get(id)
            .ok_or_else(|| Error::not_found("Environment record", id))
    }

    pub fn environment_records_for_flock(
        &self,
        flock_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Vec<EnvironmentRecord> {
        let mut records = self.environment.read(|records| {
            records
                .values()
                .filter(|r| r.flock_id == flock_id)
                .filter(|r| in_date_range(r.record_date.date_naive(), start_date, end_date))
                .cloned()
                .collect::<Vec<_>>()
        });
        records.sort_by(|a, b| b.record_date.cmp(&a.record_date));
        records
    }

    pub fn update_environment_record(
        &self,
        id: &str,
        update: EnvironmentRecordUpdate,
    ) -> Result<EnvironmentRecord> {
        let id_owned = id.to_string();
        let updated = self.environment.mutate(move |records| {
            let record = records
                .get_mut(&id_owned)
                .ok_or_else(|| Error::not_found("Environment record", id_owned.clone()))?;

            if let Some(record_date) = update.record_date {
                record.record_date = record_date;
            }
            if let Some(value) = update.temperature_celsius {
                record.temperature_celsius = Some(value);
            }
            if let Some(value) = update.humidity_percent {
                record.humidity_percent = Some(value);
            }
            if let Some(value) = update.ammonia_ppm {
                record.ammonia_ppm = Some(value);
            }
            if let Some(value) = update.carbon_dioxide_ppm {
                record.carbon_dioxide_ppm = Some(value);
            }
            if let Some(value) = update.light_intensity_lux {
                record.light_intensity_lux = Some(value);
            }
            if let Some(notes) = update.notes {
                record.notes = notes;
            }
            if let Some(sensor_id) = update.sensor_id {
                record.sensor_id = Some(sensor_id);
            }
            Ok(record.clone())
        })?;

        info!(record_id = %id, "Updated environment record");
        Ok(updated)
    }

    pub fn delete_environment_record(&self, id: &str) -> Result<bool> {
        let id_owned = id.to_string();
        let removed = self
            .environment
            .mutate(move |records| Ok(records.remove(&id_owned).is_some()))?;
        if removed {
            info!(record_id = %id, "Deleted environment record");
        }
        Ok(removed)
    }

    // --- Alert checks ---

    /// Sum mortality over the trailing window and compare against the
    /// threshold. Returns the alert message when total deaths reach
    /// `threshold_deaths`, `None` otherwise.
    ///
    /// Full rescan of the flock's mortality history per call.
    pub fn check_high_mortality_events(
        &self,
        flock_id: &str,
        period_days: i64,
        threshold_deaths: u32,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let cutoff = now - Duration::days(period_days);
        let recent_deaths: u32 = self
            .health_records_for_flock(flock_id, Some(RecordType::Mortality))
            .iter()
            .filter(|r| r.record_date >= cutoff)
            .map(|r| match &r.kind {
                HealthRecordKind::Mortality {
                    number_of_deaths, ..
                } => *number_of_deaths,
                _ => 0,
            })
            .sum();

        if recent_deaths >= threshold_deaths {
            Some(format!(
                "ALERT: High mortality event for flock {flock_id}! \
                 {recent_deaths} deaths recorded in the last {period_days} days \
                 (Threshold: {threshold_deaths})."
            ))
        } else {
            None
        }
    }

    /// Count disease incidents matching `disease_name` (case-insensitive
    /// exact match) in the trailing window. Returns the alert message when
    /// the count reaches `min_incidents`.
    pub fn check_disease_outbreak(
        &self,
        flock_id: &str,
        period_days: i64,
        disease_name: &str,
        min_incidents: u32,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let cutoff = now - Duration::days(period_days);
        let wanted = disease_name.to_lowercase();
        let incident_count = self
            .health_records_for_flock(flock_id, Some(RecordType::DiseaseIncident))
            .iter()
            .filter(|r| r.record_date >= cutoff)
            .filter(|r| match &r.kind {
                HealthRecordKind::DiseaseIncident {
                    disease_name: name, ..
                } => name.to_lowercase() == wanted,
                _ => false,
            })
            .count() as u32;

        if incident_count >= min_incidents {
            Some(format!(
                "ALERT: Possible '{disease_name}' outbreak in flock {flock_id}! \
                 {incident_count} incidents reported in the last {period_days} days."
            ))
        } else {
            None
        }
    }

    /// Mortality summary over the trailing window, regardless of any
    /// threshold.
    pub fn recent_mortality_trend(
        &self,
        flock_id: &str,
        period_days: i64,
        now: DateTime<Utc>,
    ) -> MortalityTrend {
        let cutoff = now - Duration::days(period_days);
        let recent: Vec<_> = self
            .health_records_for_flock(flock_id, Some(RecordType::Mortality))
            .into_iter()
            .filter(|r| r.record_date >= cutoff)
            .collect();

        let total_deaths = recent
            .iter()
            .map(|r| match &r.kind {
                HealthRecordKind::Mortality {
                    number_of_deaths, ..
                } => *number_of_deaths,
                _ => 0,
            })
            .sum();

        MortalityTrend {
            flock_id: flock_id.to_string(),
            period_days,
            total_deaths_in_period: total_deaths,
            records_in_period: recent.len(),
        }
    }
}

fn in_date_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
}

fn validate_health(record: &HealthRecord) -> Result<()> {
    if record.details.trim().is_empty() {
        return Err(Error::validation("Health record details are required."));
    }
    if !record.cost.is_finite() || record.cost < 0.0 {
        return Err(Error::validation("Cost cannot be negative."));
    }
    match &record.kind {
        HealthRecordKind::DiseaseIncident { disease_name, .. } => {
            if disease_name.trim().is_empty() {
                return Err(Error::validation("Disease name is required."));
            }
        }
        HealthRecordKind::Vaccination {
            vaccine_name,
            administered_by,
            ..
        } => {
            if vaccine_name.trim().is_empty() {
                return Err(Error::validation("Vaccine name is required."));
            }
            if administered_by.trim().is_empty() {
                return Err(Error::validation("Administered-by is required."));
            }
        }
        HealthRecordKind::Mortality {
            number_of_deaths, ..
        } => {
            if *number_of_deaths == 0 {
                return Err(Error::validation("Number of deaths must be positive."));
            }
        }
        HealthRecordKind::GeneralCheckup => {}
    }
    Ok(())
}

fn apply_health_update(record: &mut HealthRecord, update: HealthRecordUpdate) {
    if let Some(record_date) = update.record_date {
        record.record_date = record_date;
    }
    if let Some(details) = update.details {
        record.details = details;
    }
    if let Some(veterinarian) = update.veterinarian {
        record.veterinarian = veterinarian;
    }
    if let Some(cost) = update.cost {
        record.cost = cost;
    }

    // Variant fields only apply to the matching variant; the discriminator
    // never changes through an update.
    match &mut record.kind {
        HealthRecordKind::DiseaseIncident {
            disease_name,
            symptoms,
            treatment_administered,
            affected_count,
        } => {
            if let Some(value) = update.disease_name {
                *disease_name = value;
            }
            if let Some(value) = update.symptoms {
                *symptoms = value;
            }
            if let Some(value) = update.treatment_administered {
                *treatment_administered = value;
            }
            if let Some(value) = update.affected_count {
                *affected_count = value;
            }
        }
        HealthRecordKind::Vaccination {
            vaccine_name,
            administered_by,
            dosage,
            vaccinated_count,
        } => {
            if let Some(value) = update.vaccine_name {
                *vaccine_name = value;
            }
            if let Some(value) = update.administered_by {
                *administered_by = value;
            }
            if let Some(value) = update.dosage {
                *dosage = value;
            }
            if let Some(value) = update.vaccinated_count {
                *vaccinated_count = value;
            }
        }
        HealthRecordKind::Mortality {
            cause_of_death,
            number_of_deaths,
            post_mortem_findings,
        } => {
            if let Some(value) = update.cause_of_death {
                *cause_of_death = value;
            }
            if let Some(value) = update.number_of_deaths {
                *number_of_deaths = value;
            }
            if let Some(value) = update.post_mortem_findings {
                *post_mortem_findings = value;
            }
        }
        HealthRecordKind::GeneralCheckup => {}
    }
}

fn validate_production(record: &ProductionRecord) -> Result<()> {
    if record.damaged_eggs > record.total_eggs_laid {
        return Err(Error::validation(
            "Damaged eggs cannot exceed total eggs laid.",
        ));
    }
    if !record.average_egg_weight_gm.is_finite() || record.average_egg_weight_gm < 0.0 {
        return Err(Error::validation("Average egg weight cannot be negative."));
    }
    Ok(())
}

fn validate_feed(record: &FeedConsumptionRecord) -> Result<()> {
    if record.feed_type.trim().is_empty() {
        return Err(Error::validation("Feed type is required."));
    }
    if !record.quantity_kg.is_finite() || record.quantity_kg <= 0.0 {
        return Err(Error::validation("Feed quantity must be positive."));
    }
    if !record.cost_per_kg.is_finite() || record.cost_per_kg < 0.0 {
        return Err(Error::validation("Cost per kg cannot be negative."));
    }
    Ok(())
}

fn validate_growth(record: &GrowthRecord) -> Result<()> {
    if !record.average_weight_grams.is_finite() || record.average_weight_grams <= 0.0 {
        return Err(Error::validation("Average weight must be positive."));
    }
    if record.number_of_birds_weighed == 0 {
        return Err(Error::validation(
            "Number of birds weighed must be positive.",
        ));
    }
    if let Some(ratio) = record.feed_conversion_ratio {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(Error::validation(
                "Feed Conversion Ratio (FCR) must be positive if provided.",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> (tempfile::TempDir, TrackingRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = TrackingRepository::open(dir.path()).unwrap();
        (dir, repo)
    }

    fn mortality(deaths: u32, days_ago: i64, now: DateTime<Utc>) -> NewHealthRecord {
        NewHealthRecord {
            record_date: now - Duration::days(days_ago),
            details: "Found during rounds".to_string(),
            veterinarian: String::new(),
            cost: 0.0,
            kind: HealthRecordKind::Mortality {
                cause_of_death: "Stress".to_string(),
                number_of_deaths: deaths,
                post_mortem_findings: String::new(),
            },
        }
    }

    fn disease(name: &str, days_ago: i64, now: DateTime<Utc>) -> NewHealthRecord {
        NewHealthRecord {
            record_date: now - Duration::days(days_ago),
            details: "Symptoms observed".to_string(),
            veterinarian: String::new(),
            cost: 0.0,
            kind: HealthRecordKind::DiseaseIncident {
                disease_name: name.to_string(),
                symptoms: BTreeSet::from([Symptom::Lethargy]),
                treatment_administered: String::new(),
                affected_count: 5,
            },
        }
    }

    #[test]
    fn mortality_record_requires_positive_deaths() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        let result = repo.add_health_record("flock-1", mortality(0, 0, now));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn health_records_filter_by_type_and_sort_newest_first() {
        let (_dir, repo) = repo();
        let now = Utc::now();

        repo.add_health_record("flock-1", mortality(2, 5, now)).unwrap();
        repo.add_health_record("flock-1", mortality(3, 1, now)).unwrap();
        repo.add_health_record("flock-1", disease("Avian Flu", 2, now))
            .unwrap();
        repo.add_health_record("flock-2", mortality(9, 1, now)).unwrap();

        let all = repo.health_records_for_flock("flock-1", None);
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].record_date >= w[1].record_date));

        let mortalities = repo.health_records_for_flock("flock-1", Some(RecordType::Mortality));
        assert_eq!(mortalities.len(), 2);
    }

    #[test]
    fn health_update_keeps_variant_and_revalidates() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        let record = repo.add_health_record("flock-1", mortality(3, 1, now)).unwrap();

        let updated = repo
            .update_health_record(
                &record.id,
                HealthRecordUpdate {
                    number_of_deaths: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        match updated.kind {
            HealthRecordKind::Mortality {
                number_of_deaths, ..
            } => assert_eq!(number_of_deaths, 5),
            other => panic!("expected mortality, got {other:?}"),
        }

        let rejected = repo.update_health_record(
            &record.id,
            HealthRecordUpdate {
                number_of_deaths: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(rejected, Err(Error::Validation(_))));
        // Failed update leaves the record untouched.
        assert_eq!(repo.get_health_record(&record.id).unwrap(), updated);
    }

    #[test]
    fn production_rejects_damaged_exceeding_total() {
        let (_dir, repo) = repo();
        let result = repo.add_production_record(
            "flock-1",
            NewProductionRecord {
                record_date: Utc::now().date_naive(),
                total_eggs_laid: 10,
                damaged_eggs: 11,
                average_egg_weight_gm: 60.0,
                notes: String::new(),
            },
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn production_date_range_filter() {
        let (_dir, repo) = repo();
        let today = Utc::now().date_naive();
        for days_ago in [0i64, 3, 10] {
            repo.add_production_record(
                "flock-1",
                NewProductionRecord {
                    record_date: today - Duration::days(days_ago),
                    total_eggs_laid: 100,
                    damaged_eggs: 2,
                    average_egg_weight_gm: 61.0,
                    notes: String::new(),
                },
            )
            .unwrap();
        }

        let last_week = repo.production_records_for_flock(
            "flock-1",
            Some(today - Duration::days(7)),
            None,
        );
        assert_eq!(last_week.len(), 2);

        let all = repo.production_records_for_flock("flock-1", None, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].record_date, today);
    }

    #[test]
    fn feed_validation() {
        let (_dir, repo) = repo();
        let today = Utc::now().date_naive();

        let no_type = repo.add_feed_record(
            "flock-1",
            NewFeedRecord {
                record_date: today,
                feed_type: "  ".to_string(),
                quantity_kg: 10.0,
                cost_per_kg: 0.3,
                notes: String::new(),
            },
        );
        assert!(matches!(no_type, Err(Error::Validation(_))));

        let zero_quantity = repo.add_feed_record(
            "flock-1",
            NewFeedRecord {
                record_date: today,
                feed_type: "Layer Mash".to_string(),
                quantity_kg: 0.0,
                cost_per_kg: 0.3,
                notes: String::new(),
            },
        );
        assert!(matches!(zero_quantity, Err(Error::Validation(_))));
    }

    #[test]
    fn growth_validation_includes_optional_fcr() {
        let (_dir, repo) = repo();
        let today = Utc::now().date_naive();

        let ok = repo.add_growth_record(
            "flock-1",
            NewGrowthRecord {
                record_date: today,
                average_weight_grams: 1200.0,
                number_of_birds_weighed: 50,
                feed_conversion_ratio: Some(1.8),
                notes: "Week 6 check".to_string(),
            },
        );
        assert!(ok.is_ok());

        let bad_fcr = repo.add_growth_record(
            "flock-1",
            NewGrowthRecord {
                record_date: today,
                average_weight_grams: 1200.0,
                number_of_birds_weighed: 50,
                feed_conversion_ratio: Some(0.0),
                notes: String::new(),
            },
        );
        assert!(matches!(bad_fcr, Err(Error::Validation(_))));
    }

    #[test]
    fn mortality_alert_fires_inside_window() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        repo.add_health_record("flock-1", mortality(2, 1, now)).unwrap();
        repo.add_health_record("flock-1", mortality(2, 3, now)).unwrap();
        repo.add_health_record("flock-1", mortality(2, 6, now)).unwrap();

        let alert = repo.check_high_mortality_events("flock-1", 7, 5, now);
        let message = alert.expect("6 deaths in 7 days should alert at threshold 5");
        assert!(message.contains("flock-1"));
        assert!(message.contains("6 deaths"));
        assert!(message.contains("7 days"));
    }

    #[test]
    fn mortality_alert_ignores_records_outside_window() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        repo.add_health_record("flock-1", mortality(4, 10, now)).unwrap();
        repo.add_health_record("flock-1", mortality(4, 12, now)).unwrap();
        repo.add_health_record("flock-1", mortality(2, 1, now)).unwrap();

        assert!(repo.check_high_mortality_events("flock-1", 7, 5, now).is_none());
    }

    #[test]
    fn mortality_alert_silent_below_threshold() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        repo.add_health_record("flock-1", mortality(4, 1, now)).unwrap();
        assert!(repo.check_high_mortality_events("flock-1", 7, 5, now).is_none());
    }

    #[test]
    fn disease_outbreak_matches_name_case_insensitively() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        repo.add_health_record("flock-1", disease("Avian Flu", 3, now)).unwrap();
        repo.add_health_record("flock-1", disease("AVIAN FLU", 1, now)).unwrap();
        repo.add_health_record("flock-1", disease("Newcastle", 1, now)).unwrap();

        let alert = repo.check_disease_outbreak("flock-1", 14, "avian flu", 2, now);
        assert!(alert.expect("two incidents should alert").contains("2 incidents"));

        assert!(repo
            .check_disease_outbreak("flock-1", 14, "Newcastle", 2, now)
            .is_none());
    }

    #[test]
    fn disease_outbreak_respects_window() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        repo.add_health_record("flock-1", disease("Avian Flu", 20, now)).unwrap();
        repo.add_health_record("flock-1", disease("Avian Flu", 1, now)).unwrap();

        assert!(repo
            .check_disease_outbreak("flock-1", 14, "Avian Flu", 2, now)
            .is_none());
    }

    #[test]
    fn mortality_trend_summarizes_window() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        repo.add_health_record("flock-1", mortality(3, 2, now)).unwrap();
        repo.add_health_record("flock-1", mortality(2, 1, now)).unwrap();
        repo.add_health_record("flock-1", mortality(5, 30, now)).unwrap();

        let trend = repo.recent_mortality_trend("flock-1", 7, now);
        assert_eq!(trend.total_deaths_in_period, 5);
        assert_eq!(trend.records_in_period, 2);
    }

    #[test]
    fn has_records_for_flock_spans_all_stores() {
        let (_dir, repo) = repo();
        let now = Utc::now();
        assert!(!repo.has_records_for_flock("flock-1"));

        repo.add_environment_record(
            "flock-1",
            NewEnvironmentRecord {
                record_date: now,
                temperature_celsius: Some(31.5),
                humidity_percent: Some(60.0),
                ammonia_ppm: None,
                carbon_dioxide_ppm: None,
                light_intensity_lux: None,
                notes: String::new(),
                sensor_id: Some("coop-7".to_string()),
            },
        )
        .unwrap();
        assert!(repo.has_records_for_flock("flock-1"));
        assert!(!repo.has_records_for_flock("flock-2"));
    }

    #[test]
    fn stores_round_trip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let (health, production) = {
            let repo = TrackingRepository::open(dir.path()).unwrap();
            let health = repo
                .add_health_record("flock-1", disease("Infectious Bronchitis", 1, now))
                .unwrap();
            let production = repo
                .add_production_record(
                    "flock-1",
                    NewProductionRecord {
                        record_date: now.date_naive(),
                        total_eggs_laid: 400,
                        damaged_eggs: 10,
                        average_egg_weight_gm: 60.5,
                        notes: String::new(),
                    },
                )
                .unwrap();
            (health, production)
        };

        let reopened = TrackingRepository::open(dir.path()).unwrap();
        assert_eq!(reopened.get_health_record(&health.id).unwrap(), health);
        let loaded = reopened.get_production_record(&production.id).unwrap();
        assert_eq!(loaded, production);
        assert_eq!(loaded.marketable_eggs(), 390);
    }
}
