//! Domain types for Flocktrack.
//!
//! Entities are plain serde values; every derived quantity (age group,
//! marketable eggs, feed cost) is computed from source fields at read time
//! and never persisted, so storage can never serve a stale derivation.
//!
//! Relationships are by-id only:
//!
//! - A [`Farm`] owns the *membership* set of flock ids, not the flocks.
//! - A [`Flock`] back-references its farm and weakly references up to two
//!   parent flocks; parent ids may dangle after a deletion and are resolved
//!   lazily during lineage traversal.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A flock is a chick for its first six weeks, a grower afterwards.
pub const CHICK_MAX_AGE_DAYS: i64 = 42;

/// A poultry farm. Owns the membership list of its flocks by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    pub id: String,
    pub name: String,
    pub location: String,
    pub owner: String,
    /// Housing capacity in birds. Never negative.
    pub capacity: u32,
    pub established_date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    /// Ids of flocks housed at this farm. Membership only; flock lifetime
    /// is managed by the flock repository.
    #[serde(default)]
    pub flock_ids: BTreeSet<String>,
}

/// Age classification derived from a flock's acquisition date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeGroup {
    /// Age at most [`CHICK_MAX_AGE_DAYS`] days.
    Chick,
    Grower,
}

impl AgeGroup {
    /// Classify a flock acquired on `acquired` as of `today`.
    ///
    /// A flock acquired in the future (clock skew, data entry ahead of
    /// delivery) counts as age zero, i.e. a chick.
    pub fn from_acquisition(acquired: NaiveDate, today: NaiveDate) -> Self {
        let age_days = (today - acquired).num_days().max(0);
        if age_days <= CHICK_MAX_AGE_DAYS {
            AgeGroup::Chick
        } else {
            AgeGroup::Grower
        }
    }
}

/// A cohort of birds acquired together and tracked as a unit.
///
/// `current_count` starts at `initial_count` and is adjusted by mortality
/// events through the service layer, clamped at zero. The age group is not
/// a field: it is recomputed from `acquisition_date` on every read via
/// [`Flock::age_group`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flock {
    pub id: String,
    /// Back-reference to the owning farm. Not ownership.
    pub farm_id: String,
    pub breed: String,
    pub acquisition_date: NaiveDate,
    #[serde(default)]
    pub source_supplier: String,
    pub initial_count: u32,
    pub current_count: u32,
    /// Weak reference to the male parent flock; may dangle.
    #[serde(default)]
    pub parent_flock_id_male: Option<String>,
    /// Weak reference to the female parent flock; may dangle.
    #[serde(default)]
    pub parent_flock_id_female: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl Flock {
    /// Derived age group as of `today`. Never trusted from storage.
    pub fn age_group(&self, today: NaiveDate) -> AgeGroup {
        AgeGroup::from_acquisition(self.acquisition_date, today)
    }
}

/// Observable symptoms recordable on a disease incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symptom {
    Coughing,
    Sneezing,
    NasalDischarge,
    RespiratoryDistress,
    Diarrhea,
    Lethargy,
    LossOfAppetite,
    FeatherLoss,
    ReducedEggProduction,
    Other,
}

/// Variant-specific payload of a health record, tagged by `record_type`.
///
/// The variants differ only in a handful of extra fields, so this is a
/// sum type rather than a trait hierarchy; the tag doubles as the filter
/// key on list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record_type")]
pub enum HealthRecordKind {
    DiseaseIncident {
        disease_name: String,
        #[serde(default)]
        symptoms: BTreeSet<Symptom>,
        #[serde(default)]
        treatment_administered: String,
        #[serde(default)]
        affected_count: u32,
    },
    Vaccination {
        vaccine_name: String,
        administered_by: String,
        #[serde(default)]
        dosage: String,
        #[serde(default)]
        vaccinated_count: u32,
    },
    Mortality {
        cause_of_death: String,
        /// Must be positive; enforced by the tracking repository.
        number_of_deaths: u32,
        #[serde(default)]
        post_mortem_findings: String,
    },
    GeneralCheckup,
}

/// Discriminator for filtering health records by variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    DiseaseIncident,
    Vaccination,
    Mortality,
    GeneralCheckup,
}

impl HealthRecordKind {
    pub fn record_type(&self) -> RecordType {
        match self {
            HealthRecordKind::DiseaseIncident { .. } => RecordType::DiseaseIncident,
            HealthRecordKind::Vaccination { .. } => RecordType::Vaccination,
            HealthRecordKind::Mortality { .. } => RecordType::Mortality,
            HealthRecordKind::GeneralCheckup => RecordType::GeneralCheckup,
        }
    }

    /// Id prefix used for records of this variant, matching the historical
    /// store format.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            HealthRecordKind::DiseaseIncident { .. } => "disease",
            HealthRecordKind::Vaccination { .. } => "vaccine",
            HealthRecordKind::Mortality { .. } => "mortality",
            HealthRecordKind::GeneralCheckup => "health",
        }
    }
}

/// A health event recorded against a flock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: String,
    pub flock_id: String,
    pub record_date: DateTime<Utc>,
    pub details: String,
    #[serde(default)]
    pub veterinarian: String,
    /// Cost of the event (treatment, vet visit). Never negative.
    #[serde(default)]
    pub cost: f64,
    #[serde(flatten)]
    pub kind: HealthRecordKind,
}

/// Daily egg production for a flock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub id: String,
    pub flock_id: String,
    pub record_date: NaiveDate,
    pub total_eggs_laid: u32,
    /// Invariant: `damaged_eggs <= total_eggs_laid`.
    #[serde(default)]
    pub damaged_eggs: u32,
    #[serde(default)]
    pub average_egg_weight_gm: f64,
    #[serde(default)]
    pub notes: String,
}

impl ProductionRecord {
    /// Eggs laid minus eggs recorded as damaged.
    pub fn marketable_eggs(&self) -> u32 {
        self.total_eggs_laid - self.damaged_eggs
    }
}

/// Feed issued to a flock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConsumptionRecord {
    pub id: String,
    pub flock_id: String,
    pub record_date: NaiveDate,
    pub feed_type: String,
    /// Invariant: positive.
    pub quantity_kg: f64,
    #[serde(default)]
    pub cost_per_kg: f64,
    #[serde(default)]
    pub notes: String,
}

impl FeedConsumptionRecord {
    pub fn total_cost(&self) -> f64 {
        self.quantity_kg * self.cost_per_kg
    }
}

/// A weighing session for a sample of the flock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRecord {
    pub id: String,
    pub flock_id: String,
    pub record_date: NaiveDate,
    /// Invariant: positive.
    pub average_weight_grams: f64,
    /// Invariant: positive.
    pub number_of_birds_weighed: u32,
    /// Feed conversion ratio; positive when present.
    #[serde(default)]
    pub feed_conversion_ratio: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

/// Sensor readings for a flock's housing. All readings optional; a record
/// may carry whatever subset the sensor reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub id: String,
    pub flock_id: String,
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

/// One node of a flock's breeding ancestry tree.
///
/// A node for a parent id that no longer resolves carries only the id and
/// an `error` annotation; resolution failure is data, not a traversal
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyTreeNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub male_parent: Option<Box<FamilyTreeNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub female_parent: Option<Box<FamilyTreeNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FamilyTreeNode {
    /// A resolved node with no parents expanded yet.
    pub fn resolved(flock: &Flock) -> Self {
        FamilyTreeNode {
            id: flock.id.clone(),
            breed: Some(flock.breed.clone()),
            acquisition_date: Some(flock.acquisition_date),
            male_parent: None,
            female_parent: None,
            error: None,
        }
    }

    /// A node for a parent id that could not be resolved.
    pub fn dangling(id: &str) -> Self {
        FamilyTreeNode {
            id: id.to_string(),
            breed: None,
            acquisition_date: None,
            male_parent: None,
            female_parent: None,
            error: Some("Parent flock not found".to_string()),
        }
    }

    /// Depth of the tree rooted at this node, counting the root as 1.
    pub fn depth(&self) -> usize {
        let parent_depth = self
            .male_parent
            .iter()
            .chain(self.female_parent.iter())
            .map(|p| p.depth())
            .max()
            .unwrap_or(0);
        1 + parent_depth
    }
}

/// Summary of recent mortality for a flock over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct MortalityTrend {
    pub flock_id: String,
    pub period_days: i64,
    pub total_deaths_in_period: u32,
    pub records_in_period: usize,
}
