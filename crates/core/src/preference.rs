//! Rating log and preference-profile reduction.
//!
//! The rating log is the durable source of truth; a [`PreferenceProfile`]
//! is a pure function of it and can be recomputed at any time.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::Rating;
use crate::settings::{GenerationConfig, MaterialKind, ShadowIntensity};
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Minimum allowed rating value.
pub const MIN_RATING: Rating = 1;

/// Maximum allowed rating value.
pub const MAX_RATING: Rating = 5;

/// Ratings at or above this value feed the preference profile.
pub const HIGH_RATING_THRESHOLD: Rating = 4;

/// Validate a rating value is within the allowed range.
pub fn validate_rating(rating: Rating) -> Result<(), CoreError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(CoreError::Validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rating records
// ---------------------------------------------------------------------------

/// A user's rating of one generated result, with the settings that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub job_id: JobId,
    pub rating: Rating,
    pub config: GenerationConfig,
    pub rated_at: Timestamp,
}

impl RatingRecord {
    pub fn new(job_id: JobId, rating: Rating, config: GenerationConfig) -> Self {
        Self {
            job_id,
            rating,
            config,
            rated_at: chrono::Utc::now(),
        }
    }
}

/// Append-or-replace log of ratings, keyed by job id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingLog {
    records: Vec<RatingRecord>,
}

impl RatingLog {
    pub fn from_records(records: Vec<RatingRecord>) -> Self {
        let mut log = Self::default();
        for record in records {
            log.upsert(record);
        }
        log
    }

    /// Insert a record, replacing any existing record for the same job in
    /// place.
    pub fn upsert(&mut self, record: RatingRecord) {
        match self.records.iter_mut().find(|r| r.job_id == record.job_id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn get(&self, job_id: JobId) -> Option<&RatingRecord> {
        self.records.iter().find(|r| r.job_id == job_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Preference profile
// ---------------------------------------------------------------------------

/// What the user's highly rated results have in common.
///
/// Every field is `None` in the empty profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreferenceProfile {
    pub shadow_intensity: Option<ShadowIntensity>,
    pub material: Option<MaterialKind>,
    pub enhanced_lighting: Option<bool>,
    pub floating: Option<bool>,
    /// Shadow angle snapped to the nearest 45 degrees.
    pub shadow_angle_bucket: Option<u16>,
    /// Number of records the profile was derived from.
    pub sample_count: usize,
}

impl PreferenceProfile {
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// Reduce a rating log to a preference profile.
///
/// Only records rated at or above [`HIGH_RATING_THRESHOLD`] count. Each
/// field is the most frequent value among them; ties go to the value seen
/// first.
pub fn compute_profile(records: &[RatingRecord]) -> PreferenceProfile {
    let liked: Vec<&GenerationConfig> = records
        .iter()
        .filter(|r| r.rating >= HIGH_RATING_THRESHOLD)
        .map(|r| &r.config)
        .collect();

    if liked.is_empty() {
        return PreferenceProfile::default();
    }

    PreferenceProfile {
        shadow_intensity: mode(liked.iter().map(|c| c.shadow_intensity)),
        material: mode(liked.iter().map(|c| c.material.kind())),
        enhanced_lighting: mode(liked.iter().map(|c| c.enhanced_lighting)),
        floating: mode(liked.iter().map(|c| c.is_floating())),
        shadow_angle_bucket: mode(liked.iter().map(|c| c.shadow_angle.bucket())),
        sample_count: liked.len(),
    }
}

/// Most frequent value, ties broken by first occurrence.
fn mode<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Option<T> {
    // (value, count) in first-seen order.
    let mut tally: Vec<(T, usize)> = Vec::new();
    for value in values {
        match tally.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }

    let mut best: Option<(T, usize)> = None;
    for (value, count) in tally {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Material, Percentage, ShadowAngle};

    fn record(intensity: ShadowIntensity, rating: Rating) -> RatingRecord {
        let config = GenerationConfig {
            shadow_intensity: intensity,
            ..GenerationConfig::default()
        };
        RatingRecord::new(JobId::new_v4(), rating, config)
    }

    fn record_with(config: GenerationConfig, rating: Rating) -> RatingRecord {
        RatingRecord::new(JobId::new_v4(), rating, config)
    }

    #[test]
    fn empty_log_yields_empty_profile() {
        let profile = compute_profile(&[]);
        assert!(profile.is_empty());
        assert_eq!(profile, PreferenceProfile::default());
    }

    #[test]
    fn low_ratings_only_yield_empty_profile() {
        let log = vec![
            record(ShadowIntensity::Hard, 1),
            record(ShadowIntensity::Soft, 3),
        ];
        assert!(compute_profile(&log).is_empty());
    }

    #[test]
    fn preferred_intensity_ignores_low_ratings() {
        let log = vec![
            record(ShadowIntensity::Soft, 4),
            record(ShadowIntensity::Soft, 5),
            record(ShadowIntensity::Hard, 3),
        ];
        let profile = compute_profile(&log);
        assert_eq!(profile.shadow_intensity, Some(ShadowIntensity::Soft));
        assert_eq!(profile.sample_count, 2);
    }

    #[test]
    fn ties_go_to_first_occurrence() {
        let log = vec![
            record(ShadowIntensity::Long, 5),
            record(ShadowIntensity::Hard, 4),
            record(ShadowIntensity::Hard, 2),
            record(ShadowIntensity::Long, 1),
        ];
        assert_eq!(
            compute_profile(&log).shadow_intensity,
            Some(ShadowIntensity::Long)
        );
    }

    #[test]
    fn boolean_preferences_use_majority() {
        let enhanced_floating = GenerationConfig {
            enhanced_lighting: true,
            elevation: Percentage::new(40).unwrap(),
            ..GenerationConfig::default()
        };
        let log = vec![
            record_with(GenerationConfig::default(), 4),
            record_with(enhanced_floating.clone(), 5),
            record_with(enhanced_floating, 4),
        ];
        let profile = compute_profile(&log);
        assert_eq!(profile.enhanced_lighting, Some(true));
        assert_eq!(profile.floating, Some(true));
    }

    #[test]
    fn material_and_angle_bucket_modes() {
        let metal = GenerationConfig {
            material: Material::Metal {
                patina_intensity: Percentage::new(10).unwrap(),
                variation: Default::default(),
            },
            shadow_angle: ShadowAngle::new(100).unwrap(),
            ..GenerationConfig::default()
        };
        let other_metal = GenerationConfig {
            material: Material::Metal {
                patina_intensity: Percentage::new(90).unwrap(),
                variation: Default::default(),
            },
            shadow_angle: ShadowAngle::new(80).unwrap(),
            ..GenerationConfig::default()
        };
        let log = vec![
            record_with(GenerationConfig::default(), 4),
            record_with(metal, 5),
            record_with(other_metal, 5),
        ];
        let profile = compute_profile(&log);
        assert_eq!(profile.material, Some(MaterialKind::Metal));
        assert_eq!(profile.shadow_angle_bucket, Some(90));
    }

    #[test]
    fn upsert_replaces_existing_record() {
        let mut log = RatingLog::default();
        let first = record(ShadowIntensity::Soft, 2);
        let id = first.job_id;
        log.upsert(first.clone());
        log.upsert(RatingRecord { rating: 5, ..first });

        assert_eq!(log.len(), 1);
        assert_eq!(log.get(id).unwrap().rating, 5);
    }

    #[test]
    fn from_records_deduplicates_by_job() {
        let first = record(ShadowIntensity::Soft, 2);
        let second = RatingRecord { rating: 4, ..first.clone() };
        let log = RatingLog::from_records(vec![first, second]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.records()[0].rating, 4);
    }

    #[test]
    fn validate_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }
}
