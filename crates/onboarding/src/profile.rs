use serde::{Deserialize, Serialize};

use gympal_core::{DomainError, DomainResult};

/// Current questionnaire schema version.
pub const PROFILE_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChronicCondition {
    Diabetes,
    Hypertension,
    #[serde(rename = "Heart Disease")]
    HeartDisease,
    Asthma,
    Arthritis,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Injury {
    #[serde(rename = "Back Pain")]
    BackPain,
    #[serde(rename = "Knee Injury")]
    KneeInjury,
    #[serde(rename = "Shoulder Injury")]
    ShoulderInjury,
    #[serde(rename = "Limited Mobility")]
    LimitedMobility,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingLocation {
    Home,
    Gym,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitnessGoal {
    #[serde(rename = "Weight Loss")]
    WeightLoss,
    #[serde(rename = "Muscle Gain")]
    MuscleGain,
    #[serde(rename = "Improve Strength")]
    ImproveStrength,
    #[serde(rename = "Increase Flexibility")]
    IncreaseFlexibility,
    #[serde(rename = "Sports Performance")]
    SportsPerformance,
    #[serde(rename = "General Fitness")]
    GeneralFitness,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    Low,
    #[default]
    Medium,
    High,
}

fn default_days_per_week() -> u8 {
    3
}

/// Questionnaire answers, schema version 1.
///
/// Unknown fields are rejected at deserialization. Use
/// [`OnboardingProfile::from_json`] to parse and validate in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OnboardingProfile {
    pub version: u8,
    pub gender: Gender,
    pub age: u8,
    pub weight_kg: f64,
    pub height_cm: f64,
    #[serde(default)]
    pub chronic_conditions: Vec<ChronicCondition>,
    #[serde(default)]
    pub injuries: Vec<Injury>,
    pub location: TrainingLocation,
    #[serde(default = "default_days_per_week")]
    pub days_per_week: u8,
    #[serde(default)]
    pub goals: Vec<FitnessGoal>,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub favorite_foods: Vec<String>,
}

impl OnboardingProfile {
    /// Deserialize and validate a submitted payload.
    pub fn from_json(value: serde_json::Value) -> DomainResult<Self> {
        let profile: OnboardingProfile =
            serde_json::from_value(value).map_err(|e| DomainError::validation(e.to_string()))?;
        profile.validated()
    }

    /// Check every invariant and return the normalized record.
    ///
    /// Normalization trims favorite foods; everything else is checked as-is.
    pub fn validated(mut self) -> DomainResult<Self> {
        if self.version != PROFILE_VERSION {
            return Err(DomainError::validation(format!(
                "unsupported onboarding version {}",
                self.version
            )));
        }
        if !(13..=120).contains(&self.age) {
            return Err(DomainError::validation("age must be between 13 and 120"));
        }
        if !is_positive(self.weight_kg) {
            return Err(DomainError::validation("weightKg must be positive"));
        }
        if !is_positive(self.height_cm) {
            return Err(DomainError::validation("heightCm must be positive"));
        }
        if !(1..=7).contains(&self.days_per_week) {
            return Err(DomainError::validation("daysPerWeek must be between 1 and 7"));
        }

        exclusive_none("chronicConditions", &self.chronic_conditions, &ChronicCondition::None)?;
        exclusive_none("injuries", &self.injuries, &Injury::None)?;
        distinct("chronicConditions", &self.chronic_conditions)?;
        distinct("injuries", &self.injuries)?;
        distinct("goals", &self.goals)?;

        let mut foods = Vec::with_capacity(self.favorite_foods.len());
        for food in &self.favorite_foods {
            let food = food.trim();
            if food.is_empty() {
                return Err(DomainError::validation("favoriteFoods entries must not be blank"));
            }
            foods.push(food.to_string());
        }
        self.favorite_foods = foods;

        Ok(self)
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// `None` may only be selected on its own.
fn exclusive_none<T: PartialEq>(field: &str, items: &[T], none: &T) -> DomainResult<()> {
    if items.len() > 1 && items.contains(none) {
        return Err(DomainError::validation(format!(
            "{field}: \"None\" cannot be combined with other entries"
        )));
    }
    Ok(())
}

fn distinct<T: PartialEq>(field: &str, items: &[T]) -> DomainResult<()> {
    for (i, item) in items.iter().enumerate() {
        if items[..i].contains(item) {
            return Err(DomainError::validation(format!("{field}: duplicate entry")));
        }
    }
    Ok(())
}
