//! Onboarding questionnaire record.
//!
//! Pure validation of the first-run questionnaire a new user submits before
//! seeing coaches. No IO; the record is validated and handed back normalized.

pub mod profile;

pub use profile::{
    Budget, ChronicCondition, FitnessGoal, Gender, Injury, OnboardingProfile, TrainingLocation,
    PROFILE_VERSION,
};
