pub mod activation;
pub mod principle;
pub mod resonance;
pub mod stability;
pub mod suppression;

pub use activation::{
    check_activation, check_mutation_allowed, drift_resilience, ActivationInputs,
    ActivationOutcome, ActivationResult, MutationPermission,
};
pub use principle::{
    counter_principle, get_principle_interaction, resolve_principle, ParseEnumError, Principle,
    PrinciplePair, ALL_PRINCIPLES,
};
pub use resonance::{
    check_mastery_milestones, update_after_combat, update_after_combat_mastered, MasteryMilestone,
    MasteryState, ResonanceState,
};
pub use stability::{backlash_fires, CombatOutcome, Intensity, StabilityTier};
pub use suppression::{
    resolve_suppression, SuppressionKind, SuppressionLevel, SuppressionResult, SuppressionSource,
};
