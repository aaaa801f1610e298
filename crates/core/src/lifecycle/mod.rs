pub mod engine;
pub mod guards;
pub mod states;

pub use engine::{LifecycleEngine, LifecycleError};
pub use guards::{GuardTable, GuardViolation, Requirement, TransitionRule};
pub use states::{ActorRelation, LifecycleCommand, RequestAction, TransitionOutcome};
