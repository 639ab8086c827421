//! Service layer
//!
//! Contains the offline-sync logic on top of the data and storage layers.
//! Services orchestrate the object cache, repositories and I/O collaborators.

mod availability;
mod learning_module;
mod objects;

pub use availability::AvailabilityService;
pub use learning_module::{
    LearningModuleLoader, LoadOutcome, NoProgress, PipelineCollaborators, PipelineStage,
    ProgressReporter,
};
pub use objects::ObjectStore;
