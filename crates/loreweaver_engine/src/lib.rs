pub mod capabilities;
pub mod committer;
pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use capabilities::{Critic, Executor, Planner, PlanningError};
pub use committer::{CommittedScene, PersistenceError, SceneCommitter};
pub use orchestrator::{
    GeneratedScene, GenerationError, GenerationRequest, GenerationServices, SceneOrchestrator,
};
