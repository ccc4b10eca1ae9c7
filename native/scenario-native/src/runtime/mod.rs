//! Scenario runtime: the Key-Path Store and the Action Executor.

pub mod effects;
pub mod error;
pub mod evaluate;
pub mod executor;
pub mod key_path;
pub mod session;
pub mod store;

pub use effects::{
    ApiCall, ApiHandler, EffectHandlers, FeedbackHandler, NavigationHandler, NavigationRequest,
    SystemHandler,
};
pub use error::{EffectError, EffectKind, RuntimeError, StoreError};
pub use evaluate::ExecutionContext;
pub use executor::ActionExecutor;
pub use key_path::KeyPath;
pub use session::ScenarioSession;
pub use store::{KeyPathStore, StoreOp, StorePatch, Subscription, UpdatePlan};

#[cfg(test)]
mod executor_tests;
#[cfg(test)]
mod store_tests;
