use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use super::effects::EffectHandlers;
use super::error::RuntimeError;
use super::evaluate::ExecutionContext;
use super::executor::ActionExecutor;
use super::store::KeyPathStore;
use crate::ir::{Bindings, Schema, ValueDescriptor};

/// A loaded scenario: its schema, a store seeded from `schema.stores`, and an
/// executor bound to the host's effect handlers.
#[derive(Debug, Clone)]
pub struct ScenarioSession {
    schema: Arc<Schema>,
    store: KeyPathStore,
    executor: ActionExecutor,
}

impl ScenarioSession {
    /// Must be called inside a tokio runtime.
    pub fn start(schema: Schema, handlers: EffectHandlers) -> Self {
        let initial = schema
            .stores
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        info!(key = %schema.key, version = %schema.version, "scenario session started");
        Self {
            schema: Arc::new(schema),
            store: KeyPathStore::new(initial),
            executor: ActionExecutor::new(handlers),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &KeyPathStore {
        &self.store
    }

    /// Runs the action `id` with `props` from the triggering element and the
    /// renderer's callback `args` bound through `bind`.
    pub async fn dispatch(
        &self,
        id: &str,
        bind: &Bindings,
        props: Value,
        args: &[Value],
    ) -> Result<(), RuntimeError> {
        let action = self
            .schema
            .actions
            .get(id)
            .ok_or_else(|| RuntimeError::UnknownAction(id.to_string()))?;
        let ctx = ExecutionContext::with_props(props).bind(bind, args);
        self.executor.execute(action, &self.store, &ctx).await
    }

    /// Fires an `ActionRef` taken from a node's data.
    pub async fn trigger(
        &self,
        reference: &ValueDescriptor,
        props: Value,
        args: &[Value],
    ) -> Result<(), RuntimeError> {
        match reference {
            ValueDescriptor::ActionRef { id, bind } => self.dispatch(id, bind, props, args).await,
            other => Err(RuntimeError::UnknownAction(
                Value::from(other.clone()).to_string(),
            )),
        }
    }
}
