//! Action Executor
//!
//! Walks an [`ActionDescriptor`] tree. Store descriptors resolve their
//! arguments inside the store task, against the state they are applied to,
//! so concurrent read-modify-writes never lose an update. Effect descriptors
//! are handed to the registered platform handlers.
//!
//! Sequences are fail-fast. Steps that already ran are not rolled back.

use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

use super::effects::{ApiCall, ApiHandler, EffectHandlers, NavigationRequest};
use super::error::{EffectKind, RuntimeError};
use super::evaluate::{display_string, evaluate_condition, resolve_value, ExecutionContext};
use super::key_path::KeyPath;
use super::store::{KeyPathStore, StoreOp};
use crate::ir::{ActionDescriptor, ApiRequestDescriptor};

type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

#[derive(Debug, Clone, Default)]
pub struct ActionExecutor {
    handlers: EffectHandlers,
}

impl ActionExecutor {
    pub fn new(handlers: EffectHandlers) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &EffectHandlers {
        &self.handlers
    }

    pub async fn execute(
        &self,
        action: &ActionDescriptor,
        store: &KeyPathStore,
        ctx: &ExecutionContext,
    ) -> Result<(), RuntimeError> {
        debug!(action = action.kind_name(), "executing action");
        self.run(action, store, ctx).await
    }

    fn run<'a>(
        &'a self,
        action: &'a ActionDescriptor,
        store: &'a KeyPathStore,
        ctx: &'a ExecutionContext,
    ) -> ExecFuture<'a> {
        Box::pin(async move {
            match action {
                ActionDescriptor::StoreSet { path, value } => {
                    let path = KeyPath::parse(path)?;
                    let value = value.clone();
                    let ctx = ctx.clone();
                    store
                        .update(move |state| {
                            let value = resolve_value(&value, state, &ctx);
                            Ok(vec![StoreOp::Set { path, value }])
                        })
                        .await?;
                    Ok(())
                }
                ActionDescriptor::StoreRemove { path } => {
                    store.remove(path).await?;
                    Ok(())
                }
                ActionDescriptor::StoreMerge { path, value } => {
                    let path = KeyPath::parse(path)?;
                    let value = value.clone();
                    let ctx = ctx.clone();
                    store
                        .update(move |state| {
                            let entries: Map<String, Value> = value
                                .iter()
                                .map(|(key, entry)| {
                                    (key.clone(), resolve_value(entry, state, &ctx))
                                })
                                .collect();
                            Ok(vec![StoreOp::Merge { path, entries }])
                        })
                        .await?;
                    Ok(())
                }
                ActionDescriptor::Conditional {
                    condition,
                    then,
                    otherwise,
                } => {
                    let snapshot = store.snapshot().await?;
                    if evaluate_condition(condition, &snapshot, ctx) {
                        self.run(then, store, ctx).await
                    } else if let Some(otherwise) = otherwise {
                        self.run(otherwise, store, ctx).await
                    } else {
                        Ok(())
                    }
                }
                ActionDescriptor::Sequence { steps } => {
                    for (index, step) in steps.iter().enumerate() {
                        self.run(step, store, ctx)
                            .await
                            .map_err(|source| RuntimeError::Step {
                                step: index + 1,
                                source: Box::new(source),
                            })?;
                    }
                    Ok(())
                }
                ActionDescriptor::Navigate {
                    kind,
                    target,
                    params,
                } => {
                    let handler = self
                        .handlers
                        .navigation
                        .as_ref()
                        .ok_or(RuntimeError::Dispatch(EffectKind::Navigation))?;
                    let snapshot = store.snapshot().await?;
                    let request = NavigationRequest {
                        kind: *kind,
                        target: target.as_ref().map(|t| resolve_value(t, &snapshot, ctx)),
                        params: params.as_ref().map(|p| resolve_value(p, &snapshot, ctx)),
                    };
                    handler
                        .navigate(request)
                        .await
                        .map_err(|source| RuntimeError::Effect {
                            kind: EffectKind::Navigation,
                            source,
                        })
                }
                ActionDescriptor::ApiRequest(request) => {
                    self.dispatch_api(request, store, ctx).await
                }
                ActionDescriptor::UiFeedback { kind, payload } => {
                    let handler = self
                        .handlers
                        .feedback
                        .as_ref()
                        .ok_or(RuntimeError::Dispatch(EffectKind::Feedback))?;
                    let snapshot = store.snapshot().await?;
                    handler
                        .show(*kind, resolve_value(payload, &snapshot, ctx))
                        .await
                        .map_err(|source| RuntimeError::Effect {
                            kind: EffectKind::Feedback,
                            source,
                        })
                }
                ActionDescriptor::System { kind, payload } => {
                    let handler = self
                        .handlers
                        .system
                        .as_ref()
                        .ok_or(RuntimeError::Dispatch(EffectKind::System))?;
                    let snapshot = store.snapshot().await?;
                    handler
                        .perform(*kind, resolve_value(payload, &snapshot, ctx))
                        .await
                        .map_err(|source| RuntimeError::Effect {
                            kind: EffectKind::System,
                            source,
                        })
                }
            }
        })
    }

    /// Awaited requests complete inline. Others run on a spawned task and
    /// report failures through tracing only.
    async fn dispatch_api(
        &self,
        request: &ApiRequestDescriptor,
        store: &KeyPathStore,
        ctx: &ExecutionContext,
    ) -> Result<(), RuntimeError> {
        let handler = self
            .handlers
            .api
            .clone()
            .ok_or(RuntimeError::Dispatch(EffectKind::Api))?;
        let snapshot = store.snapshot().await?;
        let call = ApiCall {
            endpoint: display_string(&resolve_value(&request.endpoint, &snapshot, ctx)),
            method: request.method,
            headers: request
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), resolve_value(value, &snapshot, ctx)))
                .collect(),
            body: request
                .body
                .as_ref()
                .map(|body| resolve_value(body, &snapshot, ctx)),
        };

        if request.awaited {
            return self.complete_api(handler, call, request, store, ctx).await;
        }

        let executor = self.clone();
        let store = store.clone();
        let ctx = ctx.clone();
        let request = request.clone();
        tokio::spawn(async move {
            let endpoint = call.endpoint.clone();
            if let Err(error) = executor
                .complete_api(handler, call, &request, &store, &ctx)
                .await
            {
                warn!(%endpoint, %error, "background api request failed");
            }
        });
        Ok(())
    }

    async fn complete_api(
        &self,
        handler: Arc<dyn ApiHandler>,
        call: ApiCall,
        request: &ApiRequestDescriptor,
        store: &KeyPathStore,
        ctx: &ExecutionContext,
    ) -> Result<(), RuntimeError> {
        match handler.request(call).await {
            Ok(response) => {
                if let Some(mapping) = &request.response_mapping {
                    let value = match &mapping.source {
                        Some(source) => KeyPath::parse(source)?
                            .lookup(&response)
                            .cloned()
                            .unwrap_or(Value::Null),
                        None => response.clone(),
                    };
                    store.set(&mapping.target, value).await?;
                }
                if let Some(callback) = &request.on_success {
                    let ctx = ctx.bind(&callback.bind, &[response]);
                    self.run(&callback.action, store, &ctx).await?;
                }
                Ok(())
            }
            Err(error) => match &request.on_error {
                Some(callback) => {
                    let ctx = ctx.bind(&callback.bind, &[error.to_value()]);
                    self.run(&callback.action, store, &ctx).await
                }
                None => Err(RuntimeError::Effect {
                    kind: EffectKind::Api,
                    source: error,
                }),
            },
        }
    }
}
