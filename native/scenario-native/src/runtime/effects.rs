//! Platform effect seams.
//!
//! The executor never performs navigation, I/O or UI work itself. Hosts
//! register one handler per effect family; a descriptor whose family has no
//! handler fails with `RuntimeError::Dispatch`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::EffectError;
use crate::ir::{FeedbackKind, HttpMethod, NavigateKind, SystemKind};

/// Fully resolved navigation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub kind: NavigateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Fully resolved HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCall {
    pub endpoint: String,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[async_trait]
pub trait NavigationHandler: Send + Sync {
    async fn navigate(&self, request: NavigationRequest) -> Result<(), EffectError>;
}

#[async_trait]
pub trait ApiHandler: Send + Sync {
    /// Returns the decoded response body.
    async fn request(&self, call: ApiCall) -> Result<Value, EffectError>;
}

#[async_trait]
pub trait FeedbackHandler: Send + Sync {
    async fn show(&self, kind: FeedbackKind, payload: Value) -> Result<(), EffectError>;
}

#[async_trait]
pub trait SystemHandler: Send + Sync {
    async fn perform(&self, kind: SystemKind, payload: Value) -> Result<(), EffectError>;
}

/// Handler table shared by every clone of an executor.
#[derive(Clone, Default)]
pub struct EffectHandlers {
    pub navigation: Option<Arc<dyn NavigationHandler>>,
    pub api: Option<Arc<dyn ApiHandler>>,
    pub feedback: Option<Arc<dyn FeedbackHandler>>,
    pub system: Option<Arc<dyn SystemHandler>>,
}

impl EffectHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_navigation(mut self, handler: impl NavigationHandler + 'static) -> Self {
        self.navigation = Some(Arc::new(handler));
        self
    }

    pub fn with_api(mut self, handler: impl ApiHandler + 'static) -> Self {
        self.api = Some(Arc::new(handler));
        self
    }

    pub fn with_feedback(mut self, handler: impl FeedbackHandler + 'static) -> Self {
        self.feedback = Some(Arc::new(handler));
        self
    }

    pub fn with_system(mut self, handler: impl SystemHandler + 'static) -> Self {
        self.system = Some(Arc::new(handler));
        self
    }
}

impl std::fmt::Debug for EffectHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandlers")
            .field("navigation", &self.navigation.is_some())
            .field("api", &self.api.is_some())
            .field("feedback", &self.feedback.is_some())
            .field("system", &self.system.is_some())
            .finish()
    }
}
