//! Key-Path Store
//!
//! A single tokio task owns the state tree. [`KeyPathStore`] handles are cheap
//! clones that talk to it over an mpsc channel; every call carries a oneshot
//! reply, so mutations are serialized in send order and a mutating call only
//! returns after every affected subscriber has been handed the new value.
//!
//! Reads are never reported as absent-vs-null ambiguously: `get` returns
//! `None` for a missing path and `Some(Value::Null)` for a stored null.

use futures_core::Stream;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use super::error::StoreError;
use super::key_path::{type_name, KeyPath};

/// One mutation, addressed by an already-parsed path.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Set { path: KeyPath, value: Value },
    Remove { path: KeyPath },
    Merge { path: KeyPath, entries: Map<String, Value> },
}

impl StoreOp {
    pub fn set(path: &str, value: Value) -> Result<Self, StoreError> {
        Ok(StoreOp::Set {
            path: KeyPath::parse(path)?,
            value,
        })
    }

    pub fn remove(path: &str) -> Result<Self, StoreError> {
        Ok(StoreOp::Remove {
            path: KeyPath::parse(path)?,
        })
    }

    pub fn merge(path: &str, value: Value) -> Result<Self, StoreError> {
        let path = KeyPath::parse(path)?;
        match value {
            Value::Object(entries) => Ok(StoreOp::Merge { path, entries }),
            other => Err(StoreError::TypeMismatch {
                path: path.to_string(),
                expected: "object",
                found: type_name(&other),
            }),
        }
    }

    pub fn path(&self) -> &KeyPath {
        match self {
            StoreOp::Set { path, .. } | StoreOp::Remove { path } | StoreOp::Merge { path, .. } => {
                path
            }
        }
    }

    fn apply(self, state: &mut Value) -> Result<Option<Value>, StoreError> {
        match self {
            StoreOp::Set { path, value } => path.set(state, value),
            StoreOp::Remove { path } => path.remove(state),
            StoreOp::Merge { path, entries } => path.merge(state, entries),
        }
    }
}

/// Before/after record of one applied operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorePatch {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Computes the ops of a read-modify-write from the state it will be applied to.
pub type UpdatePlan = Box<dyn FnOnce(&Value) -> Result<Vec<StoreOp>, StoreError> + Send>;

enum StoreCommand {
    Get {
        path: KeyPath,
        respond_to: oneshot::Sender<Option<Value>>,
    },
    Snapshot {
        respond_to: oneshot::Sender<Value>,
    },
    Apply {
        ops: Vec<StoreOp>,
        respond_to: oneshot::Sender<Result<Vec<StorePatch>, StoreError>>,
    },
    Update {
        plan: UpdatePlan,
        respond_to: oneshot::Sender<Result<Vec<StorePatch>, StoreError>>,
    },
    Subscribe {
        path: KeyPath,
        sink: mpsc::UnboundedSender<Option<Value>>,
        respond_to: oneshot::Sender<u64>,
    },
    Unsubscribe {
        id: u64,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTOR
// ═══════════════════════════════════════════════════════════════════════════════

struct Subscriber {
    path: KeyPath,
    sink: mpsc::UnboundedSender<Option<Value>>,
}

struct StoreActor {
    state: Value,
    subscribers: BTreeMap<u64, Subscriber>,
    next_id: u64,
    receiver: mpsc::UnboundedReceiver<StoreCommand>,
}

impl StoreActor {
    async fn run(mut self) {
        while let Some(command) = self.receiver.recv().await {
            self.handle(command);
        }
        debug!("key-path store stopped");
    }

    fn handle(&mut self, command: StoreCommand) {
        match command {
            StoreCommand::Get { path, respond_to } => {
                let _ = respond_to.send(path.lookup(&self.state).cloned());
            }
            StoreCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.state.clone());
            }
            StoreCommand::Apply { ops, respond_to } => {
                let result = self.apply(ops);
                let _ = respond_to.send(result);
            }
            StoreCommand::Update { plan, respond_to } => {
                let result = plan(&self.state).and_then(|ops| {
                    if ops.is_empty() {
                        Ok(Vec::new())
                    } else {
                        self.apply(ops)
                    }
                });
                let _ = respond_to.send(result);
            }
            StoreCommand::Subscribe {
                path,
                sink,
                respond_to,
            } => {
                let id = self.next_id;
                self.next_id += 1;
                // Initial delivery precedes any later mutation.
                let _ = sink.send(path.lookup(&self.state).cloned());
                trace!(id, path = %path, "subscriber added");
                self.subscribers.insert(id, Subscriber { path, sink });
                let _ = respond_to.send(id);
            }
            StoreCommand::Unsubscribe { id } => {
                self.subscribers.remove(&id);
                trace!(id, "subscriber removed");
            }
        }
    }

    /// All-or-nothing: a failing op leaves the state and subscribers untouched.
    fn apply(&mut self, ops: Vec<StoreOp>) -> Result<Vec<StorePatch>, StoreError> {
        let touched: Vec<KeyPath> = ops.iter().map(|op| op.path().clone()).collect();

        // A failing write may already have created intermediate containers.
        let mut working = self.state.clone();
        let patches = apply_all(&mut working, ops)?;
        self.state = working;

        self.notify(&touched);
        Ok(patches)
    }

    fn notify(&mut self, touched: &[KeyPath]) {
        let state = &self.state;
        let mut closed = Vec::new();
        for (id, subscriber) in &self.subscribers {
            if !touched.iter().any(|path| path.is_related(&subscriber.path)) {
                continue;
            }
            let current = subscriber.path.lookup(state).cloned();
            if subscriber.sink.send(current).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
    }
}

fn apply_all(state: &mut Value, ops: Vec<StoreOp>) -> Result<Vec<StorePatch>, StoreError> {
    let mut patches = Vec::with_capacity(ops.len());
    for op in ops {
        let path = op.path().clone();
        let old_value = op.apply(state)?;
        patches.push(StorePatch {
            path: path.to_string(),
            old_value,
            new_value: path.lookup(state).cloned(),
        });
    }
    Ok(patches)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Cloneable handle to a running store. The store task ends once every
/// handle and subscription has been dropped.
#[derive(Debug, Clone)]
pub struct KeyPathStore {
    commands: mpsc::UnboundedSender<StoreCommand>,
}

impl KeyPathStore {
    /// Spawns the owning task on the current tokio runtime.
    pub fn new(initial: Value) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let actor = StoreActor {
            state: initial,
            subscribers: BTreeMap::new(),
            next_id: 0,
            receiver,
        };
        tokio::spawn(actor.run());
        Self { commands }
    }

    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(build(respond_to))
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)
    }

    pub async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let path = KeyPath::parse(path)?;
        self.request(|respond_to| StoreCommand::Get { path, respond_to })
            .await
    }

    /// The whole state tree, as of the moment the request is served.
    pub async fn snapshot(&self) -> Result<Value, StoreError> {
        self.request(|respond_to| StoreCommand::Snapshot { respond_to })
            .await
    }

    pub async fn set(&self, path: &str, value: Value) -> Result<StorePatch, StoreError> {
        self.single(StoreOp::set(path, value)?).await
    }

    /// Removing a missing path succeeds and still notifies related subscribers.
    pub async fn remove(&self, path: &str) -> Result<StorePatch, StoreError> {
        self.single(StoreOp::remove(path)?).await
    }

    pub async fn merge(&self, path: &str, value: Value) -> Result<StorePatch, StoreError> {
        self.single(StoreOp::merge(path, value)?).await
    }

    /// Swaps the whole tree. Every subscriber is related to the root.
    pub async fn replace_all(&self, value: Value) -> Result<StorePatch, StoreError> {
        self.single(StoreOp::Set {
            path: KeyPath::root(),
            value,
        })
        .await
    }

    /// Applies `ops` atomically with one notification round.
    pub async fn transaction(&self, ops: Vec<StoreOp>) -> Result<Vec<StorePatch>, StoreError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        self.request(|respond_to| StoreCommand::Apply { ops, respond_to })
            .await?
    }

    /// Read-modify-write in one step: `plan` sees the current state and no
    /// other command is served between the read and the write.
    pub async fn update(
        &self,
        plan: impl FnOnce(&Value) -> Result<Vec<StoreOp>, StoreError> + Send + 'static,
    ) -> Result<Vec<StorePatch>, StoreError> {
        let plan: UpdatePlan = Box::new(plan);
        self.request(|respond_to| StoreCommand::Update { plan, respond_to })
            .await?
    }

    async fn single(&self, op: StoreOp) -> Result<StorePatch, StoreError> {
        let mut patches = self.transaction(vec![op]).await?;
        patches.pop().ok_or(StoreError::Closed)
    }

    /// Registers interest in `path`. The current value is the first item of
    /// the returned stream.
    pub async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let path = KeyPath::parse(path)?;
        let (sink, receiver) = mpsc::unbounded_channel();
        let display = path.to_string();
        let id = self
            .request(|respond_to| StoreCommand::Subscribe {
                path,
                sink,
                respond_to,
            })
            .await?;
        Ok(Subscription {
            id,
            path: display,
            receiver,
            commands: self.commands.clone(),
        })
    }
}

/// Stream of values at one path. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    path: String,
    receiver: mpsc::UnboundedReceiver<Option<Value>>,
    commands: mpsc::UnboundedSender<StoreCommand>,
}

impl Subscription {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next delivered value; `None` once the store has stopped.
    pub async fn recv(&mut self) -> Option<Option<Value>> {
        self.receiver.recv().await
    }

    /// A value already delivered, without waiting.
    pub fn try_recv(&mut self) -> Option<Option<Value>> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Option<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(StoreCommand::Unsubscribe { id: self.id });
    }
}
