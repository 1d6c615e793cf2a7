//! Agent - identity, memory and lifecycle flags of one agent
//!
//! An `Agent` is a cheap handle; clones share the same state. Memory and
//! flags sit behind a per-agent mutex that is never held across an await, so
//! the Router can append from its own task while the life loop runs.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::actions::Dispatcher;
use crate::core::{FrameworkError, FrameworkResult, LifeState, Message};
use crate::runtime::Reporter;

use super::config::AgentProfile;
use super::life;

type ActionData = Box<dyn Any + Send + Sync>;

/// Mutable state guarded by the agent lock
pub(super) struct AgentShared {
    pub(super) memory: VecDeque<Message>,
    /// False once closed; never flips back
    pub(super) alive: bool,
    /// True while the agent is (or is about to be) in its plan/act loop
    pub(super) activate: bool,
    pub(super) state: LifeState,
    /// A life task is bound to this agent
    pub(super) life_running: bool,
    /// Environment messages since the last `observe(true)`
    pub(super) observed: usize,
    /// Environment messages since the current cycle began
    pub(super) cycle_inputs: usize,
    pub(super) sleep_requested: bool,
    pub(super) activations: u64,
    action_data: HashMap<String, ActionData>,
}

impl AgentShared {
    /// Move to `next` if the lifecycle allows it
    ///
    /// Returns false (and leaves the state alone) for an illegal transition.
    pub(super) fn transition(&mut self, agent: &str, next: LifeState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                "[Agent:{}] Ignoring illegal transition {} -> {}",
                agent,
                self.state,
                next
            );
            return false;
        }
        tracing::trace!("[Agent:{}] {} -> {}", agent, self.state, next);
        self.state = next;
        true
    }
}

struct AgentInner {
    name: String,
    profile: AgentProfile,
    shared: Mutex<AgentShared>,
    wake: Notify,
    reporter: Reporter,
    life_task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to one agent
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn new(profile: AgentProfile, reporter: Reporter) -> Self {
        let capacity = profile.memory_capacity.max(1);
        Self {
            inner: Arc::new(AgentInner {
                name: profile.key(),
                profile,
                shared: Mutex::new(AgentShared {
                    memory: VecDeque::with_capacity(capacity.min(64)),
                    alive: true,
                    activate: false,
                    state: LifeState::Init,
                    life_running: false,
                    observed: 0,
                    cycle_inputs: 0,
                    sleep_requested: false,
                    activations: 0,
                    action_data: HashMap::new(),
                }),
                wake: Notify::new(),
                reporter,
                life_task: Mutex::new(None),
            }),
        }
    }

    pub(super) fn shared(&self) -> MutexGuard<'_, AgentShared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub(super) fn wake_signal(&self) -> &Notify {
        &self.inner.wake
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Lowercased name (the routing key)
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.inner.profile
    }

    pub fn action_names(&self) -> &[String] {
        &self.inner.profile.action_list
    }

    pub fn reporter(&self) -> &Reporter {
        &self.inner.reporter
    }

    /// Render the system prompt with the given action descriptions
    pub fn system_prompt(&self, tools_description: &str) -> String {
        self.inner.profile.system_prompt(tools_description)
    }

    /// Whether two handles refer to the same agent
    pub fn same_as(&self, other: &Agent) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    /// Append to memory, evicting the oldest entry when full
    ///
    /// With `from_env` the message counts as environment input: a sleeping
    /// agent is woken, and an active one will not go back to sleep at the end
    /// of its current cycle.
    pub fn add_memory(&self, message: Message, from_env: bool) {
        let mut shared = self.shared();
        if shared.memory.len() >= self.inner.profile.memory_capacity.max(1) {
            shared.memory.pop_front();
        }
        shared.memory.push_back(message);

        if !from_env {
            return;
        }
        shared.observed += 1;
        shared.cycle_inputs += 1;
        if shared.alive && !shared.activate {
            shared.activate = true;
            drop(shared);
            tracing::debug!("[Agent:{}] Woken by environment", self.name());
            self.inner.wake.notify_one();
        }
    }

    /// User input from the environment
    pub fn input(&self, content: impl Into<String>) {
        self.add_memory(Message::user_input(self.name(), content), true);
    }

    /// Alias of [`input`](Self::input)
    pub fn ask(&self, content: impl Into<String>) {
        self.input(content);
    }

    pub fn memory(&self) -> Vec<Message> {
        self.shared().memory.iter().cloned().collect()
    }

    /// The `k` most recent messages, oldest first
    pub fn latest_memory(&self, k: usize) -> Vec<Message> {
        let shared = self.shared();
        let skip = shared.memory.len().saturating_sub(k);
        shared.memory.iter().skip(skip).cloned().collect()
    }

    pub fn memory_len(&self) -> usize {
        self.shared().memory.len()
    }

    /// Number of environment messages since the last reset
    pub fn observe(&self, with_reset: bool) -> usize {
        let mut shared = self.shared();
        let count = shared.observed;
        if with_reset {
            shared.observed = 0;
        }
        count
    }

    // ------------------------------------------------------------------
    // Action data
    // ------------------------------------------------------------------

    /// Store per-action data, replacing any previous value
    pub fn set_action_data<T>(&self, action_name: &str, data: T)
    where
        T: Any + Send + Sync,
    {
        self.shared()
            .action_data
            .insert(action_name.to_string(), Box::new(data));
    }

    /// Copy of per-action data, if present and of type `T`
    pub fn action_data<T>(&self, action_name: &str) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
    {
        self.shared()
            .action_data
            .get(action_name)
            .and_then(|d| d.downcast_ref::<T>())
            .cloned()
    }

    /// Mutate per-action data in place, creating it with `T::default()`
    ///
    /// Data of a different type stored under the same name is replaced.
    pub fn with_action_data<T, R, F>(&self, action_name: &str, f: F) -> R
    where
        T: Any + Send + Sync + Default,
        F: FnOnce(&mut T) -> R,
    {
        let mut shared = self.shared();
        let slot = shared
            .action_data
            .entry(action_name.to_string())
            .or_insert_with(|| Box::new(T::default()));
        if !slot.is::<T>() {
            tracing::warn!(
                "[Agent:{}] Replacing action data of '{}' with a new type",
                self.name(),
                action_name
            );
            *slot = Box::new(T::default());
        }
        match slot.downcast_mut::<T>() {
            Some(data) => f(data),
            None => f(&mut T::default()),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn state(&self) -> LifeState {
        self.shared().state
    }

    pub fn is_alive(&self) -> bool {
        self.shared().alive
    }

    /// Whether a wake is pending or the agent is in its plan/act loop
    pub fn is_activated(&self) -> bool {
        self.shared().activate
    }

    /// Number of times the agent went from sleeping to active
    pub fn activations(&self) -> u64 {
        self.shared().activations
    }

    /// Wake the agent without adding a message
    pub fn wake(&self) {
        let mut shared = self.shared();
        if shared.alive && !shared.activate {
            shared.activate = true;
            drop(shared);
            self.inner.wake.notify_one();
        }
    }

    /// Ask the life loop to sleep at the end of the current cycle
    pub fn request_sleep(&self) {
        self.shared().sleep_requested = true;
    }

    /// Start the life task
    ///
    /// Fails with `AlreadyAlive` while a life task is bound to this agent and
    /// with `AgentClosed` after [`close`](Self::close).
    pub fn life(&self, dispatcher: Arc<Dispatcher>) -> FrameworkResult<()> {
        {
            let mut shared = self.shared();
            if !shared.alive {
                return Err(FrameworkError::AgentClosed(self.name().to_string()));
            }
            if shared.life_running {
                return Err(FrameworkError::AlreadyAlive(self.name().to_string()));
            }
            shared.life_running = true;
        }

        tracing::info!("[Agent:{}] Starting life task", self.name());
        let handle = tokio::spawn(life::run(self.clone(), dispatcher));
        *self
            .inner
            .life_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    /// Mark the agent dead and release its wait
    ///
    /// The life task exits after the action it is running, if any.
    pub fn close(&self) {
        let mut shared = self.shared();
        if !shared.alive {
            return;
        }
        shared.alive = false;
        if !shared.life_running {
            shared.transition(self.name(), LifeState::Dead);
        }
        drop(shared);
        tracing::info!("[Agent:{}] Closed", self.name());
        self.inner.wake.notify_one();
    }

    /// Wait for the life task to exit
    pub async fn join(&self) {
        let handle = self
            .inner
            .life_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("[Agent:{}] Life task failed: {}", self.name(), e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Life loop support
    // ------------------------------------------------------------------

    /// Reset per-cycle bookkeeping
    pub(super) fn begin_cycle(&self) {
        let mut shared = self.shared();
        shared.cycle_inputs = 0;
        shared.sleep_requested = false;
    }

    pub(super) fn take_sleep_request(&self) -> bool {
        std::mem::take(&mut self.shared().sleep_requested)
    }

    /// Go to sleep unless input arrived during the cycle
    pub(super) fn try_sleep(&self) -> bool {
        let mut shared = self.shared();
        if shared.cycle_inputs > 0 {
            tracing::debug!(
                "[Agent:{}] {} new message(s) during cycle, staying awake",
                self.name(),
                shared.cycle_inputs
            );
            return false;
        }
        shared.activate = false;
        if shared.alive {
            shared.transition(self.name(), LifeState::Inactive);
        }
        true
    }

    pub(super) fn finish_life(&self) {
        let mut shared = self.shared();
        shared.life_running = false;
        shared.activate = false;
        shared.transition(self.name(), LifeState::Dead);
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared();
        f.debug_struct("Agent")
            .field("name", &self.inner.name)
            .field("state", &shared.state)
            .field("memory", &shared.memory.len())
            .finish()
    }
}
