//! In-memory desktop engine settings channel.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Result, SettingsError};
use crate::port::outbound::SettingsTransport;

#[derive(Default)]
struct State {
    document: Value,
    submitted: Vec<Value>,
    fetches: usize,
    resets: usize,
    reject_writes: bool,
}

type SubmitHook = Box<dyn Fn(&Value) + Send + Sync>;

/// Serves a fixed document; writes replace it.
#[derive(Default)]
pub struct FakeSettings {
    state: Mutex<State>,
    on_submit: Option<SubmitHook>,
}

impl FakeSettings {
    pub fn new(document: Value) -> Self {
        Self {
            state: Mutex::new(State {
                document,
                ..State::default()
            }),
            on_submit: None,
        }
    }

    /// Call `hook` with every accepted write.
    #[must_use]
    pub fn on_submit(mut self, hook: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_submit = Some(Box::new(hook));
        self
    }

    /// Answer every write with a 500.
    pub fn reject_writes(&self) {
        self.state.lock().reject_writes = true;
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().fetches
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().submitted.len()
    }

    pub fn reset_count(&self) -> usize {
        self.state.lock().resets
    }

    pub fn last_submitted(&self) -> Option<Value> {
        self.state.lock().submitted.last().cloned()
    }

    pub fn document(&self) -> Value {
        self.state.lock().document.clone()
    }
}

#[async_trait]
impl SettingsTransport for FakeSettings {
    async fn fetch(&self) -> Result<Value> {
        let mut state = self.state.lock();
        state.fetches += 1;
        Ok(state.document.clone())
    }

    async fn submit(&self, document: &Value) -> Result<()> {
        self.accept(document)?;
        if let Some(hook) = &self.on_submit {
            hook(document);
        }
        Ok(())
    }

    async fn reset_kubernetes(&self) -> Result<()> {
        self.state.lock().resets += 1;
        Ok(())
    }
}

impl FakeSettings {
    fn accept(&self, document: &Value) -> Result<()> {
        let mut state = self.state.lock();
        if state.reject_writes {
            return Err(SettingsError::Status {
                method: "POST",
                endpoint: "/app/settings".to_string(),
                status: 500,
                body: "settings are locked".to_string(),
            }
            .into());
        }
        state.submitted.push(document.clone());
        state.document = document.clone();
        Ok(())
    }
}
