//! A machine that only counts calls.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::application::machine::Machine;
use crate::domain::Cluster;
use crate::error::Result;

pub struct RecordingMachine {
    cpus: AtomicU32,
    ensure_exists: AtomicUsize,
    restarts: AtomicUsize,
}

impl RecordingMachine {
    pub fn new(cpus: u32) -> Self {
        Self {
            cpus: AtomicU32::new(cpus),
            ensure_exists: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
        }
    }

    pub fn ensure_exists_calls(&self) -> usize {
        self.ensure_exists.load(Ordering::SeqCst)
    }

    pub fn restart_calls(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Machine for RecordingMachine {
    async fn cpus(&self) -> Result<u32> {
        Ok(self.cpus.load(Ordering::SeqCst))
    }

    async fn ensure_exists(&self) -> Result<()> {
        self.ensure_exists.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn restart(&self, desired: &Cluster, _existing: &Cluster) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.cpus.fetch_max(desired.min_cpus, Ordering::SeqCst);
        Ok(())
    }
}
