//! Lazily built machines and admins shared across controller calls.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::application::admin::{self, Admin, AdminDeps};
use crate::application::machine::{DesktopMachine, Machine, MachineTiming, ProfileMachine};
use crate::application::retry::Clock;
use crate::domain::Product;
use crate::error::Result;

#[derive(Default)]
struct Cache {
    engine: Option<Arc<dyn Machine>>,
    admins: HashMap<Product, Arc<dyn Admin>>,
}

/// Owns the collaborators the cluster controller resolves per product.
///
/// The engine machine is a singleton; admins are built once per product.
pub struct ControllerContext {
    deps: AdminDeps,
    clock: Arc<dyn Clock>,
    timing: MachineTiming,
    minikube_home: Option<PathBuf>,
    cache: Mutex<Cache>,
}

impl ControllerContext {
    pub fn new(deps: AdminDeps, clock: Arc<dyn Clock>, timing: MachineTiming) -> Self {
        Self {
            deps,
            clock,
            timing,
            minikube_home: ProfileMachine::default_home(),
            cache: Mutex::new(Cache::default()),
        }
    }

    #[must_use]
    pub fn with_minikube_home(mut self, home: PathBuf) -> Self {
        self.minikube_home = Some(home);
        self
    }

    pub fn deps(&self) -> &AdminDeps {
        &self.deps
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    async fn engine(&self) -> Arc<dyn Machine> {
        let mut cache = self.cache.lock().await;
        cache
            .engine
            .get_or_insert_with(|| {
                Arc::new(DesktopMachine::new(
                    self.deps.runtime.clone(),
                    self.deps.runner.clone(),
                    self.deps.platform.clone(),
                    self.deps.settings.clone(),
                    self.clock.clone(),
                    self.timing,
                ))
            })
            .clone()
    }

    /// The machine backing cluster `name` of `product`.
    pub async fn machine_for(&self, product: Product, name: &str) -> Arc<dyn Machine> {
        let engine = self.engine().await;
        match (product, &self.minikube_home) {
            (Product::Minikube, Some(home)) => Arc::new(ProfileMachine::new(name, home.clone(), engine)),
            _ => engine,
        }
    }

    pub async fn admin_for(&self, product: Product) -> Result<Arc<dyn Admin>> {
        let mut cache = self.cache.lock().await;
        if let Some(admin) = cache.admins.get(&product) {
            return Ok(admin.clone());
        }
        let admin = admin::admin_for(product, &self.deps)?;
        cache.admins.insert(product, admin.clone());
        Ok(admin)
    }
}
