// Component registry and tick worker
//
// Components live behind their own lock so the tick worker, the render loop
// and custom workers never hold more than one component at a time. The
// registry itself is locked only long enough to clone the handle list.

use super::{Component, HostHandle, Scheduling};
use crate::engine::{join_bounded, Shutdown};
use crate::error::{EngineError, EngineResult};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error};

type SharedComponent = Arc<Mutex<Box<dyn Component>>>;

/// Deferred component construction, as collected by the dashboard builder
pub type ComponentFactory = Box<dyn FnOnce() -> Box<dyn Component> + Send>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Registry {
    /// Registration order is preserved for ticking
    entries: Vec<(String, SharedComponent)>,
}

impl Registry {
    fn find(&self, name: &str) -> Option<SharedComponent> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.clone())
    }

    fn snapshot(&self) -> Vec<(String, SharedComponent)> {
        self.entries.clone()
    }
}

/// Owns the components and the worker that ticks them
pub struct ComponentScheduler {
    registry: Arc<Mutex<Registry>>,
    tick_count: Arc<AtomicU64>,
    host: HostHandle,
    shutdown: Arc<Shutdown>,
    worker: Mutex<Option<JoinHandle<()>>>,
    join_timeout: Duration,
}

impl ComponentScheduler {
    pub fn new(host: HostHandle, join_timeout: Duration) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            tick_count: Arc::new(AtomicU64::new(0)),
            host,
            shutdown: Arc::new(Shutdown::new()),
            worker: Mutex::new(None),
            join_timeout,
        }
    }

    /// Build a component from `factory` and register it under `name`.
    ///
    /// Fails if the name is taken; the factory is not called in that case.
    pub fn register<C, F>(&self, name: &str, factory: F) -> EngineResult<()>
    where
        C: Component + 'static,
        F: FnOnce() -> C,
    {
        self.insert(name, move || Box::new(factory()) as Box<dyn Component>)
    }

    pub(crate) fn register_boxed(&self, name: &str, factory: ComponentFactory) -> EngineResult<()> {
        self.insert(name, factory)
    }

    fn insert(
        &self,
        name: &str,
        factory: impl FnOnce() -> Box<dyn Component>,
    ) -> EngineResult<()> {
        let mut registry = lock(&self.registry);
        if registry.find(name).is_some() {
            return Err(EngineError::DuplicateComponent(name.to_string()));
        }

        let mut component = factory();
        component.setup(name, &self.host);
        debug!(
            component = name,
            scheduling = ?component.scheduling(),
            "Registered component"
        );
        registry
            .entries
            .push((name.to_string(), Arc::new(Mutex::new(component))));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.registry).find(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.registry)
            .entries
            .iter()
            .map(|(n, _)| n.clone())
            .collect()
    }

    fn get(&self, name: &str) -> EngineResult<SharedComponent> {
        lock(&self.registry)
            .find(name)
            .ok_or_else(|| EngineError::UnknownComponent(name.to_string()))
    }

    /// Whether the component has a value that was not rendered yet
    pub fn has_updates(&self, name: &str) -> EngineResult<bool> {
        let component = self.get(name)?;
        let guard = lock(&component);
        Ok(guard.has_updates())
    }

    /// Render a component if it has updates, otherwise return an empty
    /// string. The dirty flag is always cleared.
    pub fn render(&self, name: &str, param: Option<&str>) -> EngineResult<String> {
        Ok(self.render_if_updated(name, param)?.unwrap_or_default())
    }

    /// Like `render`, but tells "no updates" apart from an updated value
    /// that happens to be empty.
    pub fn render_if_updated(&self, name: &str, param: Option<&str>) -> EngineResult<Option<String>> {
        let component = self.get(name)?;
        let mut guard = lock(&component);

        let value = if guard.has_updates() {
            match catch_unwind(AssertUnwindSafe(|| guard.render(param))) {
                Ok(value) => Some(value),
                Err(_) => {
                    error!(component = name, "Component panicked while rendering");
                    None
                }
            }
        } else {
            None
        };
        guard.mark_rendered();
        Ok(value)
    }

    /// Number of completed tick passes
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }

    /// Run one tick pass synchronously. Returns the count handed out.
    pub fn tick(&self) -> u64 {
        tick_pass(&self.registry, &self.tick_count)
    }

    /// Start the tick worker. Calling it twice is a no-op.
    pub fn start(&self, interval: Duration) -> EngineResult<()> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }

        let registry = self.registry.clone();
        let tick_count = self.tick_count.clone();
        let shutdown = self.shutdown.clone();

        let handle = std::thread::Builder::new()
            .name("headsup-ticks".to_string())
            .spawn(move || {
                debug!(?interval, "Tick loop started");
                while !shutdown.wait_timeout(interval) {
                    tick_pass(&registry, &tick_count);
                }
                debug!("Tick loop stopped");
            })?;

        *worker = Some(handle);
        Ok(())
    }

    /// Stop the tick worker and dispose every component. Idempotent.
    pub fn dispose(&self) {
        self.shutdown.trigger();
        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            join_bounded(handle, self.join_timeout, "ticks");
        }

        let components = std::mem::take(&mut lock(&self.registry).entries);
        for (name, component) in components {
            let mut guard = lock(&component);
            if catch_unwind(AssertUnwindSafe(|| guard.dispose())).is_err() {
                error!(component = %name, "Component panicked while disposing");
            }
        }
    }
}

impl Drop for ComponentScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Tick every tick-driven component once with the same count.
///
/// A panicking component is logged and skipped; the others still tick.
fn tick_pass(registry: &Mutex<Registry>, tick_count: &AtomicU64) -> u64 {
    let count = tick_count.fetch_add(1, Ordering::AcqRel);
    let components = lock(registry).snapshot();

    for (name, component) in components {
        let mut guard = lock(&component);
        if guard.scheduling() == Scheduling::Custom {
            continue;
        }
        if catch_unwind(AssertUnwindSafe(|| guard.tick(count))).is_err() {
            error!(component = %name, tick = count, "Component panicked while ticking");
        }
    }
    count
}
