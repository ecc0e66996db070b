//! Component registry.
//!
//! Each long-running component is wrapped as a [`ComponentHandle`] that
//! provides uniform lifecycle management via the [`DynPipeline`] trait.
//! The [`PluginRegistry`] supports ordered start and reverse-order stop.

use scanrelay_core::pipeline::{DynPipeline, HealthStatus};

use crate::health::ComponentHealth;

/// A handle to a registered component.
pub struct ComponentHandle {
    /// Component name for logging and health reporting.
    pub name: String,
    /// The component's lifecycle implementation.
    pub pipeline: Box<dyn DynPipeline>,
    /// Whether `start()` succeeded and `stop()` has not been called since.
    started: bool,
}

impl ComponentHandle {
    pub fn new(name: impl Into<String>, pipeline: Box<dyn DynPipeline>) -> Self {
        Self {
            name: name.into(),
            pipeline,
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

/// Registry of daemon components.
pub struct PluginRegistry {
    /// Components in registration order.
    components: Vec<ComponentHandle>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Register a component.
    ///
    /// Names must be unique; they are used by the admin surface.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        pipeline: Box<dyn DynPipeline>,
    ) -> anyhow::Result<()> {
        let name = name.into();
        if self.components.iter().any(|c| c.name == name) {
            return Err(anyhow::anyhow!("component '{}' is already registered", name));
        }
        self.components.push(ComponentHandle::new(name, pipeline));
        Ok(())
    }

    /// Start all components in registration order.
    ///
    /// Returns an error on the first component that fails to start.
    /// Already-started components stay running; the caller should
    /// invoke `stop_all` to roll back.
    pub async fn start_all(&mut self) -> anyhow::Result<()> {
        for handle in &mut self.components {
            if handle.started {
                continue;
            }
            tracing::info!(component = %handle.name, "starting component");
            handle.pipeline.start().await.map_err(|e| {
                anyhow::anyhow!("failed to start component '{}': {}", handle.name, e)
            })?;
            handle.started = true;
            tracing::info!(component = %handle.name, "component started");
        }
        Ok(())
    }

    /// Stop all started components in reverse registration order.
    ///
    /// Logs errors but continues stopping remaining components.
    pub async fn stop_all(&mut self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        for handle in self.components.iter_mut().rev() {
            if !handle.started {
                continue;
            }

            tracing::info!(component = %handle.name, "stopping component");
            handle.started = false;
            if let Err(e) = handle.pipeline.stop().await {
                tracing::error!(component = %handle.name, error = %e, "failed to stop component");
                errors.push(format!("{}: {}", handle.name, e));
            } else {
                tracing::info!(component = %handle.name, "component stopped");
            }
        }

        if !errors.is_empty() {
            return Err(anyhow::anyhow!(
                "errors stopping components: {}",
                errors.join("; ")
            ));
        }
        Ok(())
    }

    /// Health status for every registered component.
    pub async fn health_statuses(&self) -> Vec<ComponentHealth> {
        let mut statuses = Vec::with_capacity(self.components.len());
        for handle in &self.components {
            statuses.push(ComponentHealth {
                name: handle.name.clone(),
                status: handle.pipeline.health_check().await,
            });
        }
        statuses
    }

    /// Names of registered components in registration order.
    pub fn names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.name.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.components.len()
    }

    pub fn started_count(&self) -> usize {
        self.components.iter().filter(|c| c.started).count()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
