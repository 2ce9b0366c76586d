//! Hooks for memory lifecycle events
//!
//! Hooks observe the engine; they never veto it. A hook runs after the
//! mutation it describes has already happened, so a failing hook is logged
//! and the operation still succeeds.
//!
//! # Example
//!
//! ```rust,ignore
//! use mneme_core::events::{HookRegistry, LoggingHook};
//!
//! let mut registry = HookRegistry::new();
//! registry.register(Arc::new(LoggingHook));
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::memory::MemoryRecord;

/// Result type for hooks
pub type HookResult = Result<()>;

/// Trait for memory lifecycle hooks
#[async_trait]
pub trait MemoryHook: Send + Sync {
    /// Called after a new memory is stored
    async fn on_memory_created(&self, _record: &MemoryRecord) -> HookResult {
        Ok(())
    }

    /// Called after a near-duplicate was merged into `record`
    async fn on_memory_reinforced(&self, _record: &MemoryRecord, _similarity: f64) -> HookResult {
        Ok(())
    }

    /// Called after a memory was surfaced by a query or a direct access
    async fn on_memory_recalled(&self, _record: &MemoryRecord) -> HookResult {
        Ok(())
    }

    /// Called after a memory was forgotten by cleanup
    async fn on_memory_forgotten(&self, _owner: &str, _memory_id: &str) -> HookResult {
        Ok(())
    }
}

/// Registry for managing hooks
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn MemoryHook>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl HookRegistry {
    /// Create a new hook registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook
    pub fn register(&mut self, hook: Arc<dyn MemoryHook>) {
        self.hooks.push(hook);
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Trigger memory created event
    pub async fn trigger_created(&self, record: &MemoryRecord) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_memory_created(record).await {
                log_failure("created", &record.id, &e);
            }
        }
    }

    /// Trigger memory reinforced event
    pub async fn trigger_reinforced(&self, record: &MemoryRecord, similarity: f64) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_memory_reinforced(record, similarity).await {
                log_failure("reinforced", &record.id, &e);
            }
        }
    }

    /// Trigger memory recalled event
    pub async fn trigger_recalled(&self, record: &MemoryRecord) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_memory_recalled(record).await {
                log_failure("recalled", &record.id, &e);
            }
        }
    }

    /// Trigger memory forgotten event
    pub async fn trigger_forgotten(&self, owner: &str, memory_id: &str) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_memory_forgotten(owner, memory_id).await {
                log_failure("forgotten", memory_id, &e);
            }
        }
    }
}

fn log_failure(event: &str, memory_id: &str, error: &crate::error::MnemeError) {
    tracing::warn!(event, memory_id = %memory_id, error = %error, "Memory hook failed");
}

/// Hook that logs every lifecycle event
pub struct LoggingHook;

#[async_trait]
impl MemoryHook for LoggingHook {
    async fn on_memory_created(&self, record: &MemoryRecord) -> HookResult {
        tracing::info!(
            owner = %record.owner,
            memory_id = %record.id,
            content_length = record.content.len(),
            "Memory created"
        );
        Ok(())
    }

    async fn on_memory_reinforced(&self, record: &MemoryRecord, similarity: f64) -> HookResult {
        tracing::debug!(
            owner = %record.owner,
            memory_id = %record.id,
            similarity,
            strength = record.strength,
            "Memory reinforced"
        );
        Ok(())
    }

    async fn on_memory_recalled(&self, record: &MemoryRecord) -> HookResult {
        tracing::debug!(
            owner = %record.owner,
            memory_id = %record.id,
            strength = record.strength,
            "Memory recalled"
        );
        Ok(())
    }

    async fn on_memory_forgotten(&self, owner: &str, memory_id: &str) -> HookResult {
        tracing::info!(owner = %owner, memory_id = %memory_id, "Memory forgotten");
        Ok(())
    }
}
