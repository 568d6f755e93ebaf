use std::sync::Arc;

use crate::process::{ProcessTable, ProcessTree};
use crate::stream::{BoundedAllocator, SlotAllocator};

use super::{broadcaster::Broadcaster, config::Config};

/// Builder for constructing a [`Broadcaster`] with optional collaborators.
pub struct BroadcasterBuilder {
    cfg: Config,
    tree: Option<Arc<dyn ProcessTree>>,
    allocator: Option<Arc<dyn SlotAllocator>>,
}

impl BroadcasterBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            tree: None,
            allocator: None,
        }
    }

    /// Sets the process tree walked when a stream opens.
    ///
    /// Defaults to an empty [`ProcessTable`].
    pub fn with_tree(mut self, tree: Arc<dyn ProcessTree>) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Sets the slot allocator consulted for every placeholder.
    ///
    /// Defaults to a [`BoundedAllocator`] sized from
    /// [`Config::stream_capacity_clamped`].
    pub fn with_allocator(mut self, allocator: Arc<dyn SlotAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Builds and returns the Broadcaster instance.
    pub fn build(self) -> Arc<Broadcaster> {
        let tree = self
            .tree
            .unwrap_or_else(|| Arc::new(ProcessTable::new()) as Arc<dyn ProcessTree>);
        let allocator = self.allocator.unwrap_or_else(|| {
            Arc::new(BoundedAllocator::new(self.cfg.stream_capacity_clamped()))
                as Arc<dyn SlotAllocator>
        });
        Arc::new(Broadcaster::new_internal(self.cfg, tree, allocator))
    }
}
