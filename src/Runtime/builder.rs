use super::async_batcher::{AsyncBatcher, AsyncCounters, AsyncFlusher};
use super::chunk_manager::ChunkManager;
use super::command_batcher::CommandBatcher;
use super::handlers::{EventHooks, SystemHandler, UserDispatch};
use super::ref_cache::RefCache;
use super::rtd::RtdManager;
use super::Structs::Runtime_Structs::{AsyncStats, Reply};
use crate::Channel::Transport;
use crate::Core::config::RuntimeConfig;
use crate::Core::error::{ConfigError, QueueClosed, RuntimeError};
use crate::Wire::Structs::AsyncOutcome;
use log::info;
use std::sync::Arc;

pub struct RuntimeBuilder {
    config: RuntimeConfig,
    transport: Option<Arc<dyn Transport>>,
    hooks: EventHooks,
    sweeper: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self {
            config: RuntimeConfig::default(),
            transport: None,
            hooks: EventHooks::default(),
            sweeper: true,
        }
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Channel used for messages the runtime pushes on its own
    /// (async results, RTD updates). Required.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_hooks(mut self, hooks: EventHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Whether to start the background eviction thread. On by default.
    pub fn with_sweeper(mut self, enabled: bool) -> Self {
        self.sweeper = enabled;
        self
    }

    pub fn build(self) -> Result<Runtime, RuntimeError> {
        self.config.validate()?;
        let transport = self
            .transport
            .ok_or(ConfigError::Invalid("runtime needs a transport"))?;
        let config = self.config;

        let commands = Arc::new(CommandBatcher::from_config(&config));
        let chunks = Arc::new(ChunkManager::from_config(&config));
        let ref_cache = Arc::new(RefCache::new());
        let rtd = Arc::new(RtdManager::from_config(&config));
        rtd.attach_transport(Arc::clone(&transport));

        let flusher = AsyncFlusher::new(transport, Arc::clone(&chunks), &config);
        let async_counters = flusher.counters();
        let async_results = AsyncBatcher::spawn(
            config.async_queue_capacity,
            config.async_max_batch,
            move |batch| {
                flusher.flush(batch);
            },
        )?;

        if self.sweeper {
            // Detached: exits by itself once the chunk manager is dropped
            drop(chunks.spawn_sweeper(config.sweep_interval)?);
        }

        let handler = SystemHandler::new(
            Arc::clone(&commands),
            Arc::clone(&chunks),
            Arc::clone(&ref_cache),
            Arc::clone(&rtd),
            self.hooks,
        );

        info!("runtime started");

        Ok(Runtime {
            config,
            commands,
            chunks,
            ref_cache,
            rtd,
            async_results,
            async_counters,
            handler,
        })
    }
}

/// Every runtime component wired to one transport.
pub struct Runtime {
    config: RuntimeConfig,
    commands: Arc<CommandBatcher>,
    chunks: Arc<ChunkManager>,
    ref_cache: Arc<RefCache>,
    rtd: Arc<RtdManager>,
    async_results: AsyncBatcher,
    async_counters: Arc<AsyncCounters>,
    handler: SystemHandler,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn commands(&self) -> &Arc<CommandBatcher> {
        &self.commands
    }

    pub fn chunks(&self) -> &Arc<ChunkManager> {
        &self.chunks
    }

    pub fn ref_cache(&self) -> &Arc<RefCache> {
        &self.ref_cache
    }

    pub fn rtd(&self) -> &Arc<RtdManager> {
        &self.rtd
    }

    pub fn async_results(&self) -> &AsyncBatcher {
        &self.async_results
    }

    pub fn handler(&self) -> &SystemHandler {
        &self.handler
    }

    /// Hands a finished async call to the batcher. Blocks while the queue is
    /// full; fails once the runtime has been shut down.
    pub fn queue_async_result(&self, handle: Vec<u8>, outcome: AsyncOutcome) -> Result<(), QueueClosed> {
        self.async_results.queue_result(handle, outcome)
    }

    pub fn async_stats(&self) -> AsyncStats {
        self.async_counters.snapshot()
    }

    /// See [`SystemHandler::dispatch`].
    pub fn dispatch(
        &self,
        msg_type: u32,
        data: &[u8],
        resp: &mut [u8],
        user: &mut UserDispatch<'_>,
    ) -> Option<Reply> {
        self.handler.dispatch(msg_type, data, resp, user)
    }

    /// Closes the async queue and waits until everything queued has been
    /// flushed. The RTD transport is detached.
    pub fn shutdown(&self) {
        self.async_results.shutdown();
        self.rtd.detach_transport();
        info!("runtime stopped");
    }
}
