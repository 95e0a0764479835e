// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives the per-frame setup, compile, realize, execute and submit cycle.

use crate::builder::GraphBuilder;
use crate::compiled::CompiledGraph;
use crate::context::ExecuteContext;
use crate::error::GraphError;
use crate::handle::PassId;
use crate::persistent::{PersistentId, PersistentRegistry};
use crate::pipeline::Pipeline;
use crate::resource::{ResourceDescriptor, TextureBufferDesc, TextureSize};
use crate::shared::SharedResourceRegistry;
use crate::transient_pool::TransientPool;
use ember_core::math::Extent2D;
use ember_core::renderer::{
    CommandBufferId, Fence, FenceWaitError, GraphicsDevice, QueueKind, TextureUsage,
};
use ember_core::scene::Scene;
use ember_core::{QueueSubmission, RendererConfig};
use std::sync::Arc;
use std::time::Duration;

/// Label of the backbuffer texture.
pub const BACKBUFFER_LABEL: &str = "backbuffer";

/// One batch of command buffers handed to the device.
#[derive(Debug, Clone)]
pub struct SubmissionInfo {
    /// Queue the batch was submitted to.
    pub queue: QueueKind,
    /// Passes whose command buffers form the batch, in order.
    pub passes: Vec<String>,
    /// Number of command buffers in the batch.
    pub command_buffers: usize,
    /// Completes once the device has executed the batch.
    pub fence: Fence,
}

/// What happened during one [`Runtime::render`] call.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Index of the frame, starting at zero.
    pub frame_index: u64,
    /// Backbuffer size the frame was rendered at.
    pub backbuffer_size: Extent2D,
    /// Names of the executed passes, in order.
    pub executed_passes: Vec<String>,
    /// Submissions, in order.
    pub submissions: Vec<SubmissionInfo>,
    /// Transients bound this frame.
    pub transients: usize,
    /// Transients that shared a backend object with an earlier one this frame.
    pub aliased_transients: usize,
    /// Backend objects the pool had to allocate.
    pub transient_allocations: usize,
    /// Backend objects the pool handed out again.
    pub transient_reuses: usize,
    /// Idle pooled objects destroyed at the end of the frame.
    pub transient_destroyed: usize,
    /// Persistent objects allocated this frame.
    pub persistent_allocated: usize,
    /// Released persistent objects destroyed this frame.
    pub persistent_destroyed: usize,
}

impl FrameReport {
    /// Fences of every submission, in order.
    pub fn fences(&self) -> impl Iterator<Item = &Fence> {
        self.submissions.iter().map(|s| &s.fence)
    }
}

struct Batch {
    queue: QueueKind,
    passes: Vec<String>,
    buffers: Vec<CommandBufferId>,
}

/// Owns everything that outlives a frame and renders frames on demand.
pub struct Runtime {
    device: Arc<dyn GraphicsDevice>,
    config: RendererConfig,
    pipeline: Pipeline,
    persistent: PersistentRegistry,
    pool: TransientPool,
    shared: SharedResourceRegistry,
    backbuffer: PersistentId,
    backbuffer_size: Extent2D,
    pending_resize: Option<Extent2D>,
    frame_index: u64,
    in_flight: Vec<Fence>,
}

impl Runtime {
    /// Creates a runtime and registers the backbuffer.
    ///
    /// # Errors
    ///
    /// [`GraphError::Config`] if `config` does not validate.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        config: RendererConfig,
        pipeline: Pipeline,
    ) -> Result<Self, GraphError> {
        config.validate()?;
        let mut persistent = PersistentRegistry::new();
        let backbuffer = register_backbuffer(&mut persistent, &config, config.backbuffer);
        log::info!(
            "Runtime: Created on '{}' backend with {} passes at {}",
            device.backend_name(),
            pipeline.len(),
            config.backbuffer
        );
        Ok(Self {
            device,
            backbuffer_size: config.backbuffer,
            config,
            pipeline,
            persistent,
            pool: TransientPool::new(),
            shared: SharedResourceRegistry::new(),
            backbuffer,
            pending_resize: None,
            frame_index: 0,
            in_flight: Vec::new(),
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The device frames are rendered with.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The active configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The passes rendered every frame.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The passes, mutably. Added passes are set up on the next frame.
    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    /// Persistent resources, the backbuffer included.
    pub fn persistent(&self) -> &PersistentRegistry {
        &self.persistent
    }

    /// The transient pool.
    pub fn pool(&self) -> &TransientPool {
        &self.pool
    }

    /// Shared resources published during the last frame.
    pub fn shared(&self) -> &SharedResourceRegistry {
        &self.shared
    }

    /// Index the next frame will get.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Current backbuffer size. A pending resize is not reflected until the next frame.
    pub fn backbuffer_size(&self) -> Extent2D {
        self.backbuffer_size
    }

    /// The backbuffer's registry entry.
    pub fn backbuffer(&self) -> PersistentId {
        self.backbuffer
    }

    // ── Frame loop ────────────────────────────────────────────────────────

    /// Requests a new backbuffer size, applied at the start of the next frame.
    pub fn resize(&mut self, size: Extent2D) {
        if size.is_empty() {
            log::warn!("Runtime: Ignoring resize to empty size {}", size);
            return;
        }
        if size != self.backbuffer_size {
            self.pending_resize = Some(size);
        }
    }

    /// Renders one frame of `scene`.
    ///
    /// Waits for the previous frame's submissions, builds and compiles the
    /// graph, binds backend objects, records every pass and submits the
    /// recorded work. A failing pass aborts the frame before anything is
    /// submitted.
    pub fn render(&mut self, scene: &Scene) -> Result<FrameReport, GraphError> {
        let frame_index = self.frame_index;
        self.frame_index += 1;

        self.wait_in_flight()?;
        self.shared.clear_all();
        self.apply_resize()?;

        let device = Arc::clone(&self.device);
        let mut builder = GraphBuilder::new(
            frame_index,
            self.backbuffer_size,
            self.backbuffer,
            &mut self.persistent,
            &mut self.shared,
        )?;
        self.pipeline.setup(&mut builder)?;
        let mut graph = builder.compile()?;

        let persistent_allocated = self
            .persistent
            .realize(device.as_ref(), graph.persistent_ids().iter().copied())?;
        let realized = match graph.realize(
            device.as_ref(),
            &mut self.pool,
            &self.persistent,
            self.config.alias_transients,
        ) {
            Ok(stats) => stats,
            Err(e) => {
                graph.release(&mut self.pool);
                return Err(e);
            }
        };

        let batches = self.execute(device.as_ref(), &mut graph, scene)?;
        let executed_passes = batches
            .iter()
            .flat_map(|batch| batch.passes.iter().cloned())
            .collect();
        let submitted = self.submit(device.as_ref(), batches);
        graph.release(&mut self.pool);
        let submissions = submitted?;

        let mut persistent_destroyed = 0;
        if self.persistent.has_pending_releases() {
            self.wait_in_flight()?;
            persistent_destroyed = self.persistent.collect_released(device.as_ref());
        }
        let pool_stats = self
            .pool
            .end_frame(device.as_ref(), self.config.transient_max_idle_frames);

        let report = FrameReport {
            frame_index,
            backbuffer_size: self.backbuffer_size,
            executed_passes,
            submissions,
            transients: realized.transients,
            aliased_transients: realized.aliased,
            transient_allocations: pool_stats.allocations,
            transient_reuses: pool_stats.reuses,
            transient_destroyed: pool_stats.destroyed,
            persistent_allocated,
            persistent_destroyed,
        };
        log::debug!(
            "Runtime: Frame {} done ({} passes, {} submissions, {} transients)",
            report.frame_index,
            report.executed_passes.len(),
            report.submissions.len(),
            report.transients
        );
        Ok(report)
    }

    /// Records every pass into its own command buffer, grouped into per-queue batches.
    fn execute(
        &mut self,
        device: &dyn GraphicsDevice,
        graph: &mut CompiledGraph,
        scene: &Scene,
    ) -> Result<Vec<Batch>, GraphError> {
        let order: Vec<PassId> = graph.pass_ids().collect();
        let mut batches: Vec<Batch> = Vec::new();

        for pass in order {
            let queue = graph.pass_queue(pass).unwrap_or_default();
            let name = graph.pass_name(pass).unwrap_or_default().to_string();
            let mut encoder = device.create_command_encoder(Some(name.as_str()), queue);
            let result = {
                let mut ctx = ExecuteContext::new(
                    graph.pass_resources(pass),
                    encoder.as_mut(),
                    device,
                    &mut self.shared,
                    scene,
                    graph.frame_index(),
                    self.backbuffer_size,
                );
                self.pipeline.execute_pass(pass.index(), &mut ctx)
            };
            let buffer = encoder.finish();

            if let Err(source) = result {
                let mut recorded: Vec<CommandBufferId> = batches
                    .iter()
                    .flat_map(|batch| batch.buffers.iter().copied())
                    .collect();
                recorded.push(buffer);
                device.discard_command_buffers(&recorded);
                graph.release(&mut self.pool);
                log::error!(
                    "Runtime: Pass '{}' failed, frame {} aborted: {}",
                    name,
                    graph.frame_index(),
                    source
                );
                return Err(GraphError::PassFailed {
                    pass: name,
                    source: Box::new(source),
                });
            }

            match batches.last_mut() {
                Some(batch) if batch.queue == queue => {
                    batch.passes.push(name);
                    batch.buffers.push(buffer);
                }
                _ => batches.push(Batch {
                    queue,
                    passes: vec![name],
                    buffers: vec![buffer],
                }),
            }
        }
        Ok(batches)
    }

    /// Submits `batches` in order, honouring the cross-queue policy.
    fn submit(
        &mut self,
        device: &dyn GraphicsDevice,
        batches: Vec<Batch>,
    ) -> Result<Vec<SubmissionInfo>, GraphError> {
        let mut submissions: Vec<SubmissionInfo> = Vec::with_capacity(batches.len());
        let mut remaining = batches.into_iter();

        while let Some(batch) = remaining.next() {
            let must_wait = self.config.queue_submission == QueueSubmission::Serialized
                && submissions.last().is_some_and(|prev| prev.queue != batch.queue);
            let waited = match submissions.last() {
                Some(prev) if must_wait => wait_fence(&prev.fence, self.config.fence_timeout()),
                _ => Ok(()),
            };
            let submitted = waited.and_then(|()| {
                device
                    .submit(batch.queue, &batch.buffers)
                    .map_err(GraphError::from)
            });

            match submitted {
                Ok(fence) => {
                    log::trace!(
                        "Runtime: Submitted {} buffers to the {} queue",
                        batch.buffers.len(),
                        batch.queue
                    );
                    self.in_flight.push(fence.clone());
                    submissions.push(SubmissionInfo {
                        queue: batch.queue,
                        command_buffers: batch.buffers.len(),
                        passes: batch.passes,
                        fence,
                    });
                }
                Err(e) => {
                    let unsubmitted: Vec<CommandBufferId> = std::iter::once(batch)
                        .chain(remaining)
                        .flat_map(|b| b.buffers)
                        .collect();
                    device.discard_command_buffers(&unsubmitted);
                    log::error!("Runtime: Submission failed: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(submissions)
    }

    fn wait_in_flight(&mut self) -> Result<(), GraphError> {
        let timeout = self.config.fence_timeout();
        let mut first_error = None;
        for fence in self.in_flight.drain(..) {
            if let Err(e) = wait_fence(&fence, timeout) {
                log::error!("Runtime: {}: {}", e, fence_error_detail(&e));
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn apply_resize(&mut self) -> Result<(), GraphError> {
        let Some(size) = self.pending_resize.take() else {
            return Ok(());
        };
        log::info!(
            "Runtime: Resizing backbuffer {} -> {}",
            self.backbuffer_size,
            size
        );
        self.persistent.release(self.backbuffer)?;
        self.persistent.collect_released(self.device.as_ref());
        self.backbuffer = register_backbuffer(&mut self.persistent, &self.config, size);
        self.backbuffer_size = size;
        Ok(())
    }

    /// Waits for outstanding work, then destroys every persistent and pooled object.
    pub fn shutdown(&mut self) -> Result<(), GraphError> {
        let waited = self.wait_in_flight();
        let persistent = self.persistent.destroy_all(self.device.as_ref());
        let pooled = self.pool.destroy_all(self.device.as_ref());
        log::info!(
            "Runtime: Shut down after {} frames ({} persistent, {} pooled objects destroyed)",
            self.frame_index,
            persistent,
            pooled
        );
        waited
    }
}

fn register_backbuffer(
    persistent: &mut PersistentRegistry,
    config: &RendererConfig,
    size: Extent2D,
) -> PersistentId {
    let desc = TextureBufferDesc::new(
        BACKBUFFER_LABEL,
        TextureSize::Absolute(size),
        config.backbuffer_format,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_SRC,
    );
    persistent.register(
        BACKBUFFER_LABEL,
        ResourceDescriptor::Texture(desc.resolve(size)),
    )
}

fn wait_fence(fence: &Fence, timeout: Option<Duration>) -> Result<(), GraphError> {
    let result = match timeout {
        Some(timeout) => fence.wait_timeout(timeout),
        None => fence.wait().map_err(FenceWaitError::Failed),
    };
    result.map_err(|source| GraphError::Fence {
        label: fence.label().to_string(),
        source,
    })
}

fn fence_error_detail(error: &GraphError) -> String {
    match error {
        GraphError::Fence { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
