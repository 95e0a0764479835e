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

use super::command::{HeadlessCommandEncoder, RecordedCommand};
use super::queue::{QueueJob, QueueWorker};
use ember_core::renderer::traits::{CommandEncoder, GraphicsDevice};
use ember_core::renderer::{
    BufferDescriptor, BufferId, CommandBufferId, Fence, PipelineDescriptor, PipelineError,
    PipelineId, PipelineKind, QueueKind, RenderError, ResourceError, TextureDescriptor, TextureId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

#[derive(Debug)]
struct HeadlessTextureEntry {
    descriptor: TextureDescriptor,
    bytes: u64,
}

#[derive(Debug)]
struct HeadlessBufferEntry {
    descriptor: BufferDescriptor,
    data: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct RecordedCommandBuffer {
    pub(crate) label: String,
    pub(crate) queue: QueueKind,
    pub(crate) commands: Vec<RecordedCommand>,
}

/// A submission as seen by the device, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRecord {
    /// Queue the work was submitted to.
    pub queue: QueueKind,
    /// Labels of the submitted command buffers, in order.
    pub labels: Vec<String>,
    /// All commands of the submission, flattened in order.
    pub commands: Vec<RecordedCommand>,
}

/// A snapshot of the device's object bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Textures created since the device was built.
    pub textures_created: usize,
    /// Textures destroyed since the device was built.
    pub textures_destroyed: usize,
    /// Buffers created since the device was built.
    pub buffers_created: usize,
    /// Buffers destroyed since the device was built.
    pub buffers_destroyed: usize,
    /// Pipelines created since the device was built.
    pub pipelines_created: usize,
    /// Pipelines destroyed since the device was built.
    pub pipelines_destroyed: usize,
    /// Bytes currently allocated by textures and buffers.
    pub vram_allocated_bytes: u64,
    /// Highest value `vram_allocated_bytes` ever reached.
    pub vram_peak_bytes: u64,
    /// Submissions accepted so far.
    pub submissions: usize,
}

impl HeadlessStats {
    /// Textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.textures_created - self.textures_destroyed
    }

    /// Buffers currently alive.
    pub fn live_buffers(&self) -> usize {
        self.buffers_created - self.buffers_destroyed
    }

    /// Pipelines currently alive.
    pub fn live_pipelines(&self) -> usize {
        self.pipelines_created - self.pipelines_destroyed
    }
}

/// The internal, non-clonable state of the [`HeadlessDevice`].
#[derive(Debug)]
pub(crate) struct HeadlessDeviceInternal {
    textures: Mutex<HashMap<TextureId, HeadlessTextureEntry>>,
    buffers: Mutex<HashMap<BufferId, HeadlessBufferEntry>>,
    pipelines: Mutex<HashMap<PipelineId, PipelineDescriptor>>,

    next_texture_id: AtomicUsize,
    next_buffer_id: AtomicUsize,
    next_pipeline_id: AtomicUsize,

    // Bookkeeping
    textures_created: AtomicUsize,
    textures_destroyed: AtomicUsize,
    buffers_created: AtomicUsize,
    buffers_destroyed: AtomicUsize,
    pipelines_created: AtomicUsize,
    pipelines_destroyed: AtomicUsize,
    creations_by_label: Mutex<HashMap<String, usize>>,

    // VRAM Tracking
    vram_allocated_bytes: AtomicU64,
    vram_peak_bytes: AtomicU64,
    memory_budget: Option<u64>,

    // Failure injection
    pending_allocation_failure: Mutex<Option<String>>,
    pending_task_failure: Mutex<Option<String>>,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, RecordedCommandBuffer>>,
    command_buffer_id_counter: AtomicU64,
    submissions: Mutex<Vec<SubmissionRecord>>,
    /// Contents of every buffer at the moment an executing command bound it.
    buffer_bindings: Mutex<Vec<(BufferId, Vec<u8>)>>,
    workers: Vec<Option<QueueWorker>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HeadlessDeviceInternal {
    /// Checks that every object `command` references is still alive.
    fn validate_command(&self, command: &RecordedCommand) -> Result<(), String> {
        let texture_alive = |id: &TextureId| lock(&self.textures).contains_key(id);
        let buffer_alive = |id: &BufferId| lock(&self.buffers).contains_key(id);
        match command {
            RecordedCommand::BeginRenderPass { attachments, .. } => {
                match attachments.iter().find(|t| !texture_alive(*t)) {
                    Some(t) => Err(format!("attachment {t:?} is not alive")),
                    None => Ok(()),
                }
            }
            RecordedCommand::SetPipeline(id) if !lock(&self.pipelines).contains_key(id) => {
                Err(format!("pipeline {id:?} is not alive"))
            }
            RecordedCommand::SetVertexBuffer { buffer, .. }
            | RecordedCommand::BindBuffer { buffer, .. }
                if !buffer_alive(buffer) =>
            {
                Err(format!("buffer {buffer:?} is not alive"))
            }
            RecordedCommand::BindTexture { texture, .. } if !texture_alive(texture) => {
                Err(format!("texture {texture:?} is not alive"))
            }
            RecordedCommand::WriteBuffer { buffer, .. } if !buffer_alive(buffer) => {
                Err(format!("upload into {buffer:?}, which is not alive"))
            }
            RecordedCommand::CopyBuffer {
                source,
                destination,
                ..
            } if !buffer_alive(source) || !buffer_alive(destination) => {
                Err(format!("copy {source:?} -> {destination:?} touches a dead buffer"))
            }
            RecordedCommand::CopyTexture {
                source,
                destination,
            } if !texture_alive(source) || !texture_alive(destination) => {
                Err(format!("copy {source:?} -> {destination:?} touches a dead texture"))
            }
            _ => Ok(()),
        }
    }

    /// Validates `command`, then applies its effect on device memory.
    pub(crate) fn execute_command(&self, command: &RecordedCommand) -> Result<(), String> {
        self.validate_command(command)?;
        match command {
            RecordedCommand::WriteBuffer {
                buffer,
                offset,
                data,
            } => {
                let mut buffers = lock(&self.buffers);
                let entry = buffers
                    .get_mut(buffer)
                    .ok_or_else(|| format!("upload into {buffer:?}, which is not alive"))?;
                let start = *offset as usize;
                let end = start
                    .checked_add(data.len())
                    .filter(|&end| end <= entry.data.len())
                    .ok_or_else(|| {
                        format!(
                            "upload of {} bytes at {} overflows {:?} ({} bytes)",
                            data.len(),
                            offset,
                            buffer,
                            entry.data.len()
                        )
                    })?;
                entry.data[start..end].copy_from_slice(data);
            }
            RecordedCommand::SetVertexBuffer { buffer, .. }
            | RecordedCommand::BindBuffer { buffer, .. } => {
                let contents = lock(&self.buffers)
                    .get(buffer)
                    .map(|entry| entry.data.clone())
                    .unwrap_or_default();
                lock(&self.buffer_bindings).push((*buffer, contents));
            }
            _ => {}
        }
        Ok(())
    }

    fn take_injected_task_failure(&self) -> Option<String> {
        lock(&self.pending_task_failure).take()
    }
}

/// A clonable, thread-safe handle to a headless graphics device.
///
/// Every object is plain CPU memory. Submissions are executed on one worker
/// thread per [`QueueKind`], which checks that every referenced object is
/// alive and applies recorded uploads before resolving the submission's [`Fence`].
#[derive(Clone, Debug)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device without a memory budget.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a device that refuses allocations beyond `bytes` of live memory.
    pub fn with_memory_budget(bytes: u64) -> Self {
        Self::build(Some(bytes))
    }

    fn build(memory_budget: Option<u64>) -> Self {
        let internal = Arc::new_cyclic(|weak: &Weak<HeadlessDeviceInternal>| {
            let workers = QueueKind::ALL
                .iter()
                .map(|&kind| match QueueWorker::spawn(kind, weak.clone()) {
                    Ok(worker) => Some(worker),
                    Err(e) => {
                        log::warn!(
                            "HeadlessDevice: Failed to spawn {} queue worker, executing inline: {}",
                            kind,
                            e
                        );
                        None
                    }
                })
                .collect();
            HeadlessDeviceInternal {
                textures: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(HashMap::new()),
                next_texture_id: AtomicUsize::new(0),
                next_buffer_id: AtomicUsize::new(0),
                next_pipeline_id: AtomicUsize::new(0),
                textures_created: AtomicUsize::new(0),
                textures_destroyed: AtomicUsize::new(0),
                buffers_created: AtomicUsize::new(0),
                buffers_destroyed: AtomicUsize::new(0),
                pipelines_created: AtomicUsize::new(0),
                pipelines_destroyed: AtomicUsize::new(0),
                creations_by_label: Mutex::new(HashMap::new()),
                vram_allocated_bytes: AtomicU64::new(0),
                vram_peak_bytes: AtomicU64::new(0),
                memory_budget,
                pending_allocation_failure: Mutex::new(None),
                pending_task_failure: Mutex::new(None),
                pending_command_buffers: Mutex::new(HashMap::new()),
                command_buffer_id_counter: AtomicU64::new(0),
                submissions: Mutex::new(Vec::new()),
                buffer_bindings: Mutex::new(Vec::new()),
                workers,
            }
        });
        Self { internal }
    }

    // --- Inspection ---

    /// Returns a snapshot of the object counters.
    pub fn stats(&self) -> HeadlessStats {
        let i = &self.internal;
        HeadlessStats {
            textures_created: i.textures_created.load(Ordering::Relaxed),
            textures_destroyed: i.textures_destroyed.load(Ordering::Relaxed),
            buffers_created: i.buffers_created.load(Ordering::Relaxed),
            buffers_destroyed: i.buffers_destroyed.load(Ordering::Relaxed),
            pipelines_created: i.pipelines_created.load(Ordering::Relaxed),
            pipelines_destroyed: i.pipelines_destroyed.load(Ordering::Relaxed),
            vram_allocated_bytes: i.vram_allocated_bytes.load(Ordering::Relaxed),
            vram_peak_bytes: i.vram_peak_bytes.load(Ordering::Relaxed),
            submissions: lock(&i.submissions).len(),
        }
    }

    /// How many objects (of any kind) were ever created with `label`.
    pub fn creation_count(&self, label: &str) -> usize {
        lock(&self.internal.creations_by_label)
            .get(label)
            .copied()
            .unwrap_or(0)
    }

    /// The descriptor of a live texture.
    pub fn texture_descriptor(&self, id: TextureId) -> Option<TextureDescriptor> {
        lock(&self.internal.textures)
            .get(&id)
            .map(|entry| entry.descriptor.clone())
    }

    /// Live textures whose label is `label`, sorted by id.
    pub fn live_textures_labeled(&self, label: &str) -> Vec<(TextureId, TextureDescriptor)> {
        let mut textures: Vec<_> = lock(&self.internal.textures)
            .iter()
            .filter(|(_, entry)| entry.descriptor.label.as_deref() == Some(label))
            .map(|(id, entry)| (*id, entry.descriptor.clone()))
            .collect();
        textures.sort_by_key(|(id, _)| *id);
        textures
    }

    /// Returns `true` if the texture exists.
    pub fn is_texture_alive(&self, id: TextureId) -> bool {
        lock(&self.internal.textures).contains_key(&id)
    }

    /// Returns `true` if the buffer exists.
    pub fn is_buffer_alive(&self, id: BufferId) -> bool {
        lock(&self.internal.buffers).contains_key(&id)
    }

    /// A copy of a live buffer's contents.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        lock(&self.internal.buffers)
            .get(&id)
            .map(|entry| entry.data.clone())
    }

    /// Every executed buffer bind, with the buffer's contents at that point, in
    /// execution order.
    pub fn buffer_bindings(&self) -> Vec<(BufferId, Vec<u8>)> {
        lock(&self.internal.buffer_bindings).clone()
    }

    /// Every submission accepted so far, in order.
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        lock(&self.internal.submissions).clone()
    }

    /// Number of finished command buffers that were neither submitted nor discarded.
    pub fn pending_command_buffer_count(&self) -> usize {
        lock(&self.internal.pending_command_buffers).len()
    }

    // --- Failure injection ---

    /// Makes the next texture or buffer allocation fail with `reason`.
    pub fn fail_next_allocation(&self, reason: impl Into<String>) {
        *lock(&self.internal.pending_allocation_failure) = Some(reason.into());
    }

    /// Makes the next submission's fence resolve with a task failure carrying `message`.
    pub fn fail_next_submission(&self, message: impl Into<String>) {
        *lock(&self.internal.pending_task_failure) = Some(message.into());
    }

    // --- Internal Helpers ---

    fn reserve_memory(&self, label: Option<&str>, bytes: u64) -> Result<(), ResourceError> {
        if let Some(reason) = lock(&self.internal.pending_allocation_failure).take() {
            return Err(ResourceError::AllocationFailed {
                label: label.map(str::to_string),
                reason,
            });
        }
        let allocated = self.internal.vram_allocated_bytes.load(Ordering::Relaxed);
        if let Some(budget) = self.internal.memory_budget {
            let available = budget.saturating_sub(allocated);
            if bytes > available {
                return Err(ResourceError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }
        let current = self
            .internal
            .vram_allocated_bytes
            .fetch_add(bytes, Ordering::Relaxed)
            + bytes;
        self.internal
            .vram_peak_bytes
            .fetch_max(current, Ordering::Relaxed);
        Ok(())
    }

    fn release_memory(&self, bytes: u64) {
        self.internal
            .vram_allocated_bytes
            .fetch_sub(bytes, Ordering::Relaxed);
    }

    fn count_creation(&self, label: Option<&str>) {
        *lock(&self.internal.creations_by_label)
            .entry(label.unwrap_or("unnamed").to_string())
            .or_insert(0) += 1;
    }

    pub(crate) fn store_command_buffer(
        &self,
        label: String,
        queue: QueueKind,
        commands: Vec<RecordedCommand>,
    ) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.pending_command_buffers).insert(
            id,
            RecordedCommandBuffer {
                label,
                queue,
                commands,
            },
        );
        id
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let label = descriptor.label.as_deref();
        if descriptor.size.width == 0
            || descriptor.size.height == 0
            || descriptor.size.depth_or_array_layers == 0
        {
            return Err(ResourceError::AllocationFailed {
                label: label.map(str::to_string),
                reason: "texture has a zero-sized dimension".to_string(),
            });
        }
        let bytes = descriptor.byte_size();
        self.reserve_memory(label, bytes)?;

        let id = TextureId(
            self.internal
                .next_texture_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.textures).insert(
            id,
            HeadlessTextureEntry {
                descriptor: descriptor.clone(),
                bytes,
            },
        );
        self.internal.textures_created.fetch_add(1, Ordering::Relaxed);
        self.count_creation(label);

        log::debug!(
            "HeadlessDevice: Created texture '{}' with ID: {:?}, size: {}x{}",
            label.unwrap_or_default(),
            id,
            descriptor.size.width,
            descriptor.size.height
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.textures)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.release_memory(entry.bytes);
        self.internal
            .textures_destroyed
            .fetch_add(1, Ordering::Relaxed);
        log::debug!("HeadlessDevice: Destroyed texture with ID: {id:?}");
        Ok(())
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let label = descriptor.label.as_deref();
        if descriptor.size == 0 {
            return Err(ResourceError::AllocationFailed {
                label: label.map(str::to_string),
                reason: "buffer size is zero".to_string(),
            });
        }
        self.reserve_memory(label, descriptor.size)?;

        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.buffers).insert(
            id,
            HeadlessBufferEntry {
                descriptor: descriptor.clone(),
                data: vec![0; descriptor.size as usize],
            },
        );
        self.internal.buffers_created.fetch_add(1, Ordering::Relaxed);
        self.count_creation(label);

        log::debug!(
            "HeadlessDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            label.unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let descriptor = BufferDescriptor {
            size: descriptor.size.max(data.len() as u64),
            ..descriptor.clone()
        };
        let id = self.create_buffer(&descriptor)?;
        self.write_buffer(id, 0, data)?;
        Ok(id)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers);
        let entry = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let end = start
            .checked_add(data.len())
            .filter(|&end| end <= entry.data.len())
            .ok_or(ResourceError::OutOfBounds)?;
        entry.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.release_memory(entry.descriptor.size);
        self.internal
            .buffers_destroyed
            .fetch_add(1, Ordering::Relaxed);
        log::debug!("HeadlessDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn create_pipeline(
        &self,
        descriptor: &PipelineDescriptor,
    ) -> Result<PipelineId, ResourceError> {
        let label = descriptor.label.as_ref().map(|l| l.to_string());
        if descriptor
            .stages()
            .iter()
            .any(|(_, source)| source.code.trim().is_empty())
        {
            return Err(PipelineError::EmptyShaderSource { label }.into());
        }
        if let PipelineKind::Render {
            fragment: None,
            color_formats,
            ..
        } = &descriptor.kind
        {
            if !color_formats.is_empty() {
                return Err(PipelineError::MissingShaderStage {
                    label,
                    stage: "fragment",
                }
                .into());
            }
        }

        let id = PipelineId(
            self.internal
                .next_pipeline_id
                .fetch_add(1, Ordering::Relaxed),
        );
        lock(&self.internal.pipelines).insert(id, descriptor.clone());
        self.internal
            .pipelines_created
            .fetch_add(1, Ordering::Relaxed);
        self.count_creation(descriptor.label.as_deref());
        log::debug!("HeadlessDevice: Created pipeline '{label:?}' with ID: {id:?}");
        Ok(id)
    }

    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), ResourceError> {
        lock(&self.internal.pipelines)
            .remove(&id)
            .ok_or(ResourceError::NotFound)?;
        self.internal
            .pipelines_destroyed
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_command_encoder(
        &self,
        label: Option<&str>,
        queue: QueueKind,
    ) -> Box<dyn CommandEncoder> {
        Box::new(HeadlessCommandEncoder::new(self.clone(), label, queue))
    }

    fn submit(
        &self,
        queue: QueueKind,
        command_buffers: &[CommandBufferId],
    ) -> Result<Fence, RenderError> {
        let buffers = {
            let mut pending = lock(&self.internal.pending_command_buffers);
            for id in command_buffers {
                match pending.get(id) {
                    None => {
                        return Err(RenderError::SubmissionFailed(format!(
                            "unknown command buffer {id:?}"
                        )))
                    }
                    Some(buffer) if buffer.queue != queue => {
                        return Err(RenderError::SubmissionFailed(format!(
                            "command buffer '{}' was recorded for the {} queue, submitted to {}",
                            buffer.label, buffer.queue, queue
                        )))
                    }
                    Some(_) => {}
                }
            }
            command_buffers
                .iter()
                .filter_map(|id| pending.remove(id))
                .collect::<Vec<_>>()
        };

        let index = {
            let mut submissions = lock(&self.internal.submissions);
            submissions.push(SubmissionRecord {
                queue,
                labels: buffers.iter().map(|b| b.label.clone()).collect(),
                commands: buffers
                    .iter()
                    .flat_map(|b| b.commands.iter().cloned())
                    .collect(),
            });
            submissions.len() - 1
        };

        let (fence, signal) = Fence::pending(format!("{queue}-submission-{index}"));
        let job = QueueJob {
            label: format!("{queue}-submission-{index}"),
            buffers,
            signal,
            injected_failure: self.internal.take_injected_task_failure(),
        };
        match self.internal.workers.get(queue.index()).and_then(Option::as_ref) {
            Some(worker) => worker.send(job, &self.internal),
            None => job.execute(&self.internal),
        }
        Ok(fence)
    }

    fn discard_command_buffers(&self, command_buffers: &[CommandBufferId]) {
        let mut pending = lock(&self.internal.pending_command_buffers);
        for id in command_buffers {
            pending.remove(id);
        }
    }

    fn backend_name(&self) -> &str {
        "headless"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::math::Extent3D;
    use ember_core::renderer::{
        BufferUsage, RenderPassColorAttachment, RenderPassDescriptor, SampleCount, ShaderSource,
        TextureDimension, TextureFormat, TextureUsage,
    };
    use ember_core::math::LinearRgba;
    use ember_core::renderer::traits::ComputePassEncoder;
    use ember_core::renderer::{LoadOp, Operations, StoreOp};

    fn texture_desc(label: &'static str) -> TextureDescriptor {
        TextureDescriptor {
            label: Some(label.into()),
            size: Extent3D {
                width: 16,
                height: 16,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: SampleCount::X1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::RENDER_ATTACHMENT,
        }
    }

    #[test]
    fn texture_lifecycle_tracks_vram() {
        let device = HeadlessDevice::new();
        let id = device.create_texture(&texture_desc("color")).unwrap();
        assert_eq!(device.stats().vram_allocated_bytes, 16 * 16 * 4);
        assert_eq!(device.creation_count("color"), 1);

        device.destroy_texture(id).unwrap();
        assert_eq!(device.destroy_texture(id), Err(ResourceError::NotFound));
        let stats = device.stats();
        assert_eq!(stats.live_textures(), 0);
        assert_eq!(stats.textures_destroyed, 1);
        assert_eq!(stats.vram_allocated_bytes, 0);
        assert_eq!(stats.vram_peak_bytes, 16 * 16 * 4);
    }

    #[test]
    fn memory_budget_is_enforced() {
        let device = HeadlessDevice::with_memory_budget(512);
        let err = device.create_texture(&texture_desc("big")).unwrap_err();
        assert_eq!(
            err,
            ResourceError::OutOfMemory {
                requested: 1024,
                available: 512
            }
        );
        assert_eq!(device.stats().live_textures(), 0);
    }

    #[test]
    fn injected_allocation_failure_applies_once() {
        let device = HeadlessDevice::new();
        device.fail_next_allocation("device is full");
        assert!(matches!(
            device.create_texture(&texture_desc("a")),
            Err(ResourceError::AllocationFailed { .. })
        ));
        assert!(device.create_texture(&texture_desc("a")).is_ok());
    }

    #[test]
    fn write_buffer_checks_bounds() {
        let device = HeadlessDevice::new();
        let desc = BufferDescriptor {
            label: Some("uniforms".into()),
            size: 8,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        };
        let id = device.create_buffer_with_data(&desc, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.buffer_contents(id).unwrap(), vec![1, 2, 3, 4, 0, 0, 0, 0]);
        assert_eq!(
            device.write_buffer(id, 6, &[9, 9, 9]),
            Err(ResourceError::OutOfBounds)
        );
    }

    #[test]
    fn empty_shader_is_rejected() {
        let device = HeadlessDevice::new();
        let desc = PipelineDescriptor {
            label: Some("broken".into()),
            kind: PipelineKind::Compute {
                shader: ShaderSource::new("   ", "main"),
            },
        };
        assert!(matches!(
            device.create_pipeline(&desc),
            Err(ResourceError::Pipeline(PipelineError::EmptyShaderSource { .. }))
        ));
    }

    #[test]
    fn submission_executes_and_resolves_fence() {
        let device = HeadlessDevice::new();
        let target = device.create_texture(&texture_desc("target")).unwrap();

        let mut encoder = device.create_command_encoder(Some("clear"), QueueKind::Render);
        {
            let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("clear".into()),
                color_attachments: vec![RenderPassColorAttachment {
                    texture: target,
                    ops: Operations {
                        load: LoadOp::Clear(LinearRgba::BLACK),
                        store: StoreOp::Store,
                    },
                }],
                depth_attachment: None,
            });
        }
        let buffer = encoder.finish();
        let fence = device.submit(QueueKind::Render, &[buffer]).unwrap();
        assert_eq!(fence.wait(), Ok(()));

        let submissions = device.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].labels, vec!["clear".to_string()]);
        assert_eq!(submissions[0].commands.last(), Some(&RecordedCommand::EndPass));
        assert_eq!(device.pending_command_buffer_count(), 0);
    }

    #[test]
    fn recorded_upload_lands_on_execution() {
        let device = HeadlessDevice::new();
        let id = device
            .create_buffer(&BufferDescriptor {
                label: Some("uniforms".into()),
                size: 4,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            })
            .unwrap();

        let mut encoder = device.create_command_encoder(Some("upload"), QueueKind::Compute);
        encoder.write_buffer(id, 0, &[7, 7, 7, 7]);
        {
            let mut pass = encoder.begin_compute_pass(&Default::default());
            pass.bind_buffer(0, id);
        }
        let buffer = encoder.finish();
        assert_eq!(device.buffer_contents(id).unwrap(), vec![0; 4]);

        let fence = device.submit(QueueKind::Compute, &[buffer]).unwrap();
        assert_eq!(fence.wait(), Ok(()));
        assert_eq!(device.buffer_contents(id).unwrap(), vec![7; 4]);
        assert_eq!(device.buffer_bindings(), vec![(id, vec![7; 4])]);
    }

    #[test]
    fn submitting_to_the_wrong_queue_fails() {
        let device = HeadlessDevice::new();
        let buffer = device
            .create_command_encoder(Some("upload"), QueueKind::Transfer)
            .finish();
        assert!(matches!(
            device.submit(QueueKind::Compute, &[buffer]),
            Err(RenderError::SubmissionFailed(_))
        ));
        device.discard_command_buffers(&[buffer]);
        assert_eq!(device.pending_command_buffer_count(), 0);
    }

    #[test]
    fn dead_resource_fails_the_task() {
        let device = HeadlessDevice::new();
        let texture = device.create_texture(&texture_desc("gone")).unwrap();
        let mut encoder = device.create_command_encoder(Some("late"), QueueKind::Compute);
        {
            let mut pass = encoder.begin_compute_pass(&Default::default());
            pass.bind_texture(0, texture);
            pass.dispatch(1, 1, 1);
        }
        let buffer = encoder.finish();
        device.destroy_texture(texture).unwrap();

        let fence = device.submit(QueueKind::Compute, &[buffer]).unwrap();
        assert!(fence.wait().is_err());
        assert!(fence.is_complete());
    }

    #[test]
    fn injected_task_failure_reaches_fence() {
        let device = HeadlessDevice::new();
        device.fail_next_submission("device hung");
        let buffer = device
            .create_command_encoder(Some("work"), QueueKind::Render)
            .finish();
        let fence = device.submit(QueueKind::Render, &[buffer]).unwrap();
        let err = fence.wait().unwrap_err();
        assert!(err.to_string().contains("device hung"));
    }
}
