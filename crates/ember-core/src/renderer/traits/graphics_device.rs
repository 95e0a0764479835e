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

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::fence::Fence;
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The narrow capability contract every GPU backend must satisfy.
///
/// The render graph allocates, records and submits exclusively through this
/// trait. Every created object must be destroyable independently of the others.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a new GPU texture.
    /// ## Arguments
    /// * `descriptor` - The format, size, sample count and usage of the texture.
    /// ## Returns
    /// A `Result` containing the ID of the created texture or an error if the creation fails.
    /// ## Errors
    /// * `ResourceError` - If the backend refuses the allocation.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a GPU texture.
    /// ## Errors
    /// * `ResourceError::NotFound` - If the texture does not exist (e.g. destroyed twice).
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - A reference to a `BufferDescriptor` containing the buffer configuration.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer or an error if the creation fails.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new GPU buffer and initializes it with the provided data.
    /// This is often more efficient for creating static buffers.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Writes data to a GPU buffer.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If `offset + data.len()` exceeds the buffer size.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Compiles a render or compute pipeline.
    ///
    /// This is synchronous and may be expensive; callers are expected to cache
    /// the result.
    fn create_pipeline(&self, descriptor: &PipelineDescriptor)
        -> Result<PipelineId, ResourceError>;

    /// Destroys a pipeline.
    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), ResourceError>;

    /// Creates a new command encoder recording work for `queue`.
    fn create_command_encoder(&self, label: Option<&str>, queue: QueueKind)
        -> Box<dyn CommandEncoder>;

    /// Enqueues finished command buffers on `queue`.
    ///
    /// Ordering across queues of different kinds is not guaranteed. The
    /// returned [`Fence`] resolves once the work has executed and carries any
    /// failure raised while executing it.
    fn submit(
        &self,
        queue: QueueKind,
        command_buffers: &[CommandBufferId],
    ) -> Result<Fence, RenderError>;

    /// Drops finished command buffers that will never be submitted.
    ///
    /// Used when a frame is aborted after some of its passes were recorded.
    fn discard_command_buffers(&self, command_buffers: &[CommandBufferId]);

    /// A short human-readable name of the backend.
    fn backend_name(&self) -> &str;
}
