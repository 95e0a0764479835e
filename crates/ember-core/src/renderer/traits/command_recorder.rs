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

use crate::math::Extent3D;
use crate::renderer::api::{
    BufferId, CommandBufferId, ComputePassDescriptor, PipelineId, QueueKind,
    RenderPassDescriptor, TextureId,
};
use std::ops::Range;

/// A trait representing an active render pass, used for recording drawing commands.
///
/// A `RenderPassEncoder` is obtained from a [`CommandEncoder`] and borrows it
/// mutably, so only one pass can be recorded at a time. Dropping the encoder
/// ends the pass.
pub trait RenderPassEncoder {
    /// Sets the active render pipeline for subsequent draw calls.
    fn set_pipeline(&mut self, pipeline: PipelineId);

    /// Binds a vertex buffer to a specific slot.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64);

    /// Binds a uniform or storage buffer at `binding`.
    fn bind_buffer(&mut self, binding: u32, buffer: BufferId);

    /// Binds a sampled texture at `binding`.
    fn bind_texture(&mut self, binding: u32, texture: TextureId);

    /// Records a non-indexed draw call.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);
}

/// A trait representing an active compute pass, used for recording dispatch commands.
pub trait ComputePassEncoder {
    /// Sets the active compute pipeline for subsequent dispatches.
    fn set_pipeline(&mut self, pipeline: PipelineId);

    /// Binds a uniform or storage buffer at `binding`.
    fn bind_buffer(&mut self, binding: u32, buffer: BufferId);

    /// Binds a sampled or storage texture at `binding`.
    fn bind_texture(&mut self, binding: u32, texture: TextureId);

    /// Dispatches `x * y * z` workgroups.
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
}

/// A trait for an object that records a sequence of GPU commands.
///
/// A `CommandEncoder` is the main tool for building a [`CommandBufferId`]. It creates
/// render and compute passes, and can also record commands that happen outside of a
/// pass, such as copies. Every encoder targets one [`QueueKind`].
pub trait CommandEncoder: Send {
    /// The queue the resulting command buffer must be submitted to.
    fn queue(&self) -> QueueKind;

    /// Begins a new render pass.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor,
    ) -> Box<dyn RenderPassEncoder + 'encoder>;

    /// Begins a new compute pass.
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor,
    ) -> Box<dyn ComputePassEncoder + 'encoder>;

    /// Records an upload of `data` into `buffer` at `offset`.
    ///
    /// The write lands when the command buffer executes, ordered with the
    /// commands recorded around it.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);

    /// Records a command to copy data from one buffer to another on the GPU.
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    );

    /// Records a full copy of `size` texels from one texture to another.
    fn copy_texture_to_texture(&mut self, source: TextureId, destination: TextureId, size: Extent3D);

    /// Finalizes the command recording and returns a handle to the resulting command buffer.
    ///
    /// This method consumes the encoder. The returned [`CommandBufferId`] can then
    /// be submitted to the [`GraphicsDevice`](super::GraphicsDevice).
    fn finish(self: Box<Self>) -> CommandBufferId;
}
