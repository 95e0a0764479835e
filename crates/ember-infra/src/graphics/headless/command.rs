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

use super::device::HeadlessDevice;
use ember_core::math::Extent3D;
use ember_core::renderer::traits::{CommandEncoder, ComputePassEncoder, RenderPassEncoder};
use ember_core::renderer::{
    BufferId, CommandBufferId, ComputePassDescriptor, PipelineId, QueueKind,
    RenderPassDescriptor, TextureId,
};
use std::ops::Range;

/// A single command captured by a [`HeadlessCommandEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// Start of a render pass writing the given attachments.
    BeginRenderPass {
        /// Debug label of the pass.
        label: Option<String>,
        /// Every attachment texture.
        attachments: Vec<TextureId>,
    },
    /// Start of a compute pass.
    BeginComputePass {
        /// Debug label of the pass.
        label: Option<String>,
    },
    /// End of the current pass.
    EndPass,
    /// A pipeline bind.
    SetPipeline(PipelineId),
    /// A vertex buffer bind.
    SetVertexBuffer {
        /// Vertex slot.
        slot: u32,
        /// Bound buffer.
        buffer: BufferId,
    },
    /// A uniform/storage buffer bind.
    BindBuffer {
        /// Binding index.
        binding: u32,
        /// Bound buffer.
        buffer: BufferId,
    },
    /// A texture bind.
    BindTexture {
        /// Binding index.
        binding: u32,
        /// Bound texture.
        texture: TextureId,
    },
    /// A non-indexed draw.
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// A compute dispatch.
    Dispatch {
        /// Workgroup counts.
        groups: [u32; 3],
    },
    /// A CPU upload into a buffer.
    WriteBuffer {
        /// Destination buffer.
        buffer: BufferId,
        /// Byte offset of the write.
        offset: u64,
        /// Uploaded bytes.
        data: Vec<u8>,
    },
    /// A buffer-to-buffer copy.
    CopyBuffer {
        /// Source buffer.
        source: BufferId,
        /// Destination buffer.
        destination: BufferId,
        /// Bytes copied.
        size: u64,
    },
    /// A texture-to-texture copy.
    CopyTexture {
        /// Source texture.
        source: TextureId,
        /// Destination texture.
        destination: TextureId,
    },
}

impl RecordedCommand {
    /// Returns `true` for draws and dispatches.
    pub fn is_work(&self) -> bool {
        matches!(
            self,
            RecordedCommand::Draw { .. } | RecordedCommand::Dispatch { .. }
        )
    }
}

/// A command encoder that stores commands in memory.
pub struct HeadlessCommandEncoder {
    device: HeadlessDevice,
    label: String,
    queue: QueueKind,
    commands: Vec<RecordedCommand>,
}

impl HeadlessCommandEncoder {
    pub(crate) fn new(device: HeadlessDevice, label: Option<&str>, queue: QueueKind) -> Self {
        Self {
            device,
            label: label.unwrap_or("unnamed").to_string(),
            queue,
            commands: Vec::new(),
        }
    }
}

struct HeadlessRenderPass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

impl RenderPassEncoder for HeadlessRenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, _offset: u64) {
        self.commands
            .push(RecordedCommand::SetVertexBuffer { slot, buffer });
    }

    fn bind_buffer(&mut self, binding: u32, buffer: BufferId) {
        self.commands
            .push(RecordedCommand::BindBuffer { binding, buffer });
    }

    fn bind_texture(&mut self, binding: u32, texture: TextureId) {
        self.commands
            .push(RecordedCommand::BindTexture { binding, texture });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands
            .push(RecordedCommand::Draw { vertices, instances });
    }
}

impl Drop for HeadlessRenderPass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndPass);
    }
}

struct HeadlessComputePass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

impl ComputePassEncoder for HeadlessComputePass<'_> {
    fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn bind_buffer(&mut self, binding: u32, buffer: BufferId) {
        self.commands
            .push(RecordedCommand::BindBuffer { binding, buffer });
    }

    fn bind_texture(&mut self, binding: u32, texture: TextureId) {
        self.commands
            .push(RecordedCommand::BindTexture { binding, texture });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands
            .push(RecordedCommand::Dispatch { groups: [x, y, z] });
    }
}

impl Drop for HeadlessComputePass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndPass);
    }
}

impl CommandEncoder for HeadlessCommandEncoder {
    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor,
    ) -> Box<dyn RenderPassEncoder + 'encoder> {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            attachments: descriptor.textures().collect(),
        });
        Box::new(HeadlessRenderPass {
            commands: &mut self.commands,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        descriptor: &ComputePassDescriptor,
    ) -> Box<dyn ComputePassEncoder + 'encoder> {
        self.commands.push(RecordedCommand::BeginComputePass {
            label: descriptor.label.as_ref().map(|l| l.to_string()),
        });
        Box::new(HeadlessComputePass {
            commands: &mut self.commands,
        })
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        self.commands.push(RecordedCommand::WriteBuffer {
            buffer,
            offset,
            data: data.to_vec(),
        });
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        _source_offset: u64,
        destination: BufferId,
        _destination_offset: u64,
        size: u64,
    ) {
        self.commands.push(RecordedCommand::CopyBuffer {
            source,
            destination,
            size,
        });
    }

    fn copy_texture_to_texture(
        &mut self,
        source: TextureId,
        destination: TextureId,
        _size: Extent3D,
    ) {
        self.commands
            .push(RecordedCommand::CopyTexture { source, destination });
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let HeadlessCommandEncoder {
            device,
            label,
            queue,
            commands,
        } = *self;
        device.store_command_buffer(label, queue, commands)
    }
}
