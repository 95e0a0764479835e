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

//! Types describing command recording: queues, pass descriptors and attachments.

use crate::math::LinearRgba;
use crate::renderer::api::texture::TextureId;
use std::borrow::Cow;
use std::fmt;

/// An opaque handle to a finished, submittable command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandBufferId(pub u64);

/// The hardware queue a command buffer is submitted to.
///
/// Ordering between queues of different kinds is not guaranteed by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum QueueKind {
    /// Graphics queue (draws and everything else).
    #[default]
    Render,
    /// Asynchronous compute queue.
    Compute,
    /// Copy / upload queue.
    Transfer,
}

impl QueueKind {
    /// All queue kinds, in a stable order.
    pub const ALL: [QueueKind; 3] = [QueueKind::Render, QueueKind::Compute, QueueKind::Transfer];

    /// Stable index of the queue kind, usable as an array slot.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueKind::Render => "render",
            QueueKind::Compute => "compute",
            QueueKind::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// What to do with an attachment's previous contents at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<V> {
    /// Clear the attachment to the given value.
    Clear(V),
    /// Keep the existing contents.
    Load,
}

/// What to do with an attachment's contents at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Write the results to memory.
    Store,
    /// Discard the results.
    Discard,
}

/// A pair of load and store operations for an attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operations<V> {
    /// Load operation.
    pub load: LoadOp<V>,
    /// Store operation.
    pub store: StoreOp,
}

/// Describes a color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassColorAttachment {
    /// The texture rendered into.
    pub texture: TextureId,
    /// Load/store behaviour.
    pub ops: Operations<LinearRgba>,
}

/// Describes the depth attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDepthAttachment {
    /// The depth texture.
    pub texture: TextureId,
    /// Load/store behaviour for the depth aspect.
    pub depth_ops: Operations<f32>,
}

/// Describes a render pass instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Color attachments, in target order.
    pub color_attachments: Vec<RenderPassColorAttachment>,
    /// Optional depth attachment.
    pub depth_attachment: Option<RenderPassDepthAttachment>,
}

impl RenderPassDescriptor {
    /// Every texture referenced by this pass.
    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.color_attachments
            .iter()
            .map(|a| a.texture)
            .chain(self.depth_attachment.iter().map(|d| d.texture))
    }
}

/// Describes a compute pass instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputePassDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
}
