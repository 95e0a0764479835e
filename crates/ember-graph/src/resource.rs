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

//! The logical resource model: what passes ask for, and what the backend hands back.

use crate::persistent::PersistentId;
use crate::handle::PassId;
use ember_core::math::Extent2D;
use ember_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, PipelineDescriptor, PipelineId,
    ResourceError, SampleCount, TextureDescriptor, TextureDimension, TextureFormat, TextureId,
    TextureUsage,
};
use std::borrow::Cow;
use std::fmt;

// ─── Request descriptors ─────────────────────────────────────────────────────

/// Size of a texture requested through the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureSize {
    /// A fixed size in pixels.
    Absolute(Extent2D),
    /// A size relative to the backbuffer, resolved when the texture is declared.
    Backbuffer {
        /// Multiplier applied to both backbuffer dimensions.
        scale: f32,
    },
}

impl TextureSize {
    /// Full backbuffer resolution.
    pub const FULL: Self = TextureSize::Backbuffer { scale: 1.0 };

    /// Resolves to pixels against the current backbuffer size.
    pub fn resolve(self, backbuffer: Extent2D) -> Extent2D {
        match self {
            TextureSize::Absolute(size) => size,
            TextureSize::Backbuffer { scale } => backbuffer.scaled(scale),
        }
    }
}

/// Requests a texture (render target, g-buffer plane, shadow map...).
#[derive(Debug, Clone, PartialEq)]
pub struct TextureBufferDesc {
    /// Debug label, also used as the backend object label.
    pub label: Cow<'static, str>,
    /// Requested size.
    pub size: TextureSize,
    /// Texel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
    /// Samples per pixel.
    pub sample_count: SampleCount,
    /// Mip levels.
    pub mip_level_count: u32,
}

impl TextureBufferDesc {
    /// A single-sampled, single-mip texture.
    pub fn new(
        label: impl Into<Cow<'static, str>>,
        size: TextureSize,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            label: label.into(),
            size,
            format,
            usage,
            sample_count: SampleCount::X1,
            mip_level_count: 1,
        }
    }

    /// Overrides the sample count.
    pub fn with_sample_count(mut self, sample_count: SampleCount) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Builds the backend descriptor for the given backbuffer size.
    pub fn resolve(&self, backbuffer: Extent2D) -> TextureDescriptor {
        TextureDescriptor {
            label: Some(self.label.clone()),
            size: self.size.resolve(backbuffer).to_3d(),
            mip_level_count: self.mip_level_count,
            sample_count: self.sample_count,
            dimension: TextureDimension::D2,
            format: self.format,
            usage: self.usage,
        }
    }
}

/// How shaders see a shader buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferVisibility {
    /// Read-only uniform data.
    Uniform,
    /// Read/write storage data.
    Storage,
}

/// Requests a uniform or storage buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBufferDesc {
    /// Debug label.
    pub label: Cow<'static, str>,
    /// Size in bytes.
    pub size: u64,
    /// Binding visibility.
    pub visibility: BufferVisibility,
}

impl ShaderBufferDesc {
    /// Creates a shader buffer request.
    pub fn new(label: impl Into<Cow<'static, str>>, size: u64, visibility: BufferVisibility) -> Self {
        Self {
            label: label.into(),
            size,
            visibility,
        }
    }

    /// Builds the backend descriptor.
    pub fn resolve(&self) -> BufferDescriptor {
        let usage = match self.visibility {
            BufferVisibility::Uniform => BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            BufferVisibility::Storage => {
                BufferUsage::STORAGE | BufferUsage::COPY_DST | BufferUsage::COPY_SRC
            }
        };
        BufferDescriptor {
            label: Some(self.label.clone()),
            size: self.size,
            usage,
            mapped_at_creation: false,
        }
    }
}

/// Requests a vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBufferDesc {
    /// Debug label.
    pub label: Cow<'static, str>,
    /// Size in bytes.
    pub size: u64,
}

impl VertexBufferDesc {
    /// Creates a vertex buffer request.
    pub fn new(label: impl Into<Cow<'static, str>>, size: u64) -> Self {
        Self {
            label: label.into(),
            size,
        }
    }

    /// Builds the backend descriptor.
    pub fn resolve(&self) -> BufferDescriptor {
        BufferDescriptor {
            label: Some(self.label.clone()),
            size: self.size,
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            mapped_at_creation: false,
        }
    }
}

/// Any resource request accepted by
/// [`GraphBuilder::create_persistent`](crate::GraphBuilder::create_persistent).
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDesc {
    /// A texture.
    TextureBuffer(TextureBufferDesc),
    /// A uniform or storage buffer.
    ShaderBuffer(ShaderBufferDesc),
    /// A vertex buffer.
    VertexBuffer(VertexBufferDesc),
    /// A render or compute pipeline.
    Pipeline(PipelineDescriptor),
}

impl ResourceDesc {
    /// Builds the backend descriptor for the given backbuffer size.
    pub fn resolve(&self, backbuffer: Extent2D) -> ResourceDescriptor {
        match self {
            ResourceDesc::TextureBuffer(d) => ResourceDescriptor::Texture(d.resolve(backbuffer)),
            ResourceDesc::ShaderBuffer(d) => ResourceDescriptor::ShaderBuffer(d.resolve()),
            ResourceDesc::VertexBuffer(d) => ResourceDescriptor::VertexBuffer(d.resolve()),
            ResourceDesc::Pipeline(d) => ResourceDescriptor::Pipeline(d.clone()),
        }
    }
}

impl From<TextureBufferDesc> for ResourceDesc {
    fn from(desc: TextureBufferDesc) -> Self {
        ResourceDesc::TextureBuffer(desc)
    }
}

impl From<ShaderBufferDesc> for ResourceDesc {
    fn from(desc: ShaderBufferDesc) -> Self {
        ResourceDesc::ShaderBuffer(desc)
    }
}

impl From<VertexBufferDesc> for ResourceDesc {
    fn from(desc: VertexBufferDesc) -> Self {
        ResourceDesc::VertexBuffer(desc)
    }
}

impl From<PipelineDescriptor> for ResourceDesc {
    fn from(desc: PipelineDescriptor) -> Self {
        ResourceDesc::Pipeline(desc)
    }
}

// ─── Resolved descriptors ────────────────────────────────────────────────────

/// The kind of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A texture.
    TextureBuffer,
    /// A uniform or storage buffer.
    ShaderBuffer,
    /// A vertex buffer.
    VertexBuffer,
    /// A render or compute pipeline.
    Pipeline,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::TextureBuffer => "texture buffer",
            ResourceKind::ShaderBuffer => "shader buffer",
            ResourceKind::VertexBuffer => "vertex buffer",
            ResourceKind::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// A fully resolved description of how to build a backend object.
///
/// Immutable once submitted to the builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceDescriptor {
    /// A texture.
    Texture(TextureDescriptor),
    /// A uniform or storage buffer.
    ShaderBuffer(BufferDescriptor),
    /// A vertex buffer.
    VertexBuffer(BufferDescriptor),
    /// A render or compute pipeline.
    Pipeline(PipelineDescriptor),
}

impl ResourceDescriptor {
    /// The kind of resource this descriptor builds.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDescriptor::Texture(_) => ResourceKind::TextureBuffer,
            ResourceDescriptor::ShaderBuffer(_) => ResourceKind::ShaderBuffer,
            ResourceDescriptor::VertexBuffer(_) => ResourceKind::VertexBuffer,
            ResourceDescriptor::Pipeline(_) => ResourceKind::Pipeline,
        }
    }

    /// The debug label, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            ResourceDescriptor::Texture(d) => d.label.as_deref(),
            ResourceDescriptor::ShaderBuffer(d) | ResourceDescriptor::VertexBuffer(d) => {
                d.label.as_deref()
            }
            ResourceDescriptor::Pipeline(d) => d.label.as_deref(),
        }
    }

    /// The texture descriptor, for texture resources.
    pub fn as_texture(&self) -> Option<&TextureDescriptor> {
        match self {
            ResourceDescriptor::Texture(d) => Some(d),
            _ => None,
        }
    }

    /// The buffer descriptor, for shader and vertex buffers.
    pub fn as_buffer(&self) -> Option<&BufferDescriptor> {
        match self {
            ResourceDescriptor::ShaderBuffer(d) | ResourceDescriptor::VertexBuffer(d) => Some(d),
            _ => None,
        }
    }

    /// A copy with the label removed, used to match compatible objects.
    pub(crate) fn unlabeled(&self) -> Self {
        let mut key = self.clone();
        match &mut key {
            ResourceDescriptor::Texture(d) => d.label = None,
            ResourceDescriptor::ShaderBuffer(d) | ResourceDescriptor::VertexBuffer(d) => {
                d.label = None
            }
            ResourceDescriptor::Pipeline(d) => d.label = None,
        }
        key
    }

    /// Creates the backend object.
    pub fn allocate(&self, device: &dyn GraphicsDevice) -> Result<PhysicalResource, ResourceError> {
        Ok(match self {
            ResourceDescriptor::Texture(d) => PhysicalResource::Texture(device.create_texture(d)?),
            ResourceDescriptor::ShaderBuffer(d) | ResourceDescriptor::VertexBuffer(d) => {
                PhysicalResource::Buffer(device.create_buffer(d)?)
            }
            ResourceDescriptor::Pipeline(d) => PhysicalResource::Pipeline(device.create_pipeline(d)?),
        })
    }
}

/// A concrete backend object bound to a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalResource {
    /// A backend texture.
    Texture(TextureId),
    /// A backend buffer.
    Buffer(BufferId),
    /// A backend pipeline.
    Pipeline(PipelineId),
}

impl PhysicalResource {
    /// Destroys the backend object.
    pub fn destroy(self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        match self {
            PhysicalResource::Texture(id) => device.destroy_texture(id),
            PhysicalResource::Buffer(id) => device.destroy_buffer(id),
            PhysicalResource::Pipeline(id) => device.destroy_pipeline(id),
        }
    }
}

// ─── Graph-side bookkeeping ──────────────────────────────────────────────────

/// Who owns the backend object behind a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOrigin {
    /// Owned by the compiled graph for one frame, drawn from the transient pool.
    Transient,
    /// Owned by the runtime's persistent registry and lent to the graph.
    Persistent(PersistentId),
    /// The presented render target, re-imported every frame.
    Backbuffer(PersistentId),
}

impl ResourceOrigin {
    /// The registry entry backing this resource, if it is not transient.
    pub fn persistent_id(self) -> Option<PersistentId> {
        match self {
            ResourceOrigin::Transient => None,
            ResourceOrigin::Persistent(id) | ResourceOrigin::Backbuffer(id) => Some(id),
        }
    }
}

/// One logical resource slot in a graph.
#[derive(Debug, Clone)]
pub(crate) struct VirtualResource {
    pub(crate) name: String,
    pub(crate) descriptor: ResourceDescriptor,
    pub(crate) origin: ResourceOrigin,
    /// The pass that created the resource. `None` for imported resources,
    /// whose contents predate the frame.
    pub(crate) creator: Option<PassId>,
}
