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

//! Geometry pass filling the deferred g-buffer.

use crate::shaders::GBUFFER_WGSL;
use ember_core::math::{Extent2D, LinearRgba};
use ember_core::renderer::{
    LoadOp, Operations, PipelineDescriptor, PipelineKind, RenderPassColorAttachment,
    RenderPassDepthAttachment, RenderPassDescriptor, ShaderSource, StoreOp, TextureFormat,
    TextureUsage,
};
use ember_graph::{
    ExecuteContext, GBuffer, GraphBuilder, GraphError, PersistentId, RenderPass, ResourceHandle,
    TextureBufferDesc, TextureSize,
};

/// Format of the albedo plane.
pub const ALBEDO_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
/// Format of the normal plane.
pub const NORMAL_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// Format of the depth plane.
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[derive(Debug, Clone, Copy)]
struct GBufferTargets {
    albedo: PersistentId,
    normal: PersistentId,
    depth: PersistentId,
    size: Extent2D,
}

struct GBufferFrame {
    pipeline: ResourceHandle,
    planes: GBuffer,
}

/// Draws every object into persistent albedo, normal and depth planes sized
/// like the backbuffer, and publishes them as [`GBuffer`].
///
/// The planes are rebuilt when the backbuffer size changes; the old ones are
/// released once.
#[derive(Default)]
pub struct GBufferPass {
    targets: Option<GBufferTargets>,
    pipeline: Option<PersistentId>,
    frame: Option<GBufferFrame>,
}

impl GBufferPass {
    /// Creates the pass. Its planes are allocated on the first frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the current planes were built for.
    pub fn size(&self) -> Option<Extent2D> {
        self.targets.map(|t| t.size)
    }

    fn plane(label: &'static str, format: TextureFormat) -> TextureBufferDesc {
        TextureBufferDesc::new(
            label,
            TextureSize::FULL,
            format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    fn pipeline_descriptor() -> PipelineDescriptor {
        PipelineDescriptor {
            label: Some("gbuffer-pipeline".into()),
            kind: PipelineKind::Render {
                vertex: ShaderSource::new(GBUFFER_WGSL, "vs_main"),
                fragment: Some(ShaderSource::new(GBUFFER_WGSL, "fs_main")),
                color_formats: vec![ALBEDO_FORMAT, NORMAL_FORMAT],
                depth_format: Some(DEPTH_FORMAT),
            },
        }
    }

    /// Creates the three planes at the current backbuffer size.
    fn build_targets(
        builder: &mut GraphBuilder<'_>,
    ) -> Result<(GBufferTargets, [ResourceHandle; 3]), GraphError> {
        let (albedo, albedo_handle) =
            builder.create_persistent(Self::plane("gbuffer-albedo", ALBEDO_FORMAT))?;
        let (normal, normal_handle) =
            builder.create_persistent(Self::plane("gbuffer-normal", NORMAL_FORMAT))?;
        let (depth, depth_handle) =
            builder.create_persistent(Self::plane("gbuffer-depth", DEPTH_FORMAT))?;
        let targets = GBufferTargets {
            albedo,
            normal,
            depth,
            size: builder.backbuffer_size(),
        };
        Ok((targets, [albedo_handle, normal_handle, depth_handle]))
    }
}

impl RenderPass for GBufferPass {
    fn name(&self) -> &str {
        "gbuffer"
    }

    fn create(&mut self, builder: &mut GraphBuilder<'_>) -> Result<(), GraphError> {
        let [albedo, normal, depth] = match self.targets {
            Some(old) if builder.rebuild_requested() => {
                log::debug!(
                    "GBufferPass: Rebuilding planes {} -> {}",
                    old.size,
                    builder.backbuffer_size()
                );
                self.targets = None;
                builder.release_persistent(old.albedo)?;
                builder.release_persistent(old.normal)?;
                builder.release_persistent(old.depth)?;
                let (targets, handles) = Self::build_targets(builder)?;
                self.targets = Some(targets);
                handles
            }
            Some(current) => [
                builder.import_resource(current.albedo)?,
                builder.import_resource(current.normal)?,
                builder.import_resource(current.depth)?,
            ],
            None => {
                let (targets, handles) = Self::build_targets(builder)?;
                self.targets = Some(targets);
                handles
            }
        };
        for handle in [albedo, normal, depth] {
            builder.write(handle)?;
        }

        let pipeline = match self.pipeline {
            Some(id) => builder.import_resource(id)?,
            None => {
                let (id, handle) = builder.create_persistent(Self::pipeline_descriptor())?;
                self.pipeline = Some(id);
                handle
            }
        };

        let planes = GBuffer {
            albedo,
            normal,
            depth,
            size: builder.backbuffer_size(),
        };
        builder.shared_mut().set(planes);
        self.frame = Some(GBufferFrame { pipeline, planes });
        Ok(())
    }

    fn should_rebuild(&self, backbuffer_size: Extent2D) -> bool {
        self.targets.is_some_and(|t| t.size != backbuffer_size)
    }

    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> Result<(), GraphError> {
        let Some(frame) = &self.frame else {
            return Err(GraphError::NotSetUp {
                pass: self.name().to_string(),
            });
        };
        let resources = ctx.resources();
        let pipeline = resources.get_pipeline(frame.pipeline)?;
        let albedo = resources.get_texture_buffer(frame.planes.albedo)?;
        let normal = resources.get_texture_buffer(frame.planes.normal)?;
        let depth = resources.get_texture_buffer(frame.planes.depth)?;
        let clear = |color| Operations {
            load: LoadOp::Clear(color),
            store: StoreOp::Store,
        };

        let desc = RenderPassDescriptor {
            label: Some("gbuffer".into()),
            color_attachments: vec![
                RenderPassColorAttachment {
                    texture: albedo,
                    ops: clear(LinearRgba::TRANSPARENT),
                },
                RenderPassColorAttachment {
                    texture: normal,
                    ops: clear(LinearRgba::TRANSPARENT),
                },
            ],
            depth_attachment: Some(RenderPassDepthAttachment {
                texture: depth,
                depth_ops: Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                },
            }),
        };
        let scene = ctx.scene();
        let mut pass = ctx.encoder().begin_render_pass(&desc);
        pass.set_pipeline(pipeline);
        for object in &scene.objects {
            pass.set_vertex_buffer(0, object.vertex_buffer, 0);
            pass.draw(0..object.vertex_count, 0..1);
        }
        Ok(())
    }
}
