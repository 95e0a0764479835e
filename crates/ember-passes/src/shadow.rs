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

//! Renders one depth map per shadow slot.

use crate::shaders::SHADOW_WGSL;
use ember_core::math::Extent2D;
use ember_core::renderer::{
    LoadOp, Operations, PipelineDescriptor, PipelineKind, RenderPassDepthAttachment,
    RenderPassDescriptor, ShaderSource, StoreOp, TextureFormat, TextureUsage,
};
use ember_graph::{
    ExecuteContext, GraphBuilder, GraphError, PersistentId, RenderPass, ResourceHandle, ShadowMap,
    ShadowMaps, TextureBufferDesc, TextureSize,
};

/// Resolution of every shadow map.
pub const SHADOW_MAP_SIZE: u32 = 1024;

/// Depth format of the shadow maps.
pub const SHADOW_MAP_FORMAT: TextureFormat = TextureFormat::Depth32Float;

struct ShadowFrame {
    pipeline: ResourceHandle,
    maps: Vec<ResourceHandle>,
}

/// Draws every shadow caster into one transient depth texture per slot and
/// publishes them as [`ShadowMaps`].
///
/// Slot `n` belongs to the scene's `n`-th shadow-casting light. Slots without
/// a light are only cleared.
pub struct ShadowPass {
    slots: usize,
    pipeline: Option<PersistentId>,
    frame: Option<ShadowFrame>,
}

impl ShadowPass {
    /// Creates a pass with `slots` shadow maps per frame.
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            pipeline: None,
            frame: None,
        }
    }

    /// Number of shadow maps rendered per frame.
    pub fn slots(&self) -> usize {
        self.slots
    }

    fn pipeline_descriptor() -> PipelineDescriptor {
        PipelineDescriptor {
            label: Some("shadow-pipeline".into()),
            kind: PipelineKind::Render {
                vertex: ShaderSource::new(SHADOW_WGSL, "vs_main"),
                fragment: None,
                color_formats: Vec::new(),
                depth_format: Some(SHADOW_MAP_FORMAT),
            },
        }
    }
}

impl RenderPass for ShadowPass {
    fn name(&self) -> &str {
        "shadow"
    }

    fn create(&mut self, builder: &mut GraphBuilder<'_>) -> Result<(), GraphError> {
        let pipeline = match self.pipeline {
            Some(id) => builder.import_resource(id)?,
            None => {
                let (id, handle) = builder.create_persistent(Self::pipeline_descriptor())?;
                self.pipeline = Some(id);
                handle
            }
        };

        let size = TextureSize::Absolute(Extent2D::new(SHADOW_MAP_SIZE, SHADOW_MAP_SIZE));
        let maps = (0..self.slots)
            .map(|slot| {
                builder.create_texture_buffer(TextureBufferDesc::new(
                    format!("shadow-map-{slot}"),
                    size,
                    SHADOW_MAP_FORMAT,
                    TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        builder.shared_mut().set(ShadowMaps {
            maps: maps
                .iter()
                .enumerate()
                .map(|(light_index, &texture)| ShadowMap {
                    light_index,
                    texture,
                })
                .collect(),
        });
        self.frame = Some(ShadowFrame { pipeline, maps });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> Result<(), GraphError> {
        let Some(frame) = &self.frame else {
            return Err(GraphError::NotSetUp {
                pass: self.name().to_string(),
            });
        };
        let pipeline = ctx.resources().get_pipeline(frame.pipeline)?;
        let scene = ctx.scene();
        let lights = scene.shadowed_lights().count();

        for (slot, &map) in frame.maps.iter().enumerate() {
            let texture = ctx.resources().get_texture_buffer(map)?;
            let desc = RenderPassDescriptor {
                label: Some(format!("shadow-map-{slot}").into()),
                color_attachments: Vec::new(),
                depth_attachment: Some(RenderPassDepthAttachment {
                    texture,
                    depth_ops: Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    },
                }),
            };
            let mut pass = ctx.encoder().begin_render_pass(&desc);
            if slot >= lights {
                continue;
            }
            pass.set_pipeline(pipeline);
            for object in scene.shadow_casters() {
                pass.set_vertex_buffer(0, object.vertex_buffer, 0);
                pass.draw(0..object.vertex_count, 0..1);
            }
        }
        if lights > frame.maps.len() {
            log::trace!(
                "ShadowPass: {} shadowed lights, only {} slots",
                lights,
                frame.maps.len()
            );
        }
        Ok(())
    }
}
