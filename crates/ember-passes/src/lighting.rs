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

//! Deferred lighting on the compute queue.

use crate::shaders::LIGHTING_WGSL;
use ember_core::renderer::{
    ComputePassDescriptor, PipelineDescriptor, PipelineKind, QueueKind, ShaderSource,
    TextureFormat, TextureUsage,
};
use ember_core::scene::{LightKind, Scene};
use ember_graph::{
    BufferVisibility, CompositeLayer, CompositeLayers, ExecuteContext, GBuffer, GraphBuilder,
    GraphError, PersistentId, RenderPass, ResourceHandle, SceneColor, ShaderBufferDesc,
    ShadowMaps, TextureBufferDesc, TextureSize,
};

/// Maximum number of lights uploaded per frame.
pub const MAX_LIGHTS: usize = 16;

/// Edge length of a lighting tile, in pixels.
pub const TILE_SIZE: u32 = 8;

/// Format of the lit color target.
pub const LIT_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// One light, laid out for the lighting shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// Direction (directional, w = 0) or position (point, w = 1).
    pub position: [f32; 4],
    /// Color (rgb) and intensity (a).
    pub color: [f32; 4],
    /// x = range, y = shadow slot or -1, zw = padding.
    pub params: [f32; 4],
}

/// Packs the scene's lights, assigning shadow slots to shadow-casting lights in order.
///
/// Lights beyond [`MAX_LIGHTS`] are dropped. Shadow-casting lights beyond
/// `shadow_slots` get no shadow.
pub fn light_uniforms(scene: &Scene, shadow_slots: usize) -> Vec<LightUniform> {
    let mut next_slot = 0;
    scene
        .lights
        .iter()
        .take(MAX_LIGHTS)
        .map(|light| {
            let slot = if light.casts_shadows {
                let slot = next_slot;
                next_slot += 1;
                if slot < shadow_slots {
                    slot as f32
                } else {
                    -1.0
                }
            } else {
                -1.0
            };
            let (position, range) = match light.kind {
                LightKind::Directional { direction: [x, y, z] } => ([x, y, z, 0.0], 0.0),
                LightKind::Point {
                    position: [x, y, z],
                    range,
                } => ([x, y, z, 1.0], range),
            };
            LightUniform {
                position,
                color: [light.color.r, light.color.g, light.color.b, light.intensity],
                params: [range, slot, 0.0, 0.0],
            }
        })
        .collect()
}

struct LightingFrame {
    pipeline: ResourceHandle,
    gbuffer: GBuffer,
    shadow_maps: Vec<ResourceHandle>,
    lit: ResourceHandle,
    lights: ResourceHandle,
}

/// Shades the [`GBuffer`] with every light into a transient color target.
///
/// Pushes the result onto [`CompositeLayers`] and publishes it as
/// [`SceneColor`]. Shadow maps are used when a [`ShadowMaps`] value was
/// published earlier in the frame.
#[derive(Default)]
pub struct LightingPass {
    pipeline: Option<PersistentId>,
    frame: Option<LightingFrame>,
}

impl LightingPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self::default()
    }

    fn pipeline_descriptor() -> PipelineDescriptor {
        PipelineDescriptor {
            label: Some("lighting-pipeline".into()),
            kind: PipelineKind::Compute {
                shader: ShaderSource::new(LIGHTING_WGSL, "cs_main"),
            },
        }
    }
}

impl RenderPass for LightingPass {
    fn name(&self) -> &str {
        "lighting"
    }

    fn queue(&self) -> QueueKind {
        QueueKind::Compute
    }

    fn create(&mut self, builder: &mut GraphBuilder<'_>) -> Result<(), GraphError> {
        let gbuffer = *builder.shared().get::<GBuffer>()?;
        for plane in [gbuffer.albedo, gbuffer.normal, gbuffer.depth] {
            builder.read(plane)?;
        }
        let shadow_maps: Vec<ResourceHandle> = if builder.shared().check::<ShadowMaps>() {
            builder
                .shared()
                .get::<ShadowMaps>()?
                .maps
                .iter()
                .map(|map| map.texture)
                .collect()
        } else {
            Vec::new()
        };
        for &map in &shadow_maps {
            builder.read(map)?;
        }

        let lit = builder.create_texture_buffer(TextureBufferDesc::new(
            "lit-color",
            TextureSize::FULL,
            LIT_FORMAT,
            TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
        ))?;
        let lights = builder.create_shader_buffer(ShaderBufferDesc::new(
            "light-uniforms",
            (MAX_LIGHTS * std::mem::size_of::<LightUniform>()) as u64,
            BufferVisibility::Uniform,
        ))?;
        let pipeline = match self.pipeline {
            Some(id) => builder.import_resource(id)?,
            None => {
                let (id, handle) = builder.create_persistent(Self::pipeline_descriptor())?;
                self.pipeline = Some(id);
                handle
            }
        };

        let shared = builder.shared_mut();
        shared
            .get_or_default::<CompositeLayers>()?
            .layers
            .push(CompositeLayer {
                texture: lit,
                opacity: 1.0,
            });
        shared.set(SceneColor { texture: lit });

        self.frame = Some(LightingFrame {
            pipeline,
            gbuffer,
            shadow_maps,
            lit,
            lights,
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> Result<(), GraphError> {
        let Some(frame) = &self.frame else {
            return Err(GraphError::NotSetUp {
                pass: self.name().to_string(),
            });
        };
        let uniforms = light_uniforms(ctx.scene(), frame.shadow_maps.len());
        ctx.write_buffer(frame.lights, 0, bytemuck::cast_slice(&uniforms))?;

        let resources = ctx.resources();
        let pipeline = resources.get_pipeline(frame.pipeline)?;
        let planes = [
            resources.get_texture_buffer(frame.gbuffer.albedo)?,
            resources.get_texture_buffer(frame.gbuffer.normal)?,
            resources.get_texture_buffer(frame.gbuffer.depth)?,
            resources.get_texture_buffer(frame.lit)?,
        ];
        let lights = resources.get_shader_buffer(frame.lights)?;
        let shadow_maps = frame
            .shadow_maps
            .iter()
            .map(|&map| resources.get_texture_buffer(map))
            .collect::<Result<Vec<_>, _>>()?;

        let size = frame.gbuffer.size;
        let mut pass = ctx.encoder().begin_compute_pass(&ComputePassDescriptor {
            label: Some("lighting".into()),
        });
        pass.set_pipeline(pipeline);
        for (binding, texture) in planes.into_iter().enumerate() {
            pass.bind_texture(binding as u32, texture);
        }
        pass.bind_buffer(4, lights);
        for (offset, texture) in shadow_maps.into_iter().enumerate() {
            pass.bind_texture(5 + offset as u32, texture);
        }
        pass.dispatch(
            size.width.div_ceil(TILE_SIZE),
            size.height.div_ceil(TILE_SIZE),
            1,
        );
        Ok(())
    }
}
