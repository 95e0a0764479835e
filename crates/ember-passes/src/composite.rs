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

//! Blends the composite layers onto the backbuffer.

use crate::screen_quad::ScreenQuad;
use crate::shaders::COMPOSITE_WGSL;
use ember_core::renderer::{
    LoadOp, Operations, PipelineDescriptor, PipelineKind, RenderPassColorAttachment,
    RenderPassDescriptor, ShaderSource, StoreOp, TextureFormat,
};
use ember_graph::{
    CompositeLayers, ExecuteContext, GraphBuilder, GraphError, PersistentId, RenderPass,
    ResourceHandle, VertexBufferDesc,
};
use std::sync::Arc;

struct CompositeFrame {
    pipeline: ResourceHandle,
    quad: ResourceHandle,
    backbuffer: ResourceHandle,
    layers: Vec<ResourceHandle>,
}

/// Clears the backbuffer to the scene's clear color and draws one
/// full-screen quad per [`CompositeLayers`] entry, bottom layer first.
///
/// The quad's vertex buffer is persistent and uploaded once.
pub struct CompositePass {
    quad: Arc<ScreenQuad>,
    pipeline: Option<PersistentId>,
    vertex_buffer: Option<PersistentId>,
    vertex_buffer_allocated: bool,
    frame: Option<CompositeFrame>,
}

impl CompositePass {
    /// Creates the pass around a shared screen quad.
    pub fn new(quad: Arc<ScreenQuad>) -> Self {
        Self {
            quad,
            pipeline: None,
            vertex_buffer: None,
            vertex_buffer_allocated: false,
            frame: None,
        }
    }

    /// Returns `true` once the quad has been uploaded.
    pub fn vertex_buffer_allocated(&self) -> bool {
        self.vertex_buffer_allocated
    }

    fn pipeline_descriptor(format: TextureFormat) -> PipelineDescriptor {
        PipelineDescriptor {
            label: Some("composite-pipeline".into()),
            kind: PipelineKind::Render {
                vertex: ShaderSource::new(COMPOSITE_WGSL, "vs_main"),
                fragment: Some(ShaderSource::new(COMPOSITE_WGSL, "fs_main")),
                color_formats: vec![format],
                depth_format: None,
            },
        }
    }
}

impl RenderPass for CompositePass {
    fn name(&self) -> &str {
        "composite"
    }

    fn create(&mut self, builder: &mut GraphBuilder<'_>) -> Result<(), GraphError> {
        let backbuffer = builder.write(builder.backbuffer())?;

        let pipeline = match self.pipeline {
            Some(id) => builder.import_resource(id)?,
            None => {
                let format = builder
                    .descriptor(backbuffer)?
                    .as_texture()
                    .map(|t| t.format)
                    .unwrap_or(TextureFormat::Bgra8UnormSrgb);
                let (id, handle) = builder.create_persistent(Self::pipeline_descriptor(format))?;
                self.pipeline = Some(id);
                handle
            }
        };
        let quad = match self.vertex_buffer {
            Some(id) => builder.import_resource(id)?,
            None => {
                let desc = VertexBufferDesc::new("screen-quad", self.quad.byte_len());
                let (id, handle) = builder.create_persistent(desc)?;
                self.vertex_buffer = Some(id);
                self.vertex_buffer_allocated = false;
                handle
            }
        };

        let layers: Vec<ResourceHandle> = if builder.shared().check::<CompositeLayers>() {
            builder
                .shared()
                .get::<CompositeLayers>()?
                .layers
                .iter()
                .map(|layer| layer.texture)
                .collect()
        } else {
            Vec::new()
        };
        for &layer in &layers {
            builder.read(layer)?;
        }

        self.frame = Some(CompositeFrame {
            pipeline,
            quad,
            backbuffer,
            layers,
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> Result<(), GraphError> {
        let Some(frame) = &self.frame else {
            return Err(GraphError::NotSetUp {
                pass: self.name().to_string(),
            });
        };
        if !self.vertex_buffer_allocated {
            ctx.write_buffer(frame.quad, 0, self.quad.bytes())?;
            self.vertex_buffer_allocated = true;
            log::debug!("CompositePass: Uploaded screen quad");
        }

        let resources = ctx.resources();
        let pipeline = resources.get_pipeline(frame.pipeline)?;
        let quad = resources.get_vertex_buffer(frame.quad)?;
        let target = resources.get_texture_buffer(frame.backbuffer)?;
        let layers = frame
            .layers
            .iter()
            .map(|&layer| resources.get_texture_buffer(layer))
            .collect::<Result<Vec<_>, _>>()?;

        let desc = RenderPassDescriptor {
            label: Some("composite".into()),
            color_attachments: vec![RenderPassColorAttachment {
                texture: target,
                ops: Operations {
                    load: LoadOp::Clear(ctx.scene().clear_color),
                    store: StoreOp::Store,
                },
            }],
            depth_attachment: None,
        };
        let vertex_count = self.quad.vertex_count();
        let mut pass = ctx.encoder().begin_render_pass(&desc);
        pass.set_pipeline(pipeline);
        pass.set_vertex_buffer(0, quad, 0);
        for layer in layers {
            pass.bind_texture(0, layer);
            pass.draw(0..vertex_count, 0..1);
        }
        Ok(())
    }
}
