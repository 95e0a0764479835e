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

//! Pipeline descriptors for render and compute pipelines.

use crate::renderer::api::texture::TextureFormat;
use std::borrow::Cow;

/// The programmable stage a shader entry point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage.
    Vertex,
    /// Fragment shader stage.
    Fragment,
    /// Compute shader stage.
    Compute,
}

/// Source code and entry point for a single shader stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSource {
    /// Shader code (WGSL).
    pub code: Cow<'static, str>,
    /// Name of the entry point function.
    pub entry_point: Cow<'static, str>,
}

impl ShaderSource {
    /// Creates a shader source from static code and an entry point.
    pub const fn new(code: &'static str, entry_point: &'static str) -> Self {
        Self {
            code: Cow::Borrowed(code),
            entry_point: Cow::Borrowed(entry_point),
        }
    }
}

/// What kind of pipeline to build, along with its kind-specific state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// A rasterization pipeline.
    Render {
        /// Vertex stage.
        vertex: ShaderSource,
        /// Optional fragment stage. Depth-only pipelines omit it.
        fragment: Option<ShaderSource>,
        /// Formats of the color targets, in attachment order.
        color_formats: Vec<TextureFormat>,
        /// Format of the depth target, if any.
        depth_format: Option<TextureFormat>,
    },
    /// A compute pipeline.
    Compute {
        /// Compute stage.
        shader: ShaderSource,
    },
}

/// A descriptor used to create a [`PipelineId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDescriptor {
    /// An optional debug label for the pipeline.
    pub label: Option<Cow<'static, str>>,
    /// The pipeline's stages and fixed-function state.
    pub kind: PipelineKind,
}

impl PipelineDescriptor {
    /// Iterates the shader stages present in this descriptor.
    pub fn stages(&self) -> Vec<(ShaderStage, &ShaderSource)> {
        match &self.kind {
            PipelineKind::Render {
                vertex, fragment, ..
            } => {
                let mut stages = vec![(ShaderStage::Vertex, vertex)];
                if let Some(fragment) = fragment {
                    stages.push((ShaderStage::Fragment, fragment));
                }
                stages
            }
            PipelineKind::Compute { shader } => vec![(ShaderStage::Compute, shader)],
        }
    }

    /// Returns `true` for compute pipelines.
    pub fn is_compute(&self) -> bool {
        matches!(self.kind, PipelineKind::Compute { .. })
    }
}

/// An opaque handle to a compiled pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub usize);
