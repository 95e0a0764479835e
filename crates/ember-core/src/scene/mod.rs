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

//! The per-frame scene description consumed by render passes.
//!
//! Geometry is uploaded before the graph exists; the scene only references
//! the resulting buffers.

use crate::math::LinearRgba;
use crate::renderer::BufferId;

/// A single drawable object with already-uploaded geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderObject {
    /// The vertex buffer to bind.
    pub vertex_buffer: BufferId,
    /// The number of vertices to draw.
    pub vertex_count: u32,
    /// Whether the object is drawn into shadow maps.
    pub casts_shadows: bool,
}

/// The shape of a light source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// An infinitely distant light shining along `direction`.
    Directional {
        /// Direction the light travels in.
        direction: [f32; 3],
    },
    /// A light radiating from `position` up to `range`.
    Point {
        /// World-space position.
        position: [f32; 3],
        /// Maximum distance of influence.
        range: f32,
    },
}

/// A light source in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Shape and placement of the light.
    pub kind: LightKind,
    /// Color of the light.
    pub color: LinearRgba,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Whether the light renders a shadow map.
    pub casts_shadows: bool,
}

/// Everything the passes need to render one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    /// Objects to draw.
    pub objects: Vec<RenderObject>,
    /// Lights affecting the objects.
    pub lights: Vec<Light>,
    /// Color the backbuffer is cleared to.
    pub clear_color: LinearRgba,
}

impl Scene {
    /// Objects that are drawn into shadow maps.
    pub fn shadow_casters(&self) -> impl Iterator<Item = &RenderObject> {
        self.objects.iter().filter(|o| o.casts_shadows)
    }

    /// Lights that render a shadow map.
    pub fn shadowed_lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter().filter(|l| l.casts_shadows)
    }
}
