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

//! Geometry of the full-screen quad used by compositing.

/// A vertex of the screen quad, in clip space with a texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    /// Clip-space position.
    pub position: [f32; 2],
    /// Texture coordinate, origin at the top left.
    pub uv: [f32; 2],
}

/// Two triangles covering the whole viewport.
///
/// Built once at renderer initialisation and shared by the passes that need it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenQuad {
    vertices: [QuadVertex; 6],
}

impl Default for ScreenQuad {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenQuad {
    /// Builds the quad.
    pub fn new() -> Self {
        let vertex = |x: f32, y: f32| QuadVertex {
            position: [x, y],
            uv: [(x + 1.0) * 0.5, (1.0 - y) * 0.5],
        };
        Self {
            vertices: [
                vertex(-1.0, -1.0),
                vertex(1.0, -1.0),
                vertex(1.0, 1.0),
                vertex(-1.0, -1.0),
                vertex(1.0, 1.0),
                vertex(-1.0, 1.0),
            ],
        }
    }

    /// The vertices, two counter-clockwise triangles.
    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    /// Number of vertices to draw.
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// The vertices as raw bytes, ready for upload.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Size of [`bytes`](Self::bytes).
    pub fn byte_len(&self) -> u64 {
        std::mem::size_of_val(&self.vertices) as u64
    }
}
