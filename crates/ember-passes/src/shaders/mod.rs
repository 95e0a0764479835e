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

//! Built-in WGSL sources for the example passes.
//!
//! The sources are embedded at compile time and handed to pipeline
//! descriptors as-is; the backend compiles them.

/// Depth-only rendering into a shadow map. Entry point: `vs_main`.
pub const SHADOW_WGSL: &str = include_str!("shadow.wgsl");

/// Geometry pass filling the albedo and normal planes.
///
/// Entry points: `vs_main`, `fs_main`.
pub const GBUFFER_WGSL: &str = include_str!("gbuffer.wgsl");

/// Tiled deferred lighting over the g-buffer, 8x8 threads per group.
/// Entry point: `cs_main`.
pub const LIGHTING_WGSL: &str = include_str!("lighting.wgsl");

/// Full-screen quad blending one layer onto the backbuffer.
pub const COMPOSITE_WGSL: &str = include_str!("composite.wgsl");
