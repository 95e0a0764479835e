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

//! # Ember Passes
//!
//! Example passes built on `ember-graph`, wired together by
//! [`default_pipeline`]:
//!
//! 1. [`ShadowPass`] renders transient shadow maps and publishes `ShadowMaps`.
//! 2. [`GBufferPass`] fills persistent, backbuffer-sized planes and publishes `GBuffer`.
//! 3. [`LightingPass`] shades the g-buffer on the compute queue and pushes a composite layer.
//! 4. [`CompositePass`] blends every layer onto the backbuffer.
//!
//! Producers of shared resources come before their consumers; the shared
//! registry is not part of dependency tracking.

#![warn(missing_docs)]

pub mod composite;
pub mod gbuffer;
pub mod lighting;
pub mod screen_quad;
pub mod shaders;
pub mod shadow;

pub use composite::CompositePass;
pub use gbuffer::GBufferPass;
pub use lighting::{light_uniforms, LightUniform, LightingPass};
pub use screen_quad::{QuadVertex, ScreenQuad};
pub use shadow::ShadowPass;

use ember_graph::Pipeline;
use std::sync::Arc;

/// Assembles Shadow, GBuffer, Lighting and Composite, in that order.
pub fn default_pipeline(quad: &Arc<ScreenQuad>, shadow_slots: usize) -> Pipeline {
    Pipeline::new()
        .with_pass(ShadowPass::new(shadow_slots))
        .with_pass(GBufferPass::new())
        .with_pass(LightingPass::new())
        .with_pass(CompositePass::new(Arc::clone(quad)))
}
