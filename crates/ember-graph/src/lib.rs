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

//! # Ember Graph
//!
//! The frame graph core. Every frame, the [`Runtime`] asks each pass of its
//! [`Pipeline`] to declare the resources it creates, reads and writes through a
//! [`GraphBuilder`]. The builder compiles those declarations into a
//! [`CompiledGraph`], which binds logical [`ResourceHandle`]s to backend objects
//! and hands each pass a [`PassResources`] view while it records commands.
//!
//! Execution order is the pipeline's declaration order. Dependency tracking
//! validates that every read has a producer; it never reorders passes.
//!
//! ```text
//! Pipeline ──setup──▶ GraphBuilder ──compile──▶ CompiledGraph ──realize──▶ execute ──▶ submit
//!                         │                          │
//!                 PersistentRegistry           TransientPool
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod compiled;
pub mod context;
pub mod error;
pub mod handle;
pub mod pass;
pub mod pass_resources;
pub mod persistent;
pub mod pipeline;
pub mod resource;
pub mod runtime;
pub mod shared;
pub mod transient_pool;

pub use builder::GraphBuilder;
pub use compiled::{CompiledGraph, DependencyEdge, Lifetime, RealizeStats};
pub use context::ExecuteContext;
pub use error::GraphError;
pub use handle::{PassId, ResourceHandle};
pub use pass::{PassState, RenderPass};
pub use pass_resources::PassResources;
pub use persistent::{PersistentId, PersistentRegistry};
pub use pipeline::Pipeline;
pub use resource::{
    BufferVisibility, PhysicalResource, ResourceDesc, ResourceDescriptor, ResourceKind,
    ResourceOrigin, ShaderBufferDesc, TextureBufferDesc, TextureSize, VertexBufferDesc,
};
pub use runtime::{FrameReport, Runtime, SubmissionInfo, BACKBUFFER_LABEL};
pub use shared::{
    CompositeLayer, CompositeLayers, GBuffer, SceneColor, ShadowMap, ShadowMaps, SharedResource,
    SharedResourceName, SharedResourceRegistry, SharedValue,
};
pub use transient_pool::{PoolFrameStats, TransientPool};
