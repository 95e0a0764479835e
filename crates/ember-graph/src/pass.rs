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

//! The contract every render pass implements.

use crate::builder::GraphBuilder;
use crate::context::ExecuteContext;
use crate::error::GraphError;
use ember_core::math::Extent2D;
use ember_core::renderer::QueueKind;

/// One stage of the frame: declares its resources during setup, then records
/// GPU work during execute.
///
/// Setup runs every frame. The first time it calls [`create`](Self::create);
/// afterwards it calls [`recreate`](Self::recreate), which lets passes that
/// own persistent resources simply re-import them.
pub trait RenderPass: Send {
    /// Unique, human-readable name. Used in errors and logs.
    fn name(&self) -> &str;

    /// Queue this pass records on.
    fn queue(&self) -> QueueKind {
        QueueKind::Render
    }

    /// First-frame setup.
    fn create(&mut self, builder: &mut GraphBuilder<'_>) -> Result<(), GraphError>;

    /// Setup on every later frame.
    ///
    /// [`GraphBuilder::rebuild_requested`] tells whether
    /// [`should_rebuild`](Self::should_rebuild) asked for new resources.
    fn recreate(&mut self, builder: &mut GraphBuilder<'_>) -> Result<(), GraphError> {
        self.create(builder)
    }

    /// Returns `true` if the pass's persistent resources no longer fit `backbuffer_size`.
    fn should_rebuild(&self, backbuffer_size: Extent2D) -> bool {
        let _ = backbuffer_size;
        false
    }

    /// Records the pass's commands.
    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> Result<(), GraphError>;
}

/// Where a pass is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassState {
    /// Never set up.
    #[default]
    Uninitialized,
    /// Set up for the current frame.
    SetUp,
    /// Recording commands.
    Executing,
    /// Its resources were built for an older backbuffer size.
    StaleOnResize,
}
