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

//! Everything a pass can reach while recording its commands.

use crate::error::GraphError;
use crate::handle::ResourceHandle;
use crate::pass_resources::PassResources;
use crate::shared::SharedResourceRegistry;
use ember_core::math::Extent2D;
use ember_core::renderer::{CommandEncoder, GraphicsDevice, ResourceError};
use ember_core::scene::Scene;

/// Per-pass execution context.
pub struct ExecuteContext<'a> {
    resources: PassResources<'a>,
    encoder: &'a mut dyn CommandEncoder,
    device: &'a dyn GraphicsDevice,
    shared: &'a mut SharedResourceRegistry,
    scene: &'a Scene,
    frame_index: u64,
    backbuffer_size: Extent2D,
}

impl<'a> ExecuteContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        resources: PassResources<'a>,
        encoder: &'a mut dyn CommandEncoder,
        device: &'a dyn GraphicsDevice,
        shared: &'a mut SharedResourceRegistry,
        scene: &'a Scene,
        frame_index: u64,
        backbuffer_size: Extent2D,
    ) -> Self {
        Self {
            resources,
            encoder,
            device,
            shared,
            scene,
            frame_index,
            backbuffer_size,
        }
    }

    /// Physical objects of the resources this pass declared.
    pub fn resources(&self) -> &PassResources<'a> {
        &self.resources
    }

    /// The encoder recording this pass's command buffer.
    pub fn encoder(&mut self) -> &mut dyn CommandEncoder {
        &mut *self.encoder
    }

    /// The device, for uploads outside of the command stream.
    pub fn device(&self) -> &'a dyn GraphicsDevice {
        self.device
    }

    /// The scene being rendered.
    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    /// Shared resources published by earlier passes.
    pub fn shared(&self) -> &SharedResourceRegistry {
        &*self.shared
    }

    /// Shared resources, mutably.
    pub fn shared_mut(&mut self) -> &mut SharedResourceRegistry {
        &mut *self.shared
    }

    /// Index of the frame being executed.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Current backbuffer size.
    pub fn backbuffer_size(&self) -> Extent2D {
        self.backbuffer_size
    }

    /// Records an upload of `data` into a declared shader or vertex buffer.
    ///
    /// The upload is part of this pass's command buffer, so it lands right
    /// before the pass's own commands and never disturbs an earlier pass that
    /// shares the same backend buffer. Must not be called while a render or
    /// compute pass is being recorded.
    pub fn write_buffer(
        &mut self,
        handle: ResourceHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphError> {
        let buffer = self.resources.get_buffer(handle)?;
        let size = self
            .resources
            .descriptor(handle)?
            .as_buffer()
            .map_or(0, |desc| desc.size);
        let fits = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= size);
        if !fits {
            return Err(ResourceError::OutOfBounds.into());
        }
        self.encoder.write_buffer(buffer, offset, data);
        Ok(())
    }
}
