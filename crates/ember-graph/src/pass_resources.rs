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

//! Read-only view of the physical objects a pass may touch while executing.

use crate::error::GraphError;
use crate::handle::ResourceHandle;
use crate::resource::{PhysicalResource, ResourceDescriptor, ResourceKind, VirtualResource};
use ember_core::renderer::{BufferId, PipelineId, TextureId};

/// Resolves handles to backend objects for one pass.
///
/// Only handles the pass created, imported, read or wrote during setup resolve.
pub struct PassResources<'g> {
    pass: &'g str,
    generation: u32,
    declared: &'g [ResourceHandle],
    resources: &'g [VirtualResource],
    bindings: &'g [Option<PhysicalResource>],
}

impl<'g> PassResources<'g> {
    pub(crate) fn new(
        pass: &'g str,
        generation: u32,
        declared: &'g [ResourceHandle],
        resources: &'g [VirtualResource],
        bindings: &'g [Option<PhysicalResource>],
    ) -> Self {
        Self {
            pass,
            generation,
            declared,
            resources,
            bindings,
        }
    }

    /// Name of the pass this view belongs to.
    pub fn pass_name(&self) -> &'g str {
        self.pass
    }

    fn lookup(
        &self,
        handle: ResourceHandle,
    ) -> Result<(&'g VirtualResource, Option<PhysicalResource>), GraphError> {
        if handle.generation() != self.generation {
            return Err(GraphError::StaleHandle {
                pass: self.pass.to_string(),
                handle,
                current_generation: self.generation,
            });
        }
        if !self.declared.contains(&handle) {
            return Err(GraphError::UndeclaredHandle {
                pass: self.pass.to_string(),
                handle,
            });
        }
        let resource = self
            .resources
            .get(handle.slot())
            .ok_or_else(|| GraphError::UnknownHandle {
                pass: self.pass.to_string(),
                handle,
            })?;
        Ok((resource, self.bindings.get(handle.slot()).copied().flatten()))
    }

    fn physical(
        &self,
        handle: ResourceHandle,
        expected: ResourceKind,
    ) -> Result<PhysicalResource, GraphError> {
        let (resource, physical) = self.lookup(handle)?;
        let actual = resource.descriptor.kind();
        if actual != expected {
            return Err(GraphError::KindMismatch {
                pass: self.pass.to_string(),
                handle,
                expected,
                actual,
            });
        }
        physical.ok_or_else(|| GraphError::UnknownHandle {
            pass: self.pass.to_string(),
            handle,
        })
    }

    /// Descriptor of a declared resource.
    pub fn descriptor(&self, handle: ResourceHandle) -> Result<&'g ResourceDescriptor, GraphError> {
        self.lookup(handle).map(|(resource, _)| &resource.descriptor)
    }

    /// Debug name of a declared resource.
    pub fn name(&self, handle: ResourceHandle) -> Result<&'g str, GraphError> {
        self.lookup(handle).map(|(resource, _)| resource.name.as_str())
    }

    /// Backend texture of a declared texture buffer.
    pub fn get_texture_buffer(&self, handle: ResourceHandle) -> Result<TextureId, GraphError> {
        match self.physical(handle, ResourceKind::TextureBuffer)? {
            PhysicalResource::Texture(id) => Ok(id),
            _ => Err(self.backend_mismatch(handle, ResourceKind::TextureBuffer)),
        }
    }

    /// Backend buffer of a declared uniform or storage buffer.
    pub fn get_shader_buffer(&self, handle: ResourceHandle) -> Result<BufferId, GraphError> {
        self.buffer(handle, ResourceKind::ShaderBuffer)
    }

    /// Backend buffer of a declared vertex buffer.
    pub fn get_vertex_buffer(&self, handle: ResourceHandle) -> Result<BufferId, GraphError> {
        self.buffer(handle, ResourceKind::VertexBuffer)
    }

    /// Backend pipeline of a declared pipeline.
    pub fn get_pipeline(&self, handle: ResourceHandle) -> Result<PipelineId, GraphError> {
        match self.physical(handle, ResourceKind::Pipeline)? {
            PhysicalResource::Pipeline(id) => Ok(id),
            _ => Err(self.backend_mismatch(handle, ResourceKind::Pipeline)),
        }
    }

    /// Backend buffer of a declared shader or vertex buffer, whichever it is.
    pub fn get_buffer(&self, handle: ResourceHandle) -> Result<BufferId, GraphError> {
        let (resource, _) = self.lookup(handle)?;
        match resource.descriptor.kind() {
            ResourceKind::VertexBuffer => self.get_vertex_buffer(handle),
            _ => self.get_shader_buffer(handle),
        }
    }

    fn buffer(&self, handle: ResourceHandle, kind: ResourceKind) -> Result<BufferId, GraphError> {
        match self.physical(handle, kind)? {
            PhysicalResource::Buffer(id) => Ok(id),
            _ => Err(self.backend_mismatch(handle, kind)),
        }
    }

    fn backend_mismatch(&self, handle: ResourceHandle, expected: ResourceKind) -> GraphError {
        GraphError::KindMismatch {
            pass: self.pass.to_string(),
            handle,
            expected,
            actual: self
                .resources
                .get(handle.slot())
                .map(|r| r.descriptor.kind())
                .unwrap_or(expected),
        }
    }
}
