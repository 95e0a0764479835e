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

//! Collects each pass's resource declarations and compiles them into a [`CompiledGraph`].

use crate::compiled::{CompiledGraph, DependencyEdge, Lifetime, PassNode};
use crate::error::GraphError;
use crate::handle::{PassId, ResourceHandle};
use crate::persistent::{PersistentId, PersistentRegistry};
use crate::resource::{
    ResourceDesc, ResourceDescriptor, ResourceOrigin, ShaderBufferDesc, TextureBufferDesc,
    VertexBufferDesc, VirtualResource,
};
use crate::shared::SharedResourceRegistry;
use ahash::AHashMap;
use ember_core::math::Extent2D;
use ember_core::renderer::{PipelineDescriptor, QueueKind};

/// Accumulates the passes' declared creates, reads and writes for one frame.
///
/// Handles returned by the builder carry the frame's generation. They are
/// valid in the declaring pass's `execute`, and in later passes only if those
/// passes declare them through [`read`](Self::read) or [`write`](Self::write).
///
/// Every per-pass operation must happen between [`begin_pass`](Self::begin_pass)
/// and [`end_pass`](Self::end_pass); the [`Pipeline`](crate::Pipeline) takes
/// care of that.
pub struct GraphBuilder<'a> {
    generation: u32,
    frame_index: u64,
    backbuffer_size: Extent2D,
    backbuffer: ResourceHandle,
    rebuild_requested: bool,
    persistent: &'a mut PersistentRegistry,
    shared: &'a mut SharedResourceRegistry,
    resources: Vec<VirtualResource>,
    imported: AHashMap<PersistentId, ResourceHandle>,
    passes: Vec<PassNode>,
    current: Option<usize>,
}

impl<'a> GraphBuilder<'a> {
    /// Starts a graph for `frame_index`, importing the backbuffer.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownPersistent`] if `backbuffer` is not a live registry entry.
    pub fn new(
        frame_index: u64,
        backbuffer_size: Extent2D,
        backbuffer: PersistentId,
        persistent: &'a mut PersistentRegistry,
        shared: &'a mut SharedResourceRegistry,
    ) -> Result<Self, GraphError> {
        if !persistent.contains(backbuffer) {
            return Err(GraphError::UnknownPersistent { id: backbuffer });
        }
        let generation = frame_index as u32;
        let resource = VirtualResource {
            name: persistent.name(backbuffer)?.to_string(),
            descriptor: persistent.descriptor(backbuffer)?.clone(),
            origin: ResourceOrigin::Backbuffer(backbuffer),
            creator: None,
        };
        let handle = ResourceHandle::new(0, generation);
        let mut imported = AHashMap::new();
        imported.insert(backbuffer, handle);
        Ok(Self {
            generation,
            frame_index,
            backbuffer_size,
            backbuffer: handle,
            rebuild_requested: false,
            persistent,
            shared,
            resources: vec![resource],
            imported,
            passes: Vec::new(),
            current: None,
        })
    }

    // ── Frame information ─────────────────────────────────────────────────

    /// Generation stamped on every handle of this graph.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Index of the frame being built.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Handle of the presented render target. Passes must still declare it.
    pub fn backbuffer(&self) -> ResourceHandle {
        self.backbuffer
    }

    /// Current backbuffer size.
    pub fn backbuffer_size(&self) -> Extent2D {
        self.backbuffer_size
    }

    /// `true` while setting up a pass whose `should_rebuild` returned `true`.
    pub fn rebuild_requested(&self) -> bool {
        self.rebuild_requested
    }

    pub(crate) fn set_rebuild_requested(&mut self, requested: bool) {
        self.rebuild_requested = requested;
    }

    /// The shared resource registry.
    pub fn shared(&self) -> &SharedResourceRegistry {
        &*self.shared
    }

    /// The shared resource registry, mutably.
    pub fn shared_mut(&mut self) -> &mut SharedResourceRegistry {
        &mut *self.shared
    }

    /// The persistent registry, for inspecting descriptors.
    pub fn persistent(&self) -> &PersistentRegistry {
        &*self.persistent
    }

    /// Descriptor of any resource of this graph.
    pub fn descriptor(&self, handle: ResourceHandle) -> Result<&ResourceDescriptor, GraphError> {
        self.validate(handle)?;
        Ok(&self.resources[handle.slot()].descriptor)
    }

    // ── Pass scoping ──────────────────────────────────────────────────────

    /// Opens the declaration scope of the next pass in execution order.
    pub fn begin_pass(&mut self, name: impl Into<String>, queue: QueueKind) -> PassId {
        self.end_pass();
        let id = PassId(self.passes.len() as u32);
        self.passes.push(PassNode::new(id, name.into(), queue));
        self.current = Some(id.index());
        id
    }

    /// Closes the current pass scope.
    pub fn end_pass(&mut self) {
        self.current = None;
        self.rebuild_requested = false;
    }

    fn current_pass(&mut self, operation: &'static str) -> Result<&mut PassNode, GraphError> {
        match self.current {
            Some(index) => Ok(&mut self.passes[index]),
            None => Err(GraphError::NoActivePass { operation }),
        }
    }

    fn current_name(&self) -> String {
        self.current
            .map(|index| self.passes[index].name.clone())
            .unwrap_or_else(|| "<no pass>".to_string())
    }

    fn push_resource(
        &mut self,
        name: String,
        descriptor: ResourceDescriptor,
        origin: ResourceOrigin,
        creator: Option<PassId>,
    ) -> ResourceHandle {
        let handle = ResourceHandle::new(self.resources.len() as u32, self.generation);
        self.resources.push(VirtualResource {
            name,
            descriptor,
            origin,
            creator,
        });
        handle
    }

    // ── Transient resources ───────────────────────────────────────────────

    fn create_transient(
        &mut self,
        operation: &'static str,
        name: String,
        descriptor: ResourceDescriptor,
    ) -> Result<ResourceHandle, GraphError> {
        let pass = self.current_pass(operation)?.id;
        let handle = self.push_resource(name, descriptor, ResourceOrigin::Transient, Some(pass));
        self.passes[pass.index()].add_create(handle);
        Ok(handle)
    }

    /// Declares a texture owned by this frame's graph.
    ///
    /// Backbuffer-relative sizes are resolved against the current backbuffer.
    pub fn create_texture_buffer(
        &mut self,
        desc: TextureBufferDesc,
    ) -> Result<ResourceHandle, GraphError> {
        let descriptor = ResourceDescriptor::Texture(desc.resolve(self.backbuffer_size));
        self.create_transient("create_texture_buffer", desc.label.into_owned(), descriptor)
    }

    /// Declares a uniform or storage buffer owned by this frame's graph.
    pub fn create_shader_buffer(
        &mut self,
        desc: ShaderBufferDesc,
    ) -> Result<ResourceHandle, GraphError> {
        let descriptor = ResourceDescriptor::ShaderBuffer(desc.resolve());
        self.create_transient("create_shader_buffer", desc.label.into_owned(), descriptor)
    }

    /// Declares a vertex buffer owned by this frame's graph.
    pub fn create_vertex_buffer(
        &mut self,
        desc: VertexBufferDesc,
    ) -> Result<ResourceHandle, GraphError> {
        let descriptor = ResourceDescriptor::VertexBuffer(desc.resolve());
        self.create_transient("create_vertex_buffer", desc.label.into_owned(), descriptor)
    }

    /// Declares a pipeline owned by this frame's graph.
    ///
    /// Pooled pipelines are reused across frames when the descriptor matches,
    /// but passes that want explicit ownership should use
    /// [`create_persistent`](Self::create_persistent).
    pub fn create_pipeline(
        &mut self,
        desc: PipelineDescriptor,
    ) -> Result<ResourceHandle, GraphError> {
        let name = desc
            .label
            .as_deref()
            .unwrap_or("pipeline")
            .to_string();
        self.create_transient("create_pipeline", name, ResourceDescriptor::Pipeline(desc))
    }

    // ── Persistent resources ──────────────────────────────────────────────

    /// Registers a resource that survives the frame and imports it into this graph.
    ///
    /// The backing object is allocated before the first execute that needs it.
    /// Next frames obtain a new handle through [`import_resource`](Self::import_resource).
    pub fn create_persistent(
        &mut self,
        desc: impl Into<ResourceDesc>,
    ) -> Result<(PersistentId, ResourceHandle), GraphError> {
        self.current_pass("create_persistent")?;
        let descriptor = desc.into().resolve(self.backbuffer_size);
        let name = descriptor.label().unwrap_or("persistent").to_string();
        let id = self.persistent.register(name, descriptor);
        let handle = self.import_resource(id)?;
        Ok((id, handle))
    }

    /// Imports a persistent resource into this frame's graph.
    ///
    /// Importing the same resource from several passes yields the same handle.
    pub fn import_resource(&mut self, id: PersistentId) -> Result<ResourceHandle, GraphError> {
        self.current_pass("import_resource")?;
        if !self.persistent.contains(id) {
            return Err(GraphError::UnknownPersistent { id });
        }
        let handle = match self.imported.get(&id) {
            Some(&handle) => handle,
            None => {
                let name = self.persistent.name(id)?.to_string();
                let descriptor = self.persistent.descriptor(id)?.clone();
                let handle =
                    self.push_resource(name, descriptor, ResourceOrigin::Persistent(id), None);
                self.imported.insert(id, handle);
                handle
            }
        };
        self.current_pass("import_resource")?.add_import(handle);
        Ok(handle)
    }

    /// Schedules a persistent resource for destruction once this frame's work is submitted.
    ///
    /// # Errors
    ///
    /// [`GraphError::DoubleRelease`] if it was already released.
    pub fn release_persistent(&mut self, id: PersistentId) -> Result<(), GraphError> {
        self.persistent.release(id)
    }

    // ── Dependencies ──────────────────────────────────────────────────────

    fn validate(&self, handle: ResourceHandle) -> Result<(), GraphError> {
        if handle.generation() != self.generation {
            return Err(GraphError::StaleHandle {
                pass: self.current_name(),
                handle,
                current_generation: self.generation,
            });
        }
        if handle.slot() >= self.resources.len() {
            return Err(GraphError::UnknownHandle {
                pass: self.current_name(),
                handle,
            });
        }
        Ok(())
    }

    /// Declares that the current pass reads `handle`.
    ///
    /// Creates a dependency edge from the most recent producer of the resource.
    pub fn read(&mut self, handle: ResourceHandle) -> Result<ResourceHandle, GraphError> {
        self.current_pass("read")?;
        self.validate(handle)?;
        self.current_pass("read")?.add_read(handle);
        Ok(handle)
    }

    /// Declares that the current pass writes `handle`.
    ///
    /// Later readers depend on this pass.
    pub fn write(&mut self, handle: ResourceHandle) -> Result<ResourceHandle, GraphError> {
        self.current_pass("write")?;
        self.validate(handle)?;
        self.current_pass("write")?.add_write(handle);
        Ok(handle)
    }

    // ── Compilation ───────────────────────────────────────────────────────

    /// Validates the declarations and produces the frame's compiled graph.
    ///
    /// Passes keep their declaration order. For each read, the most recent
    /// earlier creator or writer of the resource becomes its producer; a
    /// transient read with no producer fails with [`GraphError::ReadBeforeWrite`].
    pub fn compile(mut self) -> Result<CompiledGraph, GraphError> {
        self.end_pass();
        let resource_count = self.resources.len();
        let mut last_producer: Vec<Option<PassId>> = vec![None; resource_count];
        let mut lifetimes: Vec<Option<Lifetime>> = vec![None; resource_count];
        let mut edges: Vec<DependencyEdge> = Vec::new();

        for pass in &self.passes {
            for &handle in &pass.reads {
                let resource = &self.resources[handle.slot()];
                match last_producer[handle.slot()] {
                    Some(producer) if producer != pass.id => {
                        let edge = DependencyEdge {
                            producer,
                            consumer: pass.id,
                            resource: handle,
                        };
                        if !edges.contains(&edge) {
                            edges.push(edge);
                        }
                    }
                    Some(_) => {}
                    None => {
                        let own = resource.creator == Some(pass.id);
                        if resource.origin == ResourceOrigin::Transient && !own {
                            return Err(GraphError::ReadBeforeWrite {
                                pass: pass.name.clone(),
                                handle,
                                resource: resource.name.clone(),
                            });
                        }
                    }
                }
            }
            for &handle in pass.creates.iter().chain(&pass.writes) {
                last_producer[handle.slot()] = Some(pass.id);
            }
            for &handle in &pass.declared {
                let lifetime = lifetimes[handle.slot()].get_or_insert(Lifetime {
                    first: pass.id,
                    last: pass.id,
                });
                lifetime.last = pass.id;
            }
        }

        // Each persistent entry is imported once per graph, see `import_resource`.
        let persistent_ids: Vec<PersistentId> = self
            .resources
            .iter()
            .filter_map(|r| r.origin.persistent_id())
            .collect();

        log::debug!(
            "GraphBuilder: Compiled frame {} with {} passes, {} resources, {} edges",
            self.frame_index,
            self.passes.len(),
            resource_count,
            edges.len()
        );

        Ok(CompiledGraph::new(
            self.generation,
            self.frame_index,
            self.backbuffer_size,
            self.passes,
            self.resources,
            edges,
            lifetimes,
            persistent_ids,
        ))
    }
}
