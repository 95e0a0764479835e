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

//! The validated, ordered form of a frame graph and its physical bindings.

use crate::error::GraphError;
use crate::handle::{PassId, ResourceHandle};
use crate::pass_resources::PassResources;
use crate::persistent::{PersistentId, PersistentRegistry};
use crate::resource::{PhysicalResource, ResourceDescriptor, ResourceOrigin, VirtualResource};
use crate::transient_pool::TransientPool;
use ahash::AHashSet;
use ember_core::math::Extent2D;
use ember_core::renderer::{GraphicsDevice, QueueKind};

/// Declarations of one pass, in the order they were made.
#[derive(Debug, Clone)]
pub(crate) struct PassNode {
    pub(crate) id: PassId,
    pub(crate) name: String,
    pub(crate) queue: QueueKind,
    pub(crate) creates: Vec<ResourceHandle>,
    pub(crate) imports: Vec<ResourceHandle>,
    pub(crate) reads: Vec<ResourceHandle>,
    pub(crate) writes: Vec<ResourceHandle>,
    /// Union of all the above.
    pub(crate) declared: Vec<ResourceHandle>,
}

impl PassNode {
    pub(crate) fn new(id: PassId, name: String, queue: QueueKind) -> Self {
        Self {
            id,
            name,
            queue,
            creates: Vec::new(),
            imports: Vec::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            declared: Vec::new(),
        }
    }

    fn declare(&mut self, handle: ResourceHandle) {
        if !self.declared.contains(&handle) {
            self.declared.push(handle);
        }
    }

    pub(crate) fn add_create(&mut self, handle: ResourceHandle) {
        self.creates.push(handle);
        self.declare(handle);
    }

    pub(crate) fn add_import(&mut self, handle: ResourceHandle) {
        if !self.imports.contains(&handle) {
            self.imports.push(handle);
        }
        self.declare(handle);
    }

    pub(crate) fn add_read(&mut self, handle: ResourceHandle) {
        if !self.reads.contains(&handle) {
            self.reads.push(handle);
        }
        self.declare(handle);
    }

    pub(crate) fn add_write(&mut self, handle: ResourceHandle) {
        if !self.writes.contains(&handle) {
            self.writes.push(handle);
        }
        self.declare(handle);
    }
}

/// `consumer` reads `resource` after `producer` created or wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    /// The pass that produced the resource contents.
    pub producer: PassId,
    /// The pass that reads them.
    pub consumer: PassId,
    /// The resource carrying the dependency.
    pub resource: ResourceHandle,
}

/// First and last pass declaring a resource, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    /// First pass touching the resource.
    pub first: PassId,
    /// Last pass touching the resource.
    pub last: PassId,
}

impl Lifetime {
    /// Returns `true` if both lifetimes share at least one pass.
    pub fn overlaps(&self, other: &Lifetime) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

/// Outcome of [`CompiledGraph::realize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RealizeStats {
    /// Transient resources bound for this frame.
    pub transients: usize,
    /// Transient resources sharing a backend object with an earlier one this frame.
    pub aliased: usize,
}

/// A frame graph ready to execute.
///
/// Passes keep their declaration order, which is always a valid topological
/// order of the dependency edges since a pass can only consume what earlier
/// passes produced.
#[derive(Debug)]
pub struct CompiledGraph {
    generation: u32,
    frame_index: u64,
    backbuffer_size: Extent2D,
    passes: Vec<PassNode>,
    resources: Vec<VirtualResource>,
    edges: Vec<DependencyEdge>,
    lifetimes: Vec<Option<Lifetime>>,
    persistent_ids: Vec<PersistentId>,
    bindings: Vec<Option<PhysicalResource>>,
    held: Vec<bool>,
}

impl CompiledGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        generation: u32,
        frame_index: u64,
        backbuffer_size: Extent2D,
        passes: Vec<PassNode>,
        resources: Vec<VirtualResource>,
        edges: Vec<DependencyEdge>,
        lifetimes: Vec<Option<Lifetime>>,
        persistent_ids: Vec<PersistentId>,
    ) -> Self {
        let count = resources.len();
        Self {
            generation,
            frame_index,
            backbuffer_size,
            passes,
            resources,
            edges,
            lifetimes,
            persistent_ids,
            bindings: vec![None; count],
            held: vec![false; count],
        }
    }

    /// Generation of every handle in this graph.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Frame this graph was built for.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Backbuffer size the graph was built against.
    pub fn backbuffer_size(&self) -> Extent2D {
        self.backbuffer_size
    }

    /// Number of passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Passes in execution order.
    pub fn pass_ids(&self) -> impl Iterator<Item = PassId> + '_ {
        self.passes.iter().map(|pass| pass.id)
    }

    /// Name of `pass`.
    pub fn pass_name(&self, pass: PassId) -> Option<&str> {
        self.passes.get(pass.index()).map(|p| p.name.as_str())
    }

    /// Queue `pass` records on.
    pub fn pass_queue(&self, pass: PassId) -> Option<QueueKind> {
        self.passes.get(pass.index()).map(|p| p.queue)
    }

    /// Every dependency edge, grouped by consumer in execution order.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Passes `pass` depends on.
    pub fn dependencies_of(&self, pass: PassId) -> impl Iterator<Item = PassId> + '_ {
        self.edges
            .iter()
            .filter(move |edge| edge.consumer == pass)
            .map(|edge| edge.producer)
    }

    /// Number of logical resources, the backbuffer included.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of transient resources.
    pub fn transient_count(&self) -> usize {
        self.resources
            .iter()
            .filter(|r| r.origin == ResourceOrigin::Transient)
            .count()
    }

    /// Lifetime of `handle`, or `None` if no pass declared it.
    pub fn lifetime(&self, handle: ResourceHandle) -> Option<Lifetime> {
        self.lookup(handle)?;
        self.lifetimes[handle.slot()]
    }

    /// Descriptor of `handle`.
    pub fn descriptor(&self, handle: ResourceHandle) -> Option<&ResourceDescriptor> {
        self.lookup(handle).map(|r| &r.descriptor)
    }

    /// Backend object bound to `handle`, once realized.
    pub fn binding(&self, handle: ResourceHandle) -> Option<PhysicalResource> {
        self.lookup(handle)?;
        self.bindings[handle.slot()]
    }

    /// Persistent resources imported by this graph, the backbuffer included.
    pub fn persistent_ids(&self) -> &[PersistentId] {
        &self.persistent_ids
    }

    fn lookup(&self, handle: ResourceHandle) -> Option<&VirtualResource> {
        if handle.generation() != self.generation {
            return None;
        }
        self.resources.get(handle.slot())
    }

    /// Binds every logical resource to a backend object.
    ///
    /// Persistent resources must already be realized in `persistent`. Each
    /// transient is acquired from `pool` just before its first pass. When
    /// `alias` is set it goes back to the pool right after its last pass, so a
    /// later transient with a compatible descriptor and a disjoint lifetime
    /// can reuse the same object.
    pub fn realize(
        &mut self,
        device: &dyn GraphicsDevice,
        pool: &mut TransientPool,
        persistent: &PersistentRegistry,
        alias: bool,
    ) -> Result<RealizeStats, GraphError> {
        for (slot, resource) in self.resources.iter().enumerate() {
            if let Some(id) = resource.origin.persistent_id() {
                let physical = persistent
                    .get(id)?
                    .ok_or(GraphError::UnknownPersistent { id })?;
                self.bindings[slot] = Some(physical);
            }
        }

        let pass_count = self.passes.len();
        let mut first_use: Vec<Vec<usize>> = vec![Vec::new(); pass_count];
        let mut last_use: Vec<Vec<usize>> = vec![Vec::new(); pass_count];
        for (slot, resource) in self.resources.iter().enumerate() {
            if resource.origin != ResourceOrigin::Transient {
                continue;
            }
            if let Some(lifetime) = self.lifetimes[slot] {
                first_use[lifetime.first.index()].push(slot);
                last_use[lifetime.last.index()].push(slot);
            }
        }

        let mut stats = RealizeStats::default();
        let mut distinct = AHashSet::new();
        for pass in 0..pass_count {
            for &slot in &first_use[pass] {
                let physical = pool.acquire(device, &self.resources[slot].descriptor)?;
                self.bindings[slot] = Some(physical);
                self.held[slot] = true;
                stats.transients += 1;
                distinct.insert(physical);
            }
            if !alias {
                continue;
            }
            for &slot in &last_use[pass] {
                if let (true, Some(physical)) = (self.held[slot], self.bindings[slot]) {
                    pool.release(&self.resources[slot].descriptor, physical);
                    self.held[slot] = false;
                }
            }
        }
        stats.aliased = stats.transients - distinct.len();

        log::trace!(
            "CompiledGraph: Realized frame {} ({} transients, {} aliased)",
            self.frame_index,
            stats.transients,
            stats.aliased
        );
        Ok(stats)
    }

    /// Returns every transient still held to `pool`.
    ///
    /// Safe to call after a partial [`realize`](Self::realize).
    pub fn release(&mut self, pool: &mut TransientPool) -> usize {
        let mut released = 0;
        for (slot, resource) in self.resources.iter().enumerate() {
            if !self.held[slot] {
                continue;
            }
            if let Some(physical) = self.bindings[slot] {
                pool.release(&resource.descriptor, physical);
                released += 1;
            }
            self.held[slot] = false;
        }
        released
    }

    /// The resource view handed to `pass` during execution.
    pub fn pass_resources(&self, pass: PassId) -> PassResources<'_> {
        let node = &self.passes[pass.index()];
        PassResources::new(
            &node.name,
            self.generation,
            &node.declared,
            &self.resources,
            &self.bindings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::resource::{TextureBufferDesc, TextureSize};
    use crate::shared::SharedResourceRegistry;
    use ember_core::renderer::{TextureFormat, TextureUsage};
    use ember_infra::HeadlessDevice;

    fn texture(label: &'static str) -> TextureBufferDesc {
        TextureBufferDesc::new(
            label,
            TextureSize::Absolute(Extent2D::new(64, 64)),
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    fn registry() -> (PersistentRegistry, PersistentId) {
        let mut persistent = PersistentRegistry::new();
        let id = persistent.register(
            "backbuffer",
            ResourceDescriptor::Texture(texture("backbuffer").resolve(Extent2D::new(64, 64))),
        );
        (persistent, id)
    }

    /// a -> b uses `first`, c -> d uses `second`.
    fn chain(builder: &mut GraphBuilder<'_>) -> (ResourceHandle, ResourceHandle) {
        builder.begin_pass("a", QueueKind::Render);
        let first = builder.create_texture_buffer(texture("first")).unwrap();
        builder.begin_pass("b", QueueKind::Render);
        builder.read(first).unwrap();
        builder.begin_pass("c", QueueKind::Render);
        let second = builder.create_texture_buffer(texture("second")).unwrap();
        builder.begin_pass("d", QueueKind::Render);
        builder.read(second).unwrap();
        (first, second)
    }

    #[test]
    fn disjoint_lifetimes_share_an_object() {
        let device = HeadlessDevice::new();
        let (mut persistent, backbuffer) = registry();
        persistent.realize(&device, [backbuffer]).unwrap();
        let mut shared = SharedResourceRegistry::new();
        let mut pool = TransientPool::new();

        let mut builder =
            GraphBuilder::new(0, Extent2D::new(64, 64), backbuffer, &mut persistent, &mut shared)
                .unwrap();
        let (first, second) = chain(&mut builder);
        let mut graph = builder.compile().unwrap();
        assert!(!graph.lifetime(first).unwrap().overlaps(&graph.lifetime(second).unwrap()));

        let stats = graph.realize(&device, &mut pool, &persistent, true).unwrap();
        assert_eq!(stats, RealizeStats { transients: 2, aliased: 1 });
        assert_eq!(graph.binding(first), graph.binding(second));
        assert_eq!(graph.release(&mut pool), 0);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn aliasing_disabled_keeps_objects_apart() {
        let device = HeadlessDevice::new();
        let (mut persistent, backbuffer) = registry();
        persistent.realize(&device, [backbuffer]).unwrap();
        let mut shared = SharedResourceRegistry::new();
        let mut pool = TransientPool::new();

        let mut builder =
            GraphBuilder::new(0, Extent2D::new(64, 64), backbuffer, &mut persistent, &mut shared)
                .unwrap();
        let (first, second) = chain(&mut builder);
        let mut graph = builder.compile().unwrap();

        let stats = graph.realize(&device, &mut pool, &persistent, false).unwrap();
        assert_eq!(stats.aliased, 0);
        assert_ne!(graph.binding(first), graph.binding(second));
        assert_eq!(graph.release(&mut pool), 2);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn overlapping_lifetimes_never_alias() {
        let device = HeadlessDevice::new();
        let (mut persistent, backbuffer) = registry();
        persistent.realize(&device, [backbuffer]).unwrap();
        let mut shared = SharedResourceRegistry::new();
        let mut pool = TransientPool::new();

        let mut builder =
            GraphBuilder::new(0, Extent2D::new(64, 64), backbuffer, &mut persistent, &mut shared)
                .unwrap();
        builder.begin_pass("a", QueueKind::Render);
        let first = builder.create_texture_buffer(texture("first")).unwrap();
        builder.begin_pass("b", QueueKind::Render);
        let second = builder.create_texture_buffer(texture("second")).unwrap();
        builder.read(first).unwrap();
        let mut graph = builder.compile().unwrap();

        graph.realize(&device, &mut pool, &persistent, true).unwrap();
        assert_ne!(graph.binding(first), graph.binding(second));
        assert_eq!(graph.dependencies_of(PassId(1)).collect::<Vec<_>>(), vec![PassId(0)]);
        graph.release(&mut pool);
    }

    #[test]
    fn unrealized_persistent_fails() {
        let device = HeadlessDevice::new();
        let (mut persistent, backbuffer) = registry();
        let mut shared = SharedResourceRegistry::new();
        let mut pool = TransientPool::new();

        let builder =
            GraphBuilder::new(0, Extent2D::new(64, 64), backbuffer, &mut persistent, &mut shared)
                .unwrap();
        let mut graph = builder.compile().unwrap();
        assert!(matches!(
            graph.realize(&device, &mut pool, &persistent, true),
            Err(GraphError::UnknownPersistent { .. })
        ));
    }
}
