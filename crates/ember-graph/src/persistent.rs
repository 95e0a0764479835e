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

//! Resources that outlive a single frame.
//!
//! The registry is owned by the [`Runtime`](crate::Runtime) and lends its
//! objects to each frame's graph by [`PersistentId`]. Backing objects are
//! allocated lazily, the first time a graph that references them is realized,
//! and destroyed exactly once after their release.

use crate::error::GraphError;
use crate::resource::{PhysicalResource, ResourceDescriptor};
use ember_core::renderer::GraphicsDevice;
use std::fmt;

/// A generational identifier of a persistent resource.
///
/// Unlike a [`ResourceHandle`](crate::ResourceHandle), it stays valid across
/// frames until the resource is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersistentId {
    index: u32,
    generation: u32,
}

impl fmt::Display for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistent#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct PersistentEntry {
    name: String,
    descriptor: ResourceDescriptor,
    physical: Option<PhysicalResource>,
    released: bool,
}

#[derive(Debug, Default)]
struct PersistentSlot {
    generation: u32,
    entry: Option<PersistentEntry>,
}

/// Owner of every cross-frame resource.
#[derive(Debug, Default)]
pub struct PersistentRegistry {
    slots: Vec<PersistentSlot>,
    free: Vec<u32>,
}

impl PersistentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new resource. Its backing object is not allocated yet.
    pub fn register(&mut self, name: impl Into<String>, descriptor: ResourceDescriptor) -> PersistentId {
        let entry = PersistentEntry {
            name: name.into(),
            descriptor,
            physical: None,
            released: false,
        };
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(PersistentSlot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(entry);
        PersistentId {
            index,
            generation: slot.generation,
        }
    }

    fn entry(&self, id: PersistentId) -> Result<&PersistentEntry, GraphError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(GraphError::UnknownPersistent { id })
    }

    /// Returns `true` if `id` names a live, unreleased resource.
    pub fn contains(&self, id: PersistentId) -> bool {
        self.entry(id).map(|e| !e.released).unwrap_or(false)
    }

    /// The resolved descriptor of a resource.
    pub fn descriptor(&self, id: PersistentId) -> Result<&ResourceDescriptor, GraphError> {
        self.entry(id).map(|e| &e.descriptor)
    }

    /// The debug name of a resource.
    pub fn name(&self, id: PersistentId) -> Result<&str, GraphError> {
        self.entry(id).map(|e| e.name.as_str())
    }

    /// The backing object, if it has been allocated.
    pub fn get(&self, id: PersistentId) -> Result<Option<PhysicalResource>, GraphError> {
        self.entry(id).map(|e| e.physical)
    }

    /// Schedules a resource for destruction after the current frame.
    ///
    /// # Errors
    ///
    /// [`GraphError::DoubleRelease`] if the resource was already released,
    /// whether or not it has been collected since.
    pub fn release(&mut self, id: PersistentId) -> Result<(), GraphError> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .ok_or(GraphError::UnknownPersistent { id })?;
        if id.generation < slot.generation {
            // The slot was recycled, so this id was already released and collected.
            return Err(GraphError::DoubleRelease { id });
        }
        match slot.entry.as_mut() {
            Some(entry) if slot.generation == id.generation => {
                if entry.released {
                    return Err(GraphError::DoubleRelease { id });
                }
                entry.released = true;
                log::debug!("PersistentRegistry: Released '{}' ({})", entry.name, id);
                Ok(())
            }
            _ => Err(GraphError::UnknownPersistent { id }),
        }
    }

    /// Allocates the backing objects of `ids` that do not have one yet.
    pub fn realize(
        &mut self,
        device: &dyn GraphicsDevice,
        ids: impl IntoIterator<Item = PersistentId>,
    ) -> Result<usize, GraphError> {
        let mut allocated = 0;
        for id in ids {
            let slot = self
                .slots
                .get_mut(id.index as usize)
                .filter(|slot| slot.generation == id.generation)
                .ok_or(GraphError::UnknownPersistent { id })?;
            let entry = slot
                .entry
                .as_mut()
                .ok_or(GraphError::UnknownPersistent { id })?;
            if entry.physical.is_none() {
                entry.physical = Some(entry.descriptor.allocate(device)?);
                allocated += 1;
                log::debug!("PersistentRegistry: Allocated '{}' ({})", entry.name, id);
            }
        }
        Ok(allocated)
    }

    /// Returns `true` if some released resources are waiting to be destroyed.
    pub fn has_pending_releases(&self) -> bool {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .any(|entry| entry.released)
    }

    /// Destroys every released resource exactly once and recycles its slot.
    ///
    /// Returns the number of backend objects destroyed.
    pub fn collect_released(&mut self, device: &dyn GraphicsDevice) -> usize {
        let mut destroyed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let released = slot.entry.as_ref().is_some_and(|entry| entry.released);
            if !released {
                continue;
            }
            if let Some(entry) = slot.entry.take() {
                if let Some(physical) = entry.physical {
                    match physical.destroy(device) {
                        Ok(()) => destroyed += 1,
                        Err(e) => log::warn!(
                            "PersistentRegistry: Failed to destroy '{}': {:?}",
                            entry.name,
                            e
                        ),
                    }
                }
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
        }
        destroyed
    }

    /// Destroys every resource, released or not. Used at shutdown.
    pub fn destroy_all(&mut self, device: &dyn GraphicsDevice) -> usize {
        for slot in self.slots.iter_mut() {
            if let Some(entry) = slot.entry.as_mut() {
                entry.released = true;
            }
        }
        self.collect_released(device)
    }

    /// Number of resources registered and not yet collected.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    /// Returns `true` if no resources are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
