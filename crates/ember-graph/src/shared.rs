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

//! A frame-scoped store for well-known intermediate results.
//!
//! Passes developed independently (shadow mapping, deferred lighting,
//! compositing) exchange values here instead of taking references to each
//! other. Each value type is bound to one [`SharedResourceName`], and the
//! registry is a fixed array indexed by that name.
//!
//! Values are not tracked by the graph's dependency validation: producers must
//! come before consumers in the pipeline. The runtime clears the registry at
//! the start of every frame.

use crate::error::GraphError;
use crate::handle::ResourceHandle;
use ember_core::math::Extent2D;

/// The well-known slots of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedResourceName {
    /// The deferred g-buffer planes.
    GBuffer,
    /// The shadow maps rendered this frame.
    ShadowMaps,
    /// The ordered layers blended onto the backbuffer.
    CompositeLayers,
    /// The main lit color target.
    SceneColor,
}

impl SharedResourceName {
    /// Number of slots.
    pub const COUNT: usize = 4;

    const fn index(self) -> usize {
        self as usize
    }
}

/// The g-buffer planes written by the geometry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBuffer {
    /// Base color plane.
    pub albedo: ResourceHandle,
    /// World-space normal plane.
    pub normal: ResourceHandle,
    /// Depth plane.
    pub depth: ResourceHandle,
    /// Resolution of every plane.
    pub size: Extent2D,
}

/// A shadow map rendered for one light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowMap {
    /// Position of the light among the scene's shadow-casting lights.
    pub light_index: usize,
    /// The depth texture.
    pub texture: ResourceHandle,
}

/// Every shadow map rendered this frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowMaps {
    /// Maps in light order.
    pub maps: Vec<ShadowMap>,
}

/// One texture blended onto the backbuffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeLayer {
    /// The texture to blend.
    pub texture: ResourceHandle,
    /// Blend weight.
    pub opacity: f32,
}

/// The layers to composite, bottom first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeLayers {
    /// Layers in blend order.
    pub layers: Vec<CompositeLayer>,
}

/// The main lit color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneColor {
    /// The color texture.
    pub texture: ResourceHandle,
}

/// A value stored in one registry slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SharedValue {
    /// See [`GBuffer`].
    GBuffer(GBuffer),
    /// See [`ShadowMaps`].
    ShadowMaps(ShadowMaps),
    /// See [`CompositeLayers`].
    CompositeLayers(CompositeLayers),
    /// See [`SceneColor`].
    SceneColor(SceneColor),
}

/// A type that can live in the [`SharedResourceRegistry`].
pub trait SharedResource: Sized + 'static {
    /// The slot this type occupies.
    const NAME: SharedResourceName;

    /// Wraps the value for storage.
    fn into_value(self) -> SharedValue;

    /// Borrows the value out of its slot.
    fn from_value(value: &SharedValue) -> Option<&Self>;

    /// Mutably borrows the value out of its slot.
    fn from_value_mut(value: &mut SharedValue) -> Option<&mut Self>;
}

macro_rules! impl_shared_resource {
    ($ty:ident) => {
        impl SharedResource for $ty {
            const NAME: SharedResourceName = SharedResourceName::$ty;

            fn into_value(self) -> SharedValue {
                SharedValue::$ty(self)
            }

            fn from_value(value: &SharedValue) -> Option<&Self> {
                match value {
                    SharedValue::$ty(v) => Some(v),
                    _ => None,
                }
            }

            fn from_value_mut(value: &mut SharedValue) -> Option<&mut Self> {
                match value {
                    SharedValue::$ty(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_shared_resource!(GBuffer);
impl_shared_resource!(ShadowMaps);
impl_shared_resource!(CompositeLayers);
impl_shared_resource!(SceneColor);

/// The registry: one optional value per [`SharedResourceName`].
///
/// Not synchronized; the graph runs setup and execute on a single thread.
#[derive(Debug, Default)]
pub struct SharedResourceRegistry {
    slots: [Option<SharedValue>; SharedResourceName::COUNT],
}

impl SharedResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, replacing any previous value of the same type.
    pub fn set<T: SharedResource>(&mut self, value: T) {
        self.slots[T::NAME.index()] = Some(value.into_value());
    }

    /// Borrows the value of type `T`.
    ///
    /// # Errors
    ///
    /// [`GraphError::SharedResourceMissing`] if nothing was published this frame.
    pub fn get<T: SharedResource>(&self) -> Result<&T, GraphError> {
        self.slots[T::NAME.index()]
            .as_ref()
            .and_then(T::from_value)
            .ok_or(GraphError::SharedResourceMissing { name: T::NAME })
    }

    /// Mutably borrows the value of type `T`.
    pub fn get_mut<T: SharedResource>(&mut self) -> Result<&mut T, GraphError> {
        self.slots[T::NAME.index()]
            .as_mut()
            .and_then(T::from_value_mut)
            .ok_or(GraphError::SharedResourceMissing { name: T::NAME })
    }

    /// Mutably borrows the value of type `T`, inserting `T::default()` if absent.
    pub fn get_or_default<T: SharedResource + Default>(&mut self) -> Result<&mut T, GraphError> {
        if !self.check::<T>() {
            self.set(T::default());
        }
        self.get_mut::<T>()
    }

    /// Returns `true` if a value of type `T` is present.
    pub fn check<T: SharedResource>(&self) -> bool {
        self.slots[T::NAME.index()].is_some()
    }

    /// Removes the value of type `T`.
    pub fn clear<T: SharedResource>(&mut self) {
        self.slots[T::NAME.index()] = None;
    }

    /// Removes every value.
    pub fn clear_all(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Returns `true` if no slot holds a value.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(index: u32) -> ResourceHandle {
        ResourceHandle::new(index, 0)
    }

    fn round_trip<T: SharedResource + Clone + PartialEq + std::fmt::Debug>(value: T) {
        let mut registry = SharedResourceRegistry::new();
        assert!(!registry.check::<T>());
        assert!(matches!(
            registry.get::<T>(),
            Err(GraphError::SharedResourceMissing { name }) if name == T::NAME
        ));

        registry.set(value.clone());
        assert!(registry.check::<T>());
        assert_eq!(registry.get::<T>().unwrap(), &value);

        registry.clear::<T>();
        assert!(!registry.check::<T>());
    }

    #[test]
    fn every_shared_type_round_trips() {
        round_trip(GBuffer {
            albedo: handle(0),
            normal: handle(1),
            depth: handle(2),
            size: Extent2D::new(800, 600),
        });
        round_trip(ShadowMaps {
            maps: vec![ShadowMap {
                light_index: 0,
                texture: handle(3),
            }],
        });
        round_trip(CompositeLayers {
            layers: vec![CompositeLayer {
                texture: handle(4),
                opacity: 0.5,
            }],
        });
        round_trip(SceneColor { texture: handle(5) });
    }

    #[test]
    fn slots_are_independent() {
        let mut registry = SharedResourceRegistry::new();
        registry.set(SceneColor { texture: handle(1) });
        registry
            .get_or_default::<CompositeLayers>()
            .unwrap()
            .layers
            .push(CompositeLayer {
                texture: handle(2),
                opacity: 1.0,
            });

        registry.clear::<SceneColor>();
        assert!(registry.check::<CompositeLayers>());
        assert_eq!(registry.get::<CompositeLayers>().unwrap().layers.len(), 1);

        registry.clear_all();
        assert!(registry.is_empty());
    }
}
