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

//! Recycling of per-frame backend objects.
//!
//! Transients are acquired while a graph is realized and returned when their
//! lifetime ends (or when the frame is done). Returned objects are kept in a
//! free list keyed by their full descriptor, so a later request with an
//! identical descriptor reuses them instead of allocating.
//!
//! Objects are never destroyed during normal rendering. [`TransientPool::end_frame`]
//! destroys the ones that sat unused for too many frames, which is what cleans
//! up after a resolution change. An object returned during a frame may still be
//! referenced by that frame's submitted work, so it only starts aging at the
//! following `end_frame`. By then the caller has waited on the frame's fences.

use crate::resource::{PhysicalResource, ResourceDescriptor};
use ahash::AHashMap;
use ember_core::renderer::{GraphicsDevice, ResourceError};

// ─── Internal Types ───────────────────────────────────────────────────────────

/// Recycling key: the descriptor without its debug label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey(ResourceDescriptor);

impl PoolKey {
    fn from_desc(desc: &ResourceDescriptor) -> Self {
        Self(desc.unlabeled())
    }
}

#[derive(Debug)]
struct PooledResource {
    physical: PhysicalResource,
    /// Frames spent in the free list without being reused.
    idle_frames: u32,
    /// Returned since the last `end_frame`.
    used_this_frame: bool,
}

/// Allocation counters for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolFrameStats {
    /// Objects created because no compatible free object existed.
    pub allocations: usize,
    /// Requests served from the free list.
    pub reuses: usize,
    /// Idle objects destroyed at the end of the frame.
    pub destroyed: usize,
}

// ─── Pool Implementation ──────────────────────────────────────────────────────

/// Pool of transient textures, buffers and pipelines.
#[derive(Debug, Default)]
pub struct TransientPool {
    free: AHashMap<PoolKey, Vec<PooledResource>>,
    in_use: usize,
    frame: PoolFrameStats,
}

impl TransientPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an object matching `desc`, reusing a free one when possible.
    ///
    /// The most recently returned compatible object is handed out first.
    pub fn acquire(
        &mut self,
        device: &dyn GraphicsDevice,
        desc: &ResourceDescriptor,
    ) -> Result<PhysicalResource, ResourceError> {
        let key = PoolKey::from_desc(desc);
        let physical = match self.free.get_mut(&key).and_then(Vec::pop) {
            Some(pooled) => {
                self.frame.reuses += 1;
                pooled.physical
            }
            None => {
                let physical = desc.allocate(device)?;
                self.frame.allocations += 1;
                physical
            }
        };
        self.in_use += 1;
        Ok(physical)
    }

    /// Puts an object back into the free list.
    pub fn release(&mut self, desc: &ResourceDescriptor, physical: PhysicalResource) {
        self.in_use = self.in_use.saturating_sub(1);
        self.free
            .entry(PoolKey::from_desc(desc))
            .or_default()
            .push(PooledResource {
                physical,
                idle_frames: 0,
                used_this_frame: true,
            });
    }

    /// Ages every free object and destroys those idle for more than `max_idle_frames`.
    ///
    /// Objects returned since the previous call are not aged yet, so they
    /// survive at least until the next call even with `max_idle_frames == 0`.
    /// The caller must have waited on all work submitted before the previous
    /// call. Returns the counters accumulated since the previous call.
    pub fn end_frame(&mut self, device: &dyn GraphicsDevice, max_idle_frames: u32) -> PoolFrameStats {
        let mut destroyed = 0;
        for bucket in self.free.values_mut() {
            for pooled in bucket.iter_mut() {
                if pooled.used_this_frame {
                    pooled.used_this_frame = false;
                } else {
                    pooled.idle_frames += 1;
                }
            }
            bucket.retain(|pooled| {
                if pooled.idle_frames <= max_idle_frames {
                    return true;
                }
                match pooled.physical.destroy(device) {
                    Ok(()) => destroyed += 1,
                    Err(e) => log::warn!(
                        "TransientPool: Failed to destroy idle {:?}: {:?}",
                        pooled.physical,
                        e
                    ),
                }
                false
            });
        }
        self.free.retain(|_, bucket| !bucket.is_empty());
        if destroyed > 0 {
            log::debug!("TransientPool: Trimmed {destroyed} idle objects");
        }

        let mut stats = std::mem::take(&mut self.frame);
        stats.destroyed = destroyed;
        stats
    }

    /// Destroys every free object. Objects still in use are not tracked here.
    pub fn destroy_all(&mut self, device: &dyn GraphicsDevice) -> usize {
        let mut destroyed = 0;
        for (_, bucket) in self.free.drain() {
            for pooled in bucket {
                match pooled.physical.destroy(device) {
                    Ok(()) => destroyed += 1,
                    Err(e) => log::warn!(
                        "TransientPool: Failed to destroy {:?}: {:?}",
                        pooled.physical,
                        e
                    ),
                }
            }
        }
        destroyed
    }

    /// Number of objects waiting in the free list.
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Number of objects currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{BufferVisibility, ShaderBufferDesc, TextureBufferDesc, TextureSize};
    use ember_core::math::Extent2D;
    use ember_core::renderer::{TextureFormat, TextureUsage};
    use ember_infra::HeadlessDevice;

    fn color_target(label: &'static str, size: Extent2D) -> ResourceDescriptor {
        ResourceDescriptor::Texture(
            TextureBufferDesc::new(
                label,
                TextureSize::Absolute(size),
                TextureFormat::Rgba16Float,
                TextureUsage::RENDER_ATTACHMENT,
            )
            .resolve(size),
        )
    }

    #[test]
    fn released_object_is_reused_across_labels() {
        let device = HeadlessDevice::new();
        let mut pool = TransientPool::new();
        let size = Extent2D::new(64, 64);

        let a = pool.acquire(&device, &color_target("bloom", size)).unwrap();
        pool.release(&color_target("bloom", size), a);
        let b = pool.acquire(&device, &color_target("blur", size)).unwrap();

        assert_eq!(a, b);
        let stats = pool.end_frame(&device, 3);
        assert_eq!((stats.allocations, stats.reuses), (1, 1));
        assert_eq!(device.stats().textures_created, 1);
    }

    #[test]
    fn different_descriptors_never_share() {
        let device = HeadlessDevice::new();
        let mut pool = TransientPool::new();

        let small = color_target("t", Extent2D::new(32, 32));
        let a = pool.acquire(&device, &small).unwrap();
        pool.release(&small, a);
        let b = pool
            .acquire(&device, &color_target("t", Extent2D::new(64, 64)))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.free_count(), 1);

        let uniform = ResourceDescriptor::ShaderBuffer(
            ShaderBufferDesc::new("u", 256, BufferVisibility::Uniform).resolve(),
        );
        let storage = ResourceDescriptor::ShaderBuffer(
            ShaderBufferDesc::new("u", 256, BufferVisibility::Storage).resolve(),
        );
        let u = pool.acquire(&device, &uniform).unwrap();
        pool.release(&uniform, u);
        assert_ne!(pool.acquire(&device, &storage).unwrap(), u);
    }

    #[test]
    fn idle_objects_are_trimmed() {
        let device = HeadlessDevice::new();
        let mut pool = TransientPool::new();
        let desc = color_target("old-size", Extent2D::new(800, 600));

        let t = pool.acquire(&device, &desc).unwrap();
        pool.release(&desc, t);

        assert_eq!(pool.end_frame(&device, 1).destroyed, 0);
        assert_eq!(pool.end_frame(&device, 1).destroyed, 0);
        assert_eq!(pool.end_frame(&device, 1).destroyed, 1);
        assert_eq!(pool.free_count(), 0);
        assert_eq!(device.stats().live_textures(), 0);
    }

    #[test]
    fn objects_returned_this_frame_outlive_its_end() {
        let device = HeadlessDevice::new();
        let mut pool = TransientPool::new();
        let desc = color_target("scratch", Extent2D::new(64, 64));

        let t = pool.acquire(&device, &desc).unwrap();
        pool.release(&desc, t);
        assert_eq!(pool.end_frame(&device, 0).destroyed, 0);
        assert_eq!(device.stats().live_textures(), 1);

        // Reused next frame: the clock restarts.
        let again = pool.acquire(&device, &desc).unwrap();
        pool.release(&desc, again);
        assert_eq!(pool.end_frame(&device, 0).destroyed, 0);

        assert_eq!(pool.end_frame(&device, 0).destroyed, 1);
        assert_eq!(device.stats().live_textures(), 0);
    }
}
