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

//! Provides structs for representing extents (sizes) in 2D and 3D.
//!
//! These types describe the dimensions of textures and of the backbuffer.
//! They use integer (`u32`) components, making them suitable for pixel sizes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A two-dimensional extent, typically representing width and height.
///
/// This is the unit in which backbuffer sizes travel through the render graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent from a width and a height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either component is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered by the extent.
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Scales both components, rounding down and never going below one pixel.
    pub fn scaled(&self, scale: f32) -> Self {
        let scale_axis = |v: u32| (((v as f32) * scale) as u32).max(1);
        Self {
            width: scale_axis(self.width),
            height: scale_axis(self.height),
        }
    }

    /// Promotes this extent to a single-layer [`Extent3D`].
    pub const fn to_3d(self) -> Extent3D {
        Extent3D {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl fmt::Display for Extent2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A three-dimensional extent, representing width, height, and depth.
///
/// This is used for 3D textures, texture arrays, or cubemaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent3D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
    /// The depth or number of array layers.
    pub depth_or_array_layers: u32,
}

impl Extent3D {
    /// Drops the depth component.
    pub const fn to_2d(self) -> Extent2D {
        Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_never_collapses_to_zero() {
        let size = Extent2D::new(3, 800);
        let half = size.scaled(0.1);
        assert_eq!(half, Extent2D::new(1, 80));
    }

    #[test]
    fn extent_round_trips_through_3d() {
        let size = Extent2D::new(1024, 768);
        let size_3d = size.to_3d();
        assert_eq!(size_3d.depth_or_array_layers, 1);
        assert_eq!(size_3d.to_2d(), size);
        assert_eq!(size.area(), 1024 * 768);
        assert_eq!(size.to_string(), "1024x768");
    }

    #[test]
    fn empty_extent_detection() {
        assert!(Extent2D::new(0, 10).is_empty());
        assert!(!Extent2D::new(1, 1).is_empty());
    }
}
