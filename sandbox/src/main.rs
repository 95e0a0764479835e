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

// Ember Sandbox
// Renders the default pipeline on the headless device and logs each frame.
//
// Usage: sandbox [config.json]

use std::mem;
use std::sync::Arc;

use anyhow::{Context, Result};
use ember_core::math::{Extent2D, LinearRgba};
use ember_core::renderer::{BufferDescriptor, BufferUsage, GraphicsDevice};
use ember_core::scene::{Light, LightKind, RenderObject, Scene};
use ember_core::RendererConfig;
use ember_graph::{FrameReport, Runtime};
use ember_infra::HeadlessDevice;
use ember_passes::{default_pipeline, ScreenQuad};

const FRAMES: u64 = 6;
const SHADOW_SLOTS: usize = 2;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    color: [f32; 4],
}

const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [0.0, 0.5, 0.0],
        normal: [0.0, 0.0, 1.0],
        color: [1.0, 0.0, 0.0, 1.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        normal: [0.0, 0.0, 1.0],
        color: [0.0, 1.0, 0.0, 1.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        normal: [0.0, 0.0, 1.0],
        color: [0.0, 0.0, 1.0, 1.0],
    },
];

fn load_config() -> Result<RendererConfig> {
    match std::env::args().nth(1) {
        Some(path) => RendererConfig::load(&path)
            .with_context(|| format!("failed to load renderer config from '{path}'")),
        None => Ok(RendererConfig::default()),
    }
}

fn build_scene(device: &HeadlessDevice) -> Result<Scene> {
    let bytes: &[u8] = bytemuck::cast_slice(&TRIANGLE);
    let vertex_buffer = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("triangle".into()),
                size: (TRIANGLE.len() * mem::size_of::<Vertex>()) as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
            bytes,
        )
        .context("failed to upload the triangle")?;

    Ok(Scene {
        objects: vec![RenderObject {
            vertex_buffer,
            vertex_count: TRIANGLE.len() as u32,
            casts_shadows: true,
        }],
        lights: vec![
            Light {
                kind: LightKind::Directional {
                    direction: [-0.3, -1.0, -0.2],
                },
                color: LinearRgba::WHITE,
                intensity: 1.0,
                casts_shadows: true,
            },
            Light {
                kind: LightKind::Point {
                    position: [0.0, 1.0, 1.0],
                    range: 4.0,
                },
                color: LinearRgba::new(1.0, 0.6, 0.3, 1.0),
                intensity: 2.5,
                casts_shadows: false,
            },
        ],
        clear_color: LinearRgba::new(0.02, 0.02, 0.05, 1.0),
    })
}

fn log_report(report: &FrameReport) {
    log::info!(
        "Frame {} at {}: passes [{}], {} submissions, {} transients ({} aliased, {} allocated, {} reused)",
        report.frame_index,
        report.backbuffer_size,
        report.executed_passes.join(", "),
        report.submissions.len(),
        report.transients,
        report.aliased_transients,
        report.transient_allocations,
        report.transient_reuses
    );
    for submission in &report.submissions {
        log::debug!(
            "  {} queue: {} command buffers ({})",
            submission.queue,
            submission.command_buffers,
            submission.passes.join(", ")
        );
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let device = HeadlessDevice::new();
    let scene = build_scene(&device)?;
    let quad = Arc::new(ScreenQuad::new());
    let initial = config.backbuffer;

    let mut runtime = Runtime::new(
        Arc::new(device.clone()),
        config,
        default_pipeline(&quad, SHADOW_SLOTS),
    )?;

    for frame in 0..FRAMES {
        if frame == FRAMES / 2 {
            runtime.resize(Extent2D::new(initial.width * 2, initial.height * 2));
        }
        let report = runtime.render(&scene)?;
        log_report(&report);
    }
    runtime.shutdown()?;

    let stats = device.stats();
    log::info!(
        "Headless device: {} textures, {} buffers, {} pipelines created; peak VRAM {} bytes",
        stats.textures_created,
        stats.buffers_created,
        stats.pipelines_created,
        stats.vram_peak_bytes
    );
    Ok(())
}
