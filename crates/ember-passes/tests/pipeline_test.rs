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

use ember_core::math::{Extent2D, LinearRgba};
use ember_core::renderer::{BufferDescriptor, BufferUsage, GraphicsDevice, QueueKind};
use ember_core::scene::{Light, LightKind, RenderObject, Scene};
use ember_core::RendererConfig;
use ember_graph::{
    ExecuteContext, GraphBuilder, GraphError, PassState, Pipeline, RenderPass, Runtime,
    SharedResourceName,
};
use ember_infra::{HeadlessDevice, RecordedCommand, SubmissionRecord};
use ember_passes::{default_pipeline, CompositePass, LightingPass, ScreenQuad, ShadowPass};
use std::mem::{discriminant, Discriminant};
use std::sync::Arc;

// --- HELPERS ---

fn scene(device: &HeadlessDevice) -> Scene {
    let triangle = device
        .create_buffer_with_data(
            &BufferDescriptor {
                label: Some("triangle".into()),
                size: 36,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
                mapped_at_creation: false,
            },
            &[0u8; 36],
        )
        .unwrap();
    Scene {
        objects: vec![RenderObject {
            vertex_buffer: triangle,
            vertex_count: 3,
            casts_shadows: true,
        }],
        lights: vec![
            Light {
                kind: LightKind::Directional {
                    direction: [0.0, -1.0, 0.0],
                },
                color: LinearRgba::WHITE,
                intensity: 1.0,
                casts_shadows: true,
            },
            Light {
                kind: LightKind::Point {
                    position: [1.0, 1.0, 1.0],
                    range: 5.0,
                },
                color: LinearRgba::new(1.0, 0.5, 0.2, 1.0),
                intensity: 3.0,
                casts_shadows: false,
            },
        ],
        clear_color: LinearRgba::new(0.1, 0.1, 0.1, 1.0),
    }
}

fn runtime(device: &HeadlessDevice, backbuffer: Extent2D, shadow_slots: usize) -> Runtime {
    let quad = Arc::new(ScreenQuad::new());
    let config = RendererConfig {
        backbuffer,
        ..RendererConfig::default()
    };
    Runtime::new(
        Arc::new(device.clone()),
        config,
        default_pipeline(&quad, shadow_slots),
    )
    .unwrap()
}

/// The kinds of the recorded commands, ignoring which objects they touch.
fn shape(record: &SubmissionRecord) -> (QueueKind, Vec<String>, Vec<Discriminant<RecordedCommand>>) {
    (
        record.queue,
        record.labels.clone(),
        record
            .commands
            .iter()
            // One-time uploads only show up in the first frame.
            .filter(|c| !matches!(c, RecordedCommand::WriteBuffer { .. }))
            .map(discriminant)
            .collect(),
    )
}

fn count(record: &SubmissionRecord, matches: impl Fn(&RecordedCommand) -> bool) -> usize {
    record.commands.iter().filter(|c| matches(c)).count()
}

// --- TESTS ---

#[test]
fn test_default_pipeline_is_deterministic() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let scene = scene(&device);
    let mut runtime = runtime(&device, Extent2D::new(800, 600), 2);

    // --- 2. ACT ---
    let reports: Vec<_> = (0..4).map(|_| runtime.render(&scene).unwrap()).collect();

    // --- 3. ASSERT ---
    for report in &reports {
        assert_eq!(
            report.executed_passes,
            vec!["shadow", "gbuffer", "lighting", "composite"]
        );
        let queues: Vec<_> = report.submissions.iter().map(|s| s.queue).collect();
        assert_eq!(
            queues,
            vec![QueueKind::Render, QueueKind::Compute, QueueKind::Render]
        );
    }
    let records = device.submissions();
    assert_eq!(records.len(), 12);
    let frames: Vec<Vec<_>> = records
        .chunks(3)
        .map(|frame| frame.iter().map(shape).collect())
        .collect();
    for frame in &frames[1..] {
        assert_eq!(frame, &frames[0], "every frame records the same work");
    }
    let quad_uploads: Vec<_> = records
        .chunks(3)
        .map(|frame| count(&frame[2], |c| matches!(c, RecordedCommand::WriteBuffer { .. })))
        .collect();
    assert_eq!(quad_uploads, vec![1, 0, 0, 0], "the screen quad is uploaded once");
    assert_eq!(runtime.pipeline().states(), vec![PassState::SetUp; 4]);
}

#[test]
fn test_persistent_objects_are_created_once() {
    let device = HeadlessDevice::new();
    let scene = scene(&device);
    let mut runtime = runtime(&device, Extent2D::new(800, 600), 1);

    for _ in 0..5 {
        runtime.render(&scene).unwrap();
    }

    assert_eq!(device.creation_count("screen-quad"), 1);
    assert_eq!(device.creation_count("composite-pipeline"), 1);
    assert_eq!(device.creation_count("shadow-pipeline"), 1);
    assert_eq!(device.creation_count("lighting-pipeline"), 1);
    assert_eq!(device.creation_count("gbuffer-albedo"), 1);
    // Transients come back from the pool after the first frame.
    assert_eq!(device.creation_count("lit-color"), 1);
}

#[test]
fn test_resize_rebuilds_the_gbuffer_once() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let scene = scene(&device);
    let mut runtime = runtime(&device, Extent2D::new(800, 600), 1);
    runtime.render(&scene).unwrap();

    // --- 2. ACT ---
    runtime.resize(Extent2D::new(1024, 768));
    let resized = runtime.render(&scene).unwrap();
    let steady = runtime.render(&scene).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(resized.backbuffer_size, Extent2D::new(1024, 768));
    assert_eq!(resized.persistent_destroyed, 3, "old planes freed exactly once");
    assert_eq!(steady.persistent_destroyed, 0);
    for label in ["gbuffer-albedo", "gbuffer-normal", "gbuffer-depth"] {
        let live = device.live_textures_labeled(label);
        assert_eq!(live.len(), 1, "{label} leaked or missing");
        assert_eq!(live[0].1.size.to_2d(), Extent2D::new(1024, 768));
        assert_eq!(device.creation_count(label), 2);
    }
    assert_eq!(runtime.pipeline().states(), vec![PassState::SetUp; 4]);
}

#[test]
fn test_lighting_dispatches_tiles_on_the_compute_queue() {
    let device = HeadlessDevice::new();
    let scene = scene(&device);
    let mut runtime = runtime(&device, Extent2D::new(801, 600), 1);

    let report = runtime.render(&scene).unwrap();

    assert!(report.submissions[0].fence.is_complete(), "serialized before compute");
    let records = device.submissions();
    let lighting = records
        .iter()
        .find(|r| r.queue == QueueKind::Compute)
        .expect("a compute submission");
    assert_eq!(lighting.labels, vec!["lighting".to_string()]);
    assert!(lighting.commands.contains(&RecordedCommand::Dispatch {
        groups: [101, 75, 1]
    }));
    // Three g-buffer planes, the lit target and one shadow map.
    assert_eq!(
        count(lighting, |c| matches!(c, RecordedCommand::BindTexture { .. })),
        5
    );
}

#[test]
fn test_shadow_maps_are_drawn_for_shadowed_lights_only() {
    let device = HeadlessDevice::new();
    let scene = scene(&device);
    let mut runtime = runtime(&device, Extent2D::new(640, 480), 3);

    runtime.render(&scene).unwrap();

    let records = device.submissions();
    let geometry = &records[0];
    assert_eq!(geometry.labels, vec!["shadow".to_string(), "gbuffer".to_string()]);
    let passes = count(geometry, |c| {
        matches!(c, RecordedCommand::BeginRenderPass { label: Some(l), .. } if l.starts_with("shadow-map"))
    });
    assert_eq!(passes, 3, "every slot is cleared");
    // One shadowed light with one caster, plus the g-buffer draw.
    assert_eq!(
        count(geometry, |c| matches!(c, RecordedCommand::Draw { .. })),
        2
    );
}

#[test]
fn test_composite_draws_one_quad_per_layer() {
    let device = HeadlessDevice::new();
    let scene = scene(&device);
    let mut runtime = runtime(&device, Extent2D::new(640, 480), 1);

    runtime.render(&scene).unwrap();

    let records = device.submissions();
    let composite = records.last().unwrap();
    assert_eq!(composite.labels, vec!["composite".to_string()]);
    assert!(composite.commands.contains(&RecordedCommand::Draw {
        vertices: 0..6,
        instances: 0..1,
    }));
    assert_eq!(
        count(composite, |c| matches!(c, RecordedCommand::Draw { .. })),
        1
    );
}

#[test]
fn test_lighting_without_gbuffer_fails() {
    let device = HeadlessDevice::new();
    let mut runtime = Runtime::new(
        Arc::new(device.clone()),
        RendererConfig::default(),
        Pipeline::new().with_pass(LightingPass::new()),
    )
    .unwrap();

    let error = runtime.render(&Scene::default()).unwrap_err();

    assert!(matches!(
        error.root(),
        GraphError::SharedResourceMissing {
            name: SharedResourceName::GBuffer
        }
    ));
    assert_eq!(device.stats().submissions, 0);
}

/// Forwards `execute` to the wrapped pass but never lets it set up.
struct SkipsSetup<P>(P);

impl<P: RenderPass> RenderPass for SkipsSetup<P> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn queue(&self) -> QueueKind {
        self.0.queue()
    }

    fn create(&mut self, _builder: &mut GraphBuilder<'_>) -> Result<(), GraphError> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> Result<(), GraphError> {
        self.0.execute(ctx)
    }
}

#[test]
fn test_executing_without_setup_is_an_error() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let quad = Arc::new(ScreenQuad::new());
    let pipelines = [
        Pipeline::new().with_pass(SkipsSetup(ShadowPass::new(1))),
        Pipeline::new().with_pass(SkipsSetup(CompositePass::new(quad))),
    ];

    for pipeline in pipelines {
        let mut runtime =
            Runtime::new(Arc::new(device.clone()), RendererConfig::default(), pipeline).unwrap();

        // --- 2. ACT ---
        let error = runtime.render(&Scene::default()).unwrap_err();

        // --- 3. ASSERT ---
        assert!(
            matches!(error.root(), GraphError::NotSetUp { .. }),
            "got {error:?}"
        );
    }
    assert_eq!(device.stats().submissions, 0);
}

#[test]
fn test_shutdown_releases_every_graph_object() {
    let device = HeadlessDevice::new();
    let scene = scene(&device);
    let mut runtime = runtime(&device, Extent2D::new(320, 240), 2);
    for _ in 0..3 {
        runtime.render(&scene).unwrap();
    }

    runtime.shutdown().unwrap();

    let stats = device.stats();
    assert_eq!(stats.live_textures(), 0);
    assert_eq!(stats.live_pipelines(), 0);
    // Only the scene's own vertex buffer remains.
    assert_eq!(stats.live_buffers(), 1);
}
