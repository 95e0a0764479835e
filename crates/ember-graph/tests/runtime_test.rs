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
use ember_core::renderer::{
    BufferId, ComputePassDescriptor, LoadOp, Operations, QueueKind, RenderError,
    RenderPassColorAttachment, RenderPassDescriptor, StoreOp, TextureFormat, TextureUsage,
};
use ember_core::scene::Scene;
use ember_core::{QueueSubmission, RendererConfig};
use ember_graph::{
    BufferVisibility, ExecuteContext, GraphBuilder, GraphError, PassState, Pipeline, RenderPass,
    ResourceHandle, Runtime, SceneColor, ShaderBufferDesc, TextureBufferDesc, TextureSize,
    VertexBufferDesc, BACKBUFFER_LABEL,
};
use ember_infra::HeadlessDevice;
use std::sync::{Arc, Mutex};

// --- TEST PASS ---

type Slot = Arc<Mutex<Option<ResourceHandle>>>;
type SetupFn = Box<dyn FnMut(&mut GraphBuilder<'_>) -> Result<(), GraphError> + Send>;
type ExecuteFn = Box<dyn FnMut(&mut ExecuteContext<'_>) -> Result<(), GraphError> + Send>;

/// A pass whose behaviour is given by closures.
struct FnPass {
    name: String,
    queue: QueueKind,
    setup: SetupFn,
    execute: ExecuteFn,
}

impl FnPass {
    fn new(
        name: &str,
        queue: QueueKind,
        setup: impl FnMut(&mut GraphBuilder<'_>) -> Result<(), GraphError> + Send + 'static,
        execute: impl FnMut(&mut ExecuteContext<'_>) -> Result<(), GraphError> + Send + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            queue,
            setup: Box::new(setup),
            execute: Box::new(execute),
        }
    }
}

impl RenderPass for FnPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn create(&mut self, builder: &mut GraphBuilder<'_>) -> Result<(), GraphError> {
        (self.setup)(builder)
    }

    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> Result<(), GraphError> {
        (self.execute)(ctx)
    }
}

fn slot() -> Slot {
    Arc::new(Mutex::new(None))
}

fn get(slot: &Slot) -> ResourceHandle {
    slot.lock().unwrap().expect("slot was never filled")
}

fn color_target(label: &'static str) -> TextureBufferDesc {
    TextureBufferDesc::new(
        label,
        TextureSize::Absolute(Extent2D::new(64, 64)),
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

/// Creates a transient texture, stores its handle and clears it.
fn producer(name: &str, label: &'static str, out: Slot) -> FnPass {
    let exec_slot = out.clone();
    FnPass::new(
        name,
        QueueKind::Render,
        move |builder| {
            let handle = builder.create_texture_buffer(color_target(label))?;
            *out.lock().unwrap() = Some(handle);
            Ok(())
        },
        move |ctx| clear(ctx, &exec_slot),
    )
}

fn clear(ctx: &mut ExecuteContext<'_>, target: &Slot) -> Result<(), GraphError> {
    let texture = ctx.resources().get_texture_buffer(get(target))?;
    let desc = RenderPassDescriptor {
        label: Some("clear".into()),
        color_attachments: vec![RenderPassColorAttachment {
            texture,
            ops: Operations {
                load: LoadOp::Clear(LinearRgba::BLACK),
                store: StoreOp::Store,
            },
        }],
        depth_attachment: None,
    };
    ctx.encoder().begin_render_pass(&desc);
    Ok(())
}

/// Creates a 16 byte uniform buffer, uploads `fill` into it and binds it.
fn uploader(name: &str, fill: u8, seen: Arc<Mutex<Vec<BufferId>>>) -> FnPass {
    let out = slot();
    let exec_slot = out.clone();
    FnPass::new(
        name,
        QueueKind::Compute,
        move |builder| {
            let handle = builder.create_shader_buffer(ShaderBufferDesc::new(
                "uniforms",
                16,
                BufferVisibility::Uniform,
            ))?;
            *out.lock().unwrap() = Some(handle);
            Ok(())
        },
        move |ctx| {
            let handle = get(&exec_slot);
            let buffer = ctx.resources().get_shader_buffer(handle)?;
            seen.lock().unwrap().push(buffer);
            ctx.write_buffer(handle, 0, &[fill; 16])?;
            let mut pass = ctx
                .encoder()
                .begin_compute_pass(&ComputePassDescriptor::default());
            pass.bind_buffer(0, buffer);
            pass.dispatch(1, 1, 1);
            Ok(())
        },
    )
}

/// Reads the texture a previous pass stored in `input`.
fn consumer(name: &str, queue: QueueKind, input: Slot) -> FnPass {
    let exec_slot = input.clone();
    FnPass::new(
        name,
        queue,
        move |builder| {
            builder.read(get(&input))?;
            Ok(())
        },
        move |ctx| {
            let texture = ctx.resources().get_texture_buffer(get(&exec_slot))?;
            if queue == QueueKind::Compute {
                let mut pass = ctx
                    .encoder()
                    .begin_compute_pass(&ComputePassDescriptor::default());
                pass.bind_texture(0, texture);
                pass.dispatch(8, 8, 1);
            }
            Ok(())
        },
    )
}

fn runtime(device: &HeadlessDevice, config: RendererConfig, pipeline: Pipeline) -> Runtime {
    Runtime::new(Arc::new(device.clone()), config, pipeline).unwrap()
}

// --- TESTS ---

#[test]
fn test_passes_execute_in_declaration_order() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let (first, second) = (slot(), slot());
    let pipeline = Pipeline::new()
        .with_pass(producer("shadow", "shadow-map", first.clone()))
        .with_pass(consumer("lighting", QueueKind::Compute, first))
        .with_pass(producer("composite", "hdr", second.clone()))
        .with_pass(consumer("present", QueueKind::Render, second));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);
    let scene = Scene::default();

    // --- 2. ACT ---
    let frames: Vec<_> = (0..3).map(|_| runtime.render(&scene).unwrap()).collect();

    // --- 3. ASSERT ---
    for (index, report) in frames.iter().enumerate() {
        assert_eq!(report.frame_index, index as u64);
        assert_eq!(
            report.executed_passes,
            vec!["shadow", "lighting", "composite", "present"]
        );
        let queues: Vec<_> = report.submissions.iter().map(|s| s.queue).collect();
        assert_eq!(
            queues,
            vec![QueueKind::Render, QueueKind::Compute, QueueKind::Render]
        );
        // Serialized mode waited on every batch followed by another queue kind.
        assert!(report.submissions[0].fence.is_complete());
        assert!(report.submissions[1].fence.is_complete());
    }
    let labels: Vec<_> = device.submissions()[..3]
        .iter()
        .map(|s| s.labels.clone())
        .collect();
    assert_eq!(
        labels,
        vec![
            vec!["shadow".to_string()],
            vec!["lighting".to_string()],
            vec!["composite".to_string(), "present".to_string()],
        ]
    );
    assert_eq!(runtime.pipeline().states(), vec![PassState::SetUp; 4]);
}

#[test]
fn test_unordered_mode_submits_every_batch() {
    let device = HeadlessDevice::new();
    let input = slot();
    let pipeline = Pipeline::new()
        .with_pass(producer("gbuffer", "albedo", input.clone()))
        .with_pass(consumer("lighting", QueueKind::Compute, input));
    let config = RendererConfig {
        queue_submission: QueueSubmission::Unordered,
        ..RendererConfig::default()
    };
    let mut runtime = runtime(&device, config, pipeline);

    let report = runtime.render(&Scene::default()).unwrap();

    assert_eq!(report.submissions.len(), 2);
    for fence in report.fences() {
        assert!(fence.wait().is_ok());
    }
}

#[test]
fn test_transients_alias_when_lifetimes_are_disjoint() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let (first, second) = (slot(), slot());
    let pipeline = Pipeline::new()
        .with_pass(producer("a", "first", first.clone()))
        .with_pass(consumer("b", QueueKind::Render, first))
        .with_pass(producer("c", "second", second.clone()))
        .with_pass(consumer("d", QueueKind::Render, second));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);
    let scene = Scene::default();

    // --- 2. ACT ---
    let frame0 = runtime.render(&scene).unwrap();
    let frame1 = runtime.render(&scene).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(frame0.transients, 2);
    assert_eq!(frame0.aliased_transients, 1);
    assert_eq!(frame0.transient_allocations, 1);
    assert_eq!(frame1.transient_allocations, 0);
    assert_eq!(frame1.transient_reuses, 2);
    assert_eq!(device.creation_count("first"), 1);
    assert_eq!(device.creation_count("second"), 0);
}

#[test]
fn test_overlapping_lifetimes_get_separate_objects() {
    let device = HeadlessDevice::new();
    let (first, second) = (slot(), slot());
    let (read_first, read_second) = (first.clone(), second.clone());
    let pipeline = Pipeline::new()
        .with_pass(producer("a", "first", first))
        .with_pass(producer("b", "second", second))
        .with_pass(FnPass::new(
            "c",
            QueueKind::Render,
            move |builder| {
                builder.read(get(&read_first))?;
                builder.read(get(&read_second))?;
                Ok(())
            },
            |_| Ok(()),
        ));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);

    let report = runtime.render(&Scene::default()).unwrap();

    assert_eq!(report.transients, 2);
    assert_eq!(report.aliased_transients, 0);
    assert_eq!(report.transient_allocations, 2);
}

#[test]
fn test_aliasing_can_be_disabled() {
    let device = HeadlessDevice::new();
    let (first, second) = (slot(), slot());
    let pipeline = Pipeline::new()
        .with_pass(producer("a", "first", first.clone()))
        .with_pass(consumer("b", QueueKind::Render, first))
        .with_pass(producer("c", "second", second.clone()))
        .with_pass(consumer("d", QueueKind::Render, second));
    let config = RendererConfig {
        alias_transients: false,
        ..RendererConfig::default()
    };
    let mut runtime = runtime(&device, config, pipeline);

    let report = runtime.render(&Scene::default()).unwrap();

    assert_eq!(report.aliased_transients, 0);
    assert_eq!(report.transient_allocations, 2);
}

#[test]
fn test_failing_pass_aborts_the_frame() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let input = slot();
    let pipeline = Pipeline::new()
        .with_pass(producer("geometry", "albedo", input.clone()))
        .with_pass(consumer("tonemap", QueueKind::Render, input))
        .with_pass(FnPass::new(
            "broken",
            QueueKind::Render,
            |_| Ok(()),
            |_| Err(RenderError::Internal("shader exploded".into()).into()),
        ));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);

    // --- 2. ACT ---
    let result = runtime.render(&Scene::default());

    // --- 3. ASSERT ---
    match result {
        Err(GraphError::PassFailed { pass, source }) => {
            assert_eq!(pass, "broken");
            assert!(matches!(
                *source,
                GraphError::Render(RenderError::Internal(_))
            ));
        }
        other => panic!("expected PassFailed, got {other:?}"),
    }
    assert_eq!(device.stats().submissions, 0, "nothing may be submitted");
    assert_eq!(device.pending_command_buffer_count(), 0);
    assert_eq!(runtime.pool().in_use(), 0);
    assert_eq!(runtime.pool().free_count(), 1);
    assert_eq!(runtime.pipeline().states(), vec![PassState::SetUp; 3]);
}

#[test]
fn test_undeclared_access_is_rejected() {
    let device = HeadlessDevice::new();
    let input = slot();
    let peek = input.clone();
    let pipeline = Pipeline::new()
        .with_pass(producer("a", "secret", input))
        .with_pass(FnPass::new(
            "sneaky",
            QueueKind::Render,
            |_| Ok(()),
            move |ctx| {
                ctx.resources().get_texture_buffer(get(&peek))?;
                Ok(())
            },
        ));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);

    let error = runtime.render(&Scene::default()).unwrap_err();

    assert!(matches!(
        error.root(),
        GraphError::UndeclaredHandle { pass, .. } if pass == "sneaky"
    ));
}

#[test]
fn test_handle_from_previous_frame_is_stale() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let kept = slot();
    let pipeline = Pipeline::new().with_pass(FnPass::new(
        "hoarder",
        QueueKind::Render,
        move |builder| {
            let mut kept = kept.lock().unwrap();
            match *kept {
                // Frame 0 keeps its handle, frame 1 tries to reuse it.
                None => *kept = Some(builder.create_texture_buffer(color_target("old"))?),
                Some(old) => {
                    builder.read(old)?;
                }
            }
            Ok(())
        },
        |_| Ok(()),
    ));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);
    let scene = Scene::default();

    // --- 2. ACT ---
    runtime.render(&scene).unwrap();
    let error = runtime.render(&scene).unwrap_err();

    // --- 3. ASSERT ---
    assert!(matches!(
        error.root(),
        GraphError::StaleHandle {
            current_generation: 1,
            ..
        }
    ));
}

#[test]
fn test_shared_registry_is_empty_at_frame_start() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = seen.clone();
    let publisher = FnPass::new(
        "publisher",
        QueueKind::Render,
        |builder| {
            let backbuffer = builder.write(builder.backbuffer())?;
            if builder.frame_index() == 0 {
                builder.shared_mut().set(SceneColor {
                    texture: backbuffer,
                });
            }
            Ok(())
        },
        |_| Ok(()),
    );
    let observer = FnPass::new(
        "observer",
        QueueKind::Render,
        |_| Ok(()),
        move |ctx| {
            observed
                .lock()
                .unwrap()
                .push(ctx.shared().check::<SceneColor>());
            Ok(())
        },
    );
    let pipeline = Pipeline::new().with_pass(publisher).with_pass(observer);
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);
    let scene = Scene::default();

    // --- 2. ACT ---
    runtime.render(&scene).unwrap();
    runtime.render(&scene).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
}

#[test]
fn test_persistent_resources_survive_frames_until_released() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let owner = FnPass::new(
        "history",
        QueueKind::Render,
        {
            let mut id = None;
            move |builder: &mut GraphBuilder<'_>| {
                match (id, builder.frame_index()) {
                    (None, _) => {
                        let (new_id, _) =
                            builder.create_persistent(VertexBufferDesc::new("history", 256))?;
                        id = Some(new_id);
                    }
                    (Some(existing), 3) => {
                        builder.release_persistent(existing)?;
                    }
                    (Some(existing), _) => {
                        builder.import_resource(existing)?;
                    }
                }
                Ok(())
            }
        },
        |_| Ok(()),
    );
    let mut runtime = runtime(&device, RendererConfig::default(), Pipeline::new().with_pass(owner));
    let scene = Scene::default();

    // --- 2. ACT ---
    let reports: Vec<_> = (0..4).map(|_| runtime.render(&scene).unwrap()).collect();

    // --- 3. ASSERT ---
    assert_eq!(device.creation_count("history"), 1);
    assert_eq!(reports[0].persistent_allocated, 2, "backbuffer and history");
    assert_eq!(reports[1].persistent_allocated, 0);
    assert_eq!(reports[2].persistent_destroyed, 0);
    assert_eq!(reports[3].persistent_destroyed, 1);
    assert_eq!(device.stats().live_buffers(), 0);
}

#[test]
fn test_resize_replaces_the_backbuffer() {
    let device = HeadlessDevice::new();
    let pipeline = Pipeline::new().with_pass(FnPass::new(
        "present",
        QueueKind::Render,
        |builder| {
            builder.write(builder.backbuffer())?;
            Ok(())
        },
        |_| Ok(()),
    ));
    let config = RendererConfig {
        backbuffer: Extent2D::new(800, 600),
        ..RendererConfig::default()
    };
    let mut runtime = runtime(&device, config, pipeline);
    let scene = Scene::default();

    runtime.render(&scene).unwrap();
    runtime.resize(Extent2D::new(0, 600));
    runtime.resize(Extent2D::new(1024, 768));
    assert_eq!(runtime.backbuffer_size(), Extent2D::new(800, 600));
    let report = runtime.render(&scene).unwrap();

    assert_eq!(report.backbuffer_size, Extent2D::new(1024, 768));
    let live = device.live_textures_labeled(BACKBUFFER_LABEL);
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].1.size.to_2d(), Extent2D::new(1024, 768));
    assert_eq!(device.creation_count(BACKBUFFER_LABEL), 2);
}

#[test]
fn test_task_failure_surfaces_on_the_next_frame() {
    let device = HeadlessDevice::new();
    let pipeline = Pipeline::new().with_pass(FnPass::new(
        "present",
        QueueKind::Render,
        |builder| {
            builder.write(builder.backbuffer())?;
            Ok(())
        },
        |_| Ok(()),
    ));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);
    let scene = Scene::default();

    device.fail_next_submission("device hung");
    runtime.render(&scene).unwrap();
    let error = runtime.render(&scene).unwrap_err();

    assert!(matches!(error, GraphError::Fence { .. }));
    assert!(runtime.render(&scene).is_ok(), "the runtime recovers");
}

#[test]
fn test_idle_trimming_never_destroys_in_flight_transients() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let target = slot();
    let (setup_slot, exec_slot) = (target.clone(), target.clone());
    // The target alternates between two sizes, so each object idles for one frame.
    let geometry = FnPass::new(
        "geometry",
        QueueKind::Render,
        move |builder| {
            let width = if builder.frame_index() % 2 == 0 { 64 } else { 96 };
            let handle = builder.create_texture_buffer(TextureBufferDesc::new(
                "scratch",
                TextureSize::Absolute(Extent2D::new(width, 64)),
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            ))?;
            *setup_slot.lock().unwrap() = Some(handle);
            Ok(())
        },
        move |ctx| clear(ctx, &exec_slot),
    );
    let pipeline = Pipeline::new()
        .with_pass(geometry)
        .with_pass(consumer("lighting", QueueKind::Compute, target));
    let config = RendererConfig {
        transient_max_idle_frames: 0,
        queue_submission: QueueSubmission::Unordered,
        ..RendererConfig::default()
    };
    let mut runtime = runtime(&device, config, pipeline);
    let scene = Scene::default();

    // --- 2. ACT ---
    let mut fences = Vec::new();
    let mut destroyed = 0;
    for _ in 0..50 {
        let report = runtime.render(&scene).unwrap();
        destroyed += report.transient_destroyed;
        fences.extend(report.fences().cloned());
    }

    // --- 3. ASSERT ---
    assert!(fences.iter().all(|fence| fence.wait().is_ok()));
    assert_eq!(destroyed, 49, "each size is trimmed once its frame retired");
    assert_eq!(runtime.pool().free_count(), 1);
}

#[test]
fn test_uploads_to_aliased_buffers_stay_ordered() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new()
        .with_pass(uploader("first", 1, seen.clone()))
        .with_pass(uploader("second", 2, seen.clone()));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);

    // --- 2. ACT ---
    let report = runtime.render(&Scene::default()).unwrap();
    for fence in report.fences() {
        fence.wait().unwrap();
    }

    // --- 3. ASSERT ---
    assert_eq!(report.aliased_transients, 1);
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0], seen[1], "both passes share one buffer");
    assert_eq!(
        device.buffer_bindings(),
        vec![(seen[0], vec![1; 16]), (seen[0], vec![2; 16])]
    );
    assert_eq!(device.buffer_contents(seen[0]), Some(vec![2; 16]));
}

#[test]
fn test_uploads_of_an_aborted_frame_never_land() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new()
        .with_pass(uploader("first", 1, seen.clone()))
        .with_pass(FnPass::new(
            "broken",
            QueueKind::Compute,
            |_| Ok(()),
            |_| Err(RenderError::Internal("boom".into()).into()),
        ));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);

    // --- 2. ACT ---
    let result = runtime.render(&Scene::default());

    // --- 3. ASSERT ---
    assert!(result.is_err());
    let buffer = seen.lock().unwrap()[0];
    assert_eq!(device.buffer_contents(buffer), Some(vec![0; 16]));
    assert!(device.buffer_bindings().is_empty());
}

#[test]
fn test_shutdown_destroys_everything() {
    let device = HeadlessDevice::new();
    let (first, second) = (slot(), slot());
    let pipeline = Pipeline::new()
        .with_pass(producer("a", "first", first.clone()))
        .with_pass(consumer("b", QueueKind::Compute, first))
        .with_pass(producer("c", "second", second.clone()))
        .with_pass(consumer("d", QueueKind::Render, second));
    let mut runtime = runtime(&device, RendererConfig::default(), pipeline);
    for _ in 0..3 {
        runtime.render(&Scene::default()).unwrap();
    }

    runtime.shutdown().unwrap();

    let stats = device.stats();
    assert_eq!(stats.live_textures(), 0);
    assert_eq!(stats.live_buffers(), 0);
    assert_eq!(stats.vram_allocated_bytes, 0);
}
