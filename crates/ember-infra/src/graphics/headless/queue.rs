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

//! Per-queue worker threads executing headless submissions.

use super::device::{HeadlessDeviceInternal, RecordedCommandBuffer};
use ember_core::renderer::{FenceSignal, GpuTaskError, QueueKind};
use std::sync::Weak;

/// A submission waiting to be executed by a queue worker.
pub(crate) struct QueueJob {
    pub(crate) label: String,
    pub(crate) buffers: Vec<RecordedCommandBuffer>,
    pub(crate) signal: FenceSignal,
    pub(crate) injected_failure: Option<String>,
}

impl QueueJob {
    /// Executes the job on the current thread and resolves its fence.
    pub(crate) fn execute(self, device: &HeadlessDeviceInternal) {
        let QueueJob {
            label,
            buffers,
            signal,
            injected_failure,
        } = self;
        let result = match injected_failure {
            Some(message) => Err(GpuTaskError::Failed {
                task: label,
                message,
            }),
            None => Self::run(&label, &buffers, device),
        };
        signal.complete(result);
    }

    fn run(
        label: &str,
        buffers: &[RecordedCommandBuffer],
        device: &HeadlessDeviceInternal,
    ) -> Result<(), GpuTaskError> {
        for buffer in buffers {
            for command in &buffer.commands {
                device
                    .execute_command(command)
                    .map_err(|message| GpuTaskError::Failed {
                        task: format!("{label}/{}", buffer.label),
                        message,
                    })?;
            }
        }
        Ok(())
    }
}

/// A thread draining the submissions of one [`QueueKind`] in order.
#[derive(Debug)]
pub(crate) struct QueueWorker {
    sender: flume::Sender<QueueJob>,
}

impl QueueWorker {
    /// Spawns the worker. It exits once the device (and thus the sender) is dropped.
    pub(crate) fn spawn(
        kind: QueueKind,
        device: Weak<HeadlessDeviceInternal>,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = flume::unbounded::<QueueJob>();
        std::thread::Builder::new()
            .name(format!("ember-headless-{kind}"))
            .spawn(move || {
                for job in receiver.iter() {
                    match device.upgrade() {
                        Some(device) => job.execute(&device),
                        // Dropping the job drops its signal, failing the fence.
                        None => break,
                    }
                }
                log::trace!("HeadlessDevice: {kind} queue worker exiting");
            })?;
        Ok(Self { sender })
    }

    /// Queues `job`, executing it inline if the worker is gone.
    pub(crate) fn send(&self, job: QueueJob, device: &HeadlessDeviceInternal) {
        if let Err(flume::SendError(job)) = self.sender.send(job) {
            log::warn!("HeadlessDevice: Queue worker is gone, executing '{}' inline", job.label);
            job.execute(device);
        }
    }
}
