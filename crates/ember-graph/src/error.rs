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

//! Errors raised while building, compiling and executing a frame graph.

use crate::handle::ResourceHandle;
use crate::persistent::PersistentId;
use crate::resource::ResourceKind;
use crate::shared::SharedResourceName;
use ember_core::renderer::{FenceWaitError, RenderError, ResourceError};
use ember_core::ConfigError;
use thiserror::Error;

/// Every failure the frame graph can report.
///
/// Build-time variants name the offending pass and handle. They signal a bug in
/// pass authoring and abort the frame.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A pass accessed a handle it never declared in its setup.
    #[error("pass '{pass}' used handle {handle} without declaring it")]
    UndeclaredHandle {
        /// Name of the offending pass.
        pass: String,
        /// The undeclared handle.
        handle: ResourceHandle,
    },
    /// The handle does not name any resource in the current graph.
    #[error("pass '{pass}' used unknown handle {handle}")]
    UnknownHandle {
        /// Name of the offending pass.
        pass: String,
        /// The unknown handle.
        handle: ResourceHandle,
    },
    /// The handle was issued by a previous frame's graph.
    #[error("pass '{pass}' used stale handle {handle} in graph generation {current_generation}")]
    StaleHandle {
        /// Name of the offending pass.
        pass: String,
        /// The stale handle.
        handle: ResourceHandle,
        /// Generation of the graph being built or executed.
        current_generation: u32,
    },
    /// The handle names a resource of a different kind.
    #[error("pass '{pass}' expected a {expected} for {handle}, found a {actual}")]
    KindMismatch {
        /// Name of the offending pass.
        pass: String,
        /// The handle looked up.
        handle: ResourceHandle,
        /// Kind requested by the getter.
        expected: ResourceKind,
        /// Kind of the resource.
        actual: ResourceKind,
    },
    /// A per-pass builder operation was called outside of any pass setup.
    #[error("'{operation}' called outside of a pass setup")]
    NoActivePass {
        /// The builder operation.
        operation: &'static str,
    },
    /// The persistent resource does not exist.
    #[error("unknown persistent resource {id}")]
    UnknownPersistent {
        /// The offending identifier.
        id: PersistentId,
    },
    /// The persistent resource was already released.
    #[error("persistent resource {id} released twice")]
    DoubleRelease {
        /// The offending identifier.
        id: PersistentId,
    },
    /// A pass reads a resource before any pass produced it.
    #[error("pass '{pass}' reads '{resource}' ({handle}) before any pass produced it")]
    ReadBeforeWrite {
        /// Name of the reading pass.
        pass: String,
        /// The handle read.
        handle: ResourceHandle,
        /// Debug name of the resource.
        resource: String,
    },
    /// A shared resource was read before any pass published it this frame.
    #[error("shared resource {name:?} is not set")]
    SharedResourceMissing {
        /// The missing slot.
        name: SharedResourceName,
    },
    /// A pass was asked to execute without a successful setup this frame.
    #[error("pass '{pass}' executed before its setup")]
    NotSetUp {
        /// Name of the pass.
        pass: String,
    },
    /// The backend failed to allocate or access a resource.
    #[error("resource error: {0}")]
    Allocation(#[from] ResourceError),
    /// The backend failed to record or submit work.
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    /// A pass failed while recording commands; the frame was aborted.
    #[error("pass '{pass}' failed")]
    PassFailed {
        /// Name of the failing pass.
        pass: String,
        /// The failure raised by the pass.
        #[source]
        source: Box<GraphError>,
    },
    /// Waiting on a submission fence failed or timed out.
    #[error("fence '{label}' failed")]
    Fence {
        /// Label of the fence.
        label: String,
        /// Why the wait failed.
        #[source]
        source: FenceWaitError,
    },
    /// The renderer configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GraphError {
    /// Returns the innermost error, unwrapping [`GraphError::PassFailed`].
    pub fn root(&self) -> &GraphError {
        match self {
            GraphError::PassFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
