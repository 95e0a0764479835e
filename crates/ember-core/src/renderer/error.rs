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

//! Defines the hierarchy of error types for the rendering subsystem.

use std::fmt;

/// An error related to the creation or management of a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The backend failed to compile the pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// A required shader stage is missing (e.g. a fragment shader with color targets).
    MissingShaderStage {
        /// The label of the pipeline being created.
        label: Option<String>,
        /// The stage that was expected.
        stage: &'static str,
    },
    /// A shader stage was given empty source code.
    EmptyShaderSource {
        /// The label of the pipeline being created.
        label: Option<String>,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::CompilationFailed { label, details } => {
                write!(f, "Pipeline compilation failed for '{label:?}': {details}")
            }
            PipelineError::MissingShaderStage { label, stage } => {
                write!(f, "Pipeline '{label:?}' is missing its {stage} stage")
            }
            PipelineError::EmptyShaderSource { label } => {
                write!(f, "Pipeline '{label:?}' has an empty shader source")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation, use, or destruction of GPU resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A generic error indicating that a requested resource could not be found.
    NotFound,
    /// An error indicating that a provided resource handle or ID is invalid.
    InvalidHandle,
    /// The backend refused to allocate a resource.
    AllocationFailed {
        /// Label of the resource being allocated.
        label: Option<String>,
        /// Backend-provided reason.
        reason: String,
    },
    /// The allocation would exceed the device's memory budget.
    OutOfMemory {
        /// Bytes requested.
        requested: u64,
        /// Bytes still available.
        available: u64,
    },
    /// An error occurred while building a pipeline.
    Pipeline(PipelineError),
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle."),
            ResourceError::AllocationFailed { label, reason } => {
                write!(f, "Allocation of '{label:?}' failed: {reason}")
            }
            ResourceError::OutOfMemory {
                requested,
                available,
            } => write!(
                f,
                "Out of GPU memory: requested {requested} bytes, {available} available"
            ),
            ResourceError::Pipeline(err) => write!(f, "Pipeline error: {err}"),
            ResourceError::BackendError(msg) => write!(f, "Backend error: {msg}"),
            ResourceError::OutOfBounds => write!(f, "Access out of bounds."),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A high-level error that can occur while recording or submitting a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A resource needed for the frame was missing or invalid.
    ResourceError(ResourceError),
    /// The device rejected a submission.
    SubmissionFailed(String),
    /// The connection to the device was lost.
    DeviceLost,
    /// An unexpected internal error.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ResourceError(err) => write!(f, "Resource error: {err}"),
            RenderError::SubmissionFailed(msg) => write!(f, "Submission failed: {msg}"),
            RenderError::DeviceLost => write!(f, "The graphics device was lost."),
            RenderError::Internal(msg) => write!(f, "Internal rendering error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

/// A failure raised by asynchronous GPU-side work and carried by a [`Fence`](crate::renderer::Fence).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuTaskError {
    /// The task reported a failure.
    Failed {
        /// Label of the failing task.
        task: String,
        /// What went wrong.
        message: String,
    },
    /// The task panicked.
    Panicked {
        /// Label of the failing task.
        task: String,
        /// The panic payload, if it was a string.
        message: String,
    },
    /// The completion signal was dropped before the task reported a result.
    SignalDropped {
        /// Label of the abandoned task.
        task: String,
    },
}

impl fmt::Display for GpuTaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuTaskError::Failed { task, message } => {
                write!(f, "GPU task '{task}' failed: {message}")
            }
            GpuTaskError::Panicked { task, message } => {
                write!(f, "GPU task '{task}' panicked: {message}")
            }
            GpuTaskError::SignalDropped { task } => {
                write!(f, "GPU task '{task}' was abandoned before completion")
            }
        }
    }
}

impl std::error::Error for GpuTaskError {}
