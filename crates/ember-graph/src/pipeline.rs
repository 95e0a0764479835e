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

//! An ordered list of passes making up a frame.

use crate::builder::GraphBuilder;
use crate::context::ExecuteContext;
use crate::error::GraphError;
use crate::pass::{PassState, RenderPass};

/// The passes of a frame, in execution order.
///
/// Passes are set up and executed in the order they were added. Reordering
/// them is the caller's business, so the order is also the declared
/// dependency order.
#[derive(Default)]
pub struct Pipeline {
    passes: Vec<(Box<dyn RenderPass>, PassState)>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pass, builder style.
    pub fn with_pass(mut self, pass: impl RenderPass + 'static) -> Self {
        self.add_pass(Box::new(pass));
        self
    }

    /// Appends a pass.
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) {
        log::debug!("Pipeline: Added pass '{}'", pass.name());
        self.passes.push((pass, PassState::Uninitialized));
    }

    /// Number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if the pipeline has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|(pass, _)| pass.name()).collect()
    }

    /// Lifecycle state of every pass.
    pub fn states(&self) -> Vec<PassState> {
        self.passes.iter().map(|(_, state)| *state).collect()
    }

    /// Lifecycle state of the pass at `index`.
    pub fn state(&self, index: usize) -> Option<PassState> {
        self.passes.get(index).map(|(_, state)| *state)
    }

    /// Runs every pass's setup against `builder`.
    pub(crate) fn setup(&mut self, builder: &mut GraphBuilder<'_>) -> Result<(), GraphError> {
        let size = builder.backbuffer_size();
        for (pass, state) in self.passes.iter_mut() {
            builder.begin_pass(pass.name(), pass.queue());
            let result = match *state {
                PassState::Uninitialized => pass.create(builder),
                _ => {
                    if pass.should_rebuild(size) {
                        log::debug!("Pipeline: Rebuilding '{}' for {}", pass.name(), size);
                        *state = PassState::StaleOnResize;
                        builder.set_rebuild_requested(true);
                    }
                    pass.recreate(builder)
                }
            };
            builder.end_pass();
            result.map_err(|source| GraphError::PassFailed {
                pass: pass.name().to_string(),
                source: Box::new(source),
            })?;
            *state = PassState::SetUp;
        }
        Ok(())
    }

    pub(crate) fn execute_pass(
        &mut self,
        index: usize,
        ctx: &mut ExecuteContext<'_>,
    ) -> Result<(), GraphError> {
        let (pass, state) = &mut self.passes[index];
        *state = PassState::Executing;
        let result = pass.execute(ctx);
        *state = PassState::SetUp;
        result
    }
}
