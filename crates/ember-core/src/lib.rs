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

//! # Ember Core
//!
//! Foundational crate containing the backend-agnostic GPU contracts, core types,
//! and configuration shared by every other Ember crate.
//!
//! The render graph (`ember-graph`) only ever talks to a GPU through the
//! [`GraphicsDevice`](renderer::GraphicsDevice) trait defined here. Concrete
//! backends live in infrastructure crates and implement that trait.

#![warn(missing_docs)]

pub mod config;
pub mod math;
pub mod renderer;
pub mod scene;

pub use config::{ConfigError, QueueSubmission, RendererConfig};
