// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ductile-pipelines: pipeline DAG compilation and the event router (spec §4.7.1).

pub mod dag;
pub mod error;
pub mod router;

pub use dag::{CompiledPipeline, DispatchUnit, PipelineSet};
pub use error::PipelineError;
pub use router::{RouteOutcome, Router};
