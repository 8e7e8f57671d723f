// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The metadata catalogue: persistent `FileName -> FileRecord` mapping plus load-balancer
//! state, the single source of truth a crashed operation resumes from.

mod model;
mod store;

pub use model::{
    CatalogueSnapshot, FileRecord, LoadBalancerState, OperationState, Remote, ShardRecord,
};
pub use store::{Catalogue, LoadBalancerStore};
