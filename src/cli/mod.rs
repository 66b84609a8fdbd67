// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Helpers shared by the `solidcraft` binary

pub mod inputs;
pub mod reporter;

pub use inputs::{parse_pack_entry, parse_params, parse_points, PackEntry};
pub use reporter::Reporter;
