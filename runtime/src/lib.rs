// Copyright 2026 Pairwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pairwatch runtime: captures a trading-pair listing page on a schedule,
//! normalizes it into canonical records, and keeps a backed-up snapshot on
//! disk with alerting on sustained failure.

#![allow(clippy::new_without_default)]

pub mod acquisition;
pub mod alert;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod extraction;
pub mod normalize;
pub mod renderer;
pub mod store;
pub mod types;
