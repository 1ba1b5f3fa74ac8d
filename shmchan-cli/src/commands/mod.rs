// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Command handlers for the shmchan CLI.

pub mod consume;
pub mod demo;
pub mod destroy;
pub mod produce;
pub mod validate;
