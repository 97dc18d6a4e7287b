// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod error;
pub mod kubernetes;
pub mod pipeline;
pub mod poller;
pub mod ports;
pub mod process;
pub mod registry;
pub mod session;
pub mod steps;
pub mod teardown;
pub mod tools;

#[cfg(test)]
pub mod test_utils;
