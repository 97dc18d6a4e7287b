// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! External command execution and long-lived process supervision.

pub mod command;
pub mod supervisor;

pub use command::{run_tool, CommandLine, ToolOutput};
pub use supervisor::{start, ProcessState, ProcessStatus, RestartPolicy, SupervisedHandle};
