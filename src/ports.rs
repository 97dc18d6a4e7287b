// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Local TCP port allocation for forwarded services.

use std::net::TcpListener;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{CorralError, Result};

// Ports already handed out by this process. Binding reserves a port against
// other processes, but the listener is dropped before the forwarder starts,
// so a concurrent allocation here could otherwise return the same number.
static CLAIMED: Mutex<Vec<u16>> = Mutex::new(Vec::new());

/// Find a free local port, probing upwards from `preferred`.
///
/// Each candidate is checked by binding a loopback listener, which is dropped
/// again immediately. The window between that drop and the forwarder binding
/// the port remains a known limitation; the claim set only removes the race
/// between allocations inside one run.
pub fn allocate(preferred: u16) -> Result<u16> {
    let mut claimed = CLAIMED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    for port in preferred..=u16::MAX {
        if claimed.contains(&port) {
            continue;
        }
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(_listener) => {
                claimed.push(port);
                if port != preferred {
                    debug!("preferred port {} taken, allocated {}", preferred, port);
                }
                return Ok(port);
            }
            Err(e) => {
                debug!("port {} unavailable: {}", port, e);
            }
        }
    }

    Err(CorralError::NoPortAvailable)
}

/// Return a port to the pool once its forwarder has stopped.
pub fn release(port: u16) {
    let mut claimed = CLAIMED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    claimed.retain(|p| *p != port);
}
