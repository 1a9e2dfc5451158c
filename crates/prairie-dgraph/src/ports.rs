//! Port offsets for side-by-side Dgraph instances.
//!
//! Every instance started in a process claims a distinct offset and adds it
//! to each base port, so several clusters can run on one host.

use std::sync::atomic::{AtomicU16, Ordering};

use prairie_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Port of the Ratel UI; it does not move with the offset.
pub const UI_PORT: u16 = 8000;

/// Hands out port offsets, never the same one twice.
#[derive(Debug, Default)]
pub struct PortAllocator {
    next: AtomicU16,
}

static GLOBAL: PortAllocator = PortAllocator::starting_at(0);

impl PortAllocator {
    /// Allocator whose first claim returns `first`.
    pub const fn starting_at(first: u16) -> Self {
        Self {
            next: AtomicU16::new(first),
        }
    }

    /// The allocator shared by the whole process.
    pub fn global() -> &'static PortAllocator {
        &GLOBAL
    }

    /// Claim the next offset.
    pub fn claim(&self) -> u16 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Offset the next claim would return.
    pub fn peek(&self) -> u16 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Base ports before the offset is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasePorts {
    /// Coordinator gRPC.
    pub zero_grpc: u16,
    /// Coordinator HTTP.
    pub zero_http: u16,
    /// Worker gRPC.
    pub alpha_grpc: u16,
    /// Worker HTTP.
    pub alpha_http: u16,
}

impl Default for BasePorts {
    fn default() -> Self {
        Self {
            zero_grpc: 5080,
            zero_http: 6080,
            alpha_grpc: 9080,
            alpha_http: 8080,
        }
    }
}

impl BasePorts {
    /// Concrete ports for an instance at `offset`.
    pub fn with_offset(&self, offset: u16) -> Result<Ports> {
        let shift = |base: u16| {
            base.checked_add(offset).ok_or_else(|| {
                Error::config(format!("port {base} + offset {offset} exceeds 65535"))
            })
        };
        Ok(Ports {
            offset,
            zero_grpc: shift(self.zero_grpc)?,
            zero_http: shift(self.zero_http)?,
            alpha_grpc: shift(self.alpha_grpc)?,
            alpha_http: shift(self.alpha_http)?,
            ui: UI_PORT,
        })
    }
}

/// Ports of one running instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    /// Offset the ports were derived from.
    pub offset: u16,
    /// Coordinator gRPC.
    pub zero_grpc: u16,
    /// Coordinator HTTP.
    pub zero_http: u16,
    /// Worker gRPC.
    pub alpha_grpc: u16,
    /// Worker HTTP.
    pub alpha_http: u16,
    /// UI.
    pub ui: u16,
}
