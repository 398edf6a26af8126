//! Test harness: a host on a loopback port and a minimal client.

#![allow(dead_code)]

mod client;
mod server;

pub use client::{ACCEPT, Frame, KEY, TestClient, Upgrade};
pub use server::TestServer;
