// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-wired client harnesses and event-plane helpers.

use std::time::Duration;

use tokio::sync::broadcast;

use argus_core::event::RuntimeEvent;
use argus_core::types::{ConnectionState, Quality, TagId, Value};
use argus_opcua::client::{ClientConfig, OpcUaClient};
use argus_opcua::transport::Identity;

use super::builders::{fast_client_config, quiet_client_config};
use super::mocks::MockSession;

/// The endpoint used by every fixture.
pub const TEST_ENDPOINT: &str = "opc.tcp://127.0.0.1:49320";

/// A client wired to a scripted session, plus the control handle.
pub struct ClientFixture {
    /// The client under test.
    pub client: OpcUaClient<MockSession>,

    /// Control handle into the scripted session.
    pub server: MockSession,
}

impl ClientFixture {
    /// Builds a disconnected fixture with the given config.
    pub fn with_config(config: ClientConfig) -> Self {
        super::init_test_tracing();
        let server = MockSession::new();
        let client = OpcUaClient::new(server.clone(), config);
        Self { client, server }
    }

    /// Builds a disconnected fixture with fast test timings.
    pub fn new() -> Self {
        Self::with_config(fast_client_config())
    }

    /// Builds a fixture with keepalive effectively disabled.
    pub fn quiet() -> Self {
        Self::with_config(quiet_client_config())
    }

    /// Builds a connected fixture (anonymous identity).
    pub async fn connected() -> Self {
        let fixture = Self::quiet();
        fixture
            .client
            .connect(TEST_ENDPOINT, Identity::Anonymous)
            .await
            .expect("fixture connect");
        fixture
    }

    /// Waits until the client reaches `state`, up to `within`.
    pub async fn wait_for_state(&self, state: ConnectionState, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if self.client.state() == state {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.client.state() == state
    }
}

impl Default for ClientFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives events until a value change arrives or `within` elapses.
pub async fn next_value_change(
    rx: &mut broadcast::Receiver<RuntimeEvent>,
    within: Duration,
) -> Option<(TagId, Value, Quality)> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(RuntimeEvent::ValueChanged {
                tag, value, quality, ..
            })) => return Some((tag, value, quality)),
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            _ => return None,
        }
    }
}

/// Receives events until one matching `predicate` arrives or `within`
/// elapses.
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<RuntimeEvent>,
    within: Duration,
    predicate: impl Fn(&RuntimeEvent) -> bool,
) -> Option<RuntimeEvent> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) if predicate(&event) => return Some(event),
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            _ => return None,
        }
    }
}
