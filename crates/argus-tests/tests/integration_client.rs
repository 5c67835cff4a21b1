// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Client Integration Tests
//!
//! End-to-end tests of the client facade against a scripted session:
//! lifecycle, registry operations, pipeline reads/writes, batch
//! semantics, and back-pressure.

use std::time::Duration;

use argus_core::error::{CapacityError, ConfigError, ConnectionError, RuntimeError};
use argus_core::event::RuntimeEvent;
use argus_core::policy::PipelineConfig;
use argus_core::types::{ConnectionState, Quality, TagId, Value};
use argus_opcua::client::OpcUaClient;
use argus_opcua::codec::WireValue;
use argus_opcua::transport::Identity;

use argus_tests::common::{
    analog_input, analog_output, fast_client_config, wait_for_event, ClientFixture, TEST_ENDPOINT,
};

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_cold_connect_reaches_connected_with_keepalives() {
    let fixture = ClientFixture::new();
    let mut events = fixture.client.subscribe_events();

    assert_eq!(fixture.client.state(), ConnectionState::Disconnected);
    fixture
        .client
        .connect(TEST_ENDPOINT, Identity::Anonymous)
        .await
        .unwrap();
    assert!(
        fixture
            .wait_for_state(ConnectionState::Connected, Duration::from_secs(10))
            .await
    );

    // The state machine walked Disconnected -> Connecting -> Connected.
    let mut transitions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RuntimeEvent::StateChanged { prev, next } = event {
            transitions.push((prev, next));
        }
    }
    assert_eq!(
        transitions,
        vec![
            (ConnectionState::Disconnected, ConnectionState::Connecting),
            (ConnectionState::Connecting, ConnectionState::Connected),
        ]
    );

    // Keepalive probes tick at the configured interval thereafter.
    let mut keepalives = 0;
    for _ in 0..2 {
        if wait_for_event(&mut events, Duration::from_millis(500), |e| {
            matches!(e, RuntimeEvent::Keepalive)
        })
        .await
        .is_some()
        {
            keepalives += 1;
        }
    }
    assert_eq!(keepalives, 2, "expected periodic keepalive events");

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_disconnect_and_reconnect_cycle() {
    let fixture = ClientFixture::connected().await;

    fixture.client.disconnect().await.unwrap();
    assert_eq!(fixture.client.state(), ConnectionState::Disconnected);

    fixture.client.reconnect().await.unwrap();
    assert_eq!(fixture.client.state(), ConnectionState::Connected);
    assert_eq!(fixture.server.connect_count(), 2);

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

// =============================================================================
// Registry through the facade
// =============================================================================

#[tokio::test]
async fn test_register_duplicate_and_unknown() {
    let fixture = ClientFixture::connected().await;

    fixture.client.register(analog_input("T1")).await.unwrap();
    let err = fixture
        .client
        .register(analog_input("T1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Config(ConfigError::DuplicateTag { .. })
    ));

    let err = fixture
        .client
        .unregister(&TagId::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Config(ConfigError::UnknownTag { .. })
    ));

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_register_many_and_clear() {
    let fixture = ClientFixture::connected().await;

    let registered = fixture
        .client
        .register_many(vec![
            analog_input("A"),
            analog_input("B"),
            analog_output("C"),
        ])
        .await
        .unwrap();
    assert_eq!(registered, 3);
    assert_eq!(fixture.client.list_tags().len(), 3);

    fixture.client.clear().await.unwrap();
    assert!(fixture.client.list_tags().is_empty());

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_invalid_address_refused_at_registration() {
    let fixture = ClientFixture::connected().await;

    let def = argus_core::variable::VariableDefinition::builder("Bad", "ns=2;q=什么")
        .build()
        .unwrap();
    let err = fixture.client.register(def).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Config(ConfigError::InvalidAddress { .. })
    ));

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

// =============================================================================
// Reads and writes
// =============================================================================

#[tokio::test]
async fn test_read_updates_handle_latest() {
    let fixture = ClientFixture::connected().await;
    fixture.client.register(analog_input("T1")).await.unwrap();
    fixture
        .server
        .set_value("ns=2;s=T1".parse().unwrap(), WireValue::Float(21.5));

    let value = fixture
        .client
        .read_sync(TagId::new("T1"), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(value, Value::Float32(21.5));

    let latest = fixture.client.latest(&TagId::new("T1")).unwrap();
    assert_eq!(latest.value, Value::Float32(21.5));
    assert_eq!(latest.quality, Quality::Good);

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_sync_read_shorter_than_server_latency_times_out() {
    let fixture = ClientFixture::connected().await;
    fixture.client.register(analog_input("T1")).await.unwrap();
    fixture
        .server
        .set_value("ns=2;s=T1".parse().unwrap(), WireValue::Int32(5));
    fixture.server.set_latency(Some(Duration::from_millis(300)));

    let err = fixture
        .client
        .read_sync(TagId::new("T1"), Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Connection(ConnectionError::Timeout { .. })
    ));

    // The orphaned completion lands without crashing, and the runtime
    // keeps serving.
    tokio::time::sleep(Duration::from_millis(400)).await;
    fixture.server.set_latency(None);
    let value = fixture
        .client
        .read_sync(TagId::new("T1"), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(value, Value::Int32(5));

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_async_completions_keyed_by_id() {
    let fixture = ClientFixture::connected().await;
    fixture.client.register(analog_input("T1")).await.unwrap();
    fixture
        .server
        .set_value("ns=2;s=T1".parse().unwrap(), WireValue::Int32(11));
    let mut events = fixture.client.subscribe_events();

    let first = fixture.client.read_async(TagId::new("T1")).unwrap();
    let second = fixture.client.read_async(TagId::new("T1")).unwrap();
    assert!(second > first, "request ids are strictly monotonic");

    let completion = wait_for_event(&mut events, Duration::from_secs(1), |e| {
        matches!(e, RuntimeEvent::ReadCompleted { id, .. } if *id == first)
    })
    .await;
    assert!(completion.is_some(), "completion for the first id");

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_write_respects_permission() {
    let fixture = ClientFixture::connected().await;
    fixture.client.register(analog_input("RO")).await.unwrap();
    fixture.client.register(analog_output("SP")).await.unwrap();

    let err = fixture
        .client
        .write_sync(TagId::new("RO"), Value::Float64(1.0), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Config(ConfigError::NotWritable { .. })
    ));

    fixture
        .client
        .write_sync(TagId::new("SP"), Value::Float64(2.0), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(fixture.server.writes().len(), 1);

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

// =============================================================================
// Batch semantics
// =============================================================================

#[tokio::test]
async fn test_batch_read_returns_per_tag_map() {
    let fixture = ClientFixture::connected().await;
    fixture.client.register(analog_input("T1")).await.unwrap();
    fixture.client.register(analog_input("T2")).await.unwrap();
    fixture
        .server
        .set_value("ns=2;s=T1".parse().unwrap(), WireValue::Float(1.0));
    fixture
        .server
        .set_value("ns=2;s=T2".parse().unwrap(), WireValue::Float(2.0));

    let results = fixture
        .client
        .batch_read(
            vec![TagId::new("T1"), TagId::new("T2")],
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.values().all(|r| r.is_ok()));

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_batch_write_partial_failure_with_diagnostics() {
    let fixture = ClientFixture::connected().await;
    fixture.client.register(analog_output("T1")).await.unwrap();

    let result = fixture
        .client
        .batch_write(
            vec![
                (TagId::new("T1"), Value::Float64(1.0)),
                (TagId::new("TX"), Value::Float64(5.0)),
            ],
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    // Overall failure with per-tag diagnostics for the stranger.
    assert!(!result.ok);
    assert_eq!(result.diagnostics.len(), 1);
    assert!(matches!(
        result.diagnostics[&TagId::new("TX")],
        RuntimeError::Config(ConfigError::UnknownTag { .. })
    ));

    // The good element was written exactly once, verified by a
    // subsequent read.
    assert_eq!(fixture.server.writes().len(), 1);
    let value = fixture
        .client
        .read_sync(TagId::new("T1"), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(value, Value::Float64(1.0));

    fixture.client.shutdown(Duration::from_millis(200)).await;
}

// =============================================================================
// Back-pressure
// =============================================================================

#[tokio::test]
async fn test_full_queue_reports_busy() {
    let mut config = fast_client_config();
    config.reconnect.keepalive_interval = Duration::from_secs(60);
    config.pipeline = PipelineConfig {
        workers: 1,
        queue_capacity: 2,
        request_timeout: Duration::from_secs(2),
    };
    let server = argus_tests::common::MockSession::new();
    let client = OpcUaClient::new(server.clone(), config);
    client
        .connect(TEST_ENDPOINT, Identity::Anonymous)
        .await
        .unwrap();
    client.register(analog_input("T1")).await.unwrap();
    server.set_value("ns=2;s=T1".parse().unwrap(), WireValue::Int32(1));

    // A slow wire wedges the single worker; the tiny queue then fills.
    server.set_latency(Some(Duration::from_millis(300)));
    let mut saw_busy = false;
    for _ in 0..16 {
        match client.read_async(TagId::new("T1")) {
            Err(RuntimeError::Capacity(CapacityError::Busy { .. })) => {
                saw_busy = true;
                break;
            }
            _ => tokio::time::sleep(Duration::from_millis(1)).await,
        }
    }
    assert!(saw_busy, "full queue must reject with Busy");

    server.set_latency(None);
    client.shutdown(Duration::from_millis(500)).await;
}
