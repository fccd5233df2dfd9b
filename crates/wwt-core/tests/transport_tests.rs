//! Message ordering and read-back integration tests

mod common;

use common::fixtures::{events, flaky_client, pending_client, recording_client, FlakyTransport};
use proptest::prelude::*;
use serde_json::Value;
use std::thread;
use std::time::Duration;
use wwt_core::{
    Attrs, ChannelTransport, HostRequest, Message, MessageSender, RecordingTransport, SkyCoord,
    ViewField, WwtClient, WwtConfig, WwtError,
};

// === Readiness ===

#[test]
fn test_client_queues_until_ready() {
    let (mut client, recorder) = pending_client();
    client.set("grid", true).unwrap();
    client.add_circle(Some(SkyCoord::new(10.0, 10.0)), &Attrs::new()).unwrap();
    assert!(recorder.messages().is_empty());

    client.signal_ready().unwrap();
    assert_eq!(
        events(&recorder),
        vec!["setting_set", "annotation_create", "circle_set_center"]
    );
    assert_eq!(recorder.batches(), vec![3]);

    client.set("grid", false).unwrap();
    assert_eq!(recorder.messages().len(), 4);
    assert_eq!(recorder.batches(), vec![3]);
}

#[test]
fn test_failed_flush_keeps_queue_for_retry() {
    let recorder = RecordingTransport::new();
    let flaky = FlakyTransport::new(recorder.clone());
    let sender = MessageSender::new(Box::new(flaky.clone()), false);
    sender.send(Message::new("a")).unwrap();
    sender.send(Message::new("b")).unwrap();

    flaky.fail_after(0);
    assert!(matches!(sender.signal_ready(), Err(WwtError::Transport(_))));
    assert!(!sender.is_ready());
    assert_eq!(sender.pending(), 2);

    sender.send(Message::new("c")).unwrap();
    assert!(recorder.messages().is_empty());

    sender.signal_ready().unwrap();
    assert!(sender.is_ready());
    assert_eq!(events(&recorder), vec!["a", "b", "c"]);
    assert_eq!(recorder.batches(), vec![3]);
    assert_eq!(sender.sent(), 3);
}

#[test]
fn test_client_retries_ready_after_failed_flush() {
    let (mut client, flaky, recorder) = flaky_client(false);
    client.set("grid", true).unwrap();

    flaky.fail_after(0);
    assert!(client.signal_ready().is_err());
    client.set("crosshairs", true).unwrap();
    assert!(recorder.messages().is_empty());

    client.signal_ready().unwrap();
    let sent: Vec<Option<String>> = recorder
        .messages()
        .iter()
        .map(|m| m.get_str("setting").map(str::to_string))
        .collect();
    assert_eq!(sent, vec![Some("showGrid".to_string()), Some("showCrosshairs".to_string())]);
}

#[test]
fn test_ready_client_skips_queue() {
    let mut config = WwtConfig::default();
    config.transport.queue_until_ready = false;
    let recorder = RecordingTransport::new();
    let mut client = WwtClient::new(Box::new(recorder.clone()), config).unwrap();
    client.set("crosshairs", true).unwrap();
    assert_eq!(recorder.messages().len(), 1);
    assert!(recorder.batches().is_empty());
}

#[test]
fn test_rejected_write_sends_nothing() {
    let (mut client, recorder) = recording_client();
    assert!(matches!(
        client.set("grid_color", 42),
        Err(WwtError::Validation { .. })
    ));
    assert!(matches!(
        client.set("no_such_setting", true),
        Err(WwtError::KeyMismatch { .. })
    ));
    assert!(recorder.messages().is_empty());
}

// === Host thread ===

#[test]
fn test_channel_transport_timeout_is_transport_error() {
    let (transport, requests) = ChannelTransport::pair();
    let mut config = WwtConfig::default();
    config.transport.request_timeout_ms = 20;
    config.transport.queue_until_ready = false;
    let mut client = WwtClient::new(Box::new(transport), config).unwrap();

    // Host that never answers read-backs
    let host = thread::spawn(move || {
        let mut held = Vec::new();
        for request in requests {
            if let HostRequest::ReadViewField { reply, .. } = request {
                held.push(reply);
            }
        }
        held.len()
    });

    let err = client.get_fov().unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(err, WwtError::Timeout { waited_ms: 20, .. }));

    drop(client);
    assert_eq!(host.join().unwrap(), 1);
}

#[test]
fn test_channel_transport_round_trip() {
    let (transport, requests) = ChannelTransport::pair();
    let mut config = WwtConfig::default();
    config.transport.queue_until_ready = false;
    let mut client = WwtClient::new(Box::new(transport), config).unwrap();

    let host = thread::spawn(move || {
        let mut forwarded = Vec::new();
        for request in requests {
            match request {
                HostRequest::Message(message) => forwarded.push(message.event),
                HostRequest::Batch(batch) => forwarded.extend(batch.into_iter().map(|m| m.event)),
                HostRequest::ReadViewField { reply, .. } => {
                    let _ = reply.send(Value::from(2.5));
                }
            }
        }
        forwarded
    });

    client.pause_time().unwrap();
    assert_eq!(client.get_fov().unwrap(), 2.5);
    client.resume_tour().unwrap();

    drop(client);
    assert_eq!(host.join().unwrap(), vec!["pause_time", "resume_tour"]);
}

#[test]
fn test_disconnected_host_is_transport_error() {
    let (transport, requests) = ChannelTransport::pair();
    drop(requests);
    let sender = MessageSender::new(Box::new(transport), true);
    let err = sender.send(Message::new("pause_time")).unwrap_err();
    assert!(err.is_transport());
    assert!(sender
        .read_view_field(ViewField::Ra, Some(Duration::from_millis(5)))
        .unwrap_err()
        .is_transport());
}

// === Ordering properties ===

proptest! {
    #[test]
    fn prop_delivery_order_matches_call_order(
        before in proptest::collection::vec("[a-z_]{1,12}", 0..20),
        after in proptest::collection::vec("[a-z_]{1,12}", 0..20),
    ) {
        let recorder = RecordingTransport::new();
        let sender = MessageSender::new(Box::new(recorder.clone()), false);

        for event in &before {
            sender.send(Message::new(event.as_str())).unwrap();
        }
        prop_assert!(recorder.messages().is_empty());
        prop_assert_eq!(sender.pending(), before.len());

        sender.signal_ready().unwrap();
        for event in &after {
            sender.send(Message::new(event.as_str())).unwrap();
        }

        let delivered: Vec<String> = recorder.messages().into_iter().map(|m| m.event).collect();
        let expected: Vec<String> = before.iter().chain(after.iter()).cloned().collect();
        prop_assert_eq!(delivered, expected);

        let batches = recorder.batches();
        if before.is_empty() {
            prop_assert!(batches.is_empty());
        } else {
            prop_assert_eq!(batches, vec![before.len()]);
        }
    }

    #[test]
    fn prop_circle_radius_writes_stay_paired(
        radii in proptest::collection::vec(1.0f64..500.0, 1..10)
    ) {
        let (mut client, recorder) = recording_client();
        let id = client.add_circle(None, &Attrs::new()).unwrap();
        recorder.clear();

        for radius in &radii {
            client
                .annotation_mut(&id)
                .unwrap()
                .set("radius", wwt_core::Quantity::px(*radius))
                .unwrap();
        }

        let settings: Vec<String> = recorder
            .events("annotation_set")
            .iter()
            .filter_map(|m| m.get_str("setting").map(str::to_string))
            .collect();
        prop_assert_eq!(settings.len(), radii.len() * 2);
        for pair in settings.chunks(2) {
            prop_assert_eq!(pair[0].as_str(), "radius");
            prop_assert_eq!(pair[1].as_str(), "skyRelative");
        }
    }
}
