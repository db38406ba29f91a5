use std::sync::Arc;
use std::time::Duration;

use fiberkit_communication::firmware::marlin::commands;
use fiberkit_communication::{Clock, ProtocolHandler, ScriptedChannel};
use fiberkit_core::event_bus::{AppEvent, CommandEvent, EventBus};
use fiberkit_core::{Error, ProtocolError};

fn handler(channel: ScriptedChannel) -> ProtocolHandler {
    let clock = channel.clock();
    ProtocolHandler::with_clock(Box::new(channel), clock)
}

#[test]
fn test_busy_reports_do_not_extend_the_deadline() {
    let mut channel = ScriptedChannel::new();
    for s in 1..=10 {
        channel.push_at(Duration::from_secs(s), "busy");
    }
    channel.push_at(Duration::from_secs(10), "ok");
    let clock = channel.clock();
    let mut protocol = handler(channel);

    match protocol.send_and_await("G28", Duration::from_secs(5)) {
        Err(Error::Protocol(ProtocolError::Timeout {
            command,
            timeout_ms,
            last_line,
        })) => {
            assert_eq!(command, "G28");
            assert_eq!(timeout_ms, 5000);
            assert_eq!(last_line.as_deref(), Some("busy"));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert_eq!(clock.now(), Duration::from_secs(5));
}

#[test]
fn test_ok_arriving_before_the_deadline_succeeds() {
    let mut channel = ScriptedChannel::new();
    for s in 1..=4 {
        channel.push_at(Duration::from_secs(s), "echo:busy: processing");
    }
    channel.push_at(Duration::from_millis(4500), "ok");
    let mut protocol = handler(channel);

    assert!(protocol.send_and_await("G28", Duration::from_secs(5)).is_ok());
}

#[test]
fn test_error_line_is_reported_verbatim() {
    let channel =
        ScriptedChannel::new().respond_to("G1", &["echo:Unknown", "Error:Printer halted"]);
    let mut protocol = handler(channel);

    let err = protocol
        .send_and_await("G1 X500 F1500", Duration::from_secs(1))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::FirmwareError { ref message, .. })
            if message == "Error:Printer halted"
    ));
    assert!(!err.is_timeout());
}

#[test]
fn test_closed_channel_fails_the_exchange() {
    let mut channel = ScriptedChannel::new();
    channel.close();
    let mut protocol = handler(channel);

    assert!(matches!(
        protocol.send_and_await("G90", Duration::from_secs(1)),
        Err(Error::Protocol(ProtocolError::ChannelClosed))
    ));
}

#[test]
fn test_command_traffic_is_published() {
    let bus = Arc::new(EventBus::with_run_log(256));
    let channel = ScriptedChannel::new().auto_ack();
    let clock = channel.clock();
    let mut protocol =
        ProtocolHandler::with_clock(Box::new(channel), clock).with_event_bus(bus.clone());

    protocol.dispatch(&commands::finish_moves()).unwrap();

    let history = bus.history();
    assert!(matches!(
        &history[0],
        AppEvent::Command(CommandEvent::Sent { command }) if command == "M400"
    ));
    assert!(matches!(
        &history[1],
        AppEvent::Command(CommandEvent::Acknowledged { command, .. }) if command == "M400"
    ));
}
