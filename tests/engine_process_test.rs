//! Engine process lifecycle against real subprocesses.

mod common;

use std::time::Duration;

use serial_test::serial;
use uci_bridge::{DriverError, EngineConfig, EngineProcess};

use common::{opening_stub, raw_stub};

#[test]
fn handshake_collects_identity_and_reaches_ready() {
    let stub = opening_stub();
    let mut engine = EngineProcess::start(&stub.config, "test").expect("handshake");
    assert_eq!(engine.id().name.as_deref(), Some("StubEngine 1.0"));
    assert_eq!(engine.id().author.as_deref(), Some("driver tests"));
    engine.new_game().expect("usinewgame round trip");
    engine.shutdown();
}

#[test]
fn missing_binary_is_a_startup_error() {
    let config = EngineConfig::new("/nonexistent/engine-binary");
    match EngineProcess::start(&config, "test") {
        Err(DriverError::EngineStartup(_)) => {}
        Err(other) => panic!("expected EngineStartup, got {other}"),
        Ok(_) => panic!("expected EngineStartup, engine started"),
    }
}

#[test]
#[serial]
fn silent_engine_fails_the_handshake_within_the_timeout() {
    let mut stub = raw_stub("while read -r line; do :; done\n");
    stub.config.ready_timeout = Duration::from_millis(300);
    match EngineProcess::start(&stub.config, "test") {
        Err(DriverError::EngineStartup(_)) => {}
        Err(other) => panic!("expected EngineStartup, got {other}"),
        Ok(_) => panic!("expected EngineStartup, engine started"),
    }
}

#[test]
fn shutdown_is_idempotent() {
    let stub = opening_stub();
    let mut engine = EngineProcess::start(&stub.config, "test").expect("handshake");
    engine.shutdown();
    engine.shutdown();
}
