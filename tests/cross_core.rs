use gbsound::{EngineConfig, Message, RegisterFile, RenderPort, SoundEngine};
use std::thread;
use std::time::{Duration, Instant};

fn setup(config: EngineConfig) -> (SoundEngine, RenderPort, RegisterFile) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut engine, port) = SoundEngine::new(config).unwrap();
    let mut io = RegisterFile::new();
    io.write(0x26, 0x80);
    // Frame position 0: every init message bypasses the handshake
    engine.init(&mut io);
    port.drain();
    (engine, port, io)
}

/// Accurate delivery with a wait limit generous enough for a loaded test machine
fn accurate() -> EngineConfig {
    EngineConfig {
        sync_timeout_micros: 5_000_000,
        ..EngineConfig::accurate()
    }
}

/// Spin until the producer posts a handshake target
fn wait_for_target(port: &RenderPort) -> i32 {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(target) = port.pending_sync() {
            return target;
        }
        assert!(Instant::now() < deadline, "producer never posted a target");
        std::hint::spin_loop();
    }
}

#[test]
fn best_effort_messages_arrive_in_order_across_threads() {
    let (mut engine, port, mut io) = setup(EngineConfig::default());

    let consumer = thread::spawn(move || {
        let mut received = Vec::new();
        while received.len() < 4 {
            match port.recv_timeout(Duration::from_secs(10)) {
                Some(message) => received.push(message),
                None => break,
            }
        }
        received
    });

    for addr in [0x13, 0x18, 0x1D, 0x22] {
        io.write(addr, 0x10);
        engine.write_register(&mut io, addr, 0x10);
    }

    let received = consumer.join().unwrap();
    assert_eq!(
        received,
        (0..4).map(Message::update).collect::<Vec<_>>()
    );
    assert_eq!(engine.shared().messages_in_flight(), 0);
}

#[test]
fn handshake_delivers_at_target_cycle() {
    let (mut engine, port, mut io) = setup(accurate());

    let consumer = thread::spawn(move || {
        let target = wait_for_target(&port);
        let message = port.poll_sync(target);
        (target, message, port)
    });

    io.cycles_since_vblank = 1200;
    io.write(0x13, 0x42);
    engine.write_register(&mut io, 0x13, 0x42);

    let (target, message, port) = consumer.join().unwrap();
    assert_eq!(target, 1200);
    assert_eq!(message, Some(Message::update(0)));
    // Delivered once: nothing went through the queue as well
    assert!(port.try_recv().is_none());
    assert_eq!(engine.stats().handshakes, 1);
}

#[test]
fn double_speed_halves_target() {
    let (mut engine, port, mut io) = setup(accurate());

    let consumer = thread::spawn(move || {
        let target = wait_for_target(&port);
        port.poll_sync(target);
        target
    });

    io.double_speed = true;
    io.cycles_since_vblank = 3000;
    io.write(0x18, 0x01);
    engine.write_register(&mut io, 0x18, 0x01);

    assert_eq!(consumer.join().unwrap(), 1500);
}

#[test]
fn transfer_in_progress_aborts_wait() {
    let (mut engine, port, mut io) = setup(accurate());

    let consumer = thread::spawn(move || {
        wait_for_target(&port);
        port.set_transfer_in_progress(true);
        port
    });

    io.cycles_since_vblank = 800;
    io.write(0x14, 0x80);
    engine.write_register(&mut io, 0x14, 0x80);

    let port = consumer.join().unwrap();
    assert_eq!(port.drain(), vec![Message::start(0)]);
    assert_eq!(port.pending_sync(), None);
    assert_eq!(engine.stats().handshake_aborts, 1);

    // While the transfer lasts, nothing waits
    let bypassed = engine.stats().bypasses;
    io.cycles_since_vblank = 900;
    io.write(0x13, 0x01);
    engine.write_register(&mut io, 0x13, 0x01);
    assert_eq!(port.drain(), vec![Message::update(0)]);
    assert_eq!(engine.stats().bypasses, bypassed + 1);
}

#[test]
fn unanswered_handshake_times_out() {
    let config = EngineConfig {
        sync_timeout_micros: 2_000,
        ..EngineConfig::accurate()
    };
    let (mut engine, port, mut io) = setup(config);

    io.cycles_since_vblank = 500;
    io.write(0x19, 0x80);
    let started = Instant::now();
    engine.write_register(&mut io, 0x19, 0x80);

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(port.pending_sync(), None);
    assert_eq!(port.drain(), vec![Message::start(1)]);
    assert_eq!(engine.stats().handshake_timeouts, 1);
    // A late poll finds nothing to claim
    assert_eq!(port.poll_sync(500), None);
}

#[test]
fn out_of_phase_cores_deliver_immediately() {
    let (mut engine, port, mut io) = setup(EngineConfig::accurate());
    let bypassed = engine.stats().bypasses;

    engine.notify_vblank();
    io.cycles_since_vblank = 100;
    io.write(0x13, 0x20);
    engine.write_register(&mut io, 0x13, 0x20);

    assert_eq!(port.drain(), vec![Message::update(0)]);
    assert_eq!(engine.stats().bypasses, bypassed + 1);

    // Renderer catches up with the frame; now ahead of the target
    port.flip_frame();
    port.poll_sync(5_000);
    engine.write_register(&mut io, 0x13, 0x21);
    assert_eq!(port.drain(), vec![Message::update(0)]);
    assert_eq!(engine.stats().bypasses, bypassed + 2);
}

#[test]
fn switching_to_best_effort_stops_handshakes() {
    let (mut engine, port, mut io) = setup(EngineConfig::accurate());
    engine.set_accurate_sync(false);
    assert!(!port.shared().hyper_sync());

    io.cycles_since_vblank = 10_000;
    io.write(0x13, 0x55);
    engine.write_register(&mut io, 0x13, 0x55);

    assert_eq!(port.pending_sync(), None);
    assert_eq!(port.drain(), vec![Message::update(0)]);
    assert_eq!(engine.stats().handshakes, 0);
}
