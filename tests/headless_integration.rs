use std::time::Duration;

use fingertrace::clock::ManualClock;
use fingertrace::config::Config;
use fingertrace::runtime::{ChannelEventSource, FixedTicker, Runner, SessionEvent};
use fingertrace::{Anchors, Engine, Point3, TrialDefinition, TrialEvent, TrialKind};

// Drives the engine through Runner with a producer thread standing in for the
// hand tracker, across two trials and a paused attempt.
#[test]
fn headless_session_completes() {
    let config = Config {
        min_sample_distance: 0.0,
        trials: Some(vec![
            TrialDefinition::new("straight", TrialKind::Straight, 2),
            TrialDefinition::new(
                "zigzag",
                TrialKind::ZigZag {
                    amplitude: 0.02,
                    frequency_cycles: 2,
                },
                1,
            ),
        ]),
        ..Config::default()
    };
    let mut engine = Engine::new(&config, ManualClock::default()).unwrap();

    let (tx, source) = ChannelEventSource::pair();
    let runner = Runner::new(source, FixedTicker::new(Duration::from_millis(5)));

    let producer = std::thread::spawn(move || {
        let anchors = Anchors::new(Point3::new(0.0, 1.0, -0.3), Point3::new(0.3, 1.0, -0.3));
        tx.send(SessionEvent::Anchors(anchors)).unwrap();
        for attempt in 0..3 {
            tx.send(SessionEvent::StartTracing).unwrap();
            for i in 0..=6 {
                let x = i as f64 * 0.05;
                tx.send(SessionEvent::Sample(Point3::new(x, 1.0 + 0.005 * attempt as f64, -0.3)))
                    .unwrap();
                if i == 3 {
                    tx.send(SessionEvent::StopTracing).unwrap();
                    tx.send(SessionEvent::StartTracing).unwrap();
                }
            }
            tx.send(SessionEvent::FinishAttempt).unwrap();
        }
    });

    let events = runner.drive(&mut engine).unwrap();
    producer.join().unwrap();

    assert!(events.contains(&TrialEvent::TrialChanged { from: 0, to: 1 }));
    assert_eq!(events.last(), Some(&TrialEvent::SessionComplete));
    assert!(engine.machine().is_session_complete());

    let store = engine.into_store();
    assert_eq!(store.attempt_count(0), 2);
    assert_eq!(store.attempt_count(1), 1);

    let second = &store.attempts(0)[1];
    assert_eq!(second.attempt_number, 2);
    assert_eq!(second.points.len(), 7);
    assert!((second.score.max_deviation - 0.005).abs() < 1e-9);
    assert!((second.score.path_length - 0.3).abs() < 1e-9);

    // zig-zag attempt scored against the chord, guide stored with it
    let zig = &store.attempts(1)[0];
    assert!(zig.guide.points().iter().any(|p| (p.z + 0.3).abs() > 0.01));
}

#[test]
fn runner_ticks_while_idle() {
    let (_tx, source) = ChannelEventSource::pair();
    let runner = Runner::new(source, FixedTicker::new(Duration::from_millis(1)));
    for _ in 0..3 {
        assert_eq!(runner.step(), SessionEvent::Tick);
    }
}
