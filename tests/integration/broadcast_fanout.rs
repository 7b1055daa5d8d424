//! Event fan-out from orchestrator mutations to subscribers.

use std::sync::Arc;
use std::time::Duration;

use tagplay::broadcast::{BroadcastConfig, Broadcaster};
use tagplay::events::{Direction, Frame, FramePayload, SharedCounters};

use crate::common::fixtures::{TestEnv, files};

fn drain(sub: &mut tagplay::broadcast::Subscription) -> Vec<Frame> {
    std::iter::from_fn(|| sub.try_next_frame()).collect()
}

#[test]
fn two_subscribers_get_one_identical_copy() {
    let env = TestEnv::new();
    env.asset("v1.mp4", 8);
    let orch = env.orchestrator();

    let mut first = orch.subscribe("10.0.0.1");
    let mut second = orch.subscribe("10.0.0.2");
    drain(&mut first);
    drain(&mut second);

    orch.play("A1", files(&["v1.mp4"]), None).unwrap();

    let a = drain(&mut first);
    let b = drain(&mut second);
    assert_eq!(a.len(), 1);
    assert_eq!(a, b);
    assert!(matches!(
        &a[0].payload,
        FramePayload::AssetPlay(info) if info.asset_file == "v1.mp4"
    ));
}

#[test]
fn late_subscriber_sees_no_replay() {
    let env = TestEnv::new();
    env.asset("v1.mp4", 8);
    let orch = env.orchestrator();
    orch.play("A1", files(&["v1.mp4"]), None).unwrap();

    let mut late = orch.subscribe("10.0.0.3");
    let frames = drain(&mut late);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].name(), "connection");
}

#[test]
fn frames_follow_mutation_order() {
    let env = TestEnv::new();
    env.asset("a.mp4", 8).asset("b.jpg", 8);
    let orch = env.orchestrator();
    let mut sub = orch.subscribe("10.0.0.1");
    drain(&mut sub);

    orch.play("A1", files(&["a.mp4", "b.jpg"]), None).unwrap();
    orch.navigate("A1", Direction::Next).unwrap();
    orch.remove("A1").unwrap();

    let frames = drain(&mut sub);
    let names: Vec<&str> = frames.iter().map(Frame::name).collect();
    assert_eq!(names, ["asset_play", "navigation", "card_removed"]);
    let seqs: Vec<u64> = frames.iter().filter_map(|f| f.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn closed_subscriber_does_not_break_broadcast() {
    let env = TestEnv::new();
    env.asset("a.mp4", 8);
    let orch = env.orchestrator();

    let mut alive = orch.subscribe("10.0.0.1");
    let dead = orch.subscribe("10.0.0.2");
    drain(&mut alive);
    drop(dead);

    orch.play("A1", files(&["a.mp4"]), None).unwrap();
    assert_eq!(orch.broadcaster().subscriber_count(), 1);

    orch.remove("A1").unwrap();
    assert_eq!(drain(&mut alive).len(), 2);
}

#[test]
fn mark_unknown_emits_no_frame() {
    let env = TestEnv::new();
    let orch = env.orchestrator();
    let mut sub = orch.subscribe("10.0.0.1");
    drain(&mut sub);

    orch.mark_unknown("Z").unwrap();
    assert!(drain(&mut sub).is_empty());
}

#[test]
fn concurrent_mutations_reach_each_subscriber_in_order() {
    let env = TestEnv::new();
    env.asset("a.mp4", 8).asset("b.mp4", 8);
    let orch = env.orchestrator();

    let mut sub = orch.broadcaster().subscribe("10.0.0.1");
    drain(&mut sub);

    std::thread::scope(|scope| {
        for t in 0..4 {
            let orch = &orch;
            scope.spawn(move || {
                for _ in 0..10 {
                    orch.play(&format!("c{t}"), files(&["a.mp4", "b.mp4"]), None)
                        .unwrap();
                }
            });
        }
    });

    let frames = drain(&mut sub);
    assert_eq!(frames.len(), 40);
    let seqs: Vec<u64> = frames.iter().filter_map(|f| f.seq).collect();
    assert_eq!(seqs, (0..40).collect::<Vec<u64>>());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_and_status_frames_on_cadence() {
    let broadcaster = Broadcaster::new(
        BroadcastConfig {
            heartbeat_interval: Duration::from_secs(60),
            status_interval: Duration::from_secs(30),
            channel_capacity: 8,
        },
        Arc::new(SharedCounters::default()),
    );
    let mut sub = broadcaster.subscribe("10.0.0.1");

    assert_eq!(sub.next_frame().await.unwrap().name(), "connection");
    let status = sub.next_frame().await.unwrap();
    assert!(matches!(
        status.payload,
        FramePayload::StatusUpdate(counters) if counters.subscribers == 1
    ));
    assert_eq!(sub.next_frame().await.unwrap().name(), "heartbeat");
}

#[tokio::test]
async fn reaper_purges_dropped_subscribers() {
    let env = TestEnv::new();
    let orch = env.orchestrator();
    let keep = orch.subscribe("10.0.0.1");
    drop(orch.subscribe("10.0.0.2"));
    assert_eq!(orch.broadcaster().subscriber_count(), 2);

    let report = orch.broadcaster().reap();
    assert_eq!(report.purged, 1);
    assert_eq!(report.remaining, 1);
    assert_eq!(orch.broadcaster().subscribers()[0].id, keep.id());
}
