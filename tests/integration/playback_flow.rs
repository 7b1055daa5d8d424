//! Play, navigate and remove through the orchestrator.

use std::sync::Arc;

use tagplay::error::TagplayError;
use tagplay::events::{Direction, PlaybackEvent};
use tagplay::mapping::StaticResolver;
use tagplay::orchestrator::ScanOutcome;
use tagplay::playback::Phase;

use crate::common::fixtures::{TestEnv, files};
use crate::common::init_test_logging;

#[test]
fn play_navigate_wraps_around() {
    init_test_logging();
    let env = TestEnv::new();
    env.asset("v1.mp4", 64).asset("i1.jpg", 32);
    let orch = env.orchestrator();

    let info = orch.play("A1", files(&["v1.mp4", "i1.jpg"]), None).unwrap();
    assert_eq!(
        (info.asset_file.as_str(), info.asset_index, info.total_assets),
        ("v1.mp4", 0, 2)
    );

    let info = orch.navigate("A1", Direction::Next).unwrap();
    assert_eq!((info.asset_file.as_str(), info.asset_index), ("i1.jpg", 1));

    let info = orch.navigate("A1", Direction::Next).unwrap();
    assert_eq!((info.asset_file.as_str(), info.asset_index), ("v1.mp4", 0));
}

#[test]
fn out_of_range_index_leaves_current_card() {
    let env = TestEnv::new();
    env.asset("a.mp4", 8).asset("b.mp4", 8);
    let orch = env.orchestrator();

    orch.play("A1", files(&["a.mp4"]), None).unwrap();
    let err = orch
        .play("B2", files(&["a.mp4", "b.mp4"]), Some(5))
        .unwrap_err();
    assert!(matches!(err, TagplayError::InvalidArgument(_)));
    assert_eq!(orch.status().current_card.as_deref(), Some("A1"));
    assert_eq!(orch.assets_played(), 1);
}

#[test]
fn empty_asset_list_is_rejected() {
    let env = TestEnv::new();
    let orch = env.orchestrator();
    let err = orch.play("A1", Vec::new(), None).unwrap_err();
    assert!(matches!(err, TagplayError::InvalidArgument(_)));
    assert!(orch.current().is_none());
    assert_eq!(orch.phase(), Phase::Idle);
}

#[test]
fn remove_then_replay_resumes_position() {
    let env = TestEnv::new();
    env.asset("a.mp4", 8).asset("b.jpg", 8).asset("c.png", 8);
    let orch = env.orchestrator();
    let list = files(&["a.mp4", "b.jpg", "c.png"]);

    orch.play("A1", list.clone(), None).unwrap();
    orch.navigate("A1", Direction::Prev).unwrap();
    assert_eq!(orch.position("A1"), Some(2));

    orch.remove("A1").unwrap();
    assert!(matches!(
        orch.current(),
        Some(PlaybackEvent::Removed { ref card_id, .. }) if card_id == "A1"
    ));
    assert_eq!(orch.phase(), Phase::Idle);

    let info = orch.play("A1", list, None).unwrap();
    assert_eq!(info.asset_index, 2);
    assert_eq!(info.asset_file, "c.png");
}

#[test]
fn remove_is_acknowledged_for_any_card() {
    let env = TestEnv::new();
    let orch = env.orchestrator();
    let event = orch.remove("never-played").unwrap();
    assert_eq!(event.card_id(), "never-played");
}

#[test]
fn navigation_errors() {
    let env = TestEnv::new();
    env.asset("only.mp4", 8);
    let orch = env.orchestrator();

    assert!(matches!(
        orch.navigate("ghost", Direction::Next),
        Err(TagplayError::NotFound { .. })
    ));

    orch.play("S", files(&["only.mp4"]), None).unwrap();
    assert!(matches!(
        orch.navigate("S", Direction::Prev),
        Err(TagplayError::Conflict(_))
    ));
}

#[test]
fn missing_asset_file_is_not_found() {
    let env = TestEnv::new();
    env.asset("present.mp4", 8);
    let orch = env.orchestrator();

    let err = orch
        .play("A1", files(&["present.mp4", "absent.mp4"]), Some(1))
        .unwrap_err();
    assert!(matches!(err, TagplayError::NotFound { .. }));
    assert!(orch.current().is_none());
}

#[test]
fn scan_reads_mapping_file() {
    let env = TestEnv::new();
    env.asset("intro.mp4", 8).asset("poster.jpg", 8);
    env.mapping(
        r#"
[cards]
"3800132D9B9D" = "intro.mp4"
"38001370E9B2" = ["intro.mp4", "poster.jpg"]
"#,
    );
    let orch = env.orchestrator();

    let ScanOutcome::Played(info) = orch.scan("38001370E9B2", Some(1)).unwrap() else {
        panic!("expected playback");
    };
    assert_eq!(info.asset_file, "poster.jpg");
    assert_eq!(info.total_assets, 2);

    let ScanOutcome::Played(info) = orch.scan("3800132D9B9D", None).unwrap() else {
        panic!("expected playback");
    };
    assert_eq!(info.total_assets, 1);

    assert_eq!(orch.scan("FFFF", None).unwrap(), ScanOutcome::Unmapped);
}

#[test]
fn concurrent_plays_count_every_call() {
    let env = TestEnv::new();
    env.asset("a.mp4", 8).asset("b.mp4", 8);
    let resolver = Arc::new(StaticResolver::default());
    let orch = env.orchestrator_with(resolver);

    std::thread::scope(|scope| {
        for t in 0..4 {
            let orch = &orch;
            scope.spawn(move || {
                for i in 0..25 {
                    let card = format!("card-{t}");
                    orch.play(&card, files(&["a.mp4", "b.mp4"]), Some(i % 2))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(orch.assets_played(), 100);
    assert_eq!(orch.scan_history().total_scanned, 4);
    for t in 0..4 {
        let record = &orch.scan_history().scanned_cards[&format!("card-{t}")];
        assert_eq!(record.scan_count, 25);
    }
}
