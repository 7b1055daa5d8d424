//! Unknown cards, mapping refresh and history maintenance.

use std::sync::Arc;

use tagplay::mapping::StaticResolver;
use tagplay::orchestrator::ScanOutcome;

use crate::common::fixtures::{TestEnv, files};

#[test]
fn unknown_card_becomes_mapped_after_refresh() {
    let env = TestEnv::new();
    env.asset("b.png", 16);
    let resolver = Arc::new(StaticResolver::default());
    let orch = env.orchestrator_with(Arc::clone(&resolver));

    orch.mark_unknown("B2").unwrap();
    orch.mark_unknown("B2").unwrap();
    orch.mark_unknown("B2").unwrap();
    let before = orch.scan_history();
    assert!(before.unknown_cards.contains_key("B2"));
    assert_eq!(before.scanned_cards["B2"].scan_count, 3);
    assert!(!before.scanned_cards["B2"].mapped);

    resolver.insert("B2", files(&["b.png"]));
    let report = orch.refresh_mapping_status();
    assert_eq!(report.tracked, 1);
    assert_eq!(report.newly_mapped, vec!["B2".to_string()]);

    let after = orch.scan_history();
    assert!(!after.unknown_cards.contains_key("B2"));
    assert!(after.scanned_cards["B2"].mapped);
    assert_eq!(after.scanned_cards["B2"].scan_count, 3);
    assert_eq!(after.total_unknown, 0);
}

#[test]
fn refresh_picks_up_mapping_file_changes() {
    let env = TestEnv::new();
    env.asset("late.mp4", 16);
    env.mapping("[cards]\n");
    let orch = env.orchestrator();

    assert_eq!(orch.scan("C3", None).unwrap(), ScanOutcome::Unmapped);
    assert_eq!(orch.scan_history().total_unknown, 1);

    env.mapping("[cards]\nC3 = \"late.mp4\"\n");
    let report = orch.refresh_mapping_status();
    assert_eq!(report.newly_mapped, vec!["C3".to_string()]);
    assert!(matches!(
        orch.scan("C3", None).unwrap(),
        ScanOutcome::Played(_)
    ));
}

#[test]
fn unmapping_keeps_card_out_of_unknown() {
    let env = TestEnv::new();
    env.asset("a.mp4", 16);
    let resolver = Arc::new(StaticResolver::from_pairs([("A1", ["a.mp4"])]));
    let orch = env.orchestrator_with(Arc::clone(&resolver));

    orch.scan("A1", None).unwrap();
    resolver.replace(Default::default());
    let report = orch.refresh_mapping_status();
    assert_eq!(report.mapped, 0);

    let history = orch.scan_history();
    assert!(!history.scanned_cards["A1"].mapped);
    assert!(!history.unknown_cards.contains_key("A1"));
}

#[test]
fn forget_and_clear() {
    let env = TestEnv::new();
    let orch = env.orchestrator();
    orch.mark_unknown("X").unwrap();
    orch.mark_unknown("Y").unwrap();

    assert!(orch.forget_card("X"));
    assert!(!orch.forget_card("X"));
    assert_eq!(orch.status().counters.scanned_cards, 1);

    orch.clear_history();
    let history = orch.scan_history();
    assert_eq!((history.total_scanned, history.total_unknown), (0, 0));
    assert_eq!(orch.status().counters.unknown_cards, 0);
}
