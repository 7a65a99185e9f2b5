use postpool::{CommandProcessor, Completion, Coordinator, InvocationError};
use std::time::Duration;

#[test]
fn missing_program_fails_every_item_without_stalling() {
    let processor = CommandProcessor::new("/nonexistent/postpool-postprocess");
    let coordinator = Coordinator::try_new(2_usize, processor).unwrap();
    let report = coordinator.run(["movies", "music", "games"]).unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(report.failures().count(), 3);
    assert!(report.results.iter().all(|r| matches!(
        r.outcome,
        Err(InvocationError::Launch { .. })
    )));
}

#[cfg(unix)]
#[test]
fn exit_codes_are_reported_per_item() {
    // `$0` is the item name; only "tv" fails.
    let processor = CommandProcessor::new("sh").args(["-c", r#"[ "$0" != tv ]"#]);
    let coordinator = Coordinator::try_new(3_usize, processor)
        .unwrap()
        .with_poll_interval(Duration::from_millis(5));
    let report = coordinator.run(["tv", "books", "anime"]).unwrap();

    assert_eq!(report.failures().count(), 0);
    for result in &report.results {
        let expected = if result.item.as_str() == "tv" { 1 } else { 0 };
        assert_eq!(
            result.outcome.as_ref().ok(),
            Some(&Completion::Exited {
                code: Some(expected)
            })
        );
    }
}

#[cfg(unix)]
#[test]
fn item_timeout_bounds_a_hanging_command() {
    let processor = CommandProcessor::new("sh")
        .args(["-c", r#"[ "$0" = stuck ] && exec sleep 30; exit 0"#])
        .with_timeout(Duration::from_millis(300));
    let coordinator = Coordinator::try_new(2_usize, processor).unwrap();
    let report = coordinator.run(["stuck", "fine"]).unwrap();

    let timed_out: Vec<_> = report.timed_out().map(|r| r.item.as_str()).collect();
    assert_eq!(timed_out, vec!["stuck"]);
    assert!(report.elapsed < Duration::from_secs(10));
}

#[cfg(unix)]
#[test]
fn huge_item_timeout_behaves_like_no_timeout() {
    let processor = CommandProcessor::new("sh")
        .args(["-c", "exit 0"])
        .with_timeout(Duration::from_secs(u64::MAX));
    let coordinator = Coordinator::try_new(1_usize, processor).unwrap();
    let report = coordinator.run(["tv"]).unwrap();

    assert_eq!(report.failures().count(), 0);
    assert_eq!(
        report.results[0].outcome.as_ref().ok(),
        Some(&Completion::Exited { code: Some(0) })
    );
}
