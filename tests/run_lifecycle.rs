//! Run lifecycle through the public orchestrator API
//!
//! Checks go through the real SOAX session builder and reqwest probe, with
//! the proxy endpoint pointed at local listeners.

mod common;

use common::*;
use geoprobe::{
    BusMessage, Classification, DnsRunParams, MultiGeoParams, NoOpScreenshotRenderer, RunEvent,
    RunKind, RunRecord,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn answering_proxy(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(status).set_body_string("<html>hello</html>"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn unreachable_targets_time_out_within_the_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.execution.max_concurrency = 2;
    let orchestrator = orchestrator(config, Arc::new(NoOpScreenshotRenderer)).await;
    let proxy = SilentProxy::start().await;

    let mut params = params_via(
        proxy.addr.port(),
        &["http://a.test/", "http://b.test/", "http://c.test/"],
    );
    params.timeout_sec = 1;

    let started = Instant::now();
    let run_id = orchestrator.start_run(params).await.unwrap();
    let events = collect_events(&orchestrator, &run_id).await;
    let elapsed = started.elapsed();

    let records = check_records(&events);
    assert_eq!(records.len(), 3);
    for record in &records {
        assert!(
            matches!(
                record.result,
                Classification::Timeout | Classification::ConnectError
            ),
            "{record:?}"
        );
        assert!(record.http_code.is_none());
        assert!(record.notes.is_some());
    }

    let totals = totals(&events);
    assert_eq!(totals.ok, 0);
    assert_eq!(totals.err, 3);

    // two waves of one-second timeouts with two workers
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
}

#[tokio::test]
async fn answered_checks_succeed_and_write_reports() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;
    let proxy = answering_proxy(200).await;

    let run_id = orchestrator
        .start_run(params_via(proxy.address().port(), &["http://site.test/"]))
        .await
        .unwrap();
    let events = collect_events(&orchestrator, &run_id).await;

    let records = check_records(&events);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.result, Classification::Success);
    assert_eq!(record.http_code, Some(200));
    assert_eq!(record.bytes, Some(18));
    assert_eq!(record.country, "TR");

    let report = record.report_path.as_deref().unwrap();
    let written = std::fs::read_to_string(dir.path().join("logs").join(report)).unwrap();
    assert!(written.contains("site.test"));

    // the proxy saw the geo selection in the credentials
    let requests = proxy.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("proxy-authorization").is_some());
}

#[tokio::test]
async fn http_errors_are_classified() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;
    let proxy = answering_proxy(503).await;

    let run_id = orchestrator
        .start_run(params_via(proxy.address().port(), &["http://site.test/"]))
        .await
        .unwrap();
    let events = collect_events(&orchestrator, &run_id).await;

    let records = check_records(&events);
    assert_eq!(records[0].result, Classification::HttpError);
    assert_eq!(records[0].http_code, Some(503));
    assert_eq!(totals(&events).err, 1);
}

#[tokio::test]
async fn refused_proxy_is_a_connect_error() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;
    let port = closed_port().await;

    let run_id = orchestrator
        .start_run(params_via(port, &["http://site.test/"]))
        .await
        .unwrap();
    let events = collect_events(&orchestrator, &run_id).await;

    let records = check_records(&events);
    assert_eq!(records[0].result, Classification::ConnectError);
    assert!(records[0].notes.is_some());
}

#[tokio::test]
async fn target_names_do_not_sway_classification() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;
    let port = closed_port().await;

    let targets = [
        "http://site.test/",
        "http://dnschecker.test/",
        "http://sslshopper.test/",
        "http://timeout.test/",
    ];
    let run_id = orchestrator
        .start_run(params_via(port, &targets))
        .await
        .unwrap();
    let events = collect_events(&orchestrator, &run_id).await;

    let records = check_records(&events);
    assert_eq!(records.len(), targets.len());
    for record in &records {
        assert_eq!(record.result, Classification::ConnectError, "{record:?}");
        assert!(!record.notes.as_deref().unwrap().contains(".test"), "{record:?}");
    }
}

#[tokio::test]
async fn events_are_ordered_and_totals_add_up() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;
    let proxy = answering_proxy(200).await;
    let refused = closed_port().await;

    let targets = ["http://a.test/", "http://b.test/", "http://c.test/", "http://d.test/"];
    let ok_run = orchestrator
        .start_run(params_via(proxy.address().port(), &targets))
        .await
        .unwrap();
    let ok_events = collect_events(&orchestrator, &ok_run).await;

    let bad_run = orchestrator
        .start_run(params_via(refused, &targets[..2]))
        .await
        .unwrap();
    let bad_events = collect_events(&orchestrator, &bad_run).await;

    for (events, total) in [(&ok_events, 4), (&bad_events, 2)] {
        assert!(matches!(events.first(), Some(RunEvent::RunStarted { kind: RunKind::Single, .. })));
        assert!(matches!(events.last(), Some(RunEvent::RunFinished { .. })));
        let started = events
            .iter()
            .filter(|e| matches!(e, RunEvent::CheckStarted { .. }))
            .count();
        assert_eq!(started, total);
        assert_eq!(check_records(events).len(), total);

        let totals = totals(events);
        assert_eq!(totals.ok + totals.err, total);
    }
    assert_eq!(totals(&ok_events).ok, 4);
    assert_eq!(totals(&bad_events).err, 2);

    let progress = orchestrator.run_state(&ok_run).unwrap();
    assert_eq!(progress.total, 4);
    assert_eq!(progress.done, 4);
}

#[tokio::test]
async fn finished_runs_end_immediately_for_new_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;
    let proxy = answering_proxy(200).await;

    let run_id = orchestrator
        .start_run(params_via(proxy.address().port(), &["http://site.test/"]))
        .await
        .unwrap();
    collect_events(&orchestrator, &run_id).await;

    let mut late = orchestrator.subscribe(&run_id);
    let next = tokio::time::timeout(Duration::from_secs(1), late.next())
        .await
        .unwrap();
    assert!(matches!(next, BusMessage::End));
    // progress survives the event log
    assert_eq!(orchestrator.run_state(&run_id).unwrap().done, 1);
}

#[tokio::test]
async fn duplicate_targets_are_checked_independently() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;
    let proxy = answering_proxy(200).await;

    let run_id = orchestrator
        .start_run(params_via(
            proxy.address().port(),
            &["http://same.test/", "http://same.test/"],
        ))
        .await
        .unwrap();
    let events = collect_events(&orchestrator, &run_id).await;

    let records = check_records(&events);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.url == "http://same.test/"));
    assert_ne!(records[0].report_path, records[1].report_path);
    assert_eq!(proxy.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn dns_run_reports_every_domain() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;

    let run_id = orchestrator
        .start_dns_run(DnsRunParams {
            targets: vec!["example.com".into(), "nx.invalid".into()],
        })
        .await
        .unwrap();
    let events = collect_events(&orchestrator, &run_id).await;

    assert!(matches!(events.first(), Some(RunEvent::RunStarted { kind: RunKind::Dns, .. })));
    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::DnsFinished { record, .. } => Some(record.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 2);

    let totals = totals(&events);
    assert_eq!(totals.ok, 1);
    assert_eq!(totals.err, 1);

    let records = orchestrator.run_records(&run_id).unwrap();
    assert!(records.iter().all(|r| matches!(r, RunRecord::Dns(_))));
}

#[tokio::test]
async fn multi_geo_run_checks_every_target_from_every_country() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(test_config(&dir), Arc::new(NoOpScreenshotRenderer)).await;
    let proxy = answering_proxy(200).await;

    let run = params_via(proxy.address().port(), &["http://a.test/", "http://b.test/"]);
    let run_id = orchestrator
        .start_multi_geo_run(MultiGeoParams {
            countries: vec!["US".into(), "DE".into(), "TR".into()],
            base: run,
        })
        .await
        .unwrap();
    let events = collect_events(&orchestrator, &run_id).await;

    let mut pairs: Vec<(String, String)> = check_records(&events)
        .into_iter()
        .map(|r| (r.url, r.country))
        .collect();
    pairs.sort();
    assert_eq!(pairs.len(), 6);
    assert_eq!(pairs[0], ("http://a.test/".to_string(), "DE".to_string()));
    assert_eq!(totals(&events).ok, 6);
}
