use anyhow::Result;
use peerwatch::core::ClusterNodeAddress;
use peerwatch::dns::test_utils::{addresses, FakeAddressResolver};
use peerwatch::internal_metrics::DiscoveryMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{app::TestAppBuilder, mock_sink::FailingSink, mock_sink::RecordingSink};

#[tokio::test(start_paused = true)]
async fn test_app_reports_membership_updates_until_shutdown() {
    let resolver = Arc::new(FakeAddressResolver::new());
    resolver.add_success("cluster.test.local", addresses(&["10.0.0.1"]));
    resolver.add_success("cluster.test.local", addresses(&["10.0.0.1", "10.0.0.2"]));
    let sink = Arc::new(RecordingSink::new());
    let metrics = Arc::new(DiscoveryMetrics::new_for_test());

    let test_app = TestAppBuilder::new()
        .with_resolver(resolver)
        .with_sink(sink.clone())
        .with_metrics_override(metrics.clone())
        .start()
        .await
        .unwrap();

    sink.wait_for_reports(2, Duration::from_secs(120)).await;

    let result = test_app.shutdown(Duration::from_secs(30)).await;
    assert!(result.is_ok(), "App should shut down cleanly: {result:?}");

    let reports = sink.reports();
    assert_eq!(reports[0], vec![ClusterNodeAddress::new("10.0.0.1", 7946)]);
    assert_eq!(
        reports[1],
        vec![
            ClusterNodeAddress::new("10.0.0.1", 7946),
            ClusterNodeAddress::new("10.0.0.2", 7946),
        ]
    );
    assert!(metrics.query_success_count() >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_app_with_unconfigured_discovery_stays_idle() {
    let resolver = Arc::new(FakeAddressResolver::new());
    let sink = Arc::new(RecordingSink::new());
    let metrics = Arc::new(DiscoveryMetrics::new_for_test());

    let test_app = TestAppBuilder::new()
        .with_config_modifier(|config| config.discovery.name = None)
        .with_resolver(resolver.clone())
        .with_sink(sink.clone())
        .with_metrics_override(metrics.clone())
        .start()
        .await
        .unwrap();

    let result = test_app.shutdown(Duration::from_secs(30)).await;
    assert!(result.is_ok(), "App should shut down cleanly: {result:?}");

    assert!(sink.reports().is_empty());
    assert_eq!(resolver.call_count("cluster.test.local"), 0);
    assert_eq!(metrics.query_success_count(), 0);
    assert_eq!(metrics.query_failed_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_app_survives_a_failing_sink() {
    let resolver = Arc::new(FakeAddressResolver::new());
    resolver.add_success("cluster.test.local", addresses(&["10.0.0.1"]));
    resolver.add_success("cluster.test.local", addresses(&["10.0.0.1"]));
    let sink = Arc::new(FailingSink::new());
    let metrics = Arc::new(DiscoveryMetrics::new_for_test());

    let test_app = TestAppBuilder::new()
        .with_resolver(resolver)
        .with_sink(sink.clone())
        .with_metrics_override(metrics.clone())
        .start()
        .await
        .unwrap();

    // The poller keeps cycling even though every delivery fails.
    timeout(Duration::from_secs(120), async {
        while metrics.query_success_count() < 2 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("poller should keep polling despite sink errors");

    let result = test_app.shutdown(Duration::from_secs(30)).await;
    assert!(result.is_ok(), "App should shut down cleanly: {result:?}");
    assert!(sink.attempts() >= 1);
}

/// This test verifies the core shutdown mechanism (`tokio::sync::watch`)
/// in isolation: a worker listening on a shutdown receiver terminates as
/// soon as a signal is sent on the corresponding sender.
#[tokio::test]
async fn test_shutdown_signal_is_propagated() -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let worker = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(10)) => {
                    // Still working...
                }
            }
        }
    });

    shutdown_tx.send(true)?;

    // The outer `?` handles the timeout error, the inner `?` handles the task join error.
    timeout(Duration::from_secs(1), worker).await??;

    Ok(())
}
