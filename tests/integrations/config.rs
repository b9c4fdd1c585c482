use clap::Parser;
use peerwatch::cli::Cli;
use peerwatch::config::{
    parse_server_address, Config, DiscoveryConfig, DiscoveryFileConfig, DnsServerAddress,
    DEFAULT_RELOAD_INTERVAL_SECS, DEFAULT_RESOLUTION_TIMEOUT_SECS, ENV_DISCOVERY_NAME,
    ENV_DNS_SERVER_ADDRESS, ENV_RELOAD_INTERVAL, ENV_RESOLUTION_TIMEOUT,
};
use serial_test::serial;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    let path = file.path().to_path_buf();
    test_fn(path);
}

fn env_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        [node]
        host = "10.0.1.5"
        port = 7800
        [discovery]
        dns_server_address = "10.0.0.2:5353"
        name = "hivemq-cluster.local"
        resolution_timeout_secs = 10
        reload_interval_secs = 60
        initial_interval_secs = 2
        reset_on_topology_change = true
        [metrics]
        enabled = true
        listen_address = "0.0.0.0:9598"
    "#;

    with_config_file(toml_content, |path| {
        let cli =
            Cli::try_parse_from(["peerwatch", "--config-file", path.to_str().unwrap()]).unwrap();
        let config = Config::load(&cli).unwrap();

        assert_eq!(config.log_level, "debug".to_string());
        assert_eq!(config.node.host, "10.0.1.5".to_string());
        assert_eq!(config.node.port, 7800);
        assert_eq!(
            config.discovery.dns_server_address,
            Some("10.0.0.2:5353".to_string())
        );
        assert_eq!(
            config.discovery.name,
            Some("hivemq-cluster.local".to_string())
        );
        assert_eq!(config.discovery.resolution_timeout_secs, 10);
        assert_eq!(config.discovery.reload_interval_secs, 60);
        assert_eq!(config.discovery.initial_interval_secs, Some(2));
        assert!(config.discovery.reset_on_topology_change);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen_address, "0.0.0.0:9598".to_string());
    });
}

#[test]
fn test_load_partial_config_uses_defaults() {
    let toml_content = r#"
        [discovery]
        name = "brokers.internal"
    "#;

    with_config_file(toml_content, |path| {
        let cli =
            Cli::try_parse_from(["peerwatch", "--config-file", path.to_str().unwrap()]).unwrap();
        let config = Config::load(&cli).unwrap();

        // Value from file
        assert_eq!(config.discovery.name, Some("brokers.internal".to_string()));

        // Values from Default
        assert_eq!(config.log_level, "info".to_string());
        assert_eq!(config.node.host, "127.0.0.1".to_string());
        assert_eq!(config.node.port, 7946);
        assert_eq!(config.discovery.dns_server_address, None);
        assert_eq!(config.discovery.resolution_timeout_secs, 30);
        assert_eq!(config.discovery.reload_interval_secs, 30);
        assert_eq!(config.discovery.initial_interval_secs, None);
        assert!(!config.discovery.reset_on_topology_change);
        assert!(!config.metrics.enabled);
    });
}

#[test]
fn test_invalid_value_type() {
    let toml_content = r#"
        [discovery]
        reload_interval_secs = "thirty"
    "#;

    with_config_file(toml_content, |path| {
        let cli =
            Cli::try_parse_from(["peerwatch", "--config-file", path.to_str().unwrap()]).unwrap();
        let config_result = Config::load(&cli);
        assert!(config_result.is_err());
        let error_string = config_result.unwrap_err().to_string();
        assert!(
            error_string.contains("invalid type: found string \"thirty\""),
            "unexpected error: {error_string}"
        );
        assert!(
            error_string.contains("discovery.reload_interval_secs"),
            "unexpected error: {error_string}"
        );
    });
}

#[test]
fn test_non_existent_config_file() {
    let non_existent_path = PathBuf::from("/path/to/non/existent/peerwatch.toml");
    let cli = Cli::try_parse_from([
        "peerwatch",
        "--config-file",
        non_existent_path.to_str().unwrap(),
    ])
    .unwrap();
    let config_result = Config::load(&cli);
    assert!(config_result.is_err());
    let error_string = config_result.unwrap_err().to_string();
    assert!(error_string.contains("Config file not found at specified path"));
}

#[test]
fn test_cli_arguments_override_the_file() {
    let toml_content = r#"
        [discovery]
        name = "from-file.local"
        reload_interval_secs = 10
        [node]
        port = 7946
    "#;

    with_config_file(toml_content, |path| {
        let cli = Cli::try_parse_from([
            "peerwatch",
            "--config-file",
            path.to_str().unwrap(),
            "--discovery-name",
            "from-cli.local",
            "--reload-interval",
            "20",
            "--own-port",
            "1883",
        ])
        .unwrap();
        let config = Config::load(&cli).unwrap();

        assert_eq!(config.discovery.name, Some("from-cli.local".to_string()));
        assert_eq!(config.discovery.reload_interval_secs, 20);
        assert_eq!(config.node.port, 1883);
        // Untouched file values survive the merge.
        assert_eq!(config.node.host, "127.0.0.1".to_string());
    });
}

#[test]
fn test_cli_metrics_listen_enables_the_endpoint() {
    with_config_file("", |path| {
        let cli = Cli::try_parse_from([
            "peerwatch",
            "--config-file",
            path.to_str().unwrap(),
            "--metrics-listen",
            "127.0.0.1:0",
        ])
        .unwrap();
        let config = Config::load(&cli).unwrap();

        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen_address, "127.0.0.1:0".to_string());
    });
}

// ---------------------------------------------------------------------------
// Per-field discovery resolution (env > file > default)
// ---------------------------------------------------------------------------

#[test]
fn test_env_overrides_file_values() {
    let file = DiscoveryFileConfig {
        dns_server_address: Some("10.0.0.1".to_string()),
        name: Some("from-file.local".to_string()),
        resolution_timeout_secs: 10,
        reload_interval_secs: 20,
        ..Default::default()
    };
    let env = env_map(&[
        (ENV_DISCOVERY_NAME, "from-env.local"),
        (ENV_DNS_SERVER_ADDRESS, "10.9.9.9:5353"),
        (ENV_RESOLUTION_TIMEOUT, "3"),
        (ENV_RELOAD_INTERVAL, "7"),
    ]);

    let resolved = DiscoveryConfig::resolve_from(&file, &env).unwrap();

    assert_eq!(resolved.name, Some("from-env.local".to_string()));
    assert_eq!(
        resolved.dns_server_address,
        Some(DnsServerAddress {
            host: "10.9.9.9".to_string(),
            port: 5353,
        })
    );
    assert_eq!(resolved.resolution_timeout_secs, 3);
    assert_eq!(resolved.reload_interval_secs, 7);
}

#[test]
fn test_blank_env_values_fall_back_to_the_file() {
    let file = DiscoveryFileConfig {
        name: Some("from-file.local".to_string()),
        resolution_timeout_secs: 12,
        ..Default::default()
    };
    let env = env_map(&[(ENV_DISCOVERY_NAME, "   "), (ENV_RESOLUTION_TIMEOUT, "")]);

    let resolved = DiscoveryConfig::resolve_from(&file, &env).unwrap();

    assert_eq!(resolved.name, Some("from-file.local".to_string()));
    assert_eq!(resolved.resolution_timeout_secs, 12);
}

#[test]
fn test_blank_file_values_count_as_absent() {
    let file = DiscoveryFileConfig {
        name: Some("  ".to_string()),
        dns_server_address: Some(String::new()),
        ..Default::default()
    };

    let resolved = DiscoveryConfig::resolve_from(&file, &BTreeMap::new()).unwrap();

    assert_eq!(resolved.name, None);
    assert_eq!(resolved.dns_server_address, None);
}

#[test]
fn test_missing_values_fall_back_to_defaults() {
    let file = DiscoveryFileConfig::default();

    let resolved = DiscoveryConfig::resolve_from(&file, &BTreeMap::new()).unwrap();

    assert_eq!(resolved.name, None);
    assert_eq!(resolved.dns_server_address, None);
    assert_eq!(
        resolved.resolution_timeout_secs,
        DEFAULT_RESOLUTION_TIMEOUT_SECS
    );
    assert_eq!(resolved.reload_interval_secs, DEFAULT_RELOAD_INTERVAL_SECS);
    assert_eq!(resolved.initial_interval_secs, None);
    // Without a floor, backoff is disabled: the floor equals the ceiling.
    assert_eq!(resolved.backoff_floor_secs(), resolved.reload_interval_secs);
}

#[test]
fn test_unparsable_env_interval_is_fatal() {
    let file = DiscoveryFileConfig::default();
    let env = env_map(&[(ENV_RELOAD_INTERVAL, "soon")]);

    let result = DiscoveryConfig::resolve_from(&file, &env);

    let error_string = result.unwrap_err().to_string();
    assert!(
        error_string.contains("invalid value \"soon\" for PEERWATCH_RELOAD_INTERVAL"),
        "unexpected error: {error_string}"
    );
}

#[test]
fn test_non_positive_intervals_fall_back_to_defaults() {
    // A parseable but non-positive env value is tolerated with a warning.
    let file = DiscoveryFileConfig {
        resolution_timeout_secs: 0,
        ..Default::default()
    };
    let env = env_map(&[(ENV_RELOAD_INTERVAL, "-5")]);

    let resolved = DiscoveryConfig::resolve_from(&file, &env).unwrap();

    assert_eq!(
        resolved.resolution_timeout_secs,
        DEFAULT_RESOLUTION_TIMEOUT_SECS
    );
    assert_eq!(resolved.reload_interval_secs, DEFAULT_RELOAD_INTERVAL_SECS);
}

#[test]
fn test_non_positive_initial_interval_disables_backoff() {
    let file = DiscoveryFileConfig {
        initial_interval_secs: Some(-3),
        reload_interval_secs: 45,
        ..Default::default()
    };

    let resolved = DiscoveryConfig::resolve_from(&file, &BTreeMap::new()).unwrap();

    assert_eq!(resolved.initial_interval_secs, None);
    assert_eq!(resolved.backoff_floor_secs(), 45);
}

#[test]
fn test_resolution_is_deterministic() {
    let file = DiscoveryFileConfig {
        name: Some("brokers.internal".to_string()),
        resolution_timeout_secs: 5,
        reload_interval_secs: 90,
        initial_interval_secs: Some(2),
        ..Default::default()
    };
    let env = env_map(&[(ENV_DNS_SERVER_ADDRESS, "10.0.0.2")]);

    let first = DiscoveryConfig::resolve_from(&file, &env).unwrap();
    let second = DiscoveryConfig::resolve_from(&file, &env).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_server_address_parsing() {
    assert_eq!(
        parse_server_address("192.168.1.1:5353"),
        DnsServerAddress {
            host: "192.168.1.1".to_string(),
            port: 5353,
        }
    );
    // A bare host gets the standard DNS port.
    assert_eq!(
        parse_server_address("ns1.internal"),
        DnsServerAddress {
            host: "ns1.internal".to_string(),
            port: 53,
        }
    );
    // An unparsable port is a warning, not an error.
    assert_eq!(
        parse_server_address("192.168.1.1:dns"),
        DnsServerAddress {
            host: "192.168.1.1".to_string(),
            port: 53,
        }
    );
}

#[test]
#[serial]
fn test_resolution_reads_the_process_environment() {
    std::env::set_var(ENV_DISCOVERY_NAME, "from-process-env.local");
    std::env::set_var(ENV_RELOAD_INTERVAL, "90");

    let resolved = DiscoveryConfig::resolve(&DiscoveryFileConfig::default()).unwrap();

    std::env::remove_var(ENV_DISCOVERY_NAME);
    std::env::remove_var(ENV_RELOAD_INTERVAL);

    assert_eq!(resolved.name, Some("from-process-env.local".to_string()));
    assert_eq!(resolved.reload_interval_secs, 90);
}
