use crate::{config::DiscoveryConfig, core::AddressResolver, dns::ResolveError};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hickory_resolver::{
    config::{NameServerConfig, ResolverConfig, ResolverOpts},
    proto::xfer::Protocol,
    system_conf, TokioResolver,
};
use std::{
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    time::Duration,
};
use tracing::{trace, warn};

/// DNS resolver implementation using hickory-resolver.
///
/// One instance is built per discovery session and holds the session's
/// socket pool; dropping the session releases it.
pub struct HickoryAddressResolver {
    resolver: TokioResolver,
    timeout: Duration,
}

impl HickoryAddressResolver {
    /// Creates a new resolver from the resolved discovery configuration.
    ///
    /// Also returns the name servers in use so the caller can log them.
    pub fn from_config(config: &DiscoveryConfig) -> Result<(Self, Vec<SocketAddr>)> {
        let resolver_config = if let Some(server) = &config.dns_server_address {
            // If a specific server is provided, use it exclusively. The host
            // part may itself be a name; resolve it once, now, so a bad
            // override fails the session start instead of every poll.
            let socket_addr = (server.host.as_str(), server.port)
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| anyhow!("DNS server address {} resolved to no address", server))?;
            let mut custom_config = ResolverConfig::new();
            custom_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
            custom_config
        } else {
            // Otherwise, load from system config
            let (system_config, _) = system_conf::read_system_conf()?;
            if system_config.name_servers().is_empty() {
                warn!("No system DNS servers found, falling back to Cloudflare DNS.");
                ResolverConfig::cloudflare()
            } else {
                system_config
            }
        };

        // Rebuild the config from name servers only, dropping any search
        // domains. The discovery name is always treated as an FQDN.
        let mut resolver_config_with_no_search = ResolverConfig::new();
        for ns in resolver_config.name_servers() {
            resolver_config_with_no_search.add_name_server(ns.clone());
        }

        let mut nameservers: Vec<_> = resolver_config_with_no_search
            .name_servers()
            .iter()
            .map(|ns| ns.socket_addr)
            .collect();
        nameservers.sort();
        nameservers.dedup();

        let timeout = Duration::from_secs(config.resolution_timeout_secs);

        let mut resolver_opts = ResolverOpts::default();
        resolver_opts.ndots = 1;
        resolver_opts.timeout = timeout;
        // Every poll must observe fresh records; a resolver-side cache would
        // hide topology changes for the length of its TTL.
        resolver_opts.cache_size = 0;

        let resolver = hickory_resolver::Resolver::builder_with_config(
            resolver_config_with_no_search,
            hickory_resolver::name_server::TokioConnectionProvider::default(),
        )
        .with_options(resolver_opts)
        .build();

        Ok((Self { resolver, timeout }, nameservers))
    }

    async fn lookup_all_families(&self, name: &str) -> Result<Vec<IpAddr>, ResolveError> {
        use hickory_resolver::proto::rr::RecordType;

        // Perform concurrent lookups for A and AAAA records.
        let (a_result, aaaa_result) = tokio::join!(
            self.resolver.lookup(name, RecordType::A),
            self.resolver.lookup(name, RecordType::AAAA)
        );

        let mut addresses = Vec::new();
        let mut primary_error = None;

        // Anything that is not a usable IP address is dropped silently.
        match a_result {
            Ok(lookup) => {
                addresses.extend(lookup.into_iter().filter_map(|r| r.ip_addr()));
            }
            Err(e) => {
                primary_error = Some(e);
            }
        }

        match aaaa_result {
            Ok(lookup) => {
                addresses.extend(lookup.into_iter().filter_map(|r| r.ip_addr()));
            }
            Err(e) => {
                if primary_error.is_none() {
                    primary_error = Some(e);
                } else {
                    trace!(name, error = %e, "AAAA record lookup also failed");
                }
            }
        }

        // One record family failing is recoverable as long as the other
        // answered. Zero records without any error is an empty success and
        // propagates as such.
        match primary_error {
            Some(err) if addresses.is_empty() => Err(ResolveError::Query(err.to_string())),
            Some(err) => {
                trace!(name, error = %err, "Partial DNS failure recovered by the other record family");
                Ok(addresses)
            }
            None => Ok(addresses),
        }
    }
}

#[async_trait]
impl AddressResolver for HickoryAddressResolver {
    /// Resolves all A and AAAA records for `name` within the session's
    /// timeout budget. When the budget elapses, the in-flight lookups are
    /// dropped and control returns immediately.
    async fn resolve_all(&self, name: &str) -> Result<Vec<IpAddr>, ResolveError> {
        match tokio::time::timeout(self.timeout, self.lookup_all_families(name)).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::Timeout),
        }
    }
}
