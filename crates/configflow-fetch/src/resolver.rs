//! Name resolution against public DNS servers.
//!
//! The managed DNS filter may itself own the host's resolver port, so artifact
//! downloads never go through the system stub. Each server gets its own
//! resolver with a single attempt; the fallback is only consulted when the
//! primary cannot be reached or gives no usable answer. A negative answer
//! (`NXDOMAIN`, or a name with no address records) is final.

use std::error::Error as StdError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::{ResolveError, Resolver, TokioResolver};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};

/// First server consulted.
pub const PRIMARY_DNS: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));
/// Server consulted when the primary fails.
pub const FALLBACK_DNS: IpAddr = IpAddr::V4(Ipv4Addr::new(223, 5, 5, 5));

const DNS_PORT: u16 = 53;
const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolver trying a fixed, ordered list of public name servers.
#[derive(Clone)]
pub struct PublicDnsResolver {
    servers: Arc<Vec<(SocketAddr, TokioResolver)>>,
}

impl std::fmt::Debug for PublicDnsResolver {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let servers: Vec<SocketAddr> = self.servers.iter().map(|(addr, _)| *addr).collect();
        formatter
            .debug_struct("PublicDnsResolver")
            .field("servers", &servers)
            .finish()
    }
}

impl Default for PublicDnsResolver {
    fn default() -> Self {
        Self::with_servers(&[PRIMARY_DNS, FALLBACK_DNS])
    }
}

impl PublicDnsResolver {
    /// Resolver for the given servers, consulted in order.
    #[must_use]
    pub fn with_servers(servers: &[IpAddr]) -> Self {
        let addrs: Vec<SocketAddr> = servers
            .iter()
            .map(|ip| SocketAddr::new(*ip, DNS_PORT))
            .collect();
        Self::with_server_addrs(&addrs)
    }

    /// Resolver for servers on explicit ports, consulted in order.
    #[must_use]
    pub fn with_server_addrs(servers: &[SocketAddr]) -> Self {
        let resolvers = servers
            .iter()
            .map(|addr| (*addr, single_server_resolver(*addr)))
            .collect();
        Self {
            servers: Arc::new(resolvers),
        }
    }

    /// Resolve `host`, moving to the next server only when the current one
    /// cannot be reached or fails to answer.
    ///
    /// # Errors
    ///
    /// Returns a negative answer immediately, otherwise the last server's
    /// error when every server fails.
    pub async fn lookup(&self, host: &str) -> FetchResult<Vec<IpAddr>> {
        let mut last_error = None;
        for (server, resolver) in self.servers.iter() {
            match resolver.lookup_ip(host).await {
                Ok(lookup) => {
                    let addrs: Vec<IpAddr> = lookup.iter().collect();
                    if addrs.is_empty() {
                        last_error = Some(FetchError::NoAddresses {
                            host: host.to_string(),
                        });
                        continue;
                    }
                    debug!(host, server = %server, count = addrs.len(), "host resolved");
                    return Ok(addrs);
                }
                Err(source) => {
                    let negative = is_negative_answer(&source);
                    let error = FetchError::Resolve {
                        host: host.to_string(),
                        server: server.ip(),
                        source,
                    };
                    if negative {
                        debug!(host, server = %server, "name does not resolve");
                        return Err(error);
                    }
                    warn!(host, server = %server, error = ?error, "name server unavailable");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| FetchError::NoAddresses {
            host: host.to_string(),
        }))
    }
}

impl Resolve for PublicDnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let addrs = resolver
                .lookup(name.as_str())
                .await
                .map_err(|err| Box::new(err) as Box<dyn StdError + Send + Sync>)?;
            let addrs: Addrs = Box::new(addrs.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok(addrs)
        })
    }
}

/// `NXDOMAIN` or an empty `NOERROR` answer from a reachable server.
fn is_negative_answer(err: &ResolveError) -> bool {
    matches!(
        err.proto().map(|proto| proto.kind()),
        Some(ProtoErrorKind::NoRecordsFound {
            response_code: ResponseCode::NXDomain | ResponseCode::NoError,
            ..
        })
    )
}

fn single_server_resolver(server: SocketAddr) -> TokioResolver {
    let group = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
    let config = ResolverConfig::from_parts(None, Vec::new(), group);
    let mut options = ResolverOpts::default();
    options.timeout = DNS_TIMEOUT;
    options.attempts = 1;
    Resolver::builder_with_config(config, TokioConnectionProvider::default())
        .with_options(options)
        .build()
}
