use crate::error::UpstreamError;
use anyhow::Context;
use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, Record, RecordType};
use hickory_proto::xfer::Protocol;
use hickory_proto::ProtoErrorKind;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{ResolveErrorKind, TokioResolver};
use std::net::SocketAddr;
use std::time::Duration;

/// Resolves an alias target to concrete records.
///
/// Negative answers (NXDOMAIN, SERVFAIL, NOERROR without data) are returned
/// as whatever records the upstream sent, usually none. `Err` is reserved for
/// transport failures.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn resolve(&self, target: &Name, qtype: RecordType) -> Result<Vec<Record>, UpstreamError>;

    /// Like `resolve` but keeps the upstream's response code.
    async fn lookup(&self, name: &Name, qtype: RecordType) -> Result<UpstreamAnswer, UpstreamError> {
        let records = self.resolve(name, qtype).await?;
        Ok(UpstreamAnswer {
            rcode: ResponseCode::NoError,
            records,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamAnswer {
    pub rcode: ResponseCode,
    pub records: Vec<Record>,
}

pub struct HickoryUpstream {
    resolver: TokioResolver,
}

impl HickoryUpstream {
    pub fn new(resolver: TokioResolver) -> Self {
        Self { resolver }
    }

    pub fn from_upstreams(upstreams: &[String], timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self::new(build_forwarder(upstreams, timeout)?))
    }
}

#[async_trait]
impl Upstream for HickoryUpstream {
    async fn resolve(&self, target: &Name, qtype: RecordType) -> Result<Vec<Record>, UpstreamError> {
        Ok(self.lookup(target, qtype).await?.records)
    }

    async fn lookup(&self, name: &Name, qtype: RecordType) -> Result<UpstreamAnswer, UpstreamError> {
        let transport = |detail: String| UpstreamError::Transport {
            target: name.to_string(),
            detail,
        };

        match self.resolver.lookup(name.clone(), qtype).await {
            Ok(lookup) => Ok(UpstreamAnswer {
                rcode: ResponseCode::NoError,
                records: lookup.records().to_vec(),
            }),
            Err(e) => match e.kind() {
                ResolveErrorKind::Proto(pe) => match pe.kind() {
                    // NXDOMAIN / NODATA / SERVFAIL con respuesta: se pasa tal cual
                    ProtoErrorKind::NoRecordsFound { response_code, .. } => Ok(UpstreamAnswer {
                        rcode: *response_code,
                        records: vec![],
                    }),
                    _ => Err(transport(e.to_string())),
                },
                _ => Err(transport(e.to_string())),
            },
        }
    }
}

/// Resolver over the configured forwarders, UDP first then TCP per address.
/// An empty list falls back to the system resolver configuration.
pub fn build_forwarder(upstreams: &[String], timeout: Duration) -> anyhow::Result<TokioResolver> {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;

    if upstreams.is_empty() {
        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .context("no pude leer la configuración de resolución del sistema")?
            .with_options(opts)
            .build();
        return Ok(resolver);
    }

    let mut cfg = ResolverConfig::new();
    for u in upstreams {
        let addr: SocketAddr = u.parse().with_context(|| format!("upstream inválido: {u}"))?;

        for protocol in [Protocol::Udp, Protocol::Tcp] {
            cfg.add_name_server(NameServerConfig {
                socket_addr: addr,
                protocol,
                tls_dns_name: None,
                trust_negative_responses: true,
                bind_addr: None,
                http_endpoint: None,
            });
        }
    }

    let resolver = TokioResolver::builder_with_config(cfg, TokioConnectionProvider::default())
        .with_options(opts)
        .build();

    Ok(resolver)
}
