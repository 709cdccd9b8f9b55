//! The view resolution engine.
//!
//! A query is classified by source address into a client group, the group's
//! zone entry for the query name is turned into a CNAME, and for any other
//! query type the alias target is delegated to the upstream. Upstream answers
//! are passed through untouched, whatever their response code.

use crate::acl::canonical_ip;
use crate::error::ResolveError;
use crate::snapshot::{ConfigSnapshot, SnapshotStore};
use crate::upstream::Upstream;
use crate::zones::{normalize, MatchMode, ZoneEntry};
use hickory_proto::rr::{rdata, DNSClass, Name, RData, Record, RecordType};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// CNAME first, then whatever the upstream returned for the target.
    Answer(Vec<Record>),
    /// Not our query: no client group or no zone entry.
    NoMatch,
}

/// How client groups are searched.
///
/// `FanOut` races one task per group and prefix and answers with the first
/// success. It does not preserve first-match-wins ordering: a later group can
/// win the race when groups overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dispatch {
    #[default]
    Sequential,
    FanOut,
}

#[derive(Clone)]
pub struct ViewResolver {
    store: Arc<SnapshotStore>,
    upstream: Arc<dyn Upstream>,
    mode: MatchMode,
    dispatch: Dispatch,
}

impl ViewResolver {
    pub fn new(store: Arc<SnapshotStore>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            store,
            upstream,
            mode: MatchMode::default(),
            dispatch: Dispatch::default(),
        }
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        if dispatch == Dispatch::FanOut {
            warn!("dispatch fan-out activo: el orden de grupos deja de garantizar first-match-wins");
        }
        self.dispatch = dispatch;
        self
    }

    /// The whole query runs against the snapshot current at entry, even if a
    /// reload publishes a new one meanwhile.
    pub async fn resolve(
        &self,
        src: IpAddr,
        qname: &Name,
        qtype: RecordType,
        qclass: DNSClass,
        deadline: Instant,
    ) -> Result<Resolution, ResolveError> {
        let snapshot = self.store.current();
        match self.dispatch {
            Dispatch::Sequential => {
                self.resolve_sequential(&snapshot, src, qname, qtype, qclass, deadline)
                    .await
            }
            Dispatch::FanOut => {
                let q = Arc::new(FanOutQuery {
                    snapshot,
                    upstream: self.upstream.clone(),
                    mode: self.mode,
                    src: canonical_ip(src),
                    qname: qname.clone(),
                    qkey: normalize(&qname.to_ascii()),
                    qtype,
                    qclass,
                    deadline,
                });
                resolve_fan_out(q).await
            }
        }
    }

    async fn resolve_sequential(
        &self,
        snapshot: &ConfigSnapshot,
        src: IpAddr,
        qname: &Name,
        qtype: RecordType,
        qclass: DNSClass,
        deadline: Instant,
    ) -> Result<Resolution, ResolveError> {
        let Some((group, prefix)) = snapshot.acl.classify_with_prefix(src) else {
            debug!(%src, %qname, "sin grupo de cliente");
            return Ok(Resolution::NoMatch);
        };
        info!(group = group.name(), %src, %prefix, %qname, "cliente reconocido");

        let Some(entry) = snapshot
            .zones
            .lookup(group.name(), &qname.to_ascii(), self.mode)
        else {
            debug!(group = group.name(), %qname, "sin zona para el nombre");
            return Ok(Resolution::NoMatch);
        };
        debug!(
            group = group.name(),
            kind = ?entry.kind,
            ttl = entry.ttl,
            target = %entry.value,
            "zona encontrada"
        );

        synthesize(self.upstream.as_ref(), entry, qname, qtype, qclass, deadline).await
    }
}

/// CNAME for `qname` -> `entry.value`, plus the upstream's records for the
/// target unless the query itself asked for CNAME.
async fn synthesize(
    upstream: &dyn Upstream,
    entry: &ZoneEntry,
    qname: &Name,
    qtype: RecordType,
    qclass: DNSClass,
    deadline: Instant,
) -> Result<Resolution, ResolveError> {
    let target = Name::from_ascii(&entry.value).map_err(|e| ResolveError::InvalidTarget {
        value: entry.value.clone(),
        detail: e.to_string(),
    })?;

    let mut cname = Record::from_rdata(
        qname.clone(),
        entry.ttl,
        RData::CNAME(rdata::CNAME(target.clone())),
    );
    cname.set_dns_class(qclass);

    let mut answers = vec![cname];

    if qtype != RecordType::CNAME {
        match timeout_at(deadline, upstream.resolve(&target, qtype)).await {
            Ok(Ok(extra)) => answers.extend(extra),
            // aporta vacío; nunca se inventa una respuesta sustituta
            Ok(Err(e)) => warn!(error = %e, target = %target, "upstream falló"),
            Err(_) => {
                return Err(ResolveError::DeadlineExceeded {
                    target: entry.value.clone(),
                })
            }
        }
    }

    if answers.is_empty() {
        return Ok(Resolution::NoMatch);
    }
    Ok(Resolution::Answer(answers))
}

struct FanOutQuery {
    snapshot: Arc<ConfigSnapshot>,
    upstream: Arc<dyn Upstream>,
    mode: MatchMode,
    src: IpAddr,
    qname: Name,
    qkey: String,
    qtype: RecordType,
    qclass: DNSClass,
    deadline: Instant,
}

type WorkerResult = Result<Option<Vec<Record>>, ResolveError>;

/// One task per group, each with one task per prefix. The first answer is
/// returned and the remaining tasks are aborted when their `JoinSet` drops.
/// NoMatch only after every task has finished.
async fn resolve_fan_out(q: Arc<FanOutQuery>) -> Result<Resolution, ResolveError> {
    let mut groups = JoinSet::new();
    for gi in 0..q.snapshot.acl.len() {
        groups.spawn(group_worker(q.clone(), gi));
    }

    while let Some(joined) = groups.join_next().await {
        match joined {
            Ok(Ok(Some(answers))) => return Ok(Resolution::Answer(answers)),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!(error = %e, qname = %q.qname, "worker de grupo falló"),
            Err(e) => warn!(error = %e, qname = %q.qname, "worker de grupo abortado"),
        }
    }

    debug!(src = %q.src, qname = %q.qname, "ningún grupo respondió");
    Ok(Resolution::NoMatch)
}

async fn group_worker(q: Arc<FanOutQuery>, gi: usize) -> WorkerResult {
    let prefix_count = q.snapshot.acl.groups()[gi].prefixes().len();

    let mut prefixes = JoinSet::new();
    for pi in 0..prefix_count {
        prefixes.spawn(prefix_worker(q.clone(), gi, pi));
    }

    let mut failure = None;
    while let Some(joined) = prefixes.join_next().await {
        match joined {
            Ok(Ok(Some(answers))) => return Ok(Some(answers)),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "worker de prefijo falló");
                failure.get_or_insert(e);
            }
            Err(e) => {
                failure.get_or_insert(ResolveError::Worker(e.to_string()));
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

async fn prefix_worker(q: Arc<FanOutQuery>, gi: usize, pi: usize) -> WorkerResult {
    let group = &q.snapshot.acl.groups()[gi];
    let prefix = &group.prefixes()[pi];
    if !prefix.contains(&q.src) {
        return Ok(None);
    }
    info!(group = group.name(), src = %q.src, %prefix, qname = %q.qname, "cliente reconocido");

    let Some(entry) = q
        .snapshot
        .zones
        .group(group.name())
        .and_then(|z| z.lookup(&q.qkey, q.mode))
    else {
        return Ok(None);
    };
    debug!(
        group = group.name(),
        kind = ?entry.kind,
        ttl = entry.ttl,
        target = %entry.value,
        "zona encontrada"
    );

    let resolution = synthesize(
        q.upstream.as_ref(),
        entry,
        &q.qname,
        q.qtype,
        q.qclass,
        q.deadline,
    )
    .await?;

    Ok(match resolution {
        Resolution::Answer(answers) => Some(answers),
        Resolution::NoMatch => None,
    })
}
