#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::rr::{rdata, Name, RData, Record, RecordType};
use tempfile::TempDir;

use rust_dns_views::{
    error::UpstreamError,
    loader::Loader,
    resolver::ViewResolver,
    snapshot::SnapshotStore,
    source::Source,
    upstream::Upstream,
};

pub const CLIENTS: &str = r#"
- name: internal
  prefixes:
    - 100.64.0.0/10
- name: dc2
  prefixes:
    - 100.64.1.0/24
    - 10.20.0.0/16
- name: empty-view
  prefixes:
    - 192.0.2.0/24
"#;

pub const RECORDS: &str = r#"
- name: internal
  records:
    - name: db.example.internal
      ttl: 60
      type: CNAME
      value: db-dc1.example.internal
    - name: cache.example.internal
      ttl: 30
      type: SRV
      value: cache-dc1.example.internal
    - name: api.example.internal.
      ttl: 120
      type: cname
      value: API-DC1.example.internal.
- name: dc2
  records:
    - name: db.example.internal
      ttl: 60
      type: CNAME
      value: db-dc2.example.internal
"#;

pub fn write(dir: &TempDir, file: &str, body: &str) -> PathBuf {
    let p = dir.path().join(file);
    std::fs::write(&p, body).expect("write fixture");
    p
}

pub fn loader_for(dir: &TempDir, clients: &str, records: &str) -> Loader {
    let c = write(dir, "clients.yaml", clients);
    let r = write(dir, "records.yaml", records);
    Loader::new(
        Source::File(c),
        Source::File(r),
        Duration::from_secs(5),
    )
}

pub async fn resolver_for(
    dir: &TempDir,
    clients: &str,
    records: &str,
    upstream: Arc<FakeUpstream>,
) -> ViewResolver {
    let report = loader_for(dir, clients, records).load().await.expect("load");
    let store = Arc::new(SnapshotStore::new(report.snapshot));
    ViewResolver::new(store, upstream)
}

pub fn name(s: &str) -> Name {
    Name::from_ascii(s).expect("name")
}

pub fn a_record(owner: &str, ip: [u8; 4]) -> Record {
    Record::from_rdata(name(owner), 30, RData::A(rdata::A(ip.into())))
}

pub fn cname_target(r: &Record) -> Option<String> {
    match r.data() {
        RData::CNAME(c) => Some(c.0.to_ascii()),
        _ => None,
    }
}

/// Scripted upstream that records every call.
#[derive(Default)]
pub struct FakeUpstream {
    answers: HashMap<(String, RecordType), Vec<Record>>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, RecordType)>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, target: &str, qtype: RecordType, records: Vec<Record>) -> Self {
        self.answers.insert((target.to_string(), qtype), records);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, RecordType)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn resolve(&self, target: &Name, qtype: RecordType) -> Result<Vec<Record>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = target.to_ascii();
        self.seen.lock().unwrap().push((key.clone(), qtype));

        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(UpstreamError::Transport {
                target: key,
                detail: "connection refused".to_string(),
            });
        }
        Ok(self.answers.get(&(key, qtype)).cloned().unwrap_or_default())
    }
}
