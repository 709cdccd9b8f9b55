use crate::acl::{AclTable, ClientGroup};
use crate::error::{LoadError, RowIssue};
use crate::snapshot::ConfigSnapshot;
use crate::source::Source;
use crate::zones::{normalize, GroupZones, RecordKind, ZoneEntry, ZoneTable};
use ipnet::IpNet;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct RawClientGroup {
    pub name: String,
    #[serde(default, alias = "prefix_list")]
    pub prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawRecordGroup {
    pub name: String,
    #[serde(default)]
    pub records: Vec<RawRecord>,
}

/// Every field is optional here: a bad row must be skipped, not fail the
/// whole document.
#[derive(Debug, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ttl: serde_yaml::Value,
    #[serde(default, rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub value: String,
}

impl RawRecord {
    /// Missing ttl is 0; anything that is not an integer in u32 range is `None`.
    fn ttl(&self) -> Option<u32> {
        match &self.ttl {
            serde_yaml::Value::Null => Some(0),
            serde_yaml::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            serde_yaml::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A successfully built snapshot plus the rows that were skipped on the way.
#[derive(Debug)]
pub struct LoadReport {
    pub snapshot: ConfigSnapshot,
    pub issues: Vec<RowIssue>,
}

/// Fetches and parses both documents into a `ConfigSnapshot`.
#[derive(Debug, Clone)]
pub struct Loader {
    clients: Source,
    records: Source,
    fetch_timeout: Duration,
}

impl Loader {
    pub fn new(clients: Source, records: Source, fetch_timeout: Duration) -> Self {
        Self {
            clients,
            records,
            fetch_timeout,
        }
    }

    pub fn clients(&self) -> &Source {
        &self.clients
    }

    pub fn records(&self) -> &Source {
        &self.records
    }

    pub async fn load(&self) -> Result<LoadReport, LoadError> {
        let (clients_txt, records_txt) = tokio::try_join!(
            self.clients.fetch(self.fetch_timeout),
            self.records.fetch(self.fetch_timeout),
        )?;

        let raw_clients: Vec<RawClientGroup> = parse_document(&self.clients, &clients_txt)?;
        let raw_records: Vec<RawRecordGroup> = parse_document(&self.records, &records_txt)?;

        let report = build_snapshot(raw_clients, raw_records);
        for issue in &report.issues {
            warn!(%issue, "fila ignorada");
        }
        debug!(
            groups = report.snapshot.acl.len(),
            zone_groups = report.snapshot.zones.group_count(),
            entries = report.snapshot.zones.entry_count(),
            skipped = report.issues.len(),
            "configuración de vistas cargada"
        );
        Ok(report)
    }
}

/// Documents are YAML; JSON bodies parse through the same path.
pub fn parse_document<T>(source: &Source, text: &str) -> Result<Vec<T>, LoadError>
where
    T: for<'de> Deserialize<'de>,
{
    if text.trim().is_empty() {
        return Err(LoadError::ConfigParse {
            source_name: source.to_string(),
            detail: "documento vacío".to_string(),
        });
    }
    serde_yaml::from_str(text).map_err(|e| LoadError::ConfigParse {
        source_name: source.to_string(),
        detail: e.to_string(),
    })
}

pub fn build_snapshot(clients: Vec<RawClientGroup>, records: Vec<RawRecordGroup>) -> LoadReport {
    let mut issues = Vec::new();
    let acl = build_acl(clients, &mut issues);
    let zones = build_zones(records, &mut issues);
    LoadReport {
        snapshot: ConfigSnapshot::new(acl, zones),
        issues,
    }
}

fn build_acl(raw: Vec<RawClientGroup>, issues: &mut Vec<RowIssue>) -> AclTable {
    let mut groups = Vec::with_capacity(raw.len());
    for client in raw {
        let mut nets = Vec::with_capacity(client.prefixes.len());
        for p in &client.prefixes {
            match p.trim().parse::<IpNet>() {
                // 10.0.0.5/8 se trata como 10.0.0.0/8
                Ok(n) => nets.push(n.trunc()),
                Err(e) => issues.push(RowIssue::InvalidCidr {
                    group: client.name.clone(),
                    prefix: p.clone(),
                    detail: e.to_string(),
                }),
            }
        }
        groups.push(ClientGroup::new(client.name, nets));
    }
    AclTable::new(groups)
}

fn build_zones(raw: Vec<RawRecordGroup>, issues: &mut Vec<RowIssue>) -> ZoneTable {
    let mut by_group: HashMap<String, GroupZones> = HashMap::new();
    for group in raw {
        let zones = by_group.entry(group.name.clone()).or_default();
        for rr in group.records {
            if rr.name.trim().is_empty() {
                issues.push(RowIssue::MissingField {
                    group: group.name.clone(),
                    name: rr.name,
                    field: "name",
                });
                continue;
            }
            let Some(kind) = RecordKind::parse(&rr.typ) else {
                issues.push(RowIssue::UnknownRecordType {
                    group: group.name.clone(),
                    name: rr.name,
                    kind: rr.typ,
                });
                continue;
            };
            let Some(ttl) = rr.ttl() else {
                issues.push(RowIssue::InvalidTtl {
                    group: group.name.clone(),
                    name: rr.name,
                    ttl: format!("{:?}", rr.ttl),
                });
                continue;
            };
            if rr.value.trim().is_empty() {
                issues.push(RowIssue::MissingField {
                    group: group.name.clone(),
                    name: rr.name,
                    field: "value",
                });
                continue;
            }
            zones.insert(ZoneEntry {
                name: normalize(&rr.name),
                ttl,
                kind,
                value: normalize(&rr.value),
            });
        }
    }

    let mut table = ZoneTable::new();
    for (name, zones) in by_group {
        table.insert_group(&name, zones);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::MatchMode;
    use std::path::PathBuf;

    fn src() -> Source {
        Source::File(PathBuf::from("test.yaml"))
    }

    #[test]
    fn bad_rows_are_skipped_not_fatal() {
        let clients: Vec<RawClientGroup> = parse_document(
            &src(),
            r#"
- name: internal
  prefixes: ["100.64.0.0/10", "not-a-cidr", "10.0.0.0/8"]
"#,
        )
        .unwrap();
        let records: Vec<RawRecordGroup> = parse_document(
            &src(),
            r#"
- name: internal
  records:
    - { name: db.example.internal, ttl: 60, type: CNAME, value: db-dc1.example.internal }
    - { name: mx.example.internal, ttl: 60, type: MX, value: mail.example.internal }
    - { name: web.example.internal, ttl: 30, type: cname, value: WEB-DC1.example.internal. }
"#,
        )
        .unwrap();

        let report = build_snapshot(clients, records);
        assert_eq!(report.issues.len(), 2);

        let snap = report.snapshot;
        assert_eq!(snap.acl.groups()[0].prefixes().len(), 2);
        let zones = snap.zones.group("internal").unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(
            zones.lookup("web.example.internal.", MatchMode::Exact).unwrap().value,
            "web-dc1.example.internal."
        );
    }

    #[test]
    fn rows_with_missing_or_out_of_range_fields_are_skipped() {
        let records: Vec<RawRecordGroup> = parse_document(
            &src(),
            r#"
- name: internal
  records:
    - { name: db.example.internal, ttl: 60, type: CNAME, value: db-dc1.example.internal }
    - { name: notype.example.internal, ttl: 60, value: x.example.internal }
    - { name: bigttl.example.internal, ttl: 4294967296, type: CNAME, value: x.example.internal }
    - { name: negttl.example.internal, ttl: -5, type: CNAME, value: x.example.internal }
    - { name: novalue.example.internal, ttl: 60, type: CNAME }
    - { ttl: 60, type: CNAME, value: x.example.internal }
    - { name: nottl.example.internal, type: CNAME, value: y.example.internal }
"#,
        )
        .unwrap();

        let report = build_snapshot(vec![], records);
        assert_eq!(report.issues.len(), 5);
        assert!(report.issues.contains(&RowIssue::UnknownRecordType {
            group: "internal".into(),
            name: "notype.example.internal".into(),
            kind: String::new(),
        }));
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, RowIssue::InvalidTtl { name, .. } if name == "bigttl.example.internal")));

        let zones = report.snapshot.zones.group("internal").unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones.lookup("db.example.internal.", MatchMode::Exact).unwrap().ttl, 60);
        assert_eq!(zones.lookup("nottl.example.internal.", MatchMode::Exact).unwrap().ttl, 0);
    }

    #[test]
    fn accepts_legacy_prefix_list_and_json() {
        let clients: Vec<RawClientGroup> = parse_document(
            &src(),
            r#"[{"name": "dc1", "prefix_list": ["192.0.2.0/24"]}]"#,
        )
        .unwrap();
        assert_eq!(clients[0].prefixes, vec!["192.0.2.0/24".to_string()]);
    }

    #[test]
    fn structural_errors_fail_the_batch() {
        let r: Result<Vec<RawClientGroup>, _> = parse_document(&src(), "name: [unclosed");
        assert!(matches!(r, Err(LoadError::ConfigParse { .. })));

        let r: Result<Vec<RawClientGroup>, _> = parse_document(&src(), "  \n");
        assert!(matches!(r, Err(LoadError::ConfigParse { .. })));
    }
}
