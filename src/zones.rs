use serde::Deserialize;
use std::collections::HashMap;

/// Tipos aceptados en los documentos de registros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    A,
    Aaaa,
    Cname,
    Txt,
}

impl RecordKind {
    /// Case-insensitive; returns `None` for anything outside A/AAAA/CNAME/TXT.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_uppercase().as_str() {
            "A" => RecordKind::A,
            "AAAA" => RecordKind::Aaaa,
            "CNAME" => RecordKind::Cname,
            "TXT" => RecordKind::Txt,
            _ => return None,
        })
    }
}

/// How a query name is matched against a group's zone entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Exact match on the normalized name.
    #[default]
    Exact,
    /// Exact match first, then the longest configured name that is a
    /// label-aligned suffix of the query (subtree zones).
    LongestSuffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEntry {
    pub name: String,
    pub ttl: u32,
    pub kind: RecordKind,
    pub value: String,
}

/// Entradas de un grupo: orden de configuración + índice por nombre.
#[derive(Debug, Clone, Default)]
pub struct GroupZones {
    names: Vec<String>,
    by_name: HashMap<String, ZoneEntry>,
}

impl GroupZones {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`; a repeated name replaces the earlier entry but keeps
    /// its original position.
    pub fn insert(&mut self, entry: ZoneEntry) -> Option<ZoneEntry> {
        let prev = self.by_name.insert(entry.name.clone(), entry.clone());
        if prev.is_none() {
            self.names.push(entry.name);
        }
        prev
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `qname` must already be normalized.
    pub fn lookup(&self, qname: &str, mode: MatchMode) -> Option<&ZoneEntry> {
        if let Some(z) = self.by_name.get(qname) {
            return Some(z);
        }
        match mode {
            MatchMode::Exact => None,
            MatchMode::LongestSuffix => {
                let mut best: Option<&str> = None;
                for name in &self.names {
                    if !is_suffix(qname, name) {
                        continue;
                    }
                    // empate: gana el primero configurado
                    if best.map_or(true, |b| name.len() > b.len()) {
                        best = Some(name);
                    }
                }
                best.and_then(|n| self.by_name.get(n))
            }
        }
    }
}

/// Per-group zone tables. A group with no entry here never answers.
#[derive(Debug, Clone, Default)]
pub struct ZoneTable {
    groups: HashMap<String, GroupZones>,
}

impl ZoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_group(&mut self, group: &str, zones: GroupZones) {
        self.groups.insert(group.to_string(), zones);
    }

    pub fn group(&self, group: &str) -> Option<&GroupZones> {
        self.groups.get(group)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.values().map(GroupZones::len).sum()
    }

    pub fn lookup(&self, group: &str, qname: &str, mode: MatchMode) -> Option<&ZoneEntry> {
        self.groups
            .get(group)?
            .lookup(&normalize(qname), mode)
    }
}

/// Lowercase, trimmed, fully qualified (single trailing dot). Idempotent.
pub fn normalize(name: &str) -> String {
    let x = name.trim().trim_end_matches('.').to_ascii_lowercase();
    if x.is_empty() {
        ".".to_string()
    } else {
        format!("{x}.")
    }
}

fn is_suffix(q: &str, suffix: &str) -> bool {
    if suffix == "." {
        return true;
    }
    q == suffix
        || (q.len() > suffix.len()
            && q.ends_with(suffix)
            && q.as_bytes()[q.len() - suffix.len() - 1] == b'.')
}
