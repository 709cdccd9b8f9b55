use ipnet::IpNet;
use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct ClientGroup {
    name: String,
    prefixes: Vec<IpNet>, // orden de configuración
}

impl ClientGroup {
    pub fn new(name: impl Into<String>, prefixes: Vec<IpNet>) -> Self {
        Self {
            name: name.into(),
            prefixes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefixes(&self) -> &[IpNet] {
        &self.prefixes
    }

    /// First prefix of this group containing `ip`, if any.
    pub fn matching_prefix(&self, ip: IpAddr) -> Option<&IpNet> {
        let ip = canonical_ip(ip);
        self.prefixes.iter().find(|n| n.contains(&ip))
    }
}

/// Ordered client groups. First group (then first prefix) containing the
/// source address wins; never re-sorted by specificity.
#[derive(Debug, Clone, Default)]
pub struct AclTable {
    groups: Vec<ClientGroup>,
}

impl AclTable {
    pub fn new(groups: Vec<ClientGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[ClientGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn classify(&self, ip: IpAddr) -> Option<&str> {
        self.classify_with_prefix(ip).map(|(g, _)| g.name())
    }

    pub fn classify_with_prefix(&self, ip: IpAddr) -> Option<(&ClientGroup, &IpNet)> {
        self.groups
            .iter()
            .find_map(|g| g.matching_prefix(ip).map(|p| (g, p)))
    }
}

/// Los sockets dual-stack entregan IPv4 como `::ffff:a.b.c.d`.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => ip,
        },
        v4 => v4,
    }
}
