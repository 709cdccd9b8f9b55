use crate::acl::AclTable;
use crate::zones::ZoneTable;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::SystemTime;

/// One load cycle's ACL + zones. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub acl: AclTable,
    pub zones: ZoneTable,
    pub loaded_at: SystemTime,
}

impl ConfigSnapshot {
    pub fn new(acl: AclTable, zones: ZoneTable) -> Self {
        Self {
            acl,
            zones,
            loaded_at: SystemTime::now(),
        }
    }
}

/// The currently serving snapshot. Readers take a full `Arc` and keep it for
/// the whole query; a publish swaps the pointer and the old snapshot is
/// dropped when its last reader finishes.
pub struct SnapshotStore {
    current: ArcSwap<ConfigSnapshot>,
}

impl SnapshotStore {
    pub fn new(initial: ConfigSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    pub fn publish(&self, snapshot: ConfigSnapshot) {
        self.current.store(Arc::new(snapshot));
    }
}
