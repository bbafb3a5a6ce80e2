//! Per-page shared context.

use uuid::Uuid;

use crate::host::{DocumentHandle, PageMeta};
use crate::store::ObjectStore;

/// State shared by every directive during one page run.
///
/// Built once after the bootstrap fetches and handed to factories by
/// reference.
#[derive(Debug)]
pub struct PageContext {
    pub page: PageMeta,
    pub document: DocumentHandle,
    pub store: ObjectStore,
    /// Prefix of activated span macro ids.
    pub view_prefix: String,
}

/// Fresh widget identifier in the object store key format.
///
/// Hyphens are replaced by underscores so the identifier is a single segment
/// of a dotted store path.
pub fn new_uuid() -> String {
    Uuid::new_v4().to_string().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uuid_format() {
        let uuid = new_uuid();
        let groups: Vec<&str> = uuid.split('_').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(groups[2].starts_with('4'));
        assert!(matches!(groups[3].as_bytes()[0], b'8' | b'9' | b'a' | b'b'));
        assert_ne!(new_uuid(), uuid);
    }
}
