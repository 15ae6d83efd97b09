// Editor-only per-object tooling state: edit tracking, change receptors,
// and inspector fold state. Compiled only with the `editor` feature; the
// runtime build carries none of this.

use std::collections::HashSet;

use crate::entity::EntityId;

/// Sent to registered change receptors when a watched object is edited.
pub const NOTIFICATION_EDITED_CHANGED: i32 = 2;

#[derive(Default)]
pub(crate) struct ToolingData {
    pub edited: bool,
    pub edited_version: u32,
    pub change_receptors: Vec<EntityId>,
    pub unfolded_sections: HashSet<String>,
}

impl ToolingData {
    /// Record an edit and return the receptors to notify. The caller must
    /// deliver the notifications outside the object lock.
    pub fn mark_edited(&mut self) -> Vec<EntityId> {
        self.edited = true;
        self.edited_version = self.edited_version.wrapping_add(1);
        self.change_receptors.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_edited_bumps_version_and_returns_receptors() {
        let mut t = ToolingData::default();
        t.change_receptors.push(EntityId::from_raw(7));
        let v0 = t.edited_version;
        let receptors = t.mark_edited();
        assert!(t.edited);
        assert_eq!(t.edited_version, v0.wrapping_add(1));
        assert_eq!(receptors.len(), 1);
    }
}
