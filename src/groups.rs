//! Open-group registry and grid-space ⇄ server-space position mapping.
//!
//! The flattened view interleaves each expanded group's children immediately
//! after the group row, while the backing store only knows flat top-level
//! positions. The registry remembers, per open group, the last known child
//! count and the group's last known server position, and derives the position
//! arithmetic from that: how far a grid position is displaced by children
//! above it, and how many child rows precede the cached server range.

use crate::record::RowKey;
use indexmap::IndexMap;
use smallvec::SmallVec;

/// Last known state of an expanded group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenGroup {
    /// Number of children at the last children response.
    pub count: usize,
    /// Position of the group row within the server's flat top-level
    /// ordering, corrected after every top-level mutation.
    pub server_index: usize,
}

/// Registry of currently expanded groups.
///
/// Entries are created when a group's children first arrive and removed when
/// the group is collapsed or its row is deleted. Entries for groups that have
/// scrolled outside the cached window are kept: their child counts still
/// offset every position below them.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    groups: IndexMap<RowKey, OpenGroup>,
}

impl GroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no groups are open.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Record (or refresh) an open group.
    pub fn register(&mut self, key: RowKey, group: OpenGroup) {
        self.groups.insert(key, group);
    }

    /// Forget an open group. No-op when the key is not registered.
    pub fn remove(&mut self, key: &str) -> Option<OpenGroup> {
        self.groups.shift_remove(key)
    }

    /// Look up an open group.
    pub fn get(&self, key: &str) -> Option<&OpenGroup> {
        self.groups.get(key)
    }

    /// Look up an open group, mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut OpenGroup> {
        self.groups.get_mut(key)
    }

    /// Whether a group is registered as open.
    pub fn contains(&self, key: &str) -> bool {
        self.groups.contains_key(key)
    }

    /// Iterate open groups in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&RowKey, &OpenGroup)> {
        self.groups.iter()
    }

    /// Number of child rows preceding the cached server range: the sum of
    /// child counts over groups positioned above `server_start`.
    pub fn children_above(&self, server_start: usize) -> usize {
        self.groups
            .values()
            .filter(|group| group.server_index < server_start)
            .map(|group| group.count)
            .sum()
    }

    /// Map a grid-space position (which counts inline-expanded children) to
    /// the equivalent server-space position (flat top-level ordering only).
    ///
    /// Walking open groups in ascending server order, each group below the
    /// target contributes its child count to the displacement; the
    /// contribution is clamped so that positions falling inside a group's
    /// children block map back onto the group's own server index. The result
    /// is monotonic in `grid_position` and idempotent for a fixed registry.
    pub fn server_position(&self, grid_position: usize) -> usize {
        let mut offset = 0;
        for group in self.sorted_by_index() {
            if group.server_index < grid_position - offset {
                offset += group.count.min(grid_position - offset - group.server_index);
            }
        }
        grid_position - offset
    }

    /// Open groups sorted by ascending server index.
    fn sorted_by_index(&self) -> SmallVec<[OpenGroup; 8]> {
        let mut sorted: SmallVec<[OpenGroup; 8]> = self.groups.values().copied().collect();
        sorted.sort_unstable_by_key(|group| group.server_index);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(groups: &[(&str, usize, usize)]) -> GroupRegistry {
        let mut reg = GroupRegistry::new();
        for &(key, server_index, count) in groups {
            reg.register(key.into(), OpenGroup { count, server_index });
        }
        reg
    }

    #[test]
    fn no_open_groups_maps_identically() {
        let reg = GroupRegistry::new();
        for g in [0, 1, 6, 100] {
            assert_eq!(reg.server_position(g), g);
        }
    }

    #[test]
    fn positions_past_a_group_subtract_its_children() {
        // One group at server index 5 with 3 children.
        let reg = registry(&[("g", 5, 3)]);
        assert_eq!(reg.server_position(10), 7);
        assert_eq!(reg.server_position(9), 6);
    }

    #[test]
    fn positions_inside_a_child_block_clamp_to_the_group() {
        let reg = registry(&[("g", 5, 3)]);
        // Grid rows 5..=8 are the group row and its three children.
        for g in 5..=8 {
            assert_eq!(reg.server_position(g), 5);
        }
        assert_eq!(reg.server_position(4), 4);
    }

    #[test]
    fn stacked_groups_accumulate_displacement() {
        let reg = registry(&[("a", 2, 2), ("b", 6, 4)]);
        // Below both groups: no displacement.
        assert_eq!(reg.server_position(1), 1);
        // Past group a only.
        assert_eq!(reg.server_position(6), 4);
        // Past both groups: grid 13 -> 2 children of a, 4 of b.
        assert_eq!(reg.server_position(13), 7);
    }

    #[test]
    fn registration_order_does_not_matter() {
        let fwd = registry(&[("a", 2, 2), ("b", 6, 4)]);
        let rev = registry(&[("b", 6, 4), ("a", 2, 2)]);
        for g in 0..20 {
            assert_eq!(fwd.server_position(g), rev.server_position(g));
        }
    }

    #[test]
    fn children_above_sums_groups_before_the_window() {
        let reg = registry(&[("a", 1, 3), ("b", 4, 2), ("c", 9, 5)]);
        assert_eq!(reg.children_above(0), 0);
        assert_eq!(reg.children_above(2), 3);
        assert_eq!(reg.children_above(5), 5);
        assert_eq!(reg.children_above(50), 10);
    }

    #[test]
    fn remove_is_noop_for_unknown_keys() {
        let mut reg = registry(&[("a", 1, 1)]);
        assert!(reg.remove("zzz").is_none());
        assert_eq!(reg.len(), 1);
        assert!(reg.remove("a").is_some());
        assert!(reg.is_empty());
    }
}
