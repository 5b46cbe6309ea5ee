use std::collections::BTreeSet;

use crate::record::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Activate,
    Suspend,
    Delete,
}

impl BulkAction {
    pub fn verb(self) -> &'static str {
        match self {
            BulkAction::Activate => "activate",
            BulkAction::Suspend => "suspend",
            BulkAction::Delete => "delete",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            BulkAction::Activate => "activated",
            BulkAction::Suspend => "suspended",
            BulkAction::Delete => "deleted",
        }
    }
}

/// Result of asking which records a bulk action would touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkTarget {
    NoTargets,
    Targets {
        action: BulkAction,
        ids: Vec<RecordId>,
    },
}

/// Selected record ids of one table view.
///
/// Selection only ever covers visible rows: [`Selection::retain_visible`] runs
/// after every re-derivation of the view, so hiding a row deselects it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<RecordId>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.contains(&id)
    }

    /// Sets the membership of every visible record to `checked`.
    pub fn toggle_all(&mut self, visible: &[RecordId], checked: bool) {
        for id in visible {
            if checked {
                self.ids.insert(*id);
            } else {
                self.ids.remove(id);
            }
        }
    }

    /// True when every visible record is selected (and there is at least one).
    pub fn all_selected(&self, visible: &[RecordId]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.ids.contains(id))
    }

    pub fn toggle_one(&mut self, id: RecordId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Drops every selected id that is not in `visible`. Returns how many were dropped.
    pub fn retain_visible(&mut self, visible: &[RecordId]) -> usize {
        let before = self.ids.len();
        let visible: BTreeSet<RecordId> = visible.iter().copied().collect();
        self.ids.retain(|id| visible.contains(id));
        before - self.ids.len()
    }

    /// Deselects `ids`, leaving any other selected record alone.
    pub fn remove_all(&mut self, ids: &[RecordId]) {
        for id in ids {
            self.ids.remove(id);
        }
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.ids.iter().copied().collect()
    }

    pub fn bulk_action(&self, action: BulkAction) -> BulkTarget {
        if self.ids.is_empty() {
            BulkTarget::NoTargets
        } else {
            BulkTarget::Targets {
                action,
                ids: self.ids(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<RecordId> {
        raw.iter().map(|i| RecordId(*i)).collect()
    }

    #[test]
    fn toggle_all_then_hide_keeps_only_visible_targets() {
        let mut selection = Selection::default();
        selection.toggle_all(&ids(&[1, 2, 3, 4, 5]), true);
        assert_eq!(selection.len(), 5);

        let dropped = selection.retain_visible(&ids(&[2, 4]));
        assert_eq!(dropped, 3);
        assert_eq!(selection.len(), 2);
        assert_eq!(
            selection.bulk_action(BulkAction::Suspend),
            BulkTarget::Targets {
                action: BulkAction::Suspend,
                ids: ids(&[2, 4])
            }
        );
    }

    #[test]
    fn empty_selection_refuses_bulk_actions() {
        let mut selection = Selection::default();
        assert_eq!(selection.bulk_action(BulkAction::Delete), BulkTarget::NoTargets);

        selection.toggle_one(RecordId(3));
        selection.toggle_one(RecordId(3));
        assert_eq!(selection.bulk_action(BulkAction::Delete), BulkTarget::NoTargets);
    }

    #[test]
    fn toggle_all_unchecked_only_touches_visible_rows() {
        let mut selection = Selection::default();
        selection.toggle_all(&ids(&[1, 2, 3]), true);
        selection.toggle_all(&ids(&[1, 2]), false);
        assert_eq!(selection.ids(), ids(&[3]));
        assert!(!selection.all_selected(&ids(&[1, 3])));
        assert!(selection.all_selected(&ids(&[3])));
        assert!(!selection.all_selected(&[]));
    }

    #[test]
    fn remove_all_keeps_other_selections() {
        let mut selection = Selection::default();
        selection.toggle_all(&ids(&[1, 2, 3]), true);
        selection.remove_all(&ids(&[1, 3, 7]));
        assert_eq!(selection.ids(), ids(&[2]));
    }
}
