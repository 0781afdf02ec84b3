use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

pub type NotificationId = u32;

// Leaves room below for fixed ids such as the service notification.
pub(crate) const FIRST_TASK_NOTIFICATION_ID: NotificationId = 1000;

/// Assigns each task id its own notification id while its notification is live.
///
/// Entries are dropped with [`NotificationIds::release`] so the table only
/// holds units that are still running. Ids keep counting up, so a task that
/// is downloaded again gets a fresh notification.
pub struct NotificationIds {
    table: Mutex<Table>,
}

struct Table {
    ids: HashMap<String, NotificationId>,
    next: NotificationId,
}

impl Default for NotificationIds {
    fn default() -> Self {
        Self {
            table: Mutex::new(Table {
                ids: HashMap::new(),
                next: FIRST_TASK_NOTIFICATION_ID,
            }),
        }
    }
}

impl NotificationIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_for(&self, task_id: &str) -> NotificationId {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = table.ids.get(task_id) {
            return *id;
        }
        let id = table.next;
        table.next = table.next.wrapping_add(1).max(FIRST_TASK_NOTIFICATION_ID);
        table.ids.insert(task_id.to_string(), id);
        id
    }

    /// Lookup without allocating.
    pub fn get(&self, task_id: &str) -> Option<NotificationId> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .get(task_id)
            .copied()
    }

    /// Forget `task_id` once its notification is finished or cancelled.
    pub fn release(&self, task_id: &str) -> Option<NotificationId> {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .remove(task_id)
    }

    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_and_distinct() {
        let ids = NotificationIds::new();
        let a = ids.id_for("a");
        let b = ids.id_for("b");
        assert_ne!(a, b);
        assert_eq!(ids.id_for("a"), a);
        assert_eq!(ids.get("b"), Some(b));
        assert_eq!(ids.get("c"), None);
    }

    #[test]
    fn test_ids_are_sequential() {
        let ids = NotificationIds::new();
        assert_eq!(ids.id_for("Aa"), FIRST_TASK_NOTIFICATION_ID);
        assert_eq!(ids.id_for("BB"), FIRST_TASK_NOTIFICATION_ID + 1);
    }

    #[test]
    fn test_release_drops_entry() {
        let ids = NotificationIds::new();
        let a = ids.id_for("a");
        ids.id_for("b");

        assert_eq!(ids.release("a"), Some(a));
        assert_eq!(ids.release("a"), None);
        assert_eq!(ids.get("a"), None);
        assert_eq!(ids.len(), 1);

        // A released task gets a new id next time
        assert_eq!(ids.id_for("a"), FIRST_TASK_NOTIFICATION_ID + 2);
        ids.release("a");
        ids.release("b");
        assert!(ids.is_empty());
    }
}
