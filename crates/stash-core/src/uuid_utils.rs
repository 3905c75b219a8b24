//! UUID helpers.
//!
//! All entity identifiers are UUIDv7 (time-ordered), which keeps B-tree
//! inserts append-mostly and makes `ORDER BY id` a rough creation order.

use uuid::Uuid;

/// Generate a new time-ordered UUIDv7.
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_version() {
        let id = new_v7();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_new_v7_monotonic_ordering() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b);
    }
}
