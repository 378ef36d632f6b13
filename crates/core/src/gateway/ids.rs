//! Job id allocation.

/// Allocates job ids.
///
/// Ids must be unique for the lifetime of the queue and safe to embed in a
/// file name (`[A-Za-z0-9_-]`).
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Generates `task_<uuid-v4>` ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        format!("task_{}", uuid::Uuid::new_v4().simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::validate_task_id;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_ids_are_unique_and_file_safe() {
        let ids = UuidIdGenerator;
        let generated: HashSet<String> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(generated.len(), 1000);
        for id in &generated {
            assert!(id.starts_with("task_"));
            assert_eq!(id.len(), "task_".len() + 32);
            assert!(validate_task_id(id).is_ok());
        }
    }
}
