//! Two-level todo hierarchy rules. A todo is either top-level or a subtask
//! of a top-level todo; subtasks never have subtasks of their own.
//!
//! The checks operate on rows the caller has already resolved through the
//! ownership guard, so a parent that is missing or owned by someone else is
//! reported before these functions run.

use db::entities::todo;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("Todo cannot be its own parent")]
    SelfReference,
    #[error("{0}")]
    InvalidHierarchy(&'static str),
}

const SUBTASK_PARENT: &str = "Parent todo cannot have children (subtasks can't have subtasks)";
const PARENT_WITH_CHILDREN: &str = "A todo with subtasks cannot become a subtask";

/// Rejects a reparent onto itself before any lookup happens.
pub fn ensure_not_self(todo_id: Uuid, new_parent_id: Uuid) -> Result<(), HierarchyError> {
    if todo_id == new_parent_id {
        return Err(HierarchyError::SelfReference);
    }
    Ok(())
}

/// A new todo may only hang off a top-level todo.
pub fn validate_new_child(parent: &todo::Model) -> Result<(), HierarchyError> {
    if parent.parent_todo_id.is_some() {
        return Err(HierarchyError::InvalidHierarchy(SUBTASK_PARENT));
    }
    Ok(())
}

/// Checks moving `todo` under `new_parent`. A todo that already has
/// subtasks cannot become a subtask itself, otherwise the tree would grow a
/// third level.
pub fn validate_reparent(
    todo: &todo::Model,
    new_parent: &todo::Model,
    todo_has_children: bool,
) -> Result<(), HierarchyError> {
    if todo.id == new_parent.id {
        return Err(HierarchyError::SelfReference);
    }
    validate_new_child(new_parent)?;
    if todo_has_children {
        return Err(HierarchyError::InvalidHierarchy(PARENT_WITH_CHILDREN));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::types::{TodoPriority, TodoStatus};

    use super::*;

    fn row(id: i64, parent_todo_id: Option<i64>) -> todo::Model {
        let now = Utc::now();
        todo::Model {
            id,
            uuid: Uuid::new_v4(),
            user_id: "alice".to_string(),
            title: format!("todo {id}"),
            description: None,
            status: TodoStatus::Draft,
            priority: TodoPriority::Medium,
            priority_rank: TodoPriority::Medium.rank(),
            due_date: None,
            completed_at: None,
            parent_todo_id,
            category_id: None,
            metadata: None,
            sort_order: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn top_level_todo_accepts_children() {
        assert_eq!(validate_new_child(&row(1, None)), Ok(()));
    }

    #[test]
    fn subtask_cannot_have_children() {
        assert!(matches!(
            validate_new_child(&row(2, Some(1))),
            Err(HierarchyError::InvalidHierarchy(_))
        ));
    }

    #[test]
    fn reparent_onto_itself_is_a_self_reference() {
        let todo = row(1, None);
        assert_eq!(
            validate_reparent(&todo, &todo, false),
            Err(HierarchyError::SelfReference)
        );
        assert_eq!(
            ensure_not_self(todo.uuid, todo.uuid),
            Err(HierarchyError::SelfReference)
        );
        assert_eq!(ensure_not_self(todo.uuid, Uuid::new_v4()), Ok(()));
    }

    #[test]
    fn reparent_checks_depth_on_both_sides() {
        let top = row(1, None);
        let subtask = row(2, Some(1));
        let other = row(3, None);

        assert_eq!(validate_reparent(&other, &top, false), Ok(()));
        assert!(matches!(
            validate_reparent(&other, &subtask, false),
            Err(HierarchyError::InvalidHierarchy(_))
        ));
        assert!(matches!(
            validate_reparent(&other, &top, true),
            Err(HierarchyError::InvalidHierarchy(_))
        ));
    }
}
