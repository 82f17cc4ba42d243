//! Filter, sort and pagination handling for todo listings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, QueryOrder, Select,
    sea_query::{Expr, Func, LikeExpr, Order},
};
use serde::Deserialize;
use ts_rs::TS;
use uuid::Uuid;

use super::pagination::PageRequest;
use crate::{
    entities::todo,
    types::{SortDirection, TodoPriority, TodoSortField, TodoStatus},
    validation::ValidationError,
};

/// Raw listing request as it arrives from a caller.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct TodoListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub category_id: Option<Uuid>,
    pub parent_todo_id: Option<Uuid>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    pub overdue: Option<bool>,
    pub completed: Option<bool>,
}

/// A listing request with defaults applied and every field checked.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoFilter {
    pub page: PageRequest,
    pub sort: TodoSortField,
    pub direction: SortDirection,
    pub search: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub category_id: Option<Uuid>,
    pub parent_todo_id: Option<Uuid>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    pub overdue: Option<bool>,
    pub completed: Option<bool>,
}

impl Default for TodoFilter {
    fn default() -> Self {
        Self {
            page: PageRequest::default(),
            sort: TodoSortField::default(),
            direction: SortDirection::default(),
            search: None,
            status: None,
            priority: None,
            category_id: None,
            parent_todo_id: None,
            due_from: None,
            due_to: None,
            overdue: None,
            completed: None,
        }
    }
}

impl TodoListQuery {
    pub fn normalize(self) -> Result<TodoFilter, ValidationError> {
        let page = PageRequest::from_parts(self.page, self.limit)?;
        let sort = match non_blank(self.sort) {
            Some(raw) => TodoSortField::from_str(&raw).map_err(|_| {
                ValidationError::new(
                    "sort",
                    "must be one of created_at, updated_at, title, priority, due_date",
                )
            })?,
            None => TodoSortField::default(),
        };
        let direction = match non_blank(self.order) {
            Some(raw) => SortDirection::from_str(&raw.to_ascii_lowercase())
                .map_err(|_| ValidationError::new("order", "must be asc or desc"))?,
            None => SortDirection::default(),
        };
        if let (Some(from), Some(to)) = (self.due_from, self.due_to)
            && from > to
        {
            return Err(ValidationError::new(
                "due_from",
                "must not be later than due_to",
            ));
        }

        Ok(TodoFilter {
            page,
            sort,
            direction,
            search: non_blank(self.search),
            status: self.status,
            priority: self.priority,
            category_id: self.category_id,
            parent_todo_id: self.parent_todo_id,
            due_from: self.due_from,
            due_to: self.due_to,
            overdue: self.overdue,
            completed: self.completed,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TodoFilter {
    /// Builds the row predicate. Category and parent references must
    /// already be resolved to row ids owned by `owner_id`.
    pub(crate) fn condition(
        &self,
        owner_id: &str,
        category_row_id: Option<i64>,
        parent_row_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Condition {
        let mut condition = Condition::all().add(todo::Column::UserId.eq(owner_id));

        if let Some(search) = &self.search {
            condition = condition.add(
                Condition::any()
                    .add(contains_ignore_case(todo::Column::Title, search))
                    .add(contains_ignore_case(todo::Column::Description, search)),
            );
        }
        if let Some(status) = self.status {
            condition = condition.add(todo::Column::Status.eq(status));
        }
        if let Some(priority) = self.priority {
            condition = condition.add(todo::Column::Priority.eq(priority));
        }
        if let Some(category_row_id) = category_row_id {
            condition = condition.add(todo::Column::CategoryId.eq(category_row_id));
        }
        if let Some(parent_row_id) = parent_row_id {
            condition = condition.add(todo::Column::ParentTodoId.eq(parent_row_id));
        }
        if let Some(from) = self.due_from {
            condition = condition.add(todo::Column::DueDate.gte(from));
        }
        if let Some(to) = self.due_to {
            condition = condition.add(todo::Column::DueDate.lte(to));
        }
        match self.overdue {
            Some(true) => {
                condition = condition
                    .add(todo::Column::DueDate.is_not_null())
                    .add(todo::Column::DueDate.lt(now))
                    .add(todo::Column::Status.ne(TodoStatus::Completed));
            }
            Some(false) => {
                condition = condition.add(
                    Condition::any()
                        .add(todo::Column::DueDate.is_null())
                        .add(todo::Column::DueDate.gte(now))
                        .add(todo::Column::Status.eq(TodoStatus::Completed)),
                );
            }
            None => {}
        }
        match self.completed {
            Some(true) => {
                condition = condition.add(todo::Column::Status.eq(TodoStatus::Completed));
            }
            Some(false) => {
                condition = condition.add(todo::Column::Status.ne(TodoStatus::Completed));
            }
            None => {}
        }

        condition
    }

    /// Applies the requested ordering followed by creation time and row id
    /// so equal sort keys always come back in the same order.
    pub(crate) fn apply_order(&self, select: Select<todo::Entity>) -> Select<todo::Entity> {
        let order = match self.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        let primary = match self.sort {
            TodoSortField::CreatedAt => todo::Column::CreatedAt,
            TodoSortField::UpdatedAt => todo::Column::UpdatedAt,
            TodoSortField::Title => todo::Column::Title,
            TodoSortField::Priority => todo::Column::PriorityRank,
            TodoSortField::DueDate => todo::Column::DueDate,
        };

        let mut select = select.order_by(primary, order.clone());
        if self.sort != TodoSortField::CreatedAt {
            select = select.order_by(todo::Column::CreatedAt, order.clone());
        }
        select.order_by(todo::Column::Id, order)
    }
}

const LIKE_ESCAPE: char = '\\';

/// Escapes `%`, `_` and the escape character itself so `term` only ever
/// matches literally inside a LIKE pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring match that behaves the same on sqlite and
/// postgres: both sides are lowercased and wildcards in `term` are literal.
pub(crate) fn contains_ignore_case<C: ColumnTrait>(column: C, term: &str) -> Expr {
    use sea_orm::sea_query::ExprTrait;

    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    Func::lower(column.into_expr()).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}
