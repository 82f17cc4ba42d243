use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::ValidationError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn from_parts(page: Option<u64>, limit: Option<u64>) -> Result<Self, ValidationError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if page < 1 {
            return Err(ValidationError::new("page", "must be at least 1"));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ValidationError::new(
                "limit",
                format!("must be between 1 and {MAX_LIMIT}"),
            ));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            data,
            page: request.page,
            limit: request.limit,
            total,
            total_pages: total.div_ceil(request.limit),
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }
}
