use crate::config::{PaginateConfig, PaginationLimit, PaginationType};
use crate::database::builder::QueryBuilder;

/// Effective page window for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// `false` for count-only requests and for "everything" when the config allows it.
    pub is_paginated: bool,
    pub limit: i64,
    pub page: u64,
    pub offset: u64,
}

impl PageWindow {
    /// Reconciles the requested limit with `default_limit` and `max_limit`.
    ///
    /// Limits below `NO_PAGINATION` are treated as absent.
    #[must_use]
    pub fn calculate(requested_limit: Option<i64>, requested_page: Option<u64>, config: &PaginateConfig) -> Self {
        let requested = requested_limit.filter(|l| *l >= PaginationLimit::NO_PAGINATION);
        let max_limit = config.max_limit;
        let counter_only = requested == Some(PaginationLimit::COUNTER_ONLY);
        let is_paginated = !(counter_only
            || (requested == Some(PaginationLimit::NO_PAGINATION) && max_limit == PaginationLimit::NO_PAGINATION));

        let limit = if counter_only {
            PaginationLimit::COUNTER_ONLY
        } else if !is_paginated {
            config.default_limit
        } else if max_limit == PaginationLimit::NO_PAGINATION {
            requested.unwrap_or(config.default_limit)
        } else if requested == Some(PaginationLimit::NO_PAGINATION) {
            config.default_limit
        } else {
            requested.unwrap_or(config.default_limit).min(max_limit)
        };

        let page = requested_page.unwrap_or(1).max(1);
        let offset = (page - 1).saturating_mul(u64::try_from(limit).unwrap_or_default());
        Self {
            is_paginated,
            limit,
            page,
            offset,
        }
    }

    #[must_use]
    pub const fn is_counter_only(&self) -> bool {
        self.limit == PaginationLimit::COUNTER_ONLY
    }

    /// `ceil(total / limit)` for paginated requests, otherwise `1`.
    #[must_use]
    pub fn total_pages(&self, total_items: u64) -> u64 {
        match u64::try_from(self.limit) {
            Ok(limit) if self.is_paginated && limit > 0 => total_items.div_ceil(limit),
            _ => 1,
        }
    }
}

/// Applies the window as limit/offset or take/skip; unpaginated requests get neither.
#[must_use]
pub fn apply_pagination(mut builder: QueryBuilder, window: &PageWindow, config: &PaginateConfig) -> QueryBuilder {
    let Ok(limit) = u64::try_from(window.limit) else {
        return builder;
    };
    if !window.is_paginated || limit == 0 {
        return builder;
    }
    match config.pagination_type {
        PaginationType::LimitAndOffset => {
            builder.limit(limit).offset(window.offset);
        }
        PaginationType::TakeAndSkip => {
            builder.take(limit).skip(window.offset);
        }
    }
    builder
}
