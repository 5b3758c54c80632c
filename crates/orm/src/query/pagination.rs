//! Query Builder pagination operations

use super::builder::QueryBuilder;

impl<M> QueryBuilder<M> {
    /// Add LIMIT clause
    pub fn limit(mut self, count: i64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: i64) -> Self {
        self.offset_value = Some(count);
        self
    }

    /// Alias of [`limit`](Self::limit)
    pub fn take(self, count: i64) -> Self {
        self.limit(count)
    }

    /// Alias of [`offset`](Self::offset)
    pub fn skip(self, count: i64) -> Self {
        self.offset(count)
    }

    /// Limit the query to one page, pages start at 1
    pub fn for_page(mut self, page: i64, per_page: i64) -> Self {
        self.limit_count = Some(per_page);
        self.offset_value = Some((page.max(1) - 1) * per_page);
        self
    }
}
