use std::collections::HashMap;

use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::models::{Address, PublicUser, TeamMember};
use crate::pagination::{paginate, Page, PageRequest, PaginationError};

#[derive(Debug, FromRow)]
struct ReportCount {
    user_id: i64,
    count: i64,
}

pub struct TeamService {
    pool: SqlitePool,
}

impl TeamService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// One page of users with their address and report count.
    pub async fn members_page(
        &self,
        request: &PageRequest,
    ) -> Result<Page<TeamMember>, PaginationError> {
        let mut page = paginate::<PublicUser>(&self.pool, request).await?;
        let users = std::mem::take(&mut page.items);
        let members = self.hydrate(users).await?;
        Ok(page.with_items(members))
    }

    async fn hydrate(&self, users: Vec<PublicUser>) -> Result<Vec<TeamMember>, sqlx::Error> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, user_id, street, city, country FROM addresses WHERE user_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let mut addresses: HashMap<i64, Address> = builder
            .build_query_as::<Address>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|a| (a.user_id, a))
            .collect();

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT user_id, COUNT(*) AS count FROM reports WHERE user_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") GROUP BY user_id");
        let counts: HashMap<i64, i64> = builder
            .build_query_as::<ReportCount>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|c| (c.user_id, c.count))
            .collect();

        Ok(users
            .into_iter()
            .map(|user| TeamMember {
                address: addresses.remove(&user.id),
                report_count: counts.get(&user.id).copied().unwrap_or(0),
                user,
            })
            .collect())
    }
}
