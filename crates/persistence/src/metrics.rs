//! Query timing and pool gauges exported through the `metrics` facade.

use std::time::Instant;

use metrics::{gauge, histogram};
use sqlx::PgPool;

/// Measures one repository query and records it in
/// `database_query_duration_seconds{query}`.
///
/// ```ignore
/// let timer = QueryTimer::new("find_user_by_id");
/// let result = sqlx::query_as::<_, UserEntity>(...).fetch_optional(&pool).await;
/// timer.record();
/// result
/// ```
pub struct QueryTimer {
    query: &'static str,
    started: Instant,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            started: Instant::now(),
        }
    }

    pub fn record(self) {
        histogram!("database_query_duration_seconds", "query" => self.query)
            .record(self.started.elapsed().as_secs_f64());
    }
}

/// Connection counts of a pool at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolUsage {
    pub open: u32,
    pub idle: u32,
}

impl PoolUsage {
    pub fn of(pool: &PgPool) -> Self {
        let open = pool.size();
        let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX).min(open);
        Self { open, idle }
    }

    pub fn in_use(&self) -> u32 {
        self.open - self.idle
    }
}

/// Publishes `database_pool_connections{state="open|idle|in_use"}`.
pub fn record_pool_usage(pool: &PgPool) -> PoolUsage {
    let usage = PoolUsage::of(pool);
    gauge!("database_pool_connections", "state" => "open").set(f64::from(usage.open));
    gauge!("database_pool_connections", "state" => "idle").set(f64::from(usage.idle));
    gauge!("database_pool_connections", "state" => "in_use").set(f64::from(usage.in_use()));
    usage
}
