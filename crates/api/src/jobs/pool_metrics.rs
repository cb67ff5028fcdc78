//! Keeps the connection pool gauges current.

use persistence::metrics::record_pool_usage;
use sqlx::PgPool;
use tracing::trace;

use super::scheduler::{Job, JobFrequency};

pub struct PoolMetricsJob {
    pool: PgPool,
}

impl PoolMetricsJob {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(10)
    }

    async fn execute(&self) -> anyhow::Result<()> {
        let usage = record_pool_usage(&self.pool);
        trace!(open = usage.open, idle = usage.idle, "Pool usage sampled");
        Ok(())
    }
}
