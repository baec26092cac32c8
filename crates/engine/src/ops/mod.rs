use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{AccountCache, CacheKey, MemoryCache, ResultEngine};

mod accounts;
mod audit;
mod movements;

pub use audit::{AuditReport, BrokenLink, LinkProblem, TotalsDrift};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Engine bound to one company database.
///
/// `Engine` is `Send + Sync`: share it behind an `Arc` to apply movements
/// from concurrent tasks.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    cache: Arc<dyn AccountCache>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The read cache this engine populates and invalidates.
    pub fn cache(&self) -> &Arc<dyn AccountCache> {
        &self.cache
    }

    /// Drops the given read caches. A failing cache is logged and skipped:
    /// by the time this runs the data is already committed.
    fn invalidate(&self, keys: &[CacheKey]) {
        for key in keys {
            if let Err(err) = self.cache.invalidate(*key) {
                tracing::warn!(cache_key = %key, "cache invalidation failed: {err}");
            }
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    cache: Option<Arc<dyn AccountCache>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the read cache. Defaults to a [`MemoryCache`].
    pub fn cache(mut self, cache: Arc<dyn AccountCache>) -> EngineBuilder {
        self.cache = Some(cache);
        self
    }

    /// Construct `Engine`, checking that the database answers.
    pub async fn build(self) -> ResultEngine<Engine> {
        self.database.ping().await?;
        Ok(Engine {
            database: self.database,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(MemoryCache::default())),
        })
    }
}
