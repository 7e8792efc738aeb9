use std::sync::Arc;

use log::Logger;

use crate::db::Db;
use crate::llm::LanguageModel;
use crate::prompts::Prompts;

/// Returns the current time in seconds since the epoch.
pub type Clock = dyn Fn() -> i64 + Send + Sync;

#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db + Send + Sync>,
    pub prompts: Arc<dyn Prompts + Send + Sync>,
    pub llm: Arc<dyn LanguageModel + Send + Sync>,
    pub clock: Arc<Clock>,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<dyn Db + Send + Sync>,
        prompts: Arc<dyn Prompts + Send + Sync>,
        llm: Arc<dyn LanguageModel + Send + Sync>,
        clock: Arc<Clock>,
    ) -> Self {
        Self {
            logger,
            db,
            prompts,
            llm,
            clock,
        }
    }
}

pub fn system_clock() -> Arc<Clock> {
    Arc::new(|| time::OffsetDateTime::now_utc().unix_timestamp())
}
