//! Question generation

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::config::QuestionConfig;

#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn next_question(&self) -> String;
}

/// Picks questions at random from a fixed pool
#[derive(Debug, Clone)]
pub struct QuestionBank {
    pool: Vec<String>,
    fallback: String,
}

impl QuestionBank {
    pub fn new(pool: Vec<String>, fallback: &str) -> Self {
        let pool = pool
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        Self {
            pool,
            fallback: fallback.to_string(),
        }
    }

    pub fn from_config(config: &QuestionConfig) -> Self {
        Self::new(config.pool.clone(), &config.fallback)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn pick(&self) -> String {
        self.pool
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl QuestionSource for QuestionBank {
    async fn next_question(&self) -> String {
        self.pick()
    }
}
