//! Knowledge Base
//!
//! Historical projects and reference material used to ground scope
//! generation. Search goes through [`SimilaritySearch`] so a hosted vector
//! store can replace the in-memory [`KnowledgeBase`].

mod store;

pub use store::{DocumentKind, DocumentMetadata, KnowledgeBase, KnowledgeDocument};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Search restrictions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Case-insensitive domain equality
    #[serde(default)]
    pub domain: Option<String>,
}

impl SearchFilters {
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
        }
    }
}

/// One search hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarProject {
    pub project_name: String,
    pub domain: String,
    pub complexity: String,
    pub total_cost: f64,
    pub duration_months: f64,
    /// In `[0, 1]`, higher is closer
    pub similarity_score: f64,
    pub key_insights: Vec<String>,
}

/// Similar-project lookup
#[async_trait::async_trait]
pub trait SimilaritySearch: Send + Sync + std::fmt::Debug {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SimilarProject>>;
}

/// Lines of a document worth quoting back as insights
pub fn extract_insights(text: &str) -> Vec<String> {
    const MARKERS: &[&str] = &["activity:", "role:", "objective:", "phase"];
    text.lines()
        .take(5)
        .filter(|line| {
            let lower = line.to_lowercase();
            MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(|line| line.trim().to_string())
        .take(3)
        .collect()
}
