//! In-memory term-vector knowledge store.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{extract_insights, SearchFilters, SimilarProject, SimilaritySearch};
use crate::error::{Result, ResultExt, ScopeError};
use crate::project::ProjectProfile;
use crate::scope::ScopeDocument;

/// Domain for knowledge files whose name carries none
pub const GENERAL_DOMAIN: &str = "general";

const KNOWLEDGE_EXTENSIONS: &[&str] = &["txt", "md", "json"];

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "will", "into", "of",
    "to", "in", "on", "a", "an", "is", "be", "or", "by", "as", "at", "it",
];

/// Where a document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    KnowledgeFile,
    ProjectScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub kind: DocumentKind,
    /// File name or project name
    pub source: String,
    pub project_id: Option<String>,
    pub domain: String,
    pub complexity: String,
    pub total_cost: f64,
    pub duration_months: f64,
    pub added_at: DateTime<Utc>,
}

impl DocumentMetadata {
    pub fn knowledge_file(source: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            kind: DocumentKind::KnowledgeFile,
            source: source.into(),
            project_id: None,
            domain: domain.into(),
            complexity: String::new(),
            total_cost: 0.0,
            duration_months: 0.0,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KnowledgeDocument {
    pub id: Uuid,
    pub text: String,
    pub metadata: DocumentMetadata,
    terms: HashMap<String, f64>,
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut terms = HashMap::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1 && !STOP_WORDS.contains(t))
    {
        *terms.entry(token.to_string()).or_insert(0.0) += 1.0;
    }
    terms
}

/// Cosine similarity of two sparse term vectors
fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Searchable text for a finished project
fn project_document_text(profile: &ProjectProfile, scope: &ScopeDocument) -> String {
    let optional = |v: &Option<String>| v.clone().unwrap_or_default();
    let mut lines = vec![
        format!("Project: {}", profile.name),
        format!("Domain: {}", optional(&profile.domain)),
        format!(
            "Complexity: {}",
            profile.complexity.map(|c| c.to_string()).unwrap_or_default()
        ),
        format!("Tech Stack: {}", optional(&profile.tech_stack)),
        format!("Use Cases: {}", optional(&profile.use_cases)),
        format!("Summary: {}", scope.overview.project_summary),
    ];
    lines.extend(
        scope
            .overview
            .key_objectives
            .iter()
            .map(|o| format!("Objective: {}", o)),
    );
    lines.extend(
        scope
            .activities
            .iter()
            .take(10)
            .map(|a| format!("Activity: {} - {}", a.name, a.phase)),
    );
    lines.extend(
        scope
            .resources
            .iter()
            .map(|r| format!("Role: {} - {} months", r.role, r.effort_months)),
    );
    lines.join("\n")
}

/// In-memory knowledge base
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    documents: RwLock<Vec<KnowledgeDocument>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Add a raw document
    pub fn add_document(&self, text: impl Into<String>, metadata: DocumentMetadata) -> Uuid {
        let text = text.into();
        let document = KnowledgeDocument {
            id: Uuid::new_v4(),
            terms: term_frequencies(&text),
            text,
            metadata,
        };
        let id = document.id;
        self.documents.write().push(document);
        id
    }

    /// Record a finished scope so later projects can find it. A scope stored
    /// again for the same project replaces the earlier document.
    pub fn store_project_scope(
        &self,
        project_id: Option<&str>,
        profile: &ProjectProfile,
        scope: &ScopeDocument,
    ) -> Uuid {
        let metadata = DocumentMetadata {
            kind: DocumentKind::ProjectScope,
            source: profile.name.clone(),
            project_id: project_id.map(str::to_string),
            domain: profile.domain.clone().unwrap_or_default(),
            complexity: profile.complexity.map(|c| c.to_string()).unwrap_or_default(),
            total_cost: scope.cost_breakdown.total_cost,
            duration_months: scope.timeline.total_duration_months,
            added_at: Utc::now(),
        };
        if let Some(project_id) = project_id {
            let mut documents = self.documents.write();
            let before = documents.len();
            documents.retain(|doc| doc.metadata.project_id.as_deref() != Some(project_id));
            if documents.len() < before {
                debug!(project_id, "Replacing earlier scope document");
            }
        }
        let id = self.add_document(project_document_text(profile, scope), metadata);
        info!(project = %profile.name, %id, "Stored project scope in knowledge base");
        id
    }

    /// Load `.txt`, `.md` and `.json` files below `path`.
    ///
    /// The domain is the file-name prefix before the first `_`. A missing
    /// directory is created and yields zero documents; unreadable files are
    /// skipped.
    pub fn load_directory(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .map_err(ScopeError::from)
                .with_context(|| format!("creating knowledge directory {}", path.display()))?;
            warn!(path = %path.display(), "Knowledge directory missing; created it empty");
            return Ok(0);
        }

        let mut loaded = 0;
        let mut pending = vec![path.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let entries = std::fs::read_dir(&dir)
                .map_err(ScopeError::from)
                .with_context(|| format!("reading knowledge directory {}", dir.display()))?;
            for entry in entries {
                let file = entry?.path();
                if file.is_dir() {
                    pending.push(file);
                    continue;
                }
                let supported = file
                    .extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |e| KNOWLEDGE_EXTENSIONS.contains(&e));
                if !supported {
                    continue;
                }
                let name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string();
                match std::fs::read_to_string(&file) {
                    Ok(text) => {
                        let domain = match name.split_once('_') {
                            Some((prefix, _)) => prefix.to_string(),
                            None => GENERAL_DOMAIN.to_string(),
                        };
                        debug!(file = %name, %domain, "Loaded knowledge file");
                        self.add_document(text, DocumentMetadata::knowledge_file(name, domain));
                        loaded += 1;
                    }
                    Err(e) => warn!(file = %file.display(), error = %e, "Skipping knowledge file"),
                }
            }
        }

        info!(loaded, path = %path.display(), "Knowledge base loaded");
        Ok(loaded)
    }

    /// Synchronous search used by the trait implementation
    pub fn search_blocking(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Vec<SimilarProject> {
        let query_terms = term_frequencies(query);
        let domain = filters
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        let documents = self.documents.read();
        let mut hits: Vec<(f64, &KnowledgeDocument)> = documents
            .iter()
            .filter(|doc| domain.map_or(true, |d| doc.metadata.domain.eq_ignore_ascii_case(d)))
            .map(|doc| (cosine_similarity(&query_terms, &doc.terms), doc))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.0.total_cmp(&a.0));

        hits.into_iter()
            .take(limit)
            .map(|(score, doc)| SimilarProject {
                project_name: doc.metadata.source.clone(),
                domain: doc.metadata.domain.clone(),
                complexity: doc.metadata.complexity.clone(),
                total_cost: doc.metadata.total_cost,
                duration_months: doc.metadata.duration_months,
                similarity_score: score,
                key_insights: extract_insights(&doc.text),
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SimilaritySearch for KnowledgeBase {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SimilarProject>> {
        Ok(self.search_blocking(query, filters, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Complexity;
    use crate::scope::{Activity, ResourceAllocation};

    fn base() -> KnowledgeBase {
        let kb = KnowledgeBase::new();
        kb.add_document(
            "Telemedicine platform with video consultations and HIPAA compliant records",
            DocumentMetadata::knowledge_file("healthcare_telemedicine.md", "healthcare"),
        );
        kb.add_document(
            "Online store with payment gateway, cart and inventory management",
            DocumentMetadata::knowledge_file("ecommerce_store.md", "ecommerce"),
        );
        kb
    }

    #[test]
    fn results_are_ranked_by_similarity() {
        let hits = base().search_blocking(
            "HIPAA telemedicine video app",
            &SearchFilters::default(),
            5,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].project_name, "healthcare_telemedicine.md");
        assert!(hits[0].similarity_score > 0.0 && hits[0].similarity_score <= 1.0);
    }

    #[test]
    fn domain_filter_is_case_insensitive() {
        let kb = base();
        let hits = kb.search_blocking("platform store payment", &SearchFilters::domain("ECommerce"), 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].domain, "ecommerce");
    }

    #[test]
    fn stored_scope_is_searchable_with_insights() {
        let kb = KnowledgeBase::new();
        let profile = ProjectProfile {
            name: "Clinic Portal".into(),
            domain: Some("Healthcare".into()),
            complexity: Some(Complexity::Complex),
            ..Default::default()
        };
        let scope = ScopeDocument {
            activities: vec![Activity::new("Patient Scheduling", "Development", 20)],
            resources: vec![ResourceAllocation::new("Backend Developer", 1, 3.0, 8500.0)],
            ..Default::default()
        };
        kb.store_project_scope(Some("p-1"), &profile, &scope);

        let hits = kb.search_blocking("patient scheduling portal", &SearchFilters::domain("healthcare"), 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].project_name, "Clinic Portal");
        assert_eq!(hits[0].complexity, "complex");
        // The profile header fills the first five lines.
        assert!(hits[0].key_insights.is_empty());
    }

    #[test]
    fn loads_directory_and_creates_missing_one() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fintech_payments.md"), "Payments ledger").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "General notes").unwrap();
        std::fs::write(dir.path().join("diagram.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/retail_pos.json"), "{\"pos\": true}").unwrap();

        let kb = KnowledgeBase::new();
        assert_eq!(kb.load_directory(dir.path()).unwrap(), 3);
        assert_eq!(kb.len(), 3);
        let hits = kb.search_blocking("general notes", &SearchFilters::domain("general"), 5);
        assert_eq!(hits.len(), 1);

        let missing = dir.path().join("kb");
        assert_eq!(kb.load_directory(&missing).unwrap(), 0);
        assert!(missing.is_dir());
    }

    #[test]
    fn restoring_a_project_replaces_its_document() {
        let kb = base();
        let profile = ProjectProfile::new("Clinic Portal");
        let first = kb.store_project_scope(Some("p-1"), &profile, &ScopeDocument::default());
        let second = kb.store_project_scope(Some("p-1"), &profile, &ScopeDocument::default());
        kb.store_project_scope(None, &profile, &ScopeDocument::default());

        assert_ne!(first, second);
        assert_eq!(kb.len(), 4);
        let stored: Vec<Uuid> = kb
            .documents
            .read()
            .iter()
            .filter(|d| d.metadata.project_id.as_deref() == Some("p-1"))
            .map(|d| d.id)
            .collect();
        assert_eq!(stored, vec![second]);
    }
}
