//! In-memory project store with bounded scope history

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use scopeforge_core::{ExtractedEntities, ProjectAnalysis, ProjectProfile, ScopeDocument};

use crate::{GatewayError, Result};

/// One stored revision of a project's scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeVersion {
    pub version: u32,
    pub scope: ScopeDocument,
    /// What produced this revision ("generated" or the chat message)
    pub source: String,
    pub changes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Reviewer decision recorded when a scope is finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    Pending,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub profile: ProjectProfile,
    pub document_text: Option<String>,
    pub entities: Option<ExtractedEntities>,
    pub analysis: Option<ProjectAnalysis>,
    pub versions: VecDeque<ScopeVersion>,
    /// Set once an approved scope has been added to the knowledge base
    pub finalized: bool,
    #[serde(default)]
    pub approval_status: Option<ApprovalStatus>,
    #[serde(default)]
    pub user_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    fn new(profile: ProjectProfile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            profile,
            document_text: None,
            entities: None,
            analysis: None,
            versions: VecDeque::new(),
            finalized: false,
            approval_status: None,
            user_feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn latest(&self) -> Option<&ScopeVersion> {
        self.versions.back()
    }

    /// Record view without the version history
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "profile": self.profile,
            "entities": self.entities,
            "analysis": self.analysis,
            "latest_version": self.latest().map(|v| v.version),
            "scope": self.latest().map(|v| &v.scope),
            "finalized": self.finalized,
            "approval_status": self.approval_status,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

/// Projects keyed by id; concurrent edits are last-writer-wins
#[derive(Debug)]
pub struct ProjectStore {
    projects: RwLock<HashMap<Uuid, ProjectRecord>>,
    max_versions: usize,
}

impl ProjectStore {
    pub fn new(max_versions: usize) -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            max_versions: max_versions.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.projects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.read().is_empty()
    }

    pub fn create(&self, profile: ProjectProfile) -> ProjectRecord {
        let record = ProjectRecord::new(profile);
        self.projects.write().insert(record.id, record.clone());
        tracing::info!(project = %record.id, name = %record.profile.name, "Project created");
        record
    }

    /// Every project, newest first
    pub fn list(&self) -> Vec<ProjectRecord> {
        let mut records: Vec<ProjectRecord> = self.projects.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn get(&self, id: Uuid) -> Result<ProjectRecord> {
        self.projects
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::ProjectNotFound(id.to_string()))
    }

    /// Mutate a record in place
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut ProjectRecord) -> R) -> Result<R> {
        let mut projects = self.projects.write();
        let record = projects
            .get_mut(&id)
            .ok_or_else(|| GatewayError::ProjectNotFound(id.to_string()))?;
        let result = f(record);
        record.updated_at = Utc::now();
        Ok(result)
    }

    /// Latest scope of a project
    pub fn latest_scope(&self, id: Uuid) -> Result<ScopeDocument> {
        let record = self.get(id)?;
        record
            .latest()
            .map(|v| v.scope.clone())
            .ok_or_else(|| GatewayError::NoScope(id.to_string()))
    }

    /// Replace the history with a freshly generated scope as version 1
    pub fn reset_scope(&self, id: Uuid, scope: ScopeDocument) -> Result<ScopeVersion> {
        self.update(id, |record| {
            let version = ScopeVersion {
                version: 1,
                scope,
                source: "generated".to_string(),
                changes: Vec::new(),
                created_at: Utc::now(),
            };
            record.versions.clear();
            record.versions.push_back(version.clone());
            record.finalized = false;
            record.approval_status = None;
            version
        })
    }

    /// Append a revision, dropping the oldest beyond the configured bound.
    /// Version numbers keep counting across dropped revisions.
    pub fn push_version(
        &self,
        id: Uuid,
        scope: ScopeDocument,
        source: impl Into<String>,
        changes: Vec<String>,
    ) -> Result<ScopeVersion> {
        let max_versions = self.max_versions;
        self.update(id, |record| {
            let version = ScopeVersion {
                version: record.latest().map_or(1, |v| v.version + 1),
                scope,
                source: source.into(),
                changes,
                created_at: Utc::now(),
            };
            record.versions.push_back(version.clone());
            while record.versions.len() > max_versions {
                record.versions.pop_front();
            }
            version
        })
    }
}
