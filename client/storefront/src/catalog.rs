//! Catalog store — fetches the project list once and answers every
//! browse/filter query from memory.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::Backend;
use crate::errors::{Result, StorefrontError};
use crate::models::{parse_timestamp, Difficulty, PageRequest, Project};

/// Selector value that disables the category or difficulty predicate.
pub const ALL: &str = "all";

const TECH_KEYWORDS: &[&str] = &[
    "PHP", "MySQL", "JavaScript", "HTML", "CSS", "Python", "Java", "C++", "React", "Node.js",
    "Angular", "Vue", "Laravel", "Django", "Flask", "Bootstrap", "jQuery", "AJAX", "JSON", "API",
    "REST", "MongoDB", "SQL", "NoSQL", "Git", "Docker",
];
const MAX_TECHNOLOGIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    /// Message shown next to the manual "Try Again" action.
    Failed(String),
}

/// The three browse predicates, AND'd together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFilter {
    /// Case-insensitive substring over title and description.
    pub search: String,
    pub category: String,
    pub difficulty: String,
}

impl Default for CatalogFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: ALL.to_string(),
            difficulty: ALL.to_string(),
        }
    }
}

impl CatalogFilter {
    pub fn matches(&self, project: &Project) -> bool {
        self.matches_search(project)
            && self.matches_category(project)
            && self.matches_difficulty(project)
    }

    fn matches_search(&self, project: &Project) -> bool {
        let needle = self.search.trim().to_lowercase();
        needle.is_empty()
            || project.title.to_lowercase().contains(&needle)
            || project.description.to_lowercase().contains(&needle)
    }

    fn matches_category(&self, project: &Project) -> bool {
        self.category == ALL || project.has_category(&self.category)
    }

    fn matches_difficulty(&self, project: &Project) -> bool {
        self.difficulty == ALL || project.difficulty().as_str() == self.difficulty
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub count: usize,
    pub free_count: usize,
}

pub struct CatalogStore {
    backend: Arc<dyn Backend>,
    projects: Vec<Project>,
    state: LoadState,
    pages: Option<u32>,
    last_request: Option<PageRequest>,
}

impl CatalogStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            projects: Vec::new(),
            state: LoadState::Idle,
            pages: None,
            last_request: None,
        }
    }

    /// Load the catalog (optionally a single page of it), replacing what
    /// was held before. On failure the previous list is kept and the
    /// store moves to [`LoadState::Failed`].
    pub async fn fetch(&mut self, page: Option<PageRequest>) -> Result<&[Project]> {
        self.state = LoadState::Loading;
        self.last_request = page;

        let body = match self.backend.fetch_projects(page).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Catalog fetch failed: {e}");
                self.state = LoadState::Failed("Error fetching projects".to_string());
                return Err(e);
            }
        };

        if body.status != "success" {
            let message = body
                .message
                .unwrap_or_else(|| "Failed to fetch projects".to_string());
            warn!("Catalog endpoint returned status {:?}: {message}", body.status);
            self.state = LoadState::Failed("Failed to fetch projects".to_string());
            return Err(StorefrontError::Backend(message));
        }

        self.projects = body.data.into_iter().map(Project::from).collect();
        self.pages = body.pagination.map(|p| p.pages);
        self.state = LoadState::Loaded;
        info!("Loaded {} projects", self.projects.len());
        Ok(self.projects.as_slice())
    }

    /// Repeat the last request.
    pub async fn retry(&mut self) -> Result<&[Project]> {
        let page = self.last_request;
        self.fetch(page).await
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn page_count(&self) -> u32 {
        self.pages.unwrap_or(1).max(1)
    }

    pub fn get(&self, id: i64) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Projects matching every predicate of `filter`, in backend order.
    pub fn filtered(&self, filter: &CatalogFilter) -> Vec<&Project> {
        self.projects.iter().filter(|p| filter.matches(p)).collect()
    }

    /// Every category name with its project count, most populated first.
    pub fn categories(&self) -> Vec<CategorySummary> {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for project in &self.projects {
            for name in project.categories() {
                let entry = counts.entry(name).or_default();
                entry.0 += 1;
                if project.is_free() {
                    entry.1 += 1;
                }
            }
        }

        let mut summaries: Vec<CategorySummary> = counts
            .into_iter()
            .map(|(name, (count, free_count))| CategorySummary {
                name: name.to_string(),
                count,
                free_count,
            })
            .collect();
        summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        summaries
    }

    pub fn projects_in_category(&self, name: &str) -> Vec<&Project> {
        self.projects.iter().filter(|p| p.has_category(name)).collect()
    }

    /// Free projects, narrowed by a loose category match unless `filter` is `"all"`.
    pub fn free_projects(&self, filter: &str) -> Vec<&Project> {
        let needle = filter.to_lowercase();
        self.projects
            .iter()
            .filter(|p| p.is_free())
            .filter(|p| filter == ALL || p.category.to_lowercase().contains(&needle))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────
// Presentation enrichment
// ─────────────────────────────────────────────────────────

/// Display-ready view of a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectCard {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: String,
    pub categories: Vec<String>,
    pub difficulty: Difficulty,
    pub technologies: Vec<String>,
    pub created: Option<String>,
    pub has_source: bool,
    pub has_documentation: bool,
}

impl ProjectCard {
    pub fn new(project: &Project, currency_symbol: &str) -> Self {
        Self {
            id: project.id,
            title: project.title.clone(),
            description: project.description.clone(),
            price: price_display(project.effective_price(), currency_symbol),
            categories: project.categories().into_iter().map(String::from).collect(),
            difficulty: project.difficulty(),
            technologies: extract_technologies(&project.description),
            created: project.created_at.as_deref().and_then(format_date),
            has_source: project.code_files.is_some(),
            has_documentation: project.documentation.is_some(),
        }
    }
}

pub fn price_display(price: f64, currency_symbol: &str) -> String {
    if price <= 0.0 {
        "FREE".to_string()
    } else {
        format!("{currency_symbol}{price:.0}")
    }
}

/// `"2024-01-05 10:00:00"` → `"Jan 5, 2024"`.
pub fn format_date(raw: &str) -> Option<String> {
    parse_timestamp(raw)
        .ok()
        .map(|dt| dt.format("%b %-d, %Y").to_string())
}

/// Known technology names mentioned in `description`, at most five.
pub fn extract_technologies(description: &str) -> Vec<String> {
    let haystack = description.to_uppercase();
    TECH_KEYWORDS
        .iter()
        .filter(|tech| haystack.contains(&tech.to_uppercase()))
        .take(MAX_TECHNOLOGIES)
        .map(|tech| tech.to_string())
        .collect()
}
