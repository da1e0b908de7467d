use crate::error::CatalogError;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CATALOG_FILE: &str = "catalog.json";
const DEFAULT_EXAMPLE_PATTERN: &str = "examples/roleplay-example-{i}.md";

fn default_example_pattern() -> String {
    DEFAULT_EXAMPLE_PATTERN.to_string()
}

/// A practice category and where its reference material lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Directory of the event's material, relative to the events root.
    pub data_path: String,
    #[serde(default)]
    pub overview: Option<String>,
    /// Path of the n-th example relative to `data_path`; `{i}` is replaced by 1..=count.
    #[serde(default = "default_example_pattern")]
    pub example_pattern: String,
    pub example_count: usize,
}

impl PracticeEvent {
    pub fn example_paths(&self, root: &Path) -> Vec<PathBuf> {
        let dir = root.join(&self.data_path);
        (1..=self.example_count)
            .map(|i| dir.join(self.example_pattern.replace("{i}", &i.to_string())))
            .collect()
    }

    pub fn overview_path(&self, root: &Path) -> Option<PathBuf> {
        self.overview
            .as_ref()
            .map(|file| root.join(&self.data_path).join(file))
    }
}

pub struct EventCatalog {
    events: Vec<PracticeEvent>,
    matcher: SkimMatcherV2,
}

impl EventCatalog {
    pub fn new(events: Vec<PracticeEvent>) -> Self {
        Self {
            events,
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(vec![PracticeEvent {
            id: "international-business".to_string(),
            title: "International Business".to_string(),
            description: "Explore global trade, cross-cultural business practices, and international market strategies".to_string(),
            data_path: "international-business/".to_string(),
            overview: Some("International_Business_eventoverview.md".to_string()),
            example_pattern: default_example_pattern(),
            example_count: 8,
        }])
    }

    /// Reads `catalog.json` from the events root, or uses the built-in catalog when it is absent.
    pub fn load(root: &Path) -> Result<Self, CatalogError> {
        let path = root.join(CATALOG_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no event catalog file, using built-in events");
            return Ok(Self::builtin());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| CatalogError::Read {
            path: path.clone(),
            source,
        })?;
        let events: Vec<PracticeEvent> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse { path, source })?;
        tracing::info!(events = events.len(), "loaded event catalog");
        Ok(Self::new(events))
    }

    pub fn events(&self) -> &[PracticeEvent] {
        &self.events
    }

    /// Finds an event by exact id, falling back to the best fuzzy title match.
    pub fn find(&self, query: &str) -> Result<&PracticeEvent, CatalogError> {
        let query = query.trim();
        if let Some(event) = self.events.iter().find(|e| e.id.eq_ignore_ascii_case(query)) {
            return Ok(event);
        }
        let query_lower = query.to_lowercase();
        self.events
            .iter()
            .filter_map(|event| {
                let title = event.title.to_lowercase();
                self.matcher
                    .fuzzy_match(&title, &query_lower)
                    .map(|score| (score, event))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, event)| event)
            .ok_or_else(|| CatalogError::UnknownEvent(query.to_string()))
    }
}

/// The reference material a scenario is generated from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMaterials {
    pub overview: Option<String>,
    pub examples: Vec<String>,
}

/// Reads every readable example of `event` plus its optional overview.
///
/// Unreadable examples are skipped; having none at all is an error.
pub async fn load_materials(
    root: &Path,
    event: &PracticeEvent,
) -> Result<EventMaterials, CatalogError> {
    let mut examples = Vec::new();
    for path in event.example_paths(root) {
        match tokio::fs::read_to_string(&path).await {
            Ok(text) if !text.trim().is_empty() => examples.push(text),
            Ok(_) => tracing::debug!(path = %path.display(), "skipping empty example"),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "could not read example"),
        }
    }
    if examples.is_empty() {
        return Err(CatalogError::NoExamples(event.id.clone()));
    }

    let overview = match event.overview_path(root) {
        Some(path) => match tokio::fs::read_to_string(&path).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not load event overview");
                None
            }
        },
        None => None,
    };

    tracing::info!(event = %event.id, examples = examples.len(), "loaded event materials");
    Ok(EventMaterials { overview, examples })
}
