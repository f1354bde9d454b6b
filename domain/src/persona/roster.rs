//! Worker personas and the ordered roster.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identity of a worker persona (e.g., `worker-a`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A worker persona (configuration, never persisted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Stable identity used to key drafts
    pub id: WorkerId,
    /// Display name (e.g., "The Skeptic")
    pub name: String,
    /// Short role label (e.g., "Analyst")
    pub role: String,
    /// One-line description for presentation
    #[serde(default)]
    pub description: String,
    /// Behavioral instruction sent as the system prompt
    pub instruction: String,
}

impl Persona {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: WorkerId::new(id),
            name: name.into(),
            role: role.into(),
            description: String::new(),
            instruction: instruction.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Label used when a draft is shown to the judge
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.role)
    }
}

/// The judge persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgePersona {
    pub name: String,
    pub instruction: String,
}

impl Default for JudgePersona {
    fn default() -> Self {
        Self {
            name: "The Chief Editor".to_string(),
            instruction: "You are the Chief Editor of a council of analysts. You weigh their \
                          drafts fairly, reward well-supported reasoning, and merge the best \
                          points into a single coherent answer."
                .to_string(),
        }
    }
}

/// Ordered, non-empty set of worker personas with unique ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Roster {
    personas: Vec<Persona>,
}

impl Roster {
    /// Build a roster, rejecting an empty list or duplicate ids
    pub fn new(personas: Vec<Persona>) -> Result<Self, DomainError> {
        if personas.is_empty() {
            return Err(DomainError::EmptyRoster);
        }
        let mut seen = HashSet::new();
        for persona in &personas {
            if persona.id.as_str().trim().is_empty() {
                return Err(DomainError::InvalidInput(
                    "worker id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(persona.id.clone()) {
                return Err(DomainError::DuplicateWorker(persona.id.to_string()));
            }
        }
        Ok(Self { personas })
    }

    /// The three-persona council: skeptic, visionary, realist
    pub fn default_council() -> Self {
        Self {
            personas: vec![
                Persona::new(
                    "worker-a",
                    "The Skeptic",
                    "Analyst",
                    "You are a SKEPTICAL analyst. Look for facts, logical inconsistencies, and \
                     potential risks. Be critical but constructive. Your job is to identify what \
                     could go wrong and what is missing from the analysis. Keep your response \
                     concise (2-3 sentences).",
                )
                .with_description("Looks for logical inconsistencies and risks."),
                Persona::new(
                    "worker-b",
                    "The Visionary",
                    "Creative",
                    "You are a CREATIVE thinker. Look for novel solutions, out-of-the-box ideas, \
                     and future possibilities. Push boundaries and imagine what others might \
                     miss. Keep your response concise (2-3 sentences).",
                )
                .with_description("Proposes novel, out-of-the-box ideas."),
                Persona::new(
                    "worker-c",
                    "The Realist",
                    "Pragmatist",
                    "You are a PRAGMATIC realist. Focus on what is actionable, efficient, and \
                     can be implemented immediately with current resources. Keep your response \
                     concise (2-3 sentences).",
                )
                .with_description("Focuses on efficiency and actionable steps."),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn get(&self, id: &WorkerId) -> Option<&Persona> {
        self.personas.iter().find(|p| &p.id == id)
    }

    pub fn ids(&self) -> Vec<WorkerId> {
        self.personas.iter().map(|p| p.id.clone()).collect()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::default_council()
    }
}

impl<'de> Deserialize<'de> for Roster {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let personas = Vec::<Persona>::deserialize(deserializer)?;
        Roster::new(personas).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_council_has_three_ordered_workers() {
        let roster = Roster::default_council();
        assert_eq!(roster.len(), 3);
        let ids: Vec<_> = roster.ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["worker-a", "worker-b", "worker-c"]);
        assert_eq!(
            roster.get(&WorkerId::from("worker-b")).unwrap().name,
            "The Visionary"
        );
    }

    #[test]
    fn test_empty_roster_rejected() {
        assert_eq!(Roster::new(vec![]).unwrap_err(), DomainError::EmptyRoster);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Roster::new(vec![
            Persona::new("a", "A", "r", "i"),
            Persona::new("a", "B", "r", "i"),
        ])
        .unwrap_err();
        assert_eq!(err, DomainError::DuplicateWorker("a".to_string()));
    }

    #[test]
    fn test_roster_deserialize_validates() {
        let ok: Roster = serde_json::from_str(
            r#"[{"id":"solo","name":"Solo","role":"Generalist","instruction":"Answer."}]"#,
        )
        .unwrap();
        assert_eq!(ok.len(), 1);
        assert!(serde_json::from_str::<Roster>("[]").is_err());
    }

    #[test]
    fn test_label_includes_role() {
        let persona = Persona::new("worker-a", "The Skeptic", "Analyst", "...");
        assert_eq!(persona.label(), "The Skeptic (Analyst)");
    }
}
