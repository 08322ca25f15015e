pub mod job;
pub mod qualification;
pub mod user;

use serde::{Deserialize, Serialize};

/// Capsule channel. Every indexed entity has one vector per section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Domain,
    Task,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Domain => "domain",
            Section::Task => "task",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, bit-stable vector identifiers: `job_{id}::domain` etc.
pub fn job_vector_id(job_id: &str, section: Section) -> String {
    format!("job_{job_id}::{section}")
}

pub fn user_vector_id(user_id: &str, section: Section) -> String {
    format!("usr_{user_id}::{section}")
}

/// Recovers the entity id from a canonical vector id, e.g.
/// `usr_42::domain` → `42`. Returns `None` for non-canonical ids.
pub fn entity_id_from_vector_id(vector_id: &str) -> Option<&str> {
    let rest = vector_id
        .strip_prefix("job_")
        .or_else(|| vector_id.strip_prefix("usr_"))?;
    let (entity_id, section) = rest.rsplit_once("::")?;
    match section {
        "domain" | "task" => Some(entity_id),
        _ => None,
    }
}
