use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A learning booklet with the owning child's progress through it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Booklet {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub id: String,
    /// Owning child. Not checked against the bundle's children.
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub child_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub total_modules: Option<i64>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub modules: Vec<BookletModule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookletModule {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub idx: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub activities: Vec<Activity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub progress: Option<ActivityProgress>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityProgress {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub proof_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    pub fn is_completed(&self) -> bool {
        self.progress
            .as_ref()
            .and_then(|p| p.status.as_deref())
            .map(|s| s.eq_ignore_ascii_case("completed"))
            .unwrap_or(false)
    }

    pub fn proof_url(&self) -> Option<&str> {
        self.progress.as_ref().and_then(|p| p.proof_url.as_deref())
    }
}

impl Booklet {
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| "Untitled booklet".to_string())
    }

    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.modules.iter().flat_map(|m| m.activities.iter())
    }

    /// Share of activities marked completed, 0-100.
    pub fn progress_percentage(&self) -> f64 {
        let total = self.activities().count();
        if total == 0 {
            return 0.0;
        }
        let done = self.activities().filter(|a| a.is_completed()).count();
        done as f64 * 100.0 / total as f64
    }

    /// Set or clear the proof image on one activity.
    /// Returns false if no activity in this booklet has that id.
    pub fn set_proof_url(&mut self, activity_id: &str, proof_url: Option<String>) -> bool {
        for module in &mut self.modules {
            for activity in &mut module.activities {
                if activity.id == activity_id {
                    activity.progress.get_or_insert_with(Default::default).proof_url = proof_url;
                    return true;
                }
            }
        }
        false
    }
}
