use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The signed-in account holder (usually a parent).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// Name to show for the account holder. Older payloads carry `name`
    /// instead of `full_name`.
    pub fn display_name(&self) -> String {
        self.full_name
            .clone()
            .or_else(|| {
                self.extra
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Unknown user".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Child {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    /// K1, K2, K3
    #[serde(default)]
    pub age_band: Option<String>,
    #[serde(default)]
    pub parent_user_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Child {
    pub fn display_name(&self) -> String {
        self.nickname
            .clone()
            .or_else(|| {
                self.extra
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let json = r#"{"id":"p1","full_name":"Sarah Johnson","relationship":"mother","created_at":"2025-01-02T00:00:00Z"}"#;
        let profile: Profile = serde_json::from_str(json).expect("parse profile");
        assert_eq!(profile.full_name.as_deref(), Some("Sarah Johnson"));
        assert_eq!(profile.extra.get("relationship").and_then(Value::as_str), Some("mother"));

        let back = serde_json::to_value(&profile).expect("serialize profile");
        assert_eq!(back["created_at"], "2025-01-02T00:00:00Z");
    }

    #[test]
    fn test_display_name_falls_back_to_name() {
        let json = r#"{"id":"mock-user-1","name":"Sarah Johnson","role":"parent"}"#;
        let profile: Profile = serde_json::from_str(json).expect("parse profile");
        assert_eq!(profile.display_name(), "Sarah Johnson");
        assert_eq!(Profile::default().display_name(), "Unknown user");
    }

    #[test]
    fn test_child_display_name() {
        let child: Child = serde_json::from_str(r#"{"id":"c1","name":"Emma","age":5}"#)
            .expect("parse child");
        assert_eq!(child.display_name(), "Emma");

        let anonymous = Child {
            id: "c2".to_string(),
            ..Default::default()
        };
        assert_eq!(anonymous.display_name(), "c2");
    }
}
