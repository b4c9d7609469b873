use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Booklet, Child, Profile, TokenAccount};

/// Envelope returned by `GET /api/v1/user/bundle`.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleResponse {
    #[serde(default)]
    pub success: bool,
    pub data: BundlePayload,
    /// Always null from the server; the client stamps its own time.
    #[serde(default)]
    pub cache_timestamp: Option<i64>,
}

/// Everything the server sends for one account, without a cache timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundlePayload {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub children: Vec<Child>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub booklets: Vec<Booklet>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub token_accounts: Vec<TokenAccount>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub recent_activity: Vec<Value>,
}

/// The cached aggregate of one account's data.
///
/// `cache_timestamp` is milliseconds since the Unix epoch at which the bundle
/// was last confirmed fresh or locally updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserBundle {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub children: Vec<Child>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub booklets: Vec<Booklet>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub token_accounts: Vec<TokenAccount>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub recent_activity: Vec<Value>,
    pub cache_timestamp: i64,
}

impl UserBundle {
    pub fn from_payload(payload: BundlePayload, cache_timestamp: i64) -> Self {
        Self {
            profile: payload.profile,
            children: payload.children,
            booklets: payload.booklets,
            token_accounts: payload.token_accounts,
            recent_activity: payload.recent_activity,
            cache_timestamp,
        }
    }

    /// Replace every member the patch sets. Members are swapped whole,
    /// lists are never concatenated. The timestamp is left to the caller.
    pub fn apply(&mut self, patch: BundlePatch) {
        if let Some(profile) = patch.profile {
            self.profile = profile;
        }
        if let Some(children) = patch.children {
            self.children = children;
        }
        if let Some(booklets) = patch.booklets {
            self.booklets = booklets;
        }
        if let Some(token_accounts) = patch.token_accounts {
            self.token_accounts = token_accounts;
        }
        if let Some(recent_activity) = patch.recent_activity {
            self.recent_activity = recent_activity;
        }
    }

    pub fn booklets_for_child(&self, child_id: &str) -> Vec<Booklet> {
        self.booklets
            .iter()
            .filter(|b| b.child_id == child_id)
            .cloned()
            .collect()
    }

    pub fn token_account(&self, child_id: &str) -> Option<TokenAccount> {
        self.token_accounts
            .iter()
            .find(|a| a.child_id == child_id)
            .cloned()
    }
}

/// A partial bundle. `Some` replaces that member, `None` leaves it as is.
///
/// `profile` is doubly optional so a patch can clear the profile
/// (`Some(None)`) as well as leave it untouched (`None`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundlePatch {
    pub profile: Option<Option<Profile>>,
    pub children: Option<Vec<Child>>,
    pub booklets: Option<Vec<Booklet>>,
    pub token_accounts: Option<Vec<TokenAccount>>,
    pub recent_activity: Option<Vec<Value>>,
}

impl BundlePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: Option<Profile>) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_children(mut self, children: Vec<Child>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_booklets(mut self, booklets: Vec<Booklet>) -> Self {
        self.booklets = Some(booklets);
        self
    }

    pub fn with_token_accounts(mut self, token_accounts: Vec<TokenAccount>) -> Self {
        self.token_accounts = Some(token_accounts);
        self
    }

    pub fn with_recent_activity(mut self, recent_activity: Vec<Value>) -> Self {
        self.recent_activity = Some(recent_activity);
        self
    }

    /// Names of the members this patch sets, for logging.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.profile.is_some() {
            fields.push("profile");
        }
        if self.children.is_some() {
            fields.push("children");
        }
        if self.booklets.is_some() {
            fields.push("booklets");
        }
        if self.token_accounts.is_some() {
            fields.push("token_accounts");
        }
        if self.recent_activity.is_some() {
            fields.push("recent_activity");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booklet(id: &str, child_id: &str) -> Booklet {
        Booklet {
            id: id.to_string(),
            child_id: child_id.to_string(),
            ..Default::default()
        }
    }

    fn child(id: &str) -> Child {
        Child {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_bundle_response() {
        let json = r#"{
            "success": true,
            "data": {
                "profile": {"id": "mock-user-1", "name": "Sarah Johnson", "role": "parent"},
                "children": [{"id": "mock-child-1", "name": "Emma", "age": 5, "grade": "K1"}],
                "booklets": [],
                "token_accounts": [],
                "recent_activity": []
            },
            "cache_timestamp": null
        }"#;
        let resp: BundleResponse = serde_json::from_str(json).expect("parse bundle response");
        assert!(resp.success);
        assert!(resp.cache_timestamp.is_none());
        assert_eq!(resp.data.children.len(), 1);
        assert_eq!(resp.data.children[0].id, "mock-child-1");
    }

    #[test]
    fn test_null_values_inside_records_are_accepted() {
        let json = r#"{
            "success": true,
            "data": {
                "profile": null,
                "children": null,
                "booklets": [{"id": "b1", "child_id": "c1", "modules": null}],
                "token_accounts": [{"child_id": "c1", "balance": 42, "weekly_earned": null}],
                "recent_activity": null
            }
        }"#;
        let resp: BundleResponse = serde_json::from_str(json).expect("parse bundle response");
        assert!(resp.data.children.is_empty());
        assert!(resp.data.booklets[0].modules.is_empty());
        assert_eq!(resp.data.token_accounts[0].weekly_earned, 0);
        assert!(resp.data.recent_activity.is_empty());
    }

    #[test]
    fn test_missing_members_default_to_empty() {
        let resp: BundleResponse =
            serde_json::from_str(r#"{"success": true, "data": {}}"#).expect("parse bundle");
        assert!(resp.data.profile.is_none());
        assert!(resp.data.booklets.is_empty());
    }

    #[test]
    fn test_apply_replaces_only_given_members() {
        let mut bundle = UserBundle {
            children: vec![child("A"), child("B")],
            booklets: vec![booklet("x", "A")],
            cache_timestamp: 1_000,
            ..Default::default()
        };

        bundle.apply(BundlePatch::new().with_booklets(vec![booklet("y", "A"), booklet("z", "B")]));

        assert_eq!(bundle.children, vec![child("A"), child("B")]);
        let ids: Vec<&str> = bundle.booklets.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "z"]);
        assert_eq!(bundle.cache_timestamp, 1_000);
    }

    #[test]
    fn test_apply_can_clear_profile() {
        let mut bundle = UserBundle {
            profile: Some(Profile::default()),
            ..Default::default()
        };
        bundle.apply(BundlePatch::new());
        assert!(bundle.profile.is_some());

        bundle.apply(BundlePatch::new().with_profile(None));
        assert!(bundle.profile.is_none());
    }

    #[test]
    fn test_filters_by_child() {
        let bundle = UserBundle {
            booklets: vec![booklet("b1", "A"), booklet("b2", "B")],
            token_accounts: vec![TokenAccount {
                child_id: "A".to_string(),
                balance: 10,
                ..Default::default()
            }],
            ..Default::default()
        };

        let a = bundle.booklets_for_child("A");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].id, "b1");
        assert!(bundle.booklets_for_child("C").is_empty());

        assert_eq!(bundle.token_account("A").map(|t| t.balance), Some(10));
        assert!(bundle.token_account("B").is_none());
    }

    #[test]
    fn test_patch_fields() {
        assert!(BundlePatch::new().fields().is_empty());
        let patch = BundlePatch::new()
            .with_children(vec![])
            .with_token_accounts(vec![]);
        assert_eq!(patch.fields(), vec!["children", "token_accounts"]);
    }

    #[test]
    fn test_bundle_json_uses_wire_field_names() {
        let bundle = UserBundle {
            cache_timestamp: 1_736_000_000_000,
            ..Default::default()
        };
        let value = serde_json::to_value(&bundle).expect("serialize bundle");
        assert_eq!(value["cache_timestamp"], 1_736_000_000_000i64);
        assert!(value["token_accounts"].is_array());
        assert!(value["recent_activity"].is_array());
    }
}
