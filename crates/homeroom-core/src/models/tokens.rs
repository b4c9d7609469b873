use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reward-currency account for one child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenAccount {
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub child_id: String,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub balance: i64,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub weekly_earned: i64,
    #[serde(default)]
    pub rank_percentile: Option<f64>,
    #[serde(default)]
    pub rank_position: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenAccount {
    pub fn display_rank(&self) -> String {
        match (self.rank_position, self.rank_percentile) {
            (Some(pos), _) => format!("#{}", pos),
            (None, Some(pct)) => format!("top {:.0}%", 100.0 - pct),
            (None, None) => "Unranked".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_account_defaults_missing_numbers() {
        let account: TokenAccount =
            serde_json::from_str(r#"{"child_id":"c1","balance":42}"#).expect("parse account");
        assert_eq!(account.balance, 42);
        assert_eq!(account.weekly_earned, 0);
        assert!(account.rank_percentile.is_none());
    }

    #[test]
    fn test_token_account_accepts_null_columns() {
        let account: TokenAccount = serde_json::from_str(
            r#"{"child_id":"c1","balance":42,"weekly_earned":null,"rank_percentile":null}"#,
        )
        .expect("parse account");
        assert_eq!(account.balance, 42);
        assert_eq!(account.weekly_earned, 0);
        assert!(account.rank_percentile.is_none());
    }

    #[test]
    fn test_display_rank() {
        let mut account = TokenAccount::default();
        assert_eq!(account.display_rank(), "Unranked");
        account.rank_percentile = Some(90.0);
        assert_eq!(account.display_rank(), "top 10%");
        account.rank_position = Some(3);
        assert_eq!(account.display_rank(), "#3");
    }
}
