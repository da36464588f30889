use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct UserPrefs {
    #[serde(default, deserialize_with = "lenient_reputation")]
    pub reputation: i64,
}

/// Preferences are loosely typed on the platform; numbers may come back as
/// strings or floats. Anything unreadable counts as no reputation.
pub fn reputation_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

fn lenient_reputation<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(reputation_value(&value).unwrap_or(0))
}

/// A user as the platform's identity service returns it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub prefs: UserPrefs,
}

/// Public profile returned by the API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    #[serde(rename = "$id")]
    pub id: UserId,
    pub name: String,
    pub reputation: i64,
}

impl From<Account> for Profile {
    fn from(account: Account) -> Self {
        Profile {
            id: account.id,
            name: account.name,
            reputation: account.prefs.reputation,
        }
    }
}
