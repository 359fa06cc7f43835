use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::LedgerError;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn from_string(s: &str) -> Self {
                Self(s.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

define_id!(UserId);
define_id!(EntryId);

/// Activity categories, in declaration order. Ties between categories are
/// broken by this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Transport,
    Food,
    Energy,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Transport, Category::Food, Category::Energy];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Transport => "Transport",
            Category::Food => "Food",
            Category::Energy => "Energy",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                LedgerError::validation(
                    "category",
                    format!("unknown category '{trimmed}', expected Transport, Food or Energy"),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub streak: u32,
    pub last_log_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl User {
    pub fn new(username: String, password_hash: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            username,
            password_hash,
            streak: 0,
            last_log_date: None,
            created_at,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub user_id: UserId,
    pub category: Category,
    pub amount: f64,
    pub unit: String,
    /// Unrounded kg CO2.
    pub co2: f64,
    pub timestamp: DateTime<Utc>,
}

/// Everything the JSON store persists.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    pub users: BTreeMap<UserId, User>,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: f64,
    pub average_amount: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub user_id: UserId,
    pub username: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub top_category: Option<Category>,
    pub tip: String,
    pub weekly_goal: Option<String>,
    pub categories: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunityStats {
    pub average: f64,
    pub leaderboard: Vec<LeaderboardRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub streak: u32,
    pub last_log_date: Option<NaiveDate>,
    pub total_co2: f64,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub entry: Entry,
    pub streak: u32,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: UserId,
    pub username: String,
    pub streak: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitEntryRequest {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryFilter {
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryView {
    pub id: EntryId,
    pub category: Category,
    pub amount: f64,
    pub unit: String,
    pub co2: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitEntryResponse {
    pub entry: EntryView,
    pub co2: f64,
    pub streak: u32,
}
