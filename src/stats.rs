use crate::models::{Category, CategoryTotal, Entry, LeaderboardRow, User, UserId};
use std::collections::BTreeMap;

pub const LEADERBOARD_SIZE: usize = 5;

/// Mean CO2 per entry across every entry; zero when there are none.
pub fn community_average(entries: &[Entry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let sum: f64 = entries.iter().map(|entry| entry.co2).sum();
    sum / entries.len() as f64
}

/// The `limit` users with the lowest summed CO2, ascending, ties by user id.
pub fn leaderboard(
    entries: &[Entry],
    users: &BTreeMap<UserId, User>,
    limit: usize,
) -> Vec<LeaderboardRow> {
    let mut totals: BTreeMap<&UserId, f64> = BTreeMap::new();
    for entry in entries {
        *totals.entry(&entry.user_id).or_default() += entry.co2;
    }

    let mut rows: Vec<LeaderboardRow> = totals
        .into_iter()
        .filter_map(|(user_id, total)| {
            users.get(user_id).map(|user| LeaderboardRow {
                user_id: user_id.clone(),
                username: user.username.clone(),
                total,
            })
        })
        .collect();

    rows.sort_by(|a, b| a.total.total_cmp(&b.total).then_with(|| a.user_id.cmp(&b.user_id)));
    rows.truncate(limit);
    rows
}

/// Per-category totals for one user's entries, highest total first.
pub fn category_totals<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Vec<CategoryTotal> {
    let mut grouped: BTreeMap<Category, (f64, f64, usize)> = BTreeMap::new();
    for entry in entries {
        let slot = grouped.entry(entry.category).or_default();
        slot.0 += entry.co2;
        slot.1 += entry.amount;
        slot.2 += 1;
    }

    let mut totals: Vec<CategoryTotal> = grouped
        .into_iter()
        .map(|(category, (total, amount_sum, count))| CategoryTotal {
            category,
            total,
            average_amount: amount_sum / count as f64,
            count,
        })
        .collect();

    // stable sort keeps declaration order on equal totals
    totals.sort_by(|a, b| b.total.total_cmp(&a.total));
    totals
}
