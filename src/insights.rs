use crate::models::{Category, CategoryTotal, Entry, Insight};
use crate::stats::category_totals;

pub const START_LOGGING_TIP: &str =
    "Start logging your daily activities to get a personalized tip.";

const TRANSPORT_SAVING_SHARE: f64 = 0.2;
const WEEKLY_GOAL_SHARE: f64 = 0.9;

/// Canned tip for the category that dominates a user's footprint.
pub fn tip_for(top: &CategoryTotal) -> String {
    match top.category {
        Category::Transport => format!(
            "Transport is your largest source. Swapping a few car trips for transit, \
             cycling or walking could save about {:.1} kg CO2.",
            top.total * TRANSPORT_SAVING_SHARE
        ),
        Category::Food => "Food leads your footprint. Replacing a couple of high-impact meals \
             each week with plant-based ones makes a visible dent."
            .to_string(),
        Category::Energy => "Energy use is your biggest contributor. Switch off standby devices \
             and turn the thermostat down a degree."
            .to_string(),
    }
}

/// Insight for a single user's entries.
pub fn build_insight<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Insight {
    let categories = category_totals(entries);
    insight_from_totals(categories)
}

pub fn insight_from_totals(categories: Vec<CategoryTotal>) -> Insight {
    let (top_category, tip, weekly_goal) = match categories.first() {
        None => (None, START_LOGGING_TIP.to_string(), None),
        Some(top) => (
            Some(top.category),
            tip_for(top),
            Some(format!("{:.2}", top.total * WEEKLY_GOAL_SHARE)),
        ),
    };
    Insight {
        top_category,
        tip,
        weekly_goal,
        categories,
    }
}
