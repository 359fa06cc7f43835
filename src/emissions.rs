use crate::errors::LedgerError;
use crate::models::Category;

/// Largest amount accepted for a single entry, in the category's unit.
pub const MAX_AMOUNT: f64 = 1_000_000.0;

/// kg CO2 per unit of activity.
pub fn factor(category: Category) -> f64 {
    match category {
        Category::Transport => 0.21,
        Category::Food => 2.5,
        Category::Energy => 0.385,
    }
}

pub fn unit_label(category: Category) -> &'static str {
    match category {
        Category::Transport => "km",
        Category::Food => "meals",
        Category::Energy => "kWh",
    }
}

/// Unrounded kg CO2 for an activity. Round with [`round_kg`] only when the
/// value leaves the crate.
pub fn compute_co2(category: Category, amount: f64) -> Result<f64, LedgerError> {
    if !amount.is_finite() {
        return Err(LedgerError::validation("amount", "must be a finite number"));
    }
    if amount <= 0.0 {
        return Err(LedgerError::validation("amount", "must be greater than zero"));
    }
    if amount > MAX_AMOUNT {
        return Err(LedgerError::validation(
            "amount",
            format!("must be at most {MAX_AMOUNT}"),
        ));
    }
    Ok(amount * factor(category))
}

pub fn round_kg(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
