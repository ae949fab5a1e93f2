use focusflow_core::Database;
use serde_json::json;

use super::session::print_json;

/// Print summary statistics and the most recent activities.
pub fn run(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let stats = db.stats()?;
    let records = db.recent_records(limit)?;
    print_json(&json!({ "stats": stats, "records": records }))
}
