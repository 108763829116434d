use std::path::Path;

use clap::Subcommand;
use serde_json::json;

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum StreakAction {
    /// Current streak and totals
    Show,
    /// Award XP points for today
    Award { points: u32 },
    /// Points per day for the retained window
    History,
}

pub fn run(action: StreakAction, catalog: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(catalog)?;
    let engine = session.engine();

    match action {
        StreakAction::Show => print_json(&engine.streak())?,
        StreakAction::Award { points } => {
            let update = engine.award_xp(points);
            print_json(&json!({
                "before": update.before,
                "after": update.after,
                "extended": update.extended(),
                "restarted": update.restarted(),
            }))?;
        }
        StreakAction::History => print_json(&engine.points_history())?,
    }
    Ok(())
}
