use std::path::Path;

use clap::Subcommand;
use dailypick_core::QuotaStatus;
use serde::Serialize;

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum QuotaAction {
    /// Today's usage for a feature
    Status {
        /// Feature key (e.g. "plan", "story")
        feature: String,
    },
    /// Record one use of a feature
    Consume { feature: String },
}

#[derive(Serialize)]
struct QuotaReport {
    feature: String,
    #[serde(flatten)]
    status: QuotaStatus,
    remaining: u32,
    can_access: bool,
}

pub fn run(action: QuotaAction, catalog: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(catalog)?;
    let engine = session.engine();

    let (feature, status) = match action {
        QuotaAction::Status { feature } => {
            let status = engine.quota_status(&feature);
            (feature, status)
        }
        QuotaAction::Consume { feature } => {
            let status = engine.consume(&feature);
            (feature, status)
        }
    };
    print_json(&QuotaReport {
        remaining: status.remaining(),
        can_access: engine.can_access(&feature),
        feature,
        status,
    })
}
