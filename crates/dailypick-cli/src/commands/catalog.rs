use std::collections::BTreeSet;
use std::path::Path;

use clap::Subcommand;

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List items, optionally only those fitting a band
    List {
        #[arg(long)]
        band: Option<String>,
    },
    /// List declared bands
    Bands,
}

pub fn run(action: CatalogAction, catalog: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(catalog)?;

    match action {
        CatalogAction::List { band } => {
            let items = session.catalog.filter(band.as_deref(), &BTreeSet::new());
            print_json(&items)?;
        }
        CatalogAction::Bands => print_json(&session.catalog.bands)?,
    }
    Ok(())
}
