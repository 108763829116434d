use std::path::Path;

use clap::Subcommand;
use dailypick_core::{generate_or_fallback, TemplateGenerator, TextGenerator};

use super::{print_json, Session};

#[derive(Subcommand)]
pub enum PickAction {
    /// Today's pick (stable for the rest of the day)
    Today {
        /// Cache namespace, one per feature
        #[arg(long, default_value = "activity")]
        namespace: String,
        /// Band id (e.g. "3-5"); defaults to selection.default_band
        #[arg(long)]
        band: Option<String>,
        /// Required tag, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Next batch of ideas, counted against the daily quota
    Again {
        /// Quota and rotation feature key
        #[arg(long, default_value = "plan")]
        feature: String,
        #[arg(long)]
        band: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Number of ideas to return
        #[arg(long, default_value_t = 3)]
        take: usize,
        /// Mix in an offline generated idea
        #[arg(long)]
        generated: bool,
    },
}

pub fn run(action: PickAction, catalog: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open(catalog)?;
    let engine = session.engine();

    match action {
        PickAction::Today {
            namespace,
            band,
            tags,
        } => {
            let query = session.query(band, &tags);
            let pick = engine.daily_pick(&namespace, &query)?;
            print_json(&pick)?;
        }
        PickAction::Again {
            feature,
            band,
            tags,
            take,
            generated,
        } => {
            let query = session.query(band, &tags);
            let mut extra = Vec::new();
            if generated {
                let generator = TemplateGenerator::activities();
                let context = query.context_key();
                match session.catalog.default_item.clone() {
                    Some(fallback) => extra.push(generate_or_fallback(&generator, &context, fallback)),
                    None => extra.extend(generator.generate(&context).ok()),
                }
            }
            let generation = engine.regenerate(&feature, &query, extra, take)?;
            print_json(&generation)?;
        }
    }
    Ok(())
}
