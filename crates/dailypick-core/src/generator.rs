//! Text generation collaborator.
//!
//! Remote generation lives outside the core. Callers hand whatever it
//! produced to [`Engine::regenerate`](crate::engine::Engine::regenerate) as
//! extra candidates; when it fails they fall back to a local item.

use std::cell::Cell;

use thiserror::Error;

use crate::catalog::ContentItem;
use crate::context::ContextKey;
use crate::selector::{KeyHasher, RollingHash};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("generator returned no usable content")]
    Empty,
}

pub trait TextGenerator {
    fn generate(&self, context: &ContextKey) -> Result<ContentItem, GeneratorError>;
}

/// Ask `generator` for an item, using `fallback` on any failure.
pub fn generate_or_fallback(
    generator: &dyn TextGenerator,
    context: &ContextKey,
    fallback: ContentItem,
) -> ContentItem {
    match generator.generate(context) {
        Ok(item) if !item.title.trim().is_empty() => item,
        Ok(_) => {
            tracing::warn!(%context, "generator returned an empty title, using fallback");
            fallback
        }
        Err(e) => {
            tracing::warn!(%context, error = %e, "generator failed, using fallback");
            fallback
        }
    }
}

/// Offline generator that fills title templates.
///
/// The first template is chosen from the context hash; each further call
/// moves one template along. `{context}` in a template is replaced with the
/// context key.
pub struct TemplateGenerator {
    kind: String,
    templates: Vec<String>,
    calls: Cell<u64>,
}

impl TemplateGenerator {
    pub fn new(kind: &str, templates: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            templates: templates.iter().map(|t| t.to_string()).collect(),
            calls: Cell::new(0),
        }
    }

    /// Small set of open-ended activity prompts.
    pub fn activities() -> Self {
        Self::new(
            "activity",
            &[
                "Invent a game with three household objects",
                "Draw a map of an imaginary island",
                "Make up a song about today's weather",
                "Build the tallest tower you can from cups",
                "Tell a story that starts with a lost shoe",
            ],
        )
    }
}

impl TextGenerator for TemplateGenerator {
    fn generate(&self, context: &ContextKey) -> Result<ContentItem, GeneratorError> {
        if self.templates.is_empty() {
            return Err(GeneratorError::Empty);
        }
        let call = self.calls.get();
        self.calls.set(call.wrapping_add(1));

        let base = u64::from(RollingHash.hash(context.as_str()));
        let index = (base.wrapping_add(call) % self.templates.len() as u64) as usize;
        let title = self.templates[index].replace("{context}", context.as_str());
        let id = format!("gen-{}-{index}", self.kind);
        Ok(ContentItem::new(&id, &self.kind, &title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    impl TextGenerator for Offline {
        fn generate(&self, _context: &ContextKey) -> Result<ContentItem, GeneratorError> {
            Err(GeneratorError::Unavailable("offline".into()))
        }
    }

    struct Blank;

    impl TextGenerator for Blank {
        fn generate(&self, _context: &ContextKey) -> Result<ContentItem, GeneratorError> {
            Ok(ContentItem::new("blank", "activity", "   "))
        }
    }

    fn fallback() -> ContentItem {
        ContentItem::new("free-play", "activity", "Free play")
    }

    #[test]
    fn failure_uses_fallback() {
        let ctx = ContextKey::for_band("3-5");
        assert_eq!(generate_or_fallback(&Offline, &ctx, fallback()), fallback());
        assert_eq!(generate_or_fallback(&Blank, &ctx, fallback()), fallback());
    }

    #[test]
    fn templates_cycle_from_context_offset() {
        let generator = TemplateGenerator::new("activity", &["a {context}", "b", "c"]);
        let ctx = ContextKey::for_band("3-5");
        let titles: Vec<String> = (0..3)
            .map(|_| generator.generate(&ctx).unwrap().title)
            .collect();
        let mut sorted = titles.clone();
        sorted.sort();
        assert_eq!(sorted, ["a band=3-5", "b", "c"]);
    }

    #[test]
    fn same_context_starts_at_same_template() {
        let ctx = ContextKey::for_band("6-8");
        let first = TemplateGenerator::activities().generate(&ctx).unwrap();
        let again = TemplateGenerator::activities().generate(&ctx).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn empty_templates_error() {
        let generator = TemplateGenerator::new("activity", &[]);
        assert_eq!(
            generator.generate(&ContextKey::raw("x")),
            Err(GeneratorError::Empty)
        );
        assert_eq!(
            generate_or_fallback(&generator, &ContextKey::raw("x"), fallback()).id,
            "free-play"
        );
    }
}
