//! System prompt rendering.

use crate::types::RetrieverResult;
use handlebars::Handlebars;
use ragpipe_core::{AppError, AppResult};
use serde::Serialize;

/// Default system prompt. Receives `query` and `passages` (`id`, `text`,
/// `score`).
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "\
You are a helpful assistant that answers questions using only the provided context.
If the context does not contain the answer, say that you do not know.
Cite the passages you rely on by their id in square brackets.

Context:
{{#each passages}}
[{{this.id}}] {{this.text}}
{{else}}
(no relevant passages were found)
{{/each}}";

const TEMPLATE_NAME: &str = "system";

#[derive(Serialize)]
struct PassageView<'a> {
    id: &'a str,
    text: &'a str,
    score: f32,
}

#[derive(Serialize)]
struct PromptView<'a> {
    query: &'a str,
    passages: Vec<PassageView<'a>>,
}

/// A compiled handlebars system prompt.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    handlebars: Handlebars<'static>,
}

impl PromptTemplate {
    /// Compile a template. Fails with `Config` on syntax errors.
    pub fn new(template: &str) -> AppResult<Self> {
        let mut handlebars = Handlebars::new();

        // Plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| AppError::Config(format!("Failed to register template: {}", e)))?;

        Ok(Self { handlebars })
    }

    /// The bundled [`DEFAULT_SYSTEM_TEMPLATE`].
    pub fn standard() -> AppResult<Self> {
        Self::new(DEFAULT_SYSTEM_TEMPLATE)
    }

    /// Render the prompt for a query and its retrieved context.
    pub fn render(&self, query: &str, context: &RetrieverResult) -> AppResult<String> {
        let view = PromptView {
            query,
            passages: context
                .iter()
                .map(|(chunk, score)| PassageView {
                    id: &chunk.id,
                    text: &chunk.content,
                    score,
                })
                .collect(),
        };

        self.handlebars
            .render(TEMPLATE_NAME, &view)
            .map_err(|e| AppError::Other(format!("Failed to render prompt: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    #[test]
    fn test_default_template_lists_passages() {
        let context = RetrieverResult::new(
            "q1",
            vec![
                (Chunk::new("D1-0", "D1", "The sky is blue."), 0.9),
                (Chunk::new("D2-0", "D2", "Grass is <green>."), 0.4),
            ],
        );

        let rendered = PromptTemplate::standard()
            .unwrap()
            .render("What color is the sky?", &context)
            .unwrap();

        assert!(rendered.contains("[D1-0] The sky is blue."));
        // Not HTML-escaped
        assert!(rendered.contains("[D2-0] Grass is <green>."));
        assert!(rendered.find("D1-0") < rendered.find("D2-0"));
    }

    #[test]
    fn test_default_template_without_passages() {
        let rendered = PromptTemplate::standard()
            .unwrap()
            .render("anything", &RetrieverResult::empty("q"))
            .unwrap();
        assert!(rendered.contains("no relevant passages"));
    }

    #[test]
    fn test_custom_template() {
        let template =
            PromptTemplate::new("Q: {{query}} ids:{{#each passages}} {{this.id}}{{/each}}").unwrap();
        let context = RetrieverResult::new(
            "q",
            vec![(Chunk::new("a", "d", "x"), 1.0), (Chunk::new("b", "d", "y"), 0.5)],
        );

        let rendered = template.render("why?", &context).unwrap();
        assert_eq!(rendered, "Q: why? ids: a b");
    }

    #[test]
    fn test_invalid_template() {
        assert!(matches!(
            PromptTemplate::new("{{#each passages}}unclosed"),
            Err(AppError::Config(_))
        ));
    }
}
