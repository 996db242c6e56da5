//! The question-answering pipeline.
//!
//! One request flows through:
//!
//! ```text
//! attachment ─▶ ExtractorRegistry ─▶ Retriever (chunk → embed → index → search)
//!                                            │
//! prompt ─────────────────────────────▶ compose ─▶ Generator ─▶ answer
//! ```
//!
//! Images skip retrieval: their OCR text is appended directly (bounded by
//! the image budget). Every stage failure is converted into a
//! [`GenerationError`] at its boundary; [`Pipeline::respond`] flattens that
//! into the user-visible failure string so transports never see a fault.

use std::sync::Arc;

use anyhow::Result;
use docqa_core::category::Category;
use docqa_core::models::{Document, RankedPassage};
use docqa_core::prompt::{compose, AttachmentContext, Budgets};
use docqa_core::retrieve::Retriever;
use tracing::{info, warn};

use crate::config::{Config, EmptyContextPolicy};
use crate::embedding::create_provider;
use crate::error::{ExtractionError, GenerationError};
use crate::extract::ExtractorRegistry;
use crate::generate::{Generator, OllamaGenerator};

/// A composed prompt, ready for the backend.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub prompt: String,
    /// Category of the attachment, if one was sent.
    pub category: Option<Category>,
    /// Passages that grounded the prompt, most relevant first.
    pub passages: Vec<RankedPassage>,
}

/// A generated answer with the context that produced it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub category: Option<Category>,
    pub passages: Vec<RankedPassage>,
}

pub struct Pipeline {
    registry: Arc<ExtractorRegistry>,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    budgets: Budgets,
    policy: EmptyContextPolicy,
}

impl Pipeline {
    pub fn new(
        registry: ExtractorRegistry,
        retriever: Retriever,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            retriever,
            generator,
            budgets: Budgets::default(),
            policy: EmptyContextPolicy::default(),
        }
    }

    pub fn with_budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn with_policy(mut self, policy: EmptyContextPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build every stage from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        let retriever = Retriever::new(provider, config.retrieval.top_k);
        let generator = Arc::new(OllamaGenerator::new(&config.backend)?);
        Ok(Self::new(ExtractorRegistry::from_config(config), retriever, generator)
            .with_budgets(Budgets {
                context_chars: config.retrieval.context_char_budget,
                image_chars: config.retrieval.image_char_budget,
            })
            .with_policy(config.retrieval.empty_context))
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Extract `doc` on a blocking thread.
    pub async fn extract(&self, mut doc: Document) -> Result<Document, ExtractionError> {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || {
            registry.extract_document(&mut doc)?;
            Ok(doc)
        })
        .await
        .map_err(|e| ExtractionError::Io(std::io::Error::other(e.to_string())))?
    }

    /// Run every stage up to, but not including, generation.
    pub async fn prepare(
        &self,
        prompt: &str,
        attachment: Option<Document>,
    ) -> Result<Prepared, GenerationError> {
        let Some(doc) = attachment else {
            return Ok(Prepared {
                prompt: compose(prompt, &AttachmentContext::None, self.budgets),
                category: None,
                passages: Vec::new(),
            });
        };

        let filename = doc.filename.clone();
        let category = doc.category;
        if category == Category::Unsupported {
            return Err(GenerationError::UnsupportedAttachment(filename));
        }

        let text = match self.extract(doc).await {
            Ok(doc) => doc.text.unwrap_or_default(),
            Err(ExtractionError::NoText) => String::new(),
            Err(e) => {
                warn!(file = %filename, error = %e, "attachment extraction failed");
                return Err(e.into());
            }
        };

        if category == Category::Image {
            if text.trim().is_empty() {
                return self.empty_context(prompt, &filename, category);
            }
            return Ok(Prepared {
                prompt: compose(prompt, &AttachmentContext::ImageText(&text), self.budgets),
                category: Some(category),
                passages: Vec::new(),
            });
        }

        let retrieval = self
            .retriever
            .retrieve(prompt, &text)
            .await
            .map_err(|e| GenerationError::RetrievalFailure(format!("{:#}", e)))?;
        if retrieval.is_empty() {
            return self.empty_context(prompt, &filename, category);
        }

        info!(
            file = %filename,
            %category,
            passages = retrieval.total_passages,
            used = retrieval.passages.len(),
            degraded = retrieval.degraded,
            "retrieved attachment context"
        );
        let context = AttachmentContext::Retrieved {
            category,
            passages: &retrieval.passages,
        };
        Ok(Prepared {
            prompt: compose(prompt, &context, self.budgets),
            category: Some(category),
            passages: retrieval.passages,
        })
    }

    fn empty_context(
        &self,
        prompt: &str,
        filename: &str,
        category: Category,
    ) -> Result<Prepared, GenerationError> {
        match self.policy {
            EmptyContextPolicy::Refuse => {
                Err(GenerationError::NoUsableContent(filename.to_string()))
            }
            EmptyContextPolicy::BarePrompt => {
                info!(file = %filename, "attachment has no usable text, answering without it");
                Ok(Prepared {
                    prompt: compose(prompt, &AttachmentContext::Empty { category }, self.budgets),
                    category: Some(category),
                    passages: Vec::new(),
                })
            }
        }
    }

    /// Answer `prompt`, grounded in `attachment` when one is given.
    pub async fn answer(
        &self,
        prompt: &str,
        attachment: Option<Document>,
    ) -> Result<Answer, GenerationError> {
        let prepared = self.prepare(prompt, attachment).await?;
        let text = self.generator.generate(&prepared.prompt).await?;
        Ok(Answer {
            text,
            category: prepared.category,
            passages: prepared.passages,
        })
    }

    /// Like [`answer`](Self::answer), but failures become the user-visible
    /// failure string.
    pub async fn respond(&self, prompt: &str, attachment: Option<Document>) -> String {
        match self.answer(prompt, attachment).await {
            Ok(answer) => answer.text,
            Err(e) => {
                warn!(code = e.code(), error = %e, "request failed");
                e.user_message()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_core::embedding::HashingProvider;
    use std::sync::Mutex;

    /// Records prompts instead of calling a model.
    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for Recorder {
        fn model(&self) -> &str {
            "recorder"
        }
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("answer".to_string())
        }
    }

    fn pipeline(recorder: Arc<Recorder>) -> Pipeline {
        let retriever = Retriever::new(Arc::new(HashingProvider::new(256)), 2);
        Pipeline::new(ExtractorRegistry::default(), retriever, recorder)
    }

    #[tokio::test]
    async fn no_attachment_passes_prompt_through() {
        let rec = Arc::new(Recorder::default());
        let answer = pipeline(rec.clone()).answer("Hello?", None).await.unwrap();
        assert_eq!(answer.text, "answer");
        assert!(answer.category.is_none());
        assert_eq!(rec.prompts.lock().unwrap().as_slice(), ["Hello?"]);
    }

    #[tokio::test]
    async fn retrieved_passages_ground_the_prompt() {
        let rec = Arc::new(Recorder::default());
        let doc = Document::new(
            "facts.txt",
            b"The sky is blue. Grass is green. The sky at dusk turns orange.".to_vec(),
        );
        let answer = pipeline(rec.clone())
            .answer("What color is the sky?", Some(doc))
            .await
            .unwrap();
        assert_eq!(answer.category, Some(Category::PlainText));
        assert_eq!(answer.passages.len(), 2);
        assert!(answer.passages[0].passage.text.contains("sky"));
        let sent = rec.prompts.lock().unwrap()[0].clone();
        assert!(sent.starts_with("What color is the sky?\n\n"));
        assert!(sent.contains("Attachment Type: text"));
    }

    #[tokio::test]
    async fn unsupported_attachment_skips_backend() {
        let rec = Arc::new(Recorder::default());
        let err = pipeline(rec.clone())
            .answer("Run it", Some(Document::new("setup.exe", b"MZ".to_vec())))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedAttachment(ref n) if n == "setup.exe"));
        assert!(rec.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_document_uses_bare_prompt_by_default() {
        let rec = Arc::new(Recorder::default());
        let answer = pipeline(rec.clone())
            .answer("Summarize", Some(Document::new("blank.txt", b"   \n".to_vec())))
            .await
            .unwrap();
        assert!(answer.passages.is_empty());
        let sent = rec.prompts.lock().unwrap()[0].clone();
        assert!(sent.starts_with("Summarize"));
        assert!(sent.contains("no usable text"));
    }

    #[tokio::test]
    async fn empty_document_refused_under_refuse_policy() {
        let rec = Arc::new(Recorder::default());
        let err = pipeline(rec.clone())
            .with_policy(EmptyContextPolicy::Refuse)
            .answer("Summarize", Some(Document::new("blank.md", Vec::new())))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::NoUsableContent(_)));
        assert!(rec.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_without_ocr_is_unsupported() {
        let rec = Arc::new(Recorder::default());
        let out = pipeline(rec.clone())
            .respond("Read this", Some(Document::new("scan.png", b"\x89PNG".to_vec())))
            .await;
        assert!(out.starts_with("Unsupported file type"));
        assert!(rec.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_spreadsheet_is_extraction_failure() {
        let rec = Arc::new(Recorder::default());
        let err = pipeline(rec.clone())
            .answer("Totals?", Some(Document::new("book.xlsx", b"not a zip".to_vec())))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "extraction_failure");
    }
}
