//! Grounded answer composition.
//!
//! Retrieval hits become a bounded, numbered context; the context plus the
//! question becomes a grounding prompt; the generation service turns it
//! into an answer with deduplicated citations. When retrieval finds
//! nothing the composer answers "don't know" without spending a
//! generation call.

use crate::config::AnswerConfig;
use crate::generation::GenerationBackend;
use crate::models::{Answer, AnswerMeta, RetrievalHit, SourceRef};
use crate::retriever::Retriever;

/// Per-hit snippet cap inside the context, in characters.
const SNIPPET_CHARS: usize = 1200;

/// Fixed grounding instruction for the generation call.
const SYSTEM: &str = "\
Sen 'Kart Koç' isimli finansal yardımcı bir asistansın.
- Ekstre, ödeme tarihi, limit ve bonus/harçlık konularında kısa ve öğretici cevap ver.
- Yalnızca verilen BAĞLAM içindeki bilgilere güven; yoksa \"Bilmiyorum\" de.
- Cevabın sonunda 'Kaynaklar:' başlığında kullandığın parça başlıklarını listele.";

/// Returned when retrieval finds nothing or generation produces nothing.
const DONT_KNOW: &str = "Bilmiyorum. Şu an için ilgili bir kaynak bulamadım.";

/// A failed `answer` call. Both variants propagate to the caller, which
/// owns the user-facing fallback text.
#[derive(Debug)]
pub enum AskError {
    /// Query embedding or index lookup failed.
    Retrieval(anyhow::Error),
    /// The generation call failed.
    Generation(anyhow::Error),
}

impl std::fmt::Display for AskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AskError::Retrieval(e) => write!(f, "retrieval failed: {}", e),
            AskError::Generation(e) => write!(f, "generation failed: {}", e),
        }
    }
}

impl std::error::Error for AskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AskError::Retrieval(e) | AskError::Generation(e) => Some(e.as_ref()),
        }
    }
}

/// Composes grounded answers from retrieval hits and the generation
/// service.
pub struct AnswerComposer<'a> {
    retriever: Retriever<'a>,
    generation: &'a dyn GenerationBackend,
    defaults: AnswerConfig,
}

impl<'a> AnswerComposer<'a> {
    pub fn new(
        retriever: Retriever<'a>,
        generation: &'a dyn GenerationBackend,
        defaults: AnswerConfig,
    ) -> Self {
        Self {
            retriever,
            generation,
            defaults,
        }
    }

    /// Answer `query` from the indexed documents.
    ///
    /// Explicit arguments override the configured defaults. Zero hits
    /// short-circuit to the canned answer; low relevance does not — the
    /// context is built from whatever ranked hits exist.
    pub async fn answer(
        &self,
        query: &str,
        top_k: Option<usize>,
        temperature: Option<f32>,
        max_context_chars: Option<usize>,
    ) -> Result<Answer, AskError> {
        let top_k = top_k.unwrap_or(self.defaults.top_k);
        let max_context_chars = max_context_chars.unwrap_or(self.defaults.max_context_chars);

        let hits = self
            .retriever
            .search(query, top_k)
            .await
            .map_err(AskError::Retrieval)?;

        if hits.is_empty() {
            return Ok(Answer {
                text: DONT_KNOW.to_string(),
                sources: Vec::new(),
                meta: AnswerMeta {
                    used_hits: 0,
                    top_k,
                    context_chars: 0,
                },
            });
        }

        let context = format_context(&hits, max_context_chars);
        let prompt = build_prompt(&context, query);
        let temperature = temperature.unwrap_or(self.defaults.temperature);

        let raw = self
            .generation
            .generate(&prompt, temperature)
            .await
            .map_err(AskError::Generation)?;

        let text = if raw.trim().is_empty() {
            DONT_KNOW.to_string()
        } else {
            raw.trim().to_string()
        };

        Ok(Answer {
            text,
            sources: dedup_sources(&hits),
            meta: AnswerMeta {
                used_hits: hits.len(),
                top_k,
                context_chars: context.chars().count(),
            },
        })
    }
}

/// Join hits into numbered context blocks, greedily in rank order, keeping
/// the total block length within `max_chars`.
fn format_context(hits: &[RetrievalHit], max_chars: usize) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut total = 0usize;

    for (i, hit) in hits.iter().enumerate() {
        let snippet = truncate(&hit.text, SNIPPET_CHARS);
        let block = format!(
            "[{}] {} (chunk {}):\n{}\n",
            i + 1,
            hit.meta.title,
            hit.meta.chunk,
            snippet
        );
        let block_len = block.chars().count();
        if total + block_len > max_chars {
            break;
        }
        total += block_len;
        blocks.push(block);
    }

    blocks.join("\n")
}

fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "{SYSTEM}\n\n\
         --- BAĞLAM BAŞI ---\n\
         {context}\n\
         --- BAĞLAM SONU ---\n\n\
         SORU:\n\
         {query}\n\n\
         Lütfen kısa ve net bir cevap ver. Emin değilsen \"Bilmiyorum\" de.\n\
         Sonunda 'Kaynaklar:' başlığı altında kullandığın parçaların başlıklarını listele."
    )
}

/// Trim and cap a snippet at `n` characters, appending an ellipsis when
/// cut. Character-based so multibyte text never splits mid code point.
fn truncate(text: &str, n: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= n {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(n.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Deduplicate hits into citations by `(title, source, chunk)`, keeping
/// first-occurrence order.
fn dedup_sources(hits: &[RetrievalHit]) -> Vec<SourceRef> {
    let mut seen: Vec<(String, String, usize)> = Vec::new();
    let mut out = Vec::new();
    for hit in hits {
        let key = (
            hit.meta.title.clone(),
            hit.meta.source.clone(),
            hit.meta.chunk,
        );
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(SourceRef {
            title: hit.meta.title.clone(),
            source: hit.meta.source.clone(),
            chunk: hit.meta.chunk,
        });
    }
    out
}
