use std::path::Path;

use tokenizers::Tokenizer;

/// BPE tokenizer over the XTTS `vocab.json`.
pub struct XttsTokenizer {
    inner: Tokenizer,
}

impl std::fmt::Debug for XttsTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XttsTokenizer")
            .field("vocab_size", &self.inner.get_vocab_size(true))
            .finish()
    }
}

/// Language tag prefix plus explicit space tokens, the form the GPT was
/// trained on.
pub fn preprocess(text: &str, language: &str) -> String {
    format!("[{language}]{}", text.trim().replace(' ', "[SPACE]"))
}

impl XttsTokenizer {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let inner = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load vocabulary {}: {e}", path.display()))?;
        Ok(Self { inner })
    }

    pub fn encode(&self, text: &str, language: &str) -> anyhow::Result<Vec<i64>> {
        let prepared = preprocess(text, language);
        let encoding = self
            .inner
            .encode(prepared.as_str(), false)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        Ok(encoding.get_ids().iter().map(|&id| id as i64).collect())
    }
}
