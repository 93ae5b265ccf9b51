// Translation collaborator
//
// Batch-translates the recognized strings of one scene over HTTP. The
// response must preserve the order and count of the request batch.

pub mod http;

use async_trait::async_trait;

pub use http::HttpTranslator;

use crate::config::TranslateConfig;
use crate::error::Result;

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a batch of source strings. The returned batch has the same
    /// count and order as the input; anything else is a service error.
    async fn translate_batch(
        &self,
        batch: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create the default translator implementation (HTTP batch endpoint)
    pub fn create_translator(config: TranslateConfig) -> Box<dyn Translator> {
        Box::new(HttpTranslator::new(config))
    }
}
