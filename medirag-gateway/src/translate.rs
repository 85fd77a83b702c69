use std::sync::Arc;

use async_trait::async_trait;
use medirag_knowledge::{
    InstructionMessage, KnowledgeError, KnowledgeResult, MessageRole, Translator,
};

use crate::providers::Provider;

const TRANSLATE_INSTRUCTION: &str = "Translate the user's message into English. \
Reply with the translation only, without quotes or comments. \
If the message is already in English, repeat it unchanged.";

/// Translation pre-pass backed by the chat model itself.
pub struct ModelTranslator {
    provider: Arc<dyn Provider>,
}

impl ModelTranslator {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Translator for ModelTranslator {
    async fn translate(&self, text: &str) -> KnowledgeResult<String> {
        let messages = [
            InstructionMessage::new(MessageRole::System, TRANSLATE_INSTRUCTION),
            InstructionMessage::new(MessageRole::User, text),
        ];
        let response = self
            .provider
            .complete(&messages, 0.0)
            .await
            .map_err(|e| KnowledgeError::Translation(e.to_string()))?;
        Ok(response.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderError, ProviderResponse};

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn complete(
            &self,
            messages: &[InstructionMessage],
            temperature: f32,
        ) -> Result<ProviderResponse, ProviderError> {
            assert_eq!(temperature, 0.0);
            assert_eq!(messages[0].role, MessageRole::System);
            Ok(ProviderResponse {
                id: "1".to_string(),
                model: "echo-1".to_string(),
                text: format!("  EN: {}\n", messages[1].content),
                usage: None,
                finish_reason: None,
            })
        }
    }

    #[tokio::test]
    async fn test_translation_trims_reply() {
        let translator = ModelTranslator::new(Arc::new(Echo));
        assert_eq!(translator.translate("ciao").await.unwrap(), "EN: ciao");
    }
}
