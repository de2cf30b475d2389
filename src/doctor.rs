//! # Doctor module
//!
//! Drives one diagnosis query end to end:
//!
//! ```text
//! embed -> retrieve -> assemble context -> generate -> validate
//! ```
//!
//! Every stage can fail (the embedding model is remote, the generation
//! service is remote and slow, and models return garbage) but none of those
//! failures ever reaches the caller as an error. [`Doctor::diagnose`] always
//! returns a well-formed [`DoctorReport`]: the genuine one when the pipeline
//! succeeds, the deterministic degraded one otherwise. Callers distinguish
//! the two by `confidence` and the sentinel provenance entry.
//!
//! The case bank is only touched during retrieval, under its read lock.
//! Nothing is locked across the generation call, and dropping the
//! `diagnose` future mid-generation simply abandons the HTTP request;
//! abandoning a query can never corrupt index state.

use std::sync::Arc;
use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
};
use tracing::{debug, warn};

use crate::{
    config::HarvestMindConfig,
    context,
    embedding::{Embedder, EmbeddingError},
    models::{DiagnosisRequest, DoctorReport},
    template::ReportTemplate,
    vector_store::{CaseBank, StoreError},
};

/// What went wrong inside one diagnosis. Internal to the orchestrator:
/// every variant degrades to the fallback report, none propagates.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosisError {
    #[error("embedding model unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] StoreError),
    #[error("generation service error: {0}")]
    GenerationService(String),
    #[error("generation timed out after {seconds}s")]
    GenerationTimeout { seconds: u64 },
    #[error("response violates report schema: {0}")]
    SchemaViolation(String),
}

/// The report orchestrator.
///
/// Owns the generation client, the prompt template, and handles to the case
/// bank and the embedding capability. One `Doctor` serves any number of
/// concurrent queries.
pub struct Doctor<E> {
    config: HarvestMindConfig,
    template: ReportTemplate,
    bank: Arc<CaseBank>,
    embedder: E,
    client: Client<OpenAIConfig>,
}

/// Creates the generation client from configuration.
fn create_client(config: &HarvestMindConfig) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_key(config.api_key.clone())
        .with_api_base(config.api_base.clone());
    debug!("generation client created for {}", config.api_base);
    Client::with_config(openai_config)
}

impl<E: Embedder> Doctor<E> {
    pub fn new(
        config: HarvestMindConfig,
        template: ReportTemplate,
        bank: Arc<CaseBank>,
        embedder: E,
    ) -> Self {
        let client = create_client(&config);
        Self {
            config,
            template,
            bank,
            embedder,
            client,
        }
    }

    /// Run one diagnosis. Infallible by contract: any internal failure is
    /// logged and converted into [`DoctorReport::degraded`].
    pub async fn diagnose(&self, request: &DiagnosisRequest) -> DoctorReport {
        match self.run(request).await {
            Ok(report) => report,
            Err(error) => {
                warn!(field_id = %request.field_id, %error, "diagnosis degraded");
                DoctorReport::degraded(&error.to_string())
            }
        }
    }

    async fn run(&self, request: &DiagnosisRequest) -> Result<DoctorReport, DiagnosisError> {
        let vector = self.query_vector(request).await?;

        let k = self.config.retrieval_top_k;
        let cases = self.bank.retrieve(&vector, k)?;
        debug!(retrieved = cases.len(), k, "retrieval complete");

        let grounding = context::assemble(&request.sensor_snapshot, &cases, k, &request.query_text);

        let report = self.generate(&grounding).await?;
        report
            .validate()
            .map_err(|e| DiagnosisError::SchemaViolation(e.to_string()))?;
        Ok(report)
    }

    /// Obtain the query vector: a caller-supplied embedding wins, otherwise
    /// the observation text (or, failing that, the query text) is encoded
    /// through the embedding capability.
    async fn query_vector(&self, request: &DiagnosisRequest) -> Result<Vec<f32>, DiagnosisError> {
        if let Some(embedding) = &request.embedding {
            return Ok(embedding.clone());
        }
        let observation = request
            .observation
            .as_deref()
            .unwrap_or(&request.query_text);
        Ok(self.embedder.embed(observation).await?)
    }

    /// Submit the structured-output request and parse the response.
    ///
    /// Each attempt runs under the configured timeout. Attempts are counted
    /// by `generation_attempts` (1 by default, meaning no automatic retry);
    /// only
    /// transport failures and timeouts are retried, a response that parses
    /// badly fails the query immediately.
    async fn generate(&self, grounding: &str) -> Result<DoctorReport, DiagnosisError> {
        let request = self.build_request(grounding)?;
        let timeout = Duration::from_secs(self.config.generation_timeout_secs);
        let attempts = self.config.generation_attempts.max(1);

        let mut last_error = DiagnosisError::GenerationService("no attempt made".to_string());
        for attempt in 1..=attempts {
            debug!(attempt, "submitting generation request");
            match tokio::time::timeout(timeout, self.client.chat().create(request.clone())).await {
                Err(_) => {
                    last_error = DiagnosisError::GenerationTimeout {
                        seconds: self.config.generation_timeout_secs,
                    };
                }
                Ok(Err(error)) => {
                    last_error = DiagnosisError::GenerationService(error.to_string());
                }
                Ok(Ok(response)) => {
                    let mut response_string = String::new();
                    response.choices.iter().for_each(|chat_choice| {
                        if let Some(content) = &chat_choice.message.content {
                            response_string.push_str(content);
                        }
                    });
                    return parse_report(&response_string);
                }
            }
            warn!(attempt, error = %last_error, "generation attempt failed");
        }
        Err(last_error)
    }

    fn build_request(
        &self,
        grounding: &str,
    ) -> Result<CreateChatCompletionRequest, DiagnosisError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(
                    self.template.system_prompt.clone(),
                ),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(grounding.to_string()),
                name: None,
            }),
        ];

        let request = match self.template.response_format.clone() {
            Some(response_format_json_schema) => CreateChatCompletionRequestArgs::default()
                .max_tokens(self.config.generation_max_tokens)
                .model(self.config.model.clone())
                .messages(messages)
                .response_format(ResponseFormat::JsonSchema {
                    json_schema: response_format_json_schema,
                })
                .build(),
            None => CreateChatCompletionRequestArgs::default()
                .max_tokens(self.config.generation_max_tokens)
                .model(self.config.model.clone())
                .messages(messages)
                .build(),
        };

        request.map_err(|e| DiagnosisError::GenerationService(e.to_string()))
    }
}

/// A response is a report only if it is valid JSON of exactly the report
/// shape; anything else is a schema violation, not a partial success.
fn parse_report(text: &str) -> Result<DoctorReport, DiagnosisError> {
    serde_json::from_str(text)
        .map_err(|e| DiagnosisError::SchemaViolation(format!("not a valid report: {e}")))
}
