use crate::config::Config;
use crate::error::GeminiError;
use crate::types::{
    ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    ImageInstance, ImageParameters, PredictRequest, PredictResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;

const API_KEY_HEADER: &str = "x-goog-api-key";
const IMAGE_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: Config,
}

impl GeminiClient {
    pub fn new(config: Config) -> Result<Self, GeminiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Asks the text model for a JSON document matching `schema` and returns
    /// the raw text of the first candidate.
    pub async fn generate_json(
        &self,
        system_instruction: &str,
        prompt: &str,
        schema: serde_json::Value,
    ) -> Result<String, GeminiError> {
        let request = GenerateContentRequest {
            system_instruction: Content::text(None, system_instruction),
            contents: vec![Content::text(Some("user"), prompt)],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            },
        };

        tracing::debug!(model = self.config.text_model(), "requesting content");
        let response: GenerateContentResponse = self
            .post(&self.config.generate_content_url(), &request)
            .await?;

        if let Some(text) = response.text() {
            return Ok(text);
        }
        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(GeminiError::Blocked(reason));
        }
        match response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.finish_reason)
        {
            Some(reason) if reason != "STOP" => Err(GeminiError::Blocked(reason)),
            _ => Err(GeminiError::NoCandidates),
        }
    }

    /// Generates a single image and returns its decoded bytes.
    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GeminiError> {
        let request = PredictRequest {
            instances: vec![ImageInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImageParameters {
                sample_count: 1,
                output_mime_type: IMAGE_MIME_TYPE.to_string(),
            },
        };

        tracing::debug!(model = self.config.image_model(), "requesting image");
        let response: PredictResponse = self.post(&self.config.predict_url(), &request).await?;

        let prediction = response
            .predictions
            .into_iter()
            .find(|prediction| prediction.bytes_base64_encoded.is_some())
            .ok_or(GeminiError::NoImage)?;
        let encoded = prediction.bytes_base64_encoded.unwrap_or_default();
        let bytes = STANDARD.decode(encoded.as_bytes())?;
        if bytes.is_empty() {
            return Err(GeminiError::NoImage);
        }
        Ok(GeneratedImage {
            mime_type: prediction
                .mime_type
                .unwrap_or_else(|| IMAGE_MIME_TYPE.to_string()),
            bytes,
        })
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, GeminiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, self.config.api_key().expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            tracing::warn!(status = status.as_u16(), "Gemini API request failed");
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await.map_err(|e| self.classify(e))?;
        serde_json::from_str(&text).map_err(|e| GeminiError::Decode(e.to_string()))
    }

    fn classify(&self, error: reqwest::Error) -> GeminiError {
        match self.config.timeout() {
            Some(timeout) if error.is_timeout() => GeminiError::Timeout(timeout),
            _ => GeminiError::Http(error),
        }
    }
}
