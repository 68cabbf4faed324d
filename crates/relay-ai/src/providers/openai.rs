//! OpenAI Assistants API (v2) client

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use super::AssistantsApi;
use crate::{
    error::{Error, Result},
    types::{
        AssistantConfig, AssistantId, FileId, MessageId, Role, Run, RunId, ThreadId,
        ThreadMessage, ToolSpec,
    },
};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Beta header value required by the Assistants endpoints
const ASSISTANTS_BETA: &str = "assistants=v2";

/// Page size used when listing thread messages
const MESSAGE_PAGE_SIZE: u32 = 20;

/// OpenAI Assistants client
pub struct OpenAIAssistants {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIAssistants {
    /// Create a new client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different base URL (proxies, compatible servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = check_status(request.send().await?).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            Error::UnexpectedResponse(format!("{} in body: {}", e, truncate(&text, 200)))
        })
    }
}

#[async_trait]
impl AssistantsApi for OpenAIAssistants {
    async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        purpose: &str,
    ) -> Result<FileId> {
        debug!(file_name, size = bytes.len(), purpose, "uploading file");
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", purpose.to_string())
            .part("file", part);

        let created: Created = self
            .send_json(self.request(reqwest::Method::POST, "files").multipart(form))
            .await?;
        Ok(FileId::new(created.id))
    }

    async fn create_assistant(&self, config: &AssistantConfig) -> Result<AssistantId> {
        debug!(name = %config.name, model = %config.model, "creating assistant");
        let body = CreateAssistantRequest::from(config);
        let created: Created = self
            .send_json(self.request(reqwest::Method::POST, "assistants").json(&body))
            .await?;
        Ok(AssistantId::new(created.id))
    }

    async fn create_thread(&self) -> Result<ThreadId> {
        debug!("creating thread");
        let created: Created = self
            .send_json(
                self.request(reqwest::Method::POST, "threads")
                    .json(&serde_json::json!({})),
            )
            .await?;
        Ok(ThreadId::new(created.id))
    }

    async fn create_message(
        &self,
        thread: &ThreadId,
        role: Role,
        content: &str,
    ) -> Result<MessageId> {
        debug!(%thread, %role, "creating message");
        let body = CreateMessageRequest { role, content };
        let created: Created = self
            .send_json(
                self.request(reqwest::Method::POST, &format!("threads/{}/messages", thread))
                    .json(&body),
            )
            .await?;
        Ok(MessageId::new(created.id))
    }

    async fn create_run(&self, thread: &ThreadId, assistant: &AssistantId) -> Result<Run> {
        debug!(%thread, %assistant, "creating run");
        let body = CreateRunRequest {
            assistant_id: assistant,
        };
        self.send_json(
            self.request(reqwest::Method::POST, &format!("threads/{}/runs", thread))
                .json(&body),
        )
        .await
    }

    async fn get_run(&self, thread: &ThreadId, run: &RunId) -> Result<Run> {
        self.send_json(self.request(
            reqwest::Method::GET,
            &format!("threads/{}/runs/{}", thread, run),
        ))
        .await
    }

    async fn cancel_run(&self, thread: &ThreadId, run: &RunId) -> Result<Run> {
        debug!(%thread, %run, "cancelling run");
        self.send_json(self.request(
            reqwest::Method::POST,
            &format!("threads/{}/runs/{}/cancel", thread, run),
        ))
        .await
    }

    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>> {
        let list: MessageList = self
            .send_json(
                self.request(
                    reqwest::Method::GET,
                    &format!("threads/{}/messages", thread),
                )
                .query(&[
                    ("order", "desc".to_string()),
                    ("limit", MESSAGE_PAGE_SIZE.to_string()),
                ]),
            )
            .await?;
        Ok(list.data)
    }

    async fn file_content(&self, file: &FileId) -> Result<Vec<u8>> {
        debug!(%file, "downloading file content");
        let response = self
            .request(reqwest::Method::GET, &format!("files/{}/content", file))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Map non-success responses onto typed errors
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    Err(error_from_response(status.as_u16(), retry_after, &body))
}

fn error_from_response(status: u16, retry_after: Option<u64>, body: &str) -> Error {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| truncate(body, 200));

    match status {
        401 | 403 => Error::Auth(message),
        404 => Error::NotFound(message),
        429 => Error::RateLimited { retry_after },
        _ => {
            let error_type = parsed
                .and_then(|e| e.error.error_type)
                .unwrap_or_else(|| {
                    if status >= 500 {
                        "server_error".to_string()
                    } else {
                        format!("http_{}", status)
                    }
                });
            Error::api(error_type, message)
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct CreateAssistantRequest<'a> {
    model: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    tools: &'a [ToolSpec],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_resources: Option<ToolResources<'a>>,
}

impl<'a> From<&'a AssistantConfig> for CreateAssistantRequest<'a> {
    fn from(config: &'a AssistantConfig) -> Self {
        let tool_resources = if config.code_interpreter_files.is_empty() {
            None
        } else {
            Some(ToolResources {
                code_interpreter: CodeInterpreterResources {
                    file_ids: &config.code_interpreter_files,
                },
            })
        };

        Self {
            model: &config.model,
            name: &config.name,
            description: config.description.as_deref(),
            instructions: config.instructions.as_deref(),
            tools: &config.tools,
            tool_resources,
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolResources<'a> {
    code_interpreter: CodeInterpreterResources<'a>,
}

#[derive(Debug, Serialize)]
struct CodeInterpreterResources<'a> {
    file_ids: &'a [FileId],
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a AssistantId,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}
