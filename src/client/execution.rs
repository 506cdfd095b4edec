//! 외부 코드 실행 서비스 클라이언트

use crate::config::ClientConfig;
use crate::error::ExecutionError;
use crate::languages;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: [SourceFile<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SourceFile<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    run: RunResult,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    #[serde(default)]
    output: String,
    #[serde(default)]
    stderr: Option<String>,
}

/// 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub output: String,
    /// stderr가 비어 있지 않았는지
    pub failed: bool,
}

impl ExecutionReport {
    /// 출력 패널에 보여줄 텍스트
    pub fn render(&self) -> String {
        if self.failed {
            format!("Error!!\n\n{}", self.output)
        } else {
            self.output.clone()
        }
    }
}

pub struct ExecutionClient {
    url: String,
    http: reqwest::Client,
}

impl ExecutionClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            url: config.execution_url.clone(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn execute(&self, language: &str, source: &str) -> Result<ExecutionReport, ExecutionError> {
        if source.is_empty() {
            return Err(ExecutionError::EmptySource);
        }
        let version = languages::version_for(language)
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(language.to_string()))?;

        let request = ExecuteRequest {
            language,
            version,
            files: [SourceFile { content: source }],
        };

        let response: ExecuteResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let failed = response
            .run
            .stderr
            .as_deref()
            .is_some_and(|stderr| !stderr.is_empty());
        tracing::debug!(language = %language, failed, "Code execution finished");

        Ok(ExecutionReport {
            output: response.run.output,
            failed,
        })
    }
}
