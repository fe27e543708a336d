//! ECR authorization using the AWS CLI

use super::RegistryCredential;
use crate::error::{ReleaseError, ReleaseResult};
use crate::orchestration::{CommandRunner, ExecCommandRunner};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

/// Source of registry authorization tokens
#[async_trait]
pub trait RegistryAuthService: Send + Sync {
    /// Request a base64-encoded `username:password` token
    async fn authorization_token(&self) -> ReleaseResult<String>;
}

/// Fetches ECR tokens with `aws ecr get-authorization-token`
pub struct AwsCliEcr<R = ExecCommandRunner> {
    runner: R,
}

impl<R: CommandRunner> AwsCliEcr<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl<R: CommandRunner> RegistryAuthService for AwsCliEcr<R> {
    async fn authorization_token(&self) -> ReleaseResult<String> {
        debug!("Requesting ECR authorization token via CLI...");

        let args: Vec<String> = ["ecr", "get-authorization-token", "--output", "json"]
            .into_iter()
            .map(String::from)
            .collect();

        let stdout = self
            .runner
            .run_with_output("aws", &args)
            .await
            .map_err(|e| ReleaseError::EcrAuth(e.to_string()))?;

        let response: AuthorizationResponse = serde_json::from_str(&stdout)
            .map_err(|e| ReleaseError::EcrAuth(format!("Failed to parse response: {}", e)))?;

        response
            .authorization_data
            .into_iter()
            .next()
            .map(|data| data.authorization_token)
            .ok_or_else(|| ReleaseError::EcrAuth("No authorization data returned".to_string()))
    }
}

/// Decode an authorization token into a credential for `registry_host`
pub fn decode_token(token: &str, registry_host: &str) -> ReleaseResult<RegistryCredential> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token.trim())
        .map_err(|e| ReleaseError::MalformedToken(format!("invalid base64: {}", e)))?;

    let decoded = String::from_utf8(decoded)
        .map_err(|e| ReleaseError::MalformedToken(format!("invalid UTF-8: {}", e)))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| ReleaseError::MalformedToken("expected username:password".to_string()))?;

    let credential = RegistryCredential::new(registry_host, username, password);
    if !credential.is_present() {
        return Err(ReleaseError::MalformedToken(
            "username or password is empty".to_string(),
        ));
    }
    Ok(credential)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationResponse {
    #[serde(default)]
    authorization_data: Vec<AuthorizationData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationData {
    authorization_token: String,
}
