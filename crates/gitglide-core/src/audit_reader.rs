//! # Audit Log Reader
//!
//! Joins a deployment listing with the user's recent audit rows so each
//! deployment carries its auto-fix status.

use crate::storage::StorageError;
use crate::upstream::{DeploymentCreator, DeploymentSummary};
use crate::webhook_log::{LogStatus, WebhookLog, WebhookLogQuery, WebhookLogStore, SOURCE_VERCEL};
use crate::UserId;
use serde::Serialize;
use std::sync::Arc;

/// Number of audit rows consulted when annotating a listing
pub const RECENT_LOG_LIMIT: usize = 50;

/// Deployment annotated with its most recent remediation outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedDeployment {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub state: Option<String>,
    pub target: Option<String>,
    pub created_at: Option<i64>,
    pub creator: Option<DeploymentCreator>,
    pub inspector_url: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub fix_status: Option<LogStatus>,
    pub jules_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Annotate deployments with the first matching row of `logs`
///
/// `logs` must be ordered newest first; the first row whose deployment
/// matches wins. Deployments without a match carry no fix status.
pub fn annotate_deployments(
    deployments: Vec<DeploymentSummary>,
    logs: &[WebhookLog],
) -> Vec<AnnotatedDeployment> {
    deployments
        .into_iter()
        .map(|deployment| {
            let id = deployment.deployment_id().map(str::to_string);
            let log = id.as_deref().and_then(|id| {
                logs.iter().find(|l| {
                    l.deployment_id
                        .as_ref()
                        .is_some_and(|d| d.as_str() == id)
                })
            });

            AnnotatedDeployment {
                id,
                name: deployment.name,
                url: deployment.url.map(|u| format!("https://{}", u)),
                state: deployment.state,
                target: deployment.target,
                created_at: deployment.created,
                creator: deployment.creator,
                inspector_url: deployment.inspector_url,
                meta: deployment.meta,
                fix_status: log.map(|l| l.status),
                jules_session_id: log.and_then(|l| l.session_id.clone()),
                error_message: log.and_then(|l| l.error_message().map(str::to_string)),
            }
        })
        .collect()
}

/// Reads the user's recent audit rows for listing annotation
pub struct AuditLogReader {
    logs: Arc<dyn WebhookLogStore>,
}

impl AuditLogReader {
    pub fn new(logs: Arc<dyn WebhookLogStore>) -> Self {
        Self { logs }
    }

    /// The user's most recent deployment-platform rows, newest first
    pub async fn recent_for_user(&self, user_id: &UserId) -> Result<Vec<WebhookLog>, StorageError> {
        let query = WebhookLogQuery::for_user(user_id.clone())
            .with_source(SOURCE_VERCEL)
            .with_limit(RECENT_LOG_LIMIT);
        self.logs.list_recent(&query).await
    }

    /// Annotate a deployment listing for the user
    pub async fn annotate(
        &self,
        user_id: &UserId,
        deployments: Vec<DeploymentSummary>,
    ) -> Result<Vec<AnnotatedDeployment>, StorageError> {
        let logs = self.recent_for_user(user_id).await?;
        Ok(annotate_deployments(deployments, &logs))
    }
}

#[cfg(test)]
#[path = "audit_reader_tests.rs"]
mod tests;
