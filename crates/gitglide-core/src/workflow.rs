//! # Remediation Workflow
//!
//! Consumes one [`BuildFailedEvent`] and tries to open a Jules session that
//! fixes the failing deployment.
//!
//! ```text
//! create log (processing)
//!   -> load credentials          [CredentialsLoaded]
//!   -> fetch deployment detail   [DeploymentFetched]
//!   -> derive repository context [RepositoryResolved]
//!   -> create agent session      [SessionCreated]
//!   -> log success | log failure
//! ```
//!
//! Every step after the log row exists either completes or routes the run to
//! the failure branch, so the row never stays `processing` once [`run`]
//! returns. Checkpoints are written as each step completes. Nothing is
//! retried.
//!
//! [`run`]: RemediationWorkflow::run

use crate::credential_vault::{CredentialVault, Provider, SecretToken};
use crate::event_queue::BuildFailedEvent;
use crate::upstream::{
    AgentSessionService, AutomationMode, DeploymentDetail, DeploymentPlatform, GithubRepoContext,
    SessionRequest, SourceContext, UpstreamError,
};
use crate::webhook_log::{
    LogCreation, LogOutcome, NewWebhookLog, WebhookLogStore, WorkflowStep, SOURCE_VERCEL,
};
use crate::{RemediationError, WebhookLogId};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Deployment metadata keys identifying the source repository
const META_REPO: &str = "githubCommitRepo";
const META_ORG: &str = "githubCommitOrg";
const META_BRANCH: &str = "githubCommitRef";

/// Workflow settings derived from service configuration
#[derive(Debug, Clone, Default)]
pub struct WorkflowSettings {
    /// Skip events for deployments that already have a processing or
    /// successful run
    pub skip_duplicate_deployments: bool,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// A session was opened and the log row marked `success`
    SessionCreated {
        log_id: WebhookLogId,
        session_id: String,
    },
    /// The deployment already has an active or successful run
    SkippedDuplicate { existing_log_id: WebhookLogId },
}

/// Repository and branch the agent should work on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryContext {
    pub org: String,
    pub repo: String,
    pub branch: String,
}

impl RepositoryContext {
    /// Derive the context from deployment metadata
    ///
    /// # Errors
    ///
    /// [`RemediationError::MissingRepositoryLinkage`] naming every absent key.
    pub fn from_deployment(detail: &DeploymentDetail) -> Result<Self, RemediationError> {
        let repo = detail.meta_str(META_REPO);
        let org = detail.meta_str(META_ORG);
        let branch = detail.meta_str(META_BRANCH);

        match (org, repo, branch) {
            (Some(org), Some(repo), Some(branch)) => Ok(Self {
                org: org.to_string(),
                repo: repo.to_string(),
                branch: branch.to_string(),
            }),
            _ => {
                let missing = [(META_REPO, repo), (META_ORG, org), (META_BRANCH, branch)]
                    .into_iter()
                    .filter(|(_, value)| value.is_none())
                    .map(|(key, _)| key)
                    .collect();
                Err(RemediationError::MissingRepositoryLinkage { missing })
            }
        }
    }

    /// Agent source identifier, `sources/github-{org}-{repo}`
    pub fn source(&self) -> String {
        format!("sources/github-{}-{}", self.org, self.repo)
    }
}

/// Build the session request for a failed deployment
pub fn build_session_request(
    event: &BuildFailedEvent,
    detail: &DeploymentDetail,
    context: &RepositoryContext,
) -> SessionRequest {
    let target = event
        .deployment_url()
        .unwrap_or_else(|| event.deployment_id.as_str());

    let prompt = format!(
        "Fix the build failure in Vercel project deployment: {}.\n\
         Event: {}.\n\
         Please check the latest build logs or error trace and resolve the issue. \
         If it's a type error or lint error, please supply the fixes.",
        target, event.event_type
    );

    let name = detail
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| event.project_id.as_str());

    SessionRequest {
        prompt,
        title: format!("Fix Vercel Build - {}", name),
        source_context: SourceContext {
            source: context.source(),
            github_repo_context: GithubRepoContext {
                starting_branch: context.branch.clone(),
            },
        },
        require_plan_approval: false,
        automation_mode: AutomationMode::AutoCreatePr,
    }
}

struct Credentials {
    vercel_token: SecretToken,
    jules_api_key: SecretToken,
}

/// Step-wise remediation engine
pub struct RemediationWorkflow {
    vault: Arc<dyn CredentialVault>,
    logs: Arc<dyn WebhookLogStore>,
    platform: Arc<dyn DeploymentPlatform>,
    agent: Arc<dyn AgentSessionService>,
    settings: WorkflowSettings,
}

impl RemediationWorkflow {
    pub fn new(
        vault: Arc<dyn CredentialVault>,
        logs: Arc<dyn WebhookLogStore>,
        platform: Arc<dyn DeploymentPlatform>,
        agent: Arc<dyn AgentSessionService>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            vault,
            logs,
            platform,
            agent,
            settings,
        }
    }

    /// Run the workflow for one event
    ///
    /// Returns the error that ended the run after recording it on the log
    /// row. When the log row itself cannot be created the error is returned
    /// without any row existing.
    #[instrument(
        skip(self, event),
        fields(
            user_id = %event.user_id,
            project_id = %event.project_id,
            deployment_id = %event.deployment_id,
        )
    )]
    pub async fn run(&self, event: &BuildFailedEvent) -> Result<WorkflowOutcome, RemediationError> {
        let new_log = NewWebhookLog {
            user_id: Some(event.user_id.clone()),
            source: SOURCE_VERCEL.to_string(),
            event: event.event_type.clone(),
            deployment_id: Some(event.deployment_id.clone()),
            payload: event.payload.clone(),
        };

        let log = if self.settings.skip_duplicate_deployments {
            match self.logs.create_unless_active(new_log).await? {
                LogCreation::Created(log) => log,
                LogCreation::Existing(existing) => {
                    info!(existing_log_id = %existing.id, "Deployment already handled; skipping");
                    return Ok(WorkflowOutcome::SkippedDuplicate {
                        existing_log_id: existing.id,
                    });
                }
            }
        } else {
            self.logs.create(new_log).await?
        };

        match self.execute(&log.id, event).await {
            Ok(session_id) => {
                let outcome = LogOutcome::Success {
                    session_id: session_id.clone(),
                };
                if let Err(e) = self.logs.complete(&log.id, outcome).await {
                    error!(
                        log_id = %log.id,
                        session_id = %session_id,
                        error = %e,
                        "Session created but success could not be recorded"
                    );
                    return Err(e.into());
                }
                info!(log_id = %log.id, session_id = %session_id, "Remediation session created");
                Ok(WorkflowOutcome::SessionCreated {
                    log_id: log.id,
                    session_id,
                })
            }
            Err(e) => {
                error!(log_id = %log.id, error = %e, "Remediation workflow failed");
                let outcome = LogOutcome::Failed {
                    error: e.to_string(),
                };
                if let Err(log_error) = self.logs.complete(&log.id, outcome).await {
                    error!(
                        log_id = %log.id,
                        error = %log_error,
                        "Failed to record workflow failure"
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        log_id: &WebhookLogId,
        event: &BuildFailedEvent,
    ) -> Result<String, RemediationError> {
        let credentials = self.load_credentials(event).await?;
        self.checkpoint(log_id, WorkflowStep::CredentialsLoaded).await;

        let detail = self
            .platform
            .get_deployment(&credentials.vercel_token, &event.deployment_id)
            .await?;
        self.checkpoint(log_id, WorkflowStep::DeploymentFetched).await;

        let context = RepositoryContext::from_deployment(&detail)?;
        self.checkpoint(log_id, WorkflowStep::RepositoryResolved).await;

        let request = build_session_request(event, &detail, &context);
        let session = self
            .agent
            .create_session(&credentials.jules_api_key, &request)
            .await
            .map_err(|e| match e {
                UpstreamError::HttpError { status, body, .. } => {
                    RemediationError::SessionCreate { status, body }
                }
                other => RemediationError::Upstream(other),
            })?;
        self.checkpoint(log_id, WorkflowStep::SessionCreated).await;

        Ok(session.id)
    }

    async fn load_credentials(
        &self,
        event: &BuildFailedEvent,
    ) -> Result<Credentials, RemediationError> {
        let vercel_token = self
            .vault
            .get_token(&event.user_id, Provider::Vercel)
            .await?
            .ok_or(RemediationError::CredentialMissing {
                provider: Provider::Vercel,
            })?;
        let jules_api_key = self
            .vault
            .get_token(&event.user_id, Provider::Jules)
            .await?
            .ok_or(RemediationError::CredentialMissing {
                provider: Provider::Jules,
            })?;

        Ok(Credentials {
            vercel_token,
            jules_api_key,
        })
    }

    async fn checkpoint(&self, log_id: &WebhookLogId, step: WorkflowStep) {
        if let Err(e) = self.logs.record_step(log_id, step).await {
            warn!(log_id = %log_id, step = %step, error = %e, "Failed to record checkpoint");
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
