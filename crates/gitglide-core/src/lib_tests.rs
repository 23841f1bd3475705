//! Tests for the gitglide-core library module.

use super::*;

#[test]
fn test_user_id_validation() {
    assert!(UserId::new("user_2abc").is_ok());
    assert!(matches!(
        UserId::new(""),
        Err(ValidationError::Required { .. })
    ));
    assert!(matches!(
        UserId::new("a".repeat(256)),
        Err(ValidationError::TooLong { .. })
    ));
}

#[test]
fn test_project_id_rejects_whitespace() {
    let invalid = ProjectId::new("prj 123");
    assert!(matches!(
        invalid,
        Err(ValidationError::InvalidCharacters { .. })
    ));

    let valid: ProjectId = "prj_123".parse().unwrap();
    assert_eq!(valid.as_str(), "prj_123");
}

#[test]
fn test_capability_key_format() {
    let project = ProjectId::new("prj_abc").unwrap();
    let key = CapabilityKey::for_vercel_project(&project);

    assert_eq!(key.as_str(), "vercel_project_prj_abc");
    assert_eq!(key.vercel_project_id(), Some("prj_abc"));
}

#[test]
fn test_webhook_log_id_round_trips_through_string() {
    let id = WebhookLogId::new();
    let parsed: WebhookLogId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);

    assert!("not-a-ulid".parse::<WebhookLogId>().is_err());
}

#[test]
fn test_timestamp_subtract_and_duration_since() {
    let now = Timestamp::now();
    let earlier = now.subtract_duration(Duration::from_secs(90));

    assert!(earlier < now);
    assert_eq!(now.duration_since(earlier), Duration::from_secs(90));
    assert_eq!(earlier.duration_since(now), Duration::ZERO);
}

#[test]
fn test_remediation_error_messages() {
    let missing = RemediationError::CredentialMissing {
        provider: Provider::Jules,
    };
    assert_eq!(missing.to_string(), "Jules API key not found");

    let session = RemediationError::SessionCreate {
        status: 403,
        body: "forbidden".to_string(),
    };
    assert_eq!(
        session.to_string(),
        "Failed to create Jules session. Status: 403. Body: forbidden"
    );

    let linkage = RemediationError::MissingRepositoryLinkage {
        missing: vec!["githubCommitRef"],
    };
    assert!(linkage
        .to_string()
        .starts_with("Deployment does not have GitHub linkage metadata"));
}

#[test]
fn test_remediation_error_classification() {
    let timeout = RemediationError::Upstream(UpstreamError::Timeout {
        service: "vercel",
        timeout_seconds: 10,
    });
    assert!(timeout.is_transient());
    assert_eq!(timeout.error_category(), ErrorCategory::Transient);

    let config = RemediationError::Configuration {
        message: "public base URL is not set".to_string(),
    };
    assert!(!config.is_transient());
    assert_eq!(config.error_category(), ErrorCategory::Configuration);

    let linkage = RemediationError::MissingRepositoryLinkage { missing: vec![] };
    assert_eq!(linkage.error_category(), ErrorCategory::Permanent);
}
