//! Operator alert emails via SMTP.
//!
//! [`AlertMailer`] wraps the `lettre` async SMTP transport to notify
//! operators when chain verification finds integrity issues.
//! Configuration is loaded from environment variables; if `SMTP_HOST`
//! is not set, [`EmailConfig::from_env`] returns `None` and alerting is
//! skipped.

use veritax_core::chain::ChainVerification;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for alert delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@veritax.local";

/// Configuration for the SMTP alert mailer.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// alerting is not configured and should be skipped.
    ///
    /// | Variable        | Required | Default                  |
    /// |-----------------|----------|--------------------------|
    /// | `SMTP_HOST`     | yes      | —                        |
    /// | `SMTP_PORT`     | no       | `587`                    |
    /// | `SMTP_FROM`     | no       | `noreply@veritax.local`  |
    /// | `SMTP_USER`     | no       | —                        |
    /// | `SMTP_PASSWORD` | no       | —                        |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// AlertMailer
// ---------------------------------------------------------------------------

/// Sends integrity alert emails via SMTP.
pub struct AlertMailer {
    config: EmailConfig,
}

impl AlertMailer {
    /// Create a new alert mailer with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Email a chain verification report enumerating every issue.
    pub async fn send_chain_alert(
        &self,
        to_email: &str,
        verification: &ChainVerification,
    ) -> Result<(), AlertError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let subject = format!(
            "[Veritax] Audit chain verification failed: {} issue(s)",
            verification.issues.len()
        );
        let body = format_chain_report(verification);

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AlertError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(
            to = to_email,
            issues = verification.issues.len(),
            "Chain integrity alert email sent"
        );
        Ok(())
    }
}

/// Render a verification result as a plain-text report, one block per
/// issue.
fn format_chain_report(verification: &ChainVerification) -> String {
    let mut body = format!(
        "Audit chain verification walked {} record(s) and found {} issue(s).\n\n",
        verification.checked,
        verification.issues.len()
    );
    for issue in &verification.issues {
        body.push_str(&format!(
            "Record {} ({}, {}):\n  {}\n  expected: {}\n  actual:   {}\n\n",
            issue.log_id,
            issue.action_type,
            issue.timestamp.to_rfc3339(),
            issue.message,
            issue.expected,
            issue.actual,
        ));
    }
    body
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veritax_core::chain::{ChainIssue, ChainIssueKind};

    #[test]
    fn alert_error_display_build() {
        let err = AlertError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[test]
    fn report_lists_every_issue() {
        let verification = ChainVerification {
            is_valid: false,
            checked: 10,
            issues: vec![
                ChainIssue {
                    log_id: 4,
                    timestamp: Utc::now(),
                    action_type: "import_batch".to_string(),
                    kind: ChainIssueKind::ContentMismatch,
                    message: "stored hash does not match recomputed content hash for record 4"
                        .to_string(),
                    expected: "aaaa".to_string(),
                    actual: "bbbb".to_string(),
                },
                ChainIssue {
                    log_id: 5,
                    timestamp: Utc::now(),
                    action_type: "bulk_edit".to_string(),
                    kind: ChainIssueKind::LinkMismatch,
                    message: "previous-hash link broken at record 5".to_string(),
                    expected: "cccc".to_string(),
                    actual: "dddd".to_string(),
                },
            ],
        };

        let report = format_chain_report(&verification);
        assert!(report.contains("walked 10 record(s)"));
        assert!(report.contains("Record 4"));
        assert!(report.contains("Record 5"));
        assert!(report.contains("expected: aaaa"));
        assert!(report.contains("actual:   dddd"));
    }
}
