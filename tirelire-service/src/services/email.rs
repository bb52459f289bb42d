use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use service_core::error::AppError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SmtpConfig;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let builder = if config.host == "localhost" || config.host == "127.0.0.1" {
            SmtpTransport::builder_dangerous(&config.host)
        } else {
            SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| AppError::EmailError(e.to_string()))?
        };

        let builder = match (&config.user, &config.password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };

        let mailer = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, port = config.port, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: String,
        html_body: String,
    ) -> Result<(), AppError> {
        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| AppError::EmailError(e.to_string()))?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::EmailError(e.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        // SmtpTransport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let link = format!("{}/auth/validate?token={}", base_url, verification_token);

        let html_body = format!(
            r#"<html>
  <body style="font-family: Arial, sans-serif;">
    <h2>Bienvenue sur Tirelire</h2>
    <p>Merci pour votre inscription. Cliquez sur le lien ci-dessous pour confirmer votre adresse email :</p>
    <p><a href="{link}" style="background-color: #2E7D32; color: white; padding: 12px 18px; text-decoration: none; border-radius: 4px;">Confirmer mon email</a></p>
    <p style="color: #666; font-size: 12px;">Ce lien expire dans 24 heures. Si vous n'êtes pas à l'origine de cette demande, ignorez ce message.</p>
  </body>
</html>"#
        );

        let plain_body = format!(
            "Bienvenue sur Tirelire\n\nConfirmez votre adresse email en ouvrant ce lien :\n{link}\n\nCe lien expire dans 24 heures."
        );

        self.send_email(to_email, "Confirmez votre adresse email", plain_body, html_body)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let link = format!("{}/auth/reset?token={}", base_url, reset_token);

        let html_body = format!(
            r#"<html>
  <body style="font-family: Arial, sans-serif;">
    <h2>Réinitialisation du mot de passe</h2>
    <p>Nous avons reçu une demande de réinitialisation de votre mot de passe. Cliquez sur le lien ci-dessous pour en choisir un nouveau :</p>
    <p><a href="{link}" style="background-color: #1565C0; color: white; padding: 12px 18px; text-decoration: none; border-radius: 4px;">Choisir un nouveau mot de passe</a></p>
    <p style="color: #666; font-size: 12px;">Ce lien expire dans 1 heure. Si vous n'êtes pas à l'origine de cette demande, ignorez ce message.</p>
  </body>
</html>"#
        );

        let plain_body = format!(
            "Réinitialisation du mot de passe\n\nChoisissez un nouveau mot de passe en ouvrant ce lien :\n{link}\n\nCe lien expire dans 1 heure."
        );

        self.send_email(to_email, "Réinitialisez votre mot de passe", plain_body, html_body)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentEmailKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub kind: SentEmailKind,
    pub to: String,
    pub token: String,
}

/// Records outgoing mail instead of sending it. `failing()` simulates an
/// unreachable SMTP server.
#[derive(Clone, Default)]
pub struct MockEmailService {
    outbox: Arc<Mutex<Vec<SentEmail>>>,
    fail: bool,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Token of the most recent mail of `kind` sent to `to`.
    pub fn last_token(&self, kind: SentEmailKind, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .map(|m| m.token)
    }

    fn record(&self, kind: SentEmailKind, to: &str, token: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::EmailError("SMTP server unreachable".to_string()));
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("mock outbox poisoned")))?;
        outbox.push(SentEmail {
            kind,
            to: to.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        _base_url: &str,
    ) -> Result<(), AppError> {
        self.record(SentEmailKind::Verification, to_email, verification_token)
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        _base_url: &str,
    ) -> Result<(), AppError> {
        self.record(SentEmailKind::PasswordReset, to_email, reset_token)
    }
}
