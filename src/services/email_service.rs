use chrono::Utc;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub struct EmailTemplate {
    pub subject_template: &'static str,
    pub text_template: &'static str,
    pub html_template: &'static str,
}

pub const WELCOME_TEMPLATE: EmailTemplate = EmailTemplate {
    subject_template: "Welcome to {{app_name}}, {{user_name}}!",
    text_template: "Hi {{user_name}},\n\n\
        Your {{app_name}} account is ready. Build your first routine and start a session at {{app_url}}.\n\n\
        See you at the gym,\nThe {{app_name}} team\n{{current_date}}",
    html_template: "<html><body><h2>Hi {{user_name}},</h2>\
        <p>Your {{app_name}} account is ready. Build your first routine and start a session at \
        <a href=\"{{app_url}}\">{{app_url}}</a>.</p>\
        <p>See you at the gym,<br>The {{app_name}} team</p></body></html>",
};

pub const PASSWORD_RESET_TEMPLATE: EmailTemplate = EmailTemplate {
    subject_template: "Reset your {{app_name}} password",
    text_template: "Hi {{user_name}},\n\n\
        Someone asked to reset the password for your {{app_name}} account. \
        Use this link within one hour:\n\n{{reset_link}}\n\n\
        If it was not you, ignore this email; your password stays the same.",
    html_template: "<html><body><h2>Hi {{user_name}},</h2>\
        <p>Someone asked to reset the password for your {{app_name}} account. \
        Use this link within one hour:</p>\
        <p><a href=\"{{reset_link}}\">Reset password</a></p>\
        <p>If it was not you, ignore this email; your password stays the same.</p></body></html>",
};

/// Replace every `{{key}}` with its value
pub fn render_template(template: &str, context: &[(&str, &str)]) -> String {
    context
        .iter()
        .fold(template.to_string(), |rendered, (key, value)| {
            rendered.replace(&format!("{{{{{}}}}}", key), value)
        })
}

/// Transactional email over SMTP. Without a host, messages are logged only.
#[derive(Clone)]
pub struct EmailService {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    app_name: String,
    app_url: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("enabled", &self.transport.is_some())
            .field("from", &self.from.to_string())
            .finish()
    }
}

impl EmailService {
    pub fn new(config: &SmtpConfig, app_url: &str) -> Result<Self, EmailError> {
        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidEmailAddress(e.to_string()))?;

        let transport = match &config.host {
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| EmailError::SmtpConnectionFailed(e.to_string()))?
                    .port(config.port);

                if let (Some(username), Some(password)) = (&config.username, &config.password) {
                    builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
                }

                Some(builder.build())
            }
            None => {
                tracing::warn!("SMTP_HOST not set; emails will be logged instead of sent");
                None
            }
        };

        Ok(Self {
            transport,
            from,
            app_name: config.from_name.clone(),
            app_url: app_url.trim_end_matches('/').to_string(),
        })
    }

    /// Service that never delivers; used by tests and tools
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: Mailbox::new(
                Some("Routine Coach".to_string()),
                "noreply@routine-coach.app"
                    .parse()
                    .expect("static address is valid"),
            ),
            app_name: "Routine Coach".to_string(),
            app_url: "http://localhost:5173".to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn build_message(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<Message, EmailError> {
        let to = to_email
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidEmailAddress(e.to_string()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text_body.to_string(),
                html_body.to_string(),
            ))
            .map_err(|e| EmailError::EmailSendingFailed(e.to_string()))
    }

    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let message = self.build_message(to_email, subject, text_body, html_body)?;

        match &self.transport {
            Some(transport) => {
                transport
                    .send(message)
                    .await
                    .map_err(|e| EmailError::EmailSendingFailed(e.to_string()))?;
                tracing::info!("Sent email '{}' to {}", subject, to_email);
            }
            None => {
                tracing::info!("Email delivery disabled; would send '{}' to {}", subject, to_email);
                tracing::debug!("Email body:\n{}", text_body);
            }
        }

        Ok(())
    }

    async fn send_template(
        &self,
        template: &EmailTemplate,
        to_email: &str,
        extra: &[(&str, &str)],
    ) -> Result<(), EmailError> {
        let current_date = Utc::now().format("%B %d, %Y").to_string();
        let mut context: Vec<(&str, &str)> = vec![
            ("app_name", self.app_name.as_str()),
            ("app_url", self.app_url.as_str()),
            ("current_date", current_date.as_str()),
        ];
        context.extend_from_slice(extra);

        let subject = render_template(template.subject_template, &context);
        let text_body = render_template(template.text_template, &context);
        let html_body = render_template(template.html_template, &context);

        self.send_email(to_email, &subject, &text_body, &html_body).await
    }

    pub async fn send_welcome(&self, to_email: &str, user_name: &str) -> Result<(), EmailError> {
        self.send_template(&WELCOME_TEMPLATE, to_email, &[("user_name", user_name)])
            .await
    }

    pub async fn send_password_reset(
        &self,
        to_email: &str,
        user_name: &str,
        reset_token: &str,
    ) -> Result<(), EmailError> {
        let reset_link = self.reset_link(reset_token);
        self.send_template(
            &PASSWORD_RESET_TEMPLATE,
            to_email,
            &[("user_name", user_name), ("reset_link", reset_link.as_str())],
        )
        .await
    }

    pub fn reset_link(&self, reset_token: &str) -> String {
        format!("{}/reset-password?token={}", self.app_url, reset_token)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("SMTP connection failed: {0}")]
    SmtpConnectionFailed(String),
    #[error("Email sending failed: {0}")]
    EmailSendingFailed(String),
    #[error("Invalid email address: {0}")]
    InvalidEmailAddress(String),
}
