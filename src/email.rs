use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpSettings;

/// Transactional mail sender. Callers treat send failures as best-effort:
/// they log and carry on, because the flows that send mail (registration,
/// forgot-password) have already done their primary work.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, String> {
        let transport = if settings.use_tls {
            let creds = Credentials::new(settings.username.clone(), settings.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| format!("Failed to create SMTP relay: {}", e))?
                .credentials(creds)
                .port(settings.port)
                .build()
        } else if !settings.username.is_empty() {
            let creds = Credentials::new(settings.username.clone(), settings.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .credentials(creds)
                .port(settings.port)
                .build()
        } else {
            // No auth (local dev relay)
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .port(settings.port)
                .build()
        };

        let from: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .map_err(|e| format!("Invalid from address: {}", e))?;

        Ok(Mailer { transport, from })
    }

    pub async fn send_welcome_email(
        &self,
        to: &str,
        full_name: &str,
        client_url: &str,
    ) -> Result<(), String> {
        let body = format!(
            "Hi {},\n\n\
             Welcome to MB Events! Your account is ready.\n\
             Log in at {} to start browsing events.\n",
            full_name, client_url
        );
        self.send(to, "Welcome to MB Events", body).await
    }

    pub async fn send_reset_password_email(
        &self,
        to: &str,
        full_name: &str,
        reset_url: &str,
    ) -> Result<(), String> {
        let body = format!(
            "Hi {},\n\n\
             We received a request to reset your password.\n\
             The link below is valid for 15 minutes:\n\
             {}\n\n\
             If you did not request this, you can ignore this email.\n",
            full_name, reset_url
        );
        self.send(to, "Reset your MB Events password", body).await
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), String> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| format!("Invalid recipient address: {}", e))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| format!("Failed to build message: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| format!("Failed to send email: {}", e))?;

        info!(to = %to, subject = %subject, "Email sent");

        Ok(())
    }
}
