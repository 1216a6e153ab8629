//! Optional delivery of the assembled PDF by email.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::error::{QuillError, RemoteError};
use crate::observe::{Observer, RunEvent};
use crate::vault::Secret;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Parse one RFC 5322 address. `role` names the field in the error.
///
/// # Errors
///
/// Returns [`QuillError::Configuration`] if `address` is not a single mailbox.
pub fn parse_mailbox(role: &str, address: &str) -> Result<Mailbox, QuillError> {
    address
        .parse()
        .map_err(|e| QuillError::config(format!("invalid {role} address {address}: {e}")))
}

/// One message with one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

impl OutgoingMail {
    /// Render as a MIME message.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Configuration`] for malformed addresses.
    pub fn to_message(&self) -> Result<Message, QuillError> {
        let from = parse_mailbox("sender", &self.from)?;
        let to = parse_mailbox("recipient", &self.to)?;
        let content_type = ContentType::parse(PDF_CONTENT_TYPE)
            .map_err(|e| QuillError::config(format!("invalid content type: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(self.body.clone()))
                    .singlepart(
                        Attachment::new(self.attachment_name.clone())
                            .body(self.attachment.clone(), content_type),
                    ),
            )
            .map_err(|e| QuillError::config(format!("cannot build email: {e}")))
    }
}

pub trait MailTransport: Send + Sync {
    fn send(
        &self,
        mail: OutgoingMail,
    ) -> Pin<Box<dyn Future<Output = Result<(), QuillError>> + Send + '_>>;
}

/// SMTP with STARTTLS and username/password login.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// # Errors
    ///
    /// Returns [`QuillError::Configuration`] if the relay host is invalid.
    pub fn new(config: &EmailConfig, password: &Secret) -> Result<Self, QuillError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .map_err(|e| QuillError::config(format!("invalid SMTP server: {e}")))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                password.expose().to_owned(),
            ))
            .build();
        Ok(Self { transport })
    }
}

impl MailTransport for SmtpMailer {
    fn send(
        &self,
        mail: OutgoingMail,
    ) -> Pin<Box<dyn Future<Output = Result<(), QuillError>> + Send + '_>> {
        Box::pin(async move {
            let message = mail.to_message()?;
            self.transport
                .send(message)
                .await
                .map_err(|e| RemoteError::Smtp(e.to_string()))?;
            Ok(())
        })
    }
}

/// Keeps messages in memory instead of sending them.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl MailTransport for RecordingTransport {
    fn send(
        &self,
        mail: OutgoingMail,
    ) -> Pin<Box<dyn Future<Output = Result<(), QuillError>> + Send + '_>> {
        Box::pin(async move {
            mail.to_message()?;
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(mail);
            }
            Ok(())
        })
    }
}

pub struct Notifier {
    email: Option<(EmailConfig, Arc<dyn MailTransport>)>,
    observer: Arc<dyn Observer>,
}

impl Notifier {
    /// A notifier with no email settings; every call is a no-op.
    #[must_use]
    pub fn disabled(observer: Arc<dyn Observer>) -> Self {
        Self {
            email: None,
            observer,
        }
    }

    #[must_use]
    pub fn new(
        email: EmailConfig,
        transport: Arc<dyn MailTransport>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            email: Some((email, transport)),
            observer,
        }
    }

    /// Email the PDF at `pdf_path` when `send` is set and email is configured.
    /// Returns whether a message was sent.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Io`] if the PDF cannot be read and
    /// [`QuillError::Remote`] if SMTP delivery fails.
    pub async fn notify(&self, pdf_path: &Path, send: bool) -> Result<bool, QuillError> {
        if !send {
            self.observer.on_event(&RunEvent::EmailSkipped {
                reason: "sending not requested",
            });
            return Ok(false);
        }
        let Some((email, transport)) = &self.email else {
            self.observer.on_event(&RunEvent::EmailSkipped {
                reason: "no email configuration",
            });
            return Ok(false);
        };

        let attachment = tokio::fs::read(pdf_path).await?;
        let attachment_name = pdf_path
            .file_name()
            .map_or_else(|| "proposal_response.pdf".to_owned(), |n| {
                n.to_string_lossy().into_owned()
            });

        transport
            .send(OutgoingMail {
                from: email.from.clone(),
                to: email.to.clone(),
                subject: email.subject.clone(),
                body: email.body.clone(),
                attachment_name,
                attachment,
            })
            .await?;

        self.observer.on_event(&RunEvent::EmailSent {
            to: email.to.clone(),
        });
        Ok(true)
    }
}
