//! Notification delivery
//!
//! The escalation worker talks to a [`Mailer`]. Production uses SMTP via
//! lettre's async transport; with mail disabled, notices go to the log.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use helpdesk_core::config::MailSection;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::db::repos::EscalatedTicket;

/// Mail error type
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A plain-text message to one or more recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), MailError>;
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_owned(),
        source,
    })
}

/// SMTP delivery
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &MailSection) -> Result<Self, MailError> {
        let from = mailbox(&config.from)?;
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        let mut builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        let mut message = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for address in &notification.to {
            message = message.to(mailbox(address)?);
        }
        let message = message.body(notification.body.clone())?;

        self.transport.send(message).await?;
        tracing::debug!(recipients = notification.to.len(), "mail sent");
        Ok(())
    }
}

/// Writes notifications to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        tracing::info!(
            to = %notification.to.join(", "),
            subject = %notification.subject,
            "mail disabled, notification not sent"
        );
        Ok(())
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}

/// Pick the mailer for this configuration.
pub fn build_mailer(config: &MailSection) -> Result<Arc<dyn Mailer>, MailError> {
    if config.enabled {
        tracing::info!(host = %config.smtp_host, port = config.smtp_port, "SMTP mailer configured");
        Ok(Arc::new(SmtpMailer::from_config(config)?))
    } else {
        Ok(Arc::new(LogMailer))
    }
}

/// Notice for a freshly escalated ticket.
///
/// Goes to the assignee (the creator when unassigned) plus the configured
/// admin recipients. `None` when nobody has an address.
pub fn escalation_notice(
    ticket: &EscalatedTicket,
    admin_recipients: &[String],
) -> Option<Notification> {
    let owner = match &ticket.assignee_email {
        Some(email) => email.as_str(),
        None => ticket.creator_email.as_str(),
    };

    let to: BTreeSet<String> = std::iter::once(owner)
        .chain(admin_recipients.iter().map(String::as_str))
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect();
    if to.is_empty() {
        return None;
    }

    let assignee = ticket.assignee_name.as_deref().unwrap_or("unassigned");
    let body = format!(
        "Ticket \"{title}\" has been escalated.\n\n\
         Ticket:          {id}\n\
         Priority:        {priority}\n\
         Previous status: {previous}\n\
         Last activity:   {updated}\n\
         Created by:      {creator}\n\
         Assigned to:     {assignee}\n",
        title = ticket.title,
        id = ticket.id,
        priority = ticket.priority.as_str(),
        previous = ticket.previous_status.as_str(),
        updated = ticket.updated_at.to_rfc3339(),
        creator = ticket.created_by_name,
        assignee = assignee,
    );

    Some(Notification {
        to: to.into_iter().collect(),
        subject: format!("[{}] Ticket escalated: {}", ticket.priority.as_str(), ticket.title),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use helpdesk_core::{Priority, TicketStatus};
    use uuid::Uuid;

    fn ticket(assignee_email: Option<&str>) -> EscalatedTicket {
        EscalatedTicket {
            id: Uuid::new_v4(),
            title: "Printer on fire".into(),
            priority: Priority::High,
            previous_status: TicketStatus::Open,
            updated_at: Utc::now(),
            escalation_date: Some(Utc::now()),
            created_by_name: "Ada Lovelace".into(),
            creator_email: "ada@example.com".into(),
            assigned_to: assignee_email.map(|_| Uuid::new_v4()),
            assignee_name: assignee_email.map(|_| "Grace Hopper".to_string()),
            assignee_email: assignee_email.map(str::to_string),
        }
    }

    #[test]
    fn notice_goes_to_assignee_and_admins() {
        let admins = vec!["ops@example.com".to_string()];
        let notice = escalation_notice(&ticket(Some("grace@example.com")), &admins).unwrap();
        assert_eq!(notice.to, vec!["grace@example.com", "ops@example.com"]);
        assert!(notice.subject.contains("Printer on fire"));
        assert!(notice.body.contains("Grace Hopper"));
    }

    #[test]
    fn unassigned_ticket_notifies_creator() {
        let notice = escalation_notice(&ticket(None), &[]).unwrap();
        assert_eq!(notice.to, vec!["ada@example.com"]);
        assert!(notice.body.contains("unassigned"));
    }

    #[test]
    fn recipients_are_deduplicated() {
        let admins = vec!["ADA@example.com".to_string(), " ".to_string()];
        let notice = escalation_notice(&ticket(None), &admins).unwrap();
        assert_eq!(notice.to, vec!["ada@example.com"]);
    }

    #[tokio::test]
    async fn memory_mailer_records() {
        let mailer = MemoryMailer::default();
        let n = Notification {
            to: vec!["a@example.com".into()],
            subject: "s".into(),
            body: "b".into(),
        };
        mailer.send(&n).await.unwrap();
        assert_eq!(mailer.sent(), vec![n]);
    }

    #[test]
    fn disabled_mail_uses_log_mailer() {
        let config = MailSection::default();
        assert!(!config.enabled);
        assert!(build_mailer(&config).is_ok());
    }

    #[tokio::test]
    async fn bad_from_address_is_rejected() {
        let config = MailSection {
            enabled: true,
            from: "not an address".into(),
            ..MailSection::default()
        };
        assert!(matches!(
            SmtpMailer::from_config(&config),
            Err(MailError::Address { .. })
        ));
    }
}
