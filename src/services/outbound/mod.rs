//! A message that still fails after its retries is logged and dropped.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{MailBackend, MailConfig};
use crate::error::{AppError, AppResult};
use crate::utils::retry_with_backoff;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl EmailMessage {
    pub fn group_invitation(
        to: &str,
        group_name: &str,
        member_type: &str,
        client_url: Option<&str>,
    ) -> Self {
        let login = match client_url {
            Some(url) => format!(
                "<p>Click <a href=\"{}/login\">here</a> to login now.</p>",
                url.trim_end_matches('/')
            ),
            None => String::new(),
        };

        Self {
            to: to.to_string(),
            subject: format!("You were added to {}", group_name),
            html: format!(
                "<h1>Welcome to Scholaris</h1><p>Someone added you into the group as <b>{}</b>: <b>{}</b>.</p>{}",
                member_type, group_name, login
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        info!("Email to {}: {}", message.to, message.subject);
        Ok(())
    }
}

#[derive(Serialize)]
struct HttpMailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

pub struct HttpMailer {
    client: Client,
    endpoint: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(endpoint: &str, sender: &str) -> AppResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            sender: sender.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&HttpMailRequest {
                from: &self.sender,
                to: &message.to,
                subject: &message.subject,
                html: &message.html,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::server(format!(
                "Mail relay returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

pub fn create_mailer(config: &MailConfig) -> AppResult<Arc<dyn Mailer>> {
    match config.backend {
        MailBackend::Log => Ok(Arc::new(LogMailer)),
        MailBackend::Http => Ok(Arc::new(HttpMailer::new(&config.endpoint, &config.sender)?)),
    }
}

#[derive(Clone)]
pub struct OutboundQueue {
    sender: mpsc::Sender<EmailMessage>,
}

impl OutboundQueue {
    /// Spawns the delivery worker. It exits once every queue handle is dropped.
    pub fn start(mailer: Arc<dyn Mailer>, config: &MailConfig) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<EmailMessage>(config.queue_capacity.max(1));
        let max_retries = config.max_retries;
        let retry_delay = Duration::from_millis(config.retry_delay_ms);

        let worker = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                let result =
                    retry_with_backoff(|| mailer.send(&message), max_retries, retry_delay).await;

                if let Err(e) = result {
                    error!("Giving up on email to {}: {}", message.to, e);
                }
            }
            info!("Outbound queue closed");
        });

        (Self { sender }, worker)
    }

    pub fn enqueue(&self, message: EmailMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!("Outbound queue full, dropping email to {}", message.to);
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                warn!("Outbound queue closed, dropping email to {}", message.to);
                false
            }
        }
    }
}
