//! Outgoing mail for password resets.
//!
//! Two providers exist. `console` writes the message to the log, which is
//! how development and single-host deployments read reset links. `disabled`
//! drops every message and reports it as not sent.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email delivery is disabled")]
    Disabled,

    #[error("Unknown email provider '{0}'")]
    UnknownProvider(String),

    #[error("Invalid recipient address")]
    InvalidRecipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Console,
    Disabled,
}

impl Provider {
    fn from_config(config: &EmailConfig) -> Result<Self, EmailError> {
        if !config.enabled {
            return Ok(Provider::Disabled);
        }
        match config.provider.as_str() {
            "console" => Ok(Provider::Console),
            "disabled" => Ok(Provider::Disabled),
            other => Err(EmailError::UnknownProvider(other.to_string())),
        }
    }
}

/// A rendered message ready for a provider.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Content of the reset email.
struct ResetMail<'a> {
    product: &'a str,
    recipient_name: &'a str,
    link: &'a str,
    valid_minutes: i64,
}

impl ResetMail<'_> {
    fn subject(&self) -> String {
        format!("Password Reset Request - {}", self.product)
    }

    fn text(&self) -> String {
        format!(
            "Hello {name},\n\n\
             Someone asked to reset the password of your {product} account.\n\
             Open this link to choose a new one:\n{link}\n\n\
             The link stops working after {minutes} minutes. If the request was \
             not yours, ignore this message and your password stays the same.\n\n\
             {product}",
            name = self.recipient_name,
            product = self.product,
            link = self.link,
            minutes = self.valid_minutes,
        )
    }

    fn html(&self) -> String {
        let name = escape_html(self.recipient_name);
        let product = escape_html(self.product);
        let link = escape_html(self.link);
        format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"UTF-8\">\
             <title>Password Reset Request</title></head>\
             <body style=\"font-family: sans-serif; max-width: 600px; margin: 0 auto;\">\
             <h2>{product}</h2>\
             <p>Hello <strong>{name}</strong>,</p>\
             <p>Someone asked to reset the password of your {product} account.</p>\
             <p><a href=\"{link}\">Choose a new password</a></p>\
             <p>If the button does not work, paste this address into your browser:<br>{link}</p>\
             <p>The link stops working after {minutes} minutes. If the request was not \
             yours, ignore this message and your password stays the same.</p>\
             </body></html>",
            minutes = self.valid_minutes,
        )
    }
}

/// Sends transactional mail through the configured provider.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    base_url: String,
    reset_token_ttl_secs: i64,
}

impl EmailService {
    /// `base_url` is the public portal address used in links.
    pub fn new(config: EmailConfig, base_url: impl Into<String>, reset_token_ttl_secs: i64) -> Self {
        if let Err(e) = Provider::from_config(&config) {
            warn!(error = %e, "Email is misconfigured; reset mail will not be delivered");
        }
        Self {
            config: Arc::new(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reset_token_ttl_secs,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(Provider::from_config(&self.config), Ok(Provider::Console))
    }

    /// Link to the frontend reset form carrying the raw token.
    pub fn reset_url(&self, reset_token: &str) -> String {
        format!("{}/#reset-password?token={}", self.base_url, reset_token)
    }

    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: &str,
        reset_token: &str,
    ) -> Result<(), EmailError> {
        let link = self.reset_url(reset_token);
        let content = ResetMail {
            product: &self.config.sender_name,
            recipient_name: to_name,
            link: &link,
            valid_minutes: self.reset_token_ttl_secs / 60,
        };

        self.send(OutgoingMail {
            to: to_email.to_string(),
            to_name: to_name.to_string(),
            subject: content.subject(),
            text: content.text(),
            html: content.html(),
        })
        .await
    }

    pub async fn send(&self, mail: OutgoingMail) -> Result<(), EmailError> {
        if mail.to.contains(['\r', '\n']) || !mail.to.contains('@') {
            return Err(EmailError::InvalidRecipient);
        }

        match Provider::from_config(&self.config)? {
            Provider::Disabled => {
                debug!(subject = %mail.subject, "Email disabled, message dropped");
                Err(EmailError::Disabled)
            }
            Provider::Console => {
                info!(
                    from = %self.config.sender_email,
                    to = %mail.to,
                    to_name = %strip_header_breaks(&mail.to_name),
                    subject = %strip_header_breaks(&mail.subject),
                    body = %mail.text,
                    html_bytes = mail.html.len(),
                    "Email (console provider)"
                );
                Ok(())
            }
        }
    }
}

/// Removes line breaks, raw or percent-encoded, from header values.
fn strip_header_breaks(value: &str) -> String {
    value
        .replace("%0a", "")
        .replace("%0d", "")
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
        .collect()
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
