use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{error, info, warn};

use crate::config::Config;

/// Outbound mail. Sending is best-effort everywhere: a delivery failure is
/// logged and swallowed, never surfaced to the request that triggered it.
/// Without SMTP credentials the transport is absent and `send` is a no-op.
pub struct Mailer {
    transport: Option<SmtpTransport>,
    from: String,
    site_url: String,
    admin_email: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let transport = config.smtp.as_ref().and_then(|smtp| {
            match SmtpTransport::starttls_relay(&smtp.host) {
                Ok(builder) => Some(
                    builder
                        .port(smtp.port)
                        .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
                        .build(),
                ),
                Err(e) => {
                    error!("Invalid SMTP relay {}: {}", smtp.host, e);
                    None
                }
            }
        });

        let from = config
            .smtp
            .as_ref()
            .map(|s| s.user.clone())
            .unwrap_or_else(|| "noreply@kiosk.example".to_string());

        Self {
            transport,
            from,
            site_url: config.site_url.clone(),
            admin_email: config.admin_email.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    pub fn admin_email(&self) -> &str {
        &self.admin_email
    }

    /// Blocking send; call from `spawn_blocking`. Returns whether the mail
    /// actually left.
    fn send(&self, to: &str, subject: &str, html: String) -> bool {
        let Some(transport) = &self.transport else {
            info!("SMTP not configured, skipping email '{}' to {}", subject, to);
            return false;
        };

        let mailbox: Mailbox = match to.parse() {
            Ok(mb) => mb,
            Err(e) => {
                warn!("Unroutable recipient address {}: {}", to, e);
                return false;
            }
        };
        let from: Mailbox = match self.from.parse() {
            Ok(mb) => mb,
            Err(e) => {
                warn!("Invalid sender address {}: {}", self.from, e);
                return false;
            }
        };

        let message = Message::builder()
            .from(from)
            .to(mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html);

        let message = match message {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to build email '{}': {}", subject, e);
                return false;
            }
        };

        match transport.send(&message) {
            Ok(_) => {
                info!("Email '{}' sent to {}", subject, to);
                true
            }
            Err(e) => {
                error!("Failed to send email '{}' to {}: {}", subject, to, e);
                false
            }
        }
    }

    pub fn send_verification_email(&self, to: &str, first_name: &str, token: &str) -> bool {
        let link = format!("{}/api/auth/verify-email?token={}", self.site_url, token);
        let html = layout(
            "Confirm your email",
            &format!(
                "<h2>Welcome {first_name}!</h2>\
                 <p>To activate your account and post listings, please confirm your \
                 email address:</p>\
                 {}\
                 <p>Or paste this link into your browser:</p>\
                 <p class=\"link\">{link}</p>\
                 <p>The link is valid for 24 hours.</p>",
                button(&link, "Confirm my email")
            ),
        );
        self.send(to, "Confirm your email address", html)
    }

    pub fn send_moderation_request(
        &self,
        listing_title: &str,
        listing_price: f64,
        listing_location: &str,
        submitter_name: &str,
        submitter_email: &str,
        approve_link: &str,
        reject_link: &str,
    ) -> bool {
        let html = layout(
            "New listing awaiting review",
            &format!(
                "<h2>New listing awaiting review</h2>\
                 <p><strong>{listing_title}</strong> — {listing_price:.2} € — {listing_location}</p>\
                 <p>Submitted by {submitter_name} ({submitter_email})</p>\
                 <p>{} {}</p>\
                 <p>These links are valid for 7 days.</p>",
                button(approve_link, "APPROVE"),
                button(reject_link, "REJECT")
            ),
        );
        self.send(
            &self.admin_email,
            &format!("Listing to review: {listing_title}"),
            html,
        )
    }

    pub fn send_listing_approved(&self, to: &str, user_name: &str, listing_title: &str) -> bool {
        let html = layout(
            "Your listing is live",
            &format!(
                "<h2>Good news, {user_name}!</h2>\
                 <p>Your listing <strong>{listing_title}</strong> has been approved and is \
                 now visible to buyers.</p>"
            ),
        );
        self.send(to, &format!("Your listing is live: {listing_title}"), html)
    }

    pub fn send_new_message_notice(
        &self,
        to: &str,
        receiver_name: &str,
        sender_name: &str,
        listing_title: &str,
    ) -> bool {
        let html = layout(
            "New message",
            &format!(
                "<h2>Hello {receiver_name},</h2>\
                 <p>{sender_name} sent you a message about \
                 <strong>{listing_title}</strong>. Log in to reply.</p>"
            ),
        );
        self.send(to, &format!("New message about {listing_title}"), html)
    }

    pub fn send_identity_submission_notice(
        &self,
        user_name: &str,
        user_email: &str,
        verification_id: &str,
    ) -> bool {
        let html = layout(
            "Identity verification requested",
            &format!(
                "<h2>Identity verification requested</h2>\
                 <p>{user_name} ({user_email}) submitted identity documents.</p>\
                 <p>Submission id: {verification_id}. The documents are stored in the \
                 database; review them from the admin console.</p>"
            ),
        );
        self.send(
            &self.admin_email,
            &format!("Identity verification: {user_name}"),
            html,
        )
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>\
         body {{ font-family: Arial, sans-serif; color: #333; }}\
         .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}\
         .header {{ background: #1e40af; color: white; padding: 16px; text-align: center; }}\
         .content {{ background: #f8fafc; padding: 24px; }}\
         .button {{ display: inline-block; background: #1e40af; color: white; \
         padding: 12px 24px; text-decoration: none; border-radius: 5px; margin: 8px 4px; }}\
         .link {{ word-break: break-all; background: #e2e8f0; padding: 8px; }}\
         </style></head><body><div class=\"container\">\
         <div class=\"header\"><h1>Kiosk</h1></div>\
         <div class=\"content\">{body}</div>\
         <p style=\"color:#64748b;font-size:12px;text-align:center;\">{title} — \
         this email was sent automatically.</p>\
         </div></body></html>"
    )
}

fn button(href: &str, label: &str) -> String {
    format!("<a href=\"{href}\" class=\"button\" style=\"color: white;\">{label}</a>")
}
