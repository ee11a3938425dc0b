use std::cmp::Ordering;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::error;

use crate::config::EmailSettings;
use crate::models::Listing;

const NO_RESULTS_MESSAGE: &str = "No new jobs found.";
const RULE_WIDTH: usize = 70;

// Rendered local time is a fixed eastern-US offset; DST is deliberately not
// tracked.
const LOCAL_OFFSET_HOURS: i32 = -5;
const LOCAL_LABEL: &str = "EST";

/// Delivers a digest covering a batch of new listings.
pub trait Notifier {
    /// Returns whether delivery succeeded. An empty batch is a no-op
    /// returning false without touching the transport.
    fn send(&self, listings: &[Listing]) -> bool;
}

pub struct EmailNotifier {
    sender: String,
    password: String,
    recipient: String,
    smtp_server: String,
}

impl EmailNotifier {
    pub fn new(settings: &EmailSettings) -> Self {
        Self {
            sender: settings.sender.clone(),
            password: settings.password.clone(),
            recipient: settings.recipient.clone(),
            smtp_server: settings.smtp_server.clone(),
        }
    }

    /// Render the digest body for a batch of new listings.
    pub fn format(&self, listings: &[Listing]) -> String {
        if listings.is_empty() {
            return NO_RESULTS_MESSAGE.to_string();
        }

        let mut ordered: Vec<&Listing> = listings.iter().collect();
        // Newest first. Listings without a parseable timestamp keep their
        // relative order at the end; the sort is stable.
        ordered.sort_by(|a, b| match (posted_at(a), posted_at(b)) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        let mut body = format!("Found {} new job posting(s)!\n\n", ordered.len());
        body.push_str(&"=".repeat(RULE_WIDTH));
        body.push_str("\n\n");

        for (i, listing) in ordered.iter().enumerate() {
            body.push_str(&format!("{}. {}\n", i + 1, listing.title));
            body.push_str(&format!("   Company: {}\n", listing.company));
            body.push_str(&format!("   Location: {}\n", listing.location));
            if let (Some(min), Some(max)) = (listing.salary_min, listing.salary_max) {
                body.push_str(&format!(
                    "   Salary: {} - {}\n",
                    format_salary(min),
                    format_salary(max)
                ));
            }
            body.push_str(&format!("   Apply: {}\n", listing.url));
            let posted = listing
                .posted_at
                .as_deref()
                .filter(|raw| !raw.is_empty())
                .map(format_timestamp)
                .unwrap_or_else(|| "N/A".to_string());
            body.push_str(&format!("   Posted: {}\n", posted));
            body.push('\n');
            body.push_str(&"-".repeat(RULE_WIDTH));
            body.push_str("\n\n");
        }

        body.push_str("\nThis is an automated message from jobwatch.\n");
        body
    }

    /// Send a fixed configuration-check message through the real transport.
    pub fn send_test(&self) -> bool {
        let body = "Hello!\n\n\
                    This is a test email from jobwatch.\n\n\
                    If you're reading this, your email configuration works. The \
                    tracker will notify you here when new postings are found.\n"
            .to_string();

        match self.deliver("Job tracker setup complete", body) {
            Ok(()) => {
                println!("Test email sent to {}", self.recipient);
                true
            }
            Err(e) => {
                error!(error = %e, "failed to send test email");
                false
            }
        }
    }

    fn deliver(&self, subject: &str, body: String) -> Result<()> {
        let message = Message::builder()
            .from(self.sender.parse().context("Invalid sender address")?)
            .to(self.recipient.parse().context("Invalid recipient address")?)
            .subject(subject)
            .multipart(MultiPart::mixed().singlepart(SinglePart::plain(body)))
            .context("Failed to build message")?;

        let credentials = Credentials::new(self.sender.clone(), self.password.clone());
        // relay() speaks implicit TLS (SMTPS) to the submission port.
        let mailer = SmtpTransport::relay(&self.smtp_server)
            .context("Failed to configure SMTP relay")?
            .credentials(credentials)
            .build();

        mailer.send(&message).context("SMTP delivery failed")?;
        Ok(())
    }
}

impl Notifier for EmailNotifier {
    fn send(&self, listings: &[Listing]) -> bool {
        if listings.is_empty() {
            return false;
        }

        let subject = format!("{} new job posting(s) found", listings.len());
        let body = self.format(listings);

        match self.deliver(&subject, body) {
            Ok(()) => {
                println!(
                    "Email sent to {} ({} new listing(s))",
                    self.recipient,
                    listings.len()
                );
                true
            }
            Err(e) => {
                error!(error = %e, "failed to send digest email");
                false
            }
        }
    }
}

fn posted_at(listing: &Listing) -> Option<DateTime<Utc>> {
    listing
        .posted_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Format an ISO 8601 UTC timestamp as "11/19/2025 - 09:51 AM EST (14:51 UTC)".
/// Unparseable input comes back unchanged.
fn format_timestamp(raw: &str) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
        return raw.to_string();
    };
    let utc = parsed.with_timezone(&Utc);
    let offset =
        FixedOffset::east_opt(LOCAL_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix());
    let local = utc.with_timezone(&offset);

    format!(
        "{} - {} {} ({} UTC)",
        local.format("%m/%d/%Y"),
        local.format("%I:%M %p"),
        LOCAL_LABEL,
        utc.format("%H:%M"),
    )
}

/// Render a salary bound as "$60,000".
fn format_salary(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::new();
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if whole < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> EmailNotifier {
        EmailNotifier::new(&EmailSettings {
            sender: "me@example.com".to_string(),
            password: "app-password".to_string(),
            recipient: "you@example.com".to_string(),
            smtp_server: "smtp.gmail.com".to_string(),
        })
    }

    fn listing(id: &str, posted_at: Option<&str>) -> Listing {
        Listing {
            id: id.to_string(),
            title: format!("Job {id}"),
            company: "Acme".to_string(),
            location: "Austin, TX".to_string(),
            url: format!("https://example.com/{id}"),
            description: String::new(),
            posted_at: posted_at.map(|raw| raw.to_string()),
            salary_min: None,
            salary_max: None,
            first_seen: None,
            notified: false,
        }
    }

    #[test]
    fn format_empty_batch_is_fixed_message() {
        assert_eq!(notifier().format(&[]), "No new jobs found.");
    }

    #[test]
    fn send_empty_batch_returns_false_without_transport() {
        assert!(!notifier().send(&[]));
    }

    #[test]
    fn format_renders_numbered_blocks() {
        let mut a = listing("a", Some("2025-11-19T14:51:45Z"));
        a.salary_min = Some(60000.0);
        a.salary_max = Some(80000.0);

        let body = notifier().format(&[a]);
        assert!(body.starts_with("Found 1 new job posting(s)!"));
        assert!(body.contains("1. Job a"));
        assert!(body.contains("   Company: Acme"));
        assert!(body.contains("   Location: Austin, TX"));
        assert!(body.contains("   Salary: $60,000 - $80,000"));
        assert!(body.contains("   Apply: https://example.com/a"));
        assert!(body.contains("   Posted: 11/19/2025 - 09:51 AM EST (14:51 UTC)"));
    }

    #[test]
    fn salary_line_needs_both_bounds() {
        let mut a = listing("a", None);
        a.salary_min = Some(60000.0);

        let body = notifier().format(&[a]);
        assert!(!body.contains("Salary:"));
        assert!(body.contains("   Posted: N/A"));
    }

    #[test]
    fn listings_sort_newest_first_with_unparseable_last() {
        let older = listing("older", Some("2025-11-18T09:00:00Z"));
        let newer = listing("newer", Some("2025-11-19T09:00:00Z"));
        let raw_a = listing("raw-a", Some("sometime last week"));
        let raw_b = listing("raw-b", None);

        let body = notifier().format(&[raw_a, older, raw_b, newer]);

        let pos = |needle: &str| body.find(needle).unwrap();
        assert!(pos("Job newer") < pos("Job older"));
        assert!(pos("Job older") < pos("Job raw-a"));
        // Unparseable timestamps keep their original relative order.
        assert!(pos("Job raw-a") < pos("Job raw-b"));
    }

    #[test]
    fn unparseable_timestamp_passes_through() {
        assert_eq!(format_timestamp("sometime last week"), "sometime last week");
    }

    #[test]
    fn timestamp_renders_fixed_offset_local_time() {
        assert_eq!(
            format_timestamp("2025-11-19T14:51:45Z"),
            "11/19/2025 - 09:51 AM EST (14:51 UTC)"
        );
        // Offset rolls the date backwards near midnight UTC.
        assert_eq!(
            format_timestamp("2025-11-19T03:10:00Z"),
            "11/18/2025 - 10:10 PM EST (03:10 UTC)"
        );
    }

    #[test]
    fn salary_grouping() {
        assert_eq!(format_salary(950.0), "$950");
        assert_eq!(format_salary(5000.0), "$5,000");
        assert_eq!(format_salary(60000.0), "$60,000");
        assert_eq!(format_salary(1250000.0), "$1,250,000");
    }
}
