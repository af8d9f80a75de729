// Report composition for notification emails

use crate::errors::NotificationError;
use crate::models::StoredTender;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::{Context, Tera};

/// HTML body for a detailed report
const DETAILED_TEMPLATE: &str = r#"
<html>
<body style="font-family: sans-serif; color: #222;">
  <h2>{{ subject }}</h2>
  <p>Monitoring run for <strong>{{ config_name }}</strong> on {{ date }} found
     {{ tenders | length }} new opportunit{% if tenders | length == 1 %}y{% else %}ies{% endif %}.</p>
  {% for tender in tenders %}
  <div style="border: 1px solid #ddd; padding: 12px; margin-bottom: 12px;">
    <h3 style="margin-top: 0;"><a href="{{ tender.source_url }}">{{ tender.title }}</a></h3>
    <p>{{ tender.description }}</p>
    <table style="font-size: 90%;">
      <tr><td><strong>Source</strong></td><td>{{ tender.source }}</td></tr>
      {% if tender.location %}<tr><td><strong>Location</strong></td><td>{{ tender.location }}</td></tr>{% endif %}
      {% if tender.estimated_value %}<tr><td><strong>Estimated value</strong></td><td>{{ tender.estimated_value }}</td></tr>{% endif %}
      {% if tender.deadline %}<tr><td><strong>Deadline</strong></td><td>{{ tender.deadline }}</td></tr>{% endif %}
      <tr><td><strong>Relevance</strong></td><td>{{ tender.relevance_score }}</td></tr>
    </table>
  </div>
  {% endfor %}
</body>
</html>
"#;

/// HTML body for an explicit nothing-found report
const EMPTY_TEMPLATE: &str = r#"
<html>
<body style="font-family: sans-serif; color: #222;">
  <h2>{{ subject }}</h2>
  <p>The monitoring run for <strong>{{ config_name }}</strong> on {{ date }}
     scanned {{ sources_scanned }} source{% if sources_scanned != 1 %}s{% endif %}
     and found no new opportunities.</p>
</body>
</html>
"#;

/// A composed email, ready for the mailer
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[derive(Serialize)]
struct TenderView<'a> {
    title: &'a str,
    description: &'a str,
    source: &'a str,
    source_url: &'a str,
    location: Option<&'a str>,
    estimated_value: Option<f64>,
    deadline: Option<String>,
    relevance_score: f64,
}

impl<'a> From<&'a StoredTender> for TenderView<'a> {
    fn from(t: &'a StoredTender) -> Self {
        Self {
            title: &t.title,
            description: &t.description,
            source: &t.source,
            source_url: &t.source_url,
            location: t.location.as_deref(),
            estimated_value: t.estimated_value,
            deadline: t.deadline.map(|d| d.format("%Y-%m-%d").to_string()),
            relevance_score: t.relevance_score,
        }
    }
}

fn detailed_subject(config_name: &str, count: usize) -> String {
    if count == 1 {
        format!("1 new opportunity ({})", config_name)
    } else {
        format!("{} new opportunities ({})", count, config_name)
    }
}

/// Compose the detailed report for a batch of newly accepted tenders
pub fn detailed_report(
    config_name: &str,
    tenders: &[StoredTender],
    now: DateTime<Utc>,
) -> Result<EmailMessage, NotificationError> {
    let subject = detailed_subject(config_name, tenders.len());
    let date = now.format("%Y-%m-%d").to_string();

    let mut text_body = format!(
        "{}\n\nMonitoring run for '{}' on {} found {} new opportunities:\n\n",
        subject,
        config_name,
        date,
        tenders.len()
    );
    for tender in tenders {
        text_body.push_str(&format!("- {} [{}]\n  {}\n", tender.title, tender.source, tender.source_url));
    }

    let views: Vec<TenderView<'_>> = tenders.iter().map(TenderView::from).collect();
    let mut context = Context::new();
    context.insert("subject", &subject);
    context.insert("config_name", config_name);
    context.insert("date", &date);
    context.insert("tenders", &views);

    let html_body = Tera::one_off(DETAILED_TEMPLATE, &context, true)
        .map_err(|e| NotificationError::Compose(e.to_string()))?;

    Ok(EmailMessage {
        subject,
        text_body,
        html_body: Some(html_body),
    })
}

/// Compose the explicit "nothing found" report
pub fn empty_report(
    config_name: &str,
    sources_scanned: usize,
    now: DateTime<Utc>,
) -> Result<EmailMessage, NotificationError> {
    let subject = format!(
        "No new opportunities for {} on {}",
        config_name,
        now.format("%Y-%m-%d")
    );
    let date = now.format("%Y-%m-%d").to_string();

    let text_body = format!(
        "{}\n\nThe monitoring run scanned {} sources and found no new opportunities.\n",
        subject, sources_scanned
    );

    let mut context = Context::new();
    context.insert("subject", &subject);
    context.insert("config_name", config_name);
    context.insert("date", &date);
    context.insert("sources_scanned", &sources_scanned);

    let html_body = Tera::one_off(EMPTY_TEMPLATE, &context, true)
        .map_err(|e| NotificationError::Compose(e.to_string()))?;

    Ok(EmailMessage {
        subject,
        text_body,
        html_body: Some(html_body),
    })
}

/// Plain test message for verifying SMTP configuration
pub fn test_message(now: DateTime<Utc>) -> EmailMessage {
    EmailMessage {
        subject: "Tenderwatch test notification".to_string(),
        text_body: format!(
            "This is a test notification sent at {}.\nIf you can read this, SMTP delivery works.\n",
            now.to_rfc3339()
        ),
        html_body: None,
    }
}
