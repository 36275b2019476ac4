//! Letter text storage format and HTML rendering.
//!
//! `final_letter_text` holds a JSON object `{"letter": "..."}`, the shape the
//! drafting model is asked to produce. Hand-written text sent through
//! `PATCH /letter-requests/{id}` is wrapped into the same shape.

use serde_json::{Value, json};

use crate::{error::AppError, models::address::MailingAddress};

/// Wrap plain letter text as stored JSON.
pub fn wrap_letter_text(text: &str) -> String {
    json!({ "letter": text }).to_string()
}

/// Keep JSON that already carries a `letter` string; wrap anything else.
pub fn normalize_letter_text(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.get("letter").and_then(Value::as_str).is_some() => raw.to_string(),
        _ => wrap_letter_text(raw),
    }
}

/// Extract the letter body, failing when the stored text is not valid JSON
/// or has no non-empty `letter` field. Used before mailing.
pub fn extract_letter_text(raw: &str) -> Result<String, AppError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|_| AppError::bad_request("Invalid JSON in final_letter_text."))?;

    value
        .get("letter")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request("No 'letter' field found in final_letter_text."))
}

/// Like [`extract_letter_text`] but never fails: non-JSON text is used
/// as-is and JSON without a `letter` field yields an empty body.
pub fn extract_letter_text_lenient(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value
            .get("letter")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Escape text for inclusion in HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn address_block(address: &MailingAddress) -> String {
    let mut lines = vec![
        escape_html(&address.name),
        escape_html(&address.line1),
    ];
    if let Some(line2) = address.line2.as_deref().filter(|l| !l.trim().is_empty()) {
        lines.push(escape_html(line2));
    }
    lines.push(format!(
        "{}, {} {}",
        escape_html(&address.city),
        escape_html(&address.state),
        escape_html(&address.zip)
    ));

    format!(
        "    <div style=\"margin-bottom: 1in;\">\n      {}\n    </div>",
        lines.join("<br>\n      ")
    )
}

/// Render a letter as a printable HTML page.
///
/// Paragraphs are separated by blank lines in `letter_text`; single line
/// breaks inside a paragraph are kept.
pub fn render_letter_html(
    letter_text: &str,
    recipient: &MailingAddress,
    sender: &MailingAddress,
) -> String {
    let paragraphs = letter_text
        .trim()
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("    <p>{}</p>", escape_html(p).replace('\n', "<br>\n")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<html>
  <head>
    <meta charset="UTF-8">
    <style>
      body {{
        font-family: "Times New Roman", serif;
        font-size: 12pt;
        margin: 1in;
      }}
      p {{
        margin-bottom: 0.5em;
        line-height: 1.5em;
      }}
    </style>
  </head>
  <body>
{sender_block}
{recipient_block}
{paragraphs}
    <p>Sincerely,<br>{signature}</p>
  </body>
</html>
"#,
        sender_block = address_block(sender),
        recipient_block = address_block(recipient),
        signature = escape_html(&sender.name),
    )
}
