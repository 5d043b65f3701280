use crate::config::{ConfigError, EmailConfig};
use crate::model::quotation::Quotation;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SMTP error: {0}")]
    SmtpError(String),

    #[error("Message building error: {0}")]
    MessageError(String),

    #[error("Address error: {0}")]
    AddressError(String),
}

impl From<ConfigError> for EmailError {
    fn from(err: ConfigError) -> Self {
        EmailError::ConfigError(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
}

impl EmailMessage {
    pub fn new(to: String, subject: String) -> Self {
        Self { to, subject, text_body: None, html_body: None }
    }

    pub fn with_text_body(mut self, body: String) -> Self {
        self.text_body = Some(body);
        self
    }

    pub fn with_html_body(mut self, body: String) -> Self {
        self.html_body = Some(body);
        self
    }
}

/// Anything that can deliver an [`EmailMessage`].
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), EmailError>;

    /// Name printed as the issuer of a quotation.
    fn sender_name(&self) -> &str;
}

pub struct SmtpEmailService {
    pub config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailService {
    #[instrument(skip(config), fields(host = %config.smtp_host, port = config.smtp_port))]
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        config.validate()?;

        let mut transport_builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .timeout(Some(std::time::Duration::from_secs(config.connection_timeout_secs)));

        if config.use_tls {
            let tls_parameters = TlsParameters::new(config.smtp_host.clone())
                .map_err(|e| EmailError::ConfigError(format!("TLS configuration error: {}", e)))?;
            transport_builder = if config.use_starttls {
                transport_builder.tls(Tls::Required(tls_parameters))
            } else {
                transport_builder.tls(Tls::Wrapper(tls_parameters))
            };
        } else {
            transport_builder = transport_builder.tls(Tls::None);
        }

        if config.has_credentials() {
            transport_builder = transport_builder
                .credentials(Credentials::new(config.smtp_username.clone(), config.smtp_password.clone()));
        }

        info!("SMTP email service initialized");
        Ok(Self { transport: transport_builder.build(), config })
    }

    fn build_message(&self, email_message: EmailMessage) -> Result<Message, EmailError> {
        let from_mailbox: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| EmailError::AddressError(format!("Invalid from address: {}", e)))?;
        let to_mailbox: Mailbox = email_message
            .to
            .parse()
            .map_err(|e| EmailError::AddressError(format!("Invalid to address: {}", e)))?;

        let builder = Message::builder().from(from_mailbox).to(to_mailbox).subject(&email_message.subject);

        match (email_message.text_body, email_message.html_body) {
            (Some(text), Some(html)) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text))
                        .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html)),
                )
                .map_err(|e| EmailError::MessageError(format!("Failed to build multipart message: {}", e))),
            (Some(text), None) => builder
                .body(text)
                .map_err(|e| EmailError::MessageError(format!("Failed to build text message: {}", e))),
            (None, Some(html)) => builder
                .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html))
                .map_err(|e| EmailError::MessageError(format!("Failed to build HTML message: {}", e))),
            (None, None) => Err(EmailError::MessageError("No message body provided".to_string())),
        }
    }
}

#[async_trait]
impl Mailer for SmtpEmailService {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send_email(&self, message: EmailMessage) -> Result<(), EmailError> {
        let email_message = self.build_message(message)?;
        self.transport.send(email_message).await.map_err(|e| {
            error!("Failed to send email: {}", e);
            EmailError::SmtpError(format!("Failed to send email: {}", e))
        })?;
        info!("Email sent");
        Ok(())
    }

    fn sender_name(&self) -> &str {
        &self.config.from_name
    }
}

fn money(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-NT${}", grouped)
    } else {
        format!("NT${}", grouped)
    }
}

pub fn quotation_subject(quotation: &Quotation, issuer: &str) -> String {
    let project = if quotation.project_name.is_empty() { "報價單" } else { quotation.project_name.as_str() };
    format!("[{}] {} {}", issuer, quotation.quote_number, project)
}

/// Plain-text rendering: items, totals and bank transfer details.
pub fn render_quotation_text(quotation: &Quotation, issuer: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} 您好，\n\n", quotation.client_contact.as_str().trim_end()));
    out.push_str(&format!("附上報價單 {}，內容如下：\n\n", quotation.quote_number));
    if !quotation.project_name.is_empty() {
        out.push_str(&format!("專案：{}\n", quotation.project_name));
    }
    for (index, item) in quotation.items.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} x{}{} @ {} = {}\n",
            index + 1,
            item.name,
            item.qty,
            item.unit,
            money(item.price),
            money(item.subtotal())
        ));
    }
    out.push_str(&format!("\n小計：{}\n", money(quotation.subtotal())));
    out.push_str(&format!("稅金 ({}%)：{}\n", quotation.tax_rate, money(quotation.tax())));
    out.push_str(&format!("總計：{}\n", money(quotation.total())));
    if !quotation.valid_until.is_empty() {
        out.push_str(&format!("有效期限：{}\n", quotation.valid_until));
    }
    if !quotation.payment_terms.is_empty() {
        out.push_str(&format!("付款條件：{}\n", quotation.payment_terms));
    }
    let bank = &quotation.bank_info;
    if !bank.is_empty() {
        out.push_str(&format!(
            "\n匯款資訊：{} ({}) {}\n帳號：{}\n戶名：{}\n",
            bank.bank_name, bank.bank_code, bank.branch_name, bank.account_number, bank.account_name
        ));
    }
    if !quotation.notes.is_empty() {
        out.push_str(&format!("\n備註：\n{}\n", quotation.notes));
    }
    out.push_str(&format!("\n{}\n", issuer));
    out
}

/// HTML rendering of the same content. Every user supplied value is escaped.
pub fn render_quotation_html(quotation: &Quotation, issuer: &str) -> String {
    let esc = |s: &str| html_escape::encode_text(s).into_owned();
    let rows: String = quotation
        .items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{}</td><td>{}</td><td style=\"text-align:right\">{}</td><td>{}</td><td style=\"text-align:right\">{}</td><td style=\"text-align:right\">{}</td></tr>",
                esc(&item.name),
                esc(&item.desc),
                item.qty,
                esc(&item.unit),
                money(item.price),
                money(item.subtotal())
            )
        })
        .collect();
    let bank = &quotation.bank_info;
    let bank_block = if bank.is_empty() {
        String::new()
    } else {
        format!(
            "<p><strong>匯款資訊</strong><br>{} ({}) {}<br>帳號：{}<br>戶名：{}</p>",
            esc(&bank.bank_name),
            esc(&bank.bank_code),
            esc(&bank.branch_name),
            esc(&bank.account_number),
            esc(&bank.account_name)
        )
    };
    let notes = if quotation.notes.is_empty() {
        String::new()
    } else {
        format!("<p style=\"white-space:pre-line\">{}</p>", esc(&quotation.notes))
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="zh-Hant">
<head><meta charset="UTF-8"><title>{number}</title></head>
<body style="font-family: Arial, sans-serif; color: #333; max-width: 720px; margin: 0 auto;">
    <h2>{issuer} 報價單 {number}</h2>
    <p>{contact} 您好，</p>
    <p>專案：{project}</p>
    <table style="width:100%; border-collapse: collapse;" border="1" cellpadding="6">
        <tr><th>項目</th><th>說明</th><th>數量</th><th>單位</th><th>單價</th><th>小計</th></tr>
        {rows}
    </table>
    <p>小計：{subtotal}<br>稅金 ({rate}%)：{tax}<br><strong>總計：{total}</strong></p>
    <p>有效期限：{valid_until}<br>付款條件：{payment_terms}</p>
    {bank_block}
    {notes}
</body>
</html>"#,
        issuer = esc(issuer),
        number = esc(&quotation.quote_number),
        contact = esc(&quotation.client_contact),
        project = esc(&quotation.project_name),
        rows = rows,
        subtotal = money(quotation.subtotal()),
        rate = quotation.tax_rate,
        tax = money(quotation.tax()),
        total = money(quotation.total()),
        valid_until = esc(&quotation.valid_until),
        payment_terms = esc(&quotation.payment_terms),
        bank_block = bank_block,
        notes = notes,
    )
}

/// Message carrying the quotation to its client's e-mail address.
pub fn quotation_message(quotation: &Quotation, issuer: &str) -> EmailMessage {
    EmailMessage::new(quotation.client_email.trim().to_string(), quotation_subject(quotation, issuer))
        .with_text_body(render_quotation_text(quotation, issuer))
        .with_html_body(render_quotation_html(quotation, issuer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::quotation::LineItem;

    fn sample() -> Quotation {
        Quotation {
            id: "Q1".into(),
            quote_number: "ZN-2026-001".into(),
            client_email: " veg8@example.com ".into(),
            client_contact: "王老闆".into(),
            project_name: "<LINE OA>".into(),
            items: vec![LineItem { name: "Setup".into(), qty: 2, price: 12500.0, unit: "式".into(), ..Default::default() }],
            ..Default::default()
        }
    }

    #[test]
    fn test_money_groups_thousands() {
        assert_eq!(money(26250.0), "NT$26,250");
        assert_eq!(money(999.0), "NT$999");
        assert_eq!(money(1000000.0), "NT$1,000,000");
    }

    #[test]
    fn test_text_contains_totals() {
        let text = render_quotation_text(&sample(), "Zeno");
        assert!(text.contains("NT$25,000"));
        assert!(text.contains("稅金 (5%)：NT$1,250"));
        assert!(text.contains("總計：NT$26,250"));
    }

    #[test]
    fn test_html_escapes_values() {
        let html = render_quotation_html(&sample(), "Zeno");
        assert!(html.contains("&lt;LINE OA&gt;"));
        assert!(!html.contains("<LINE OA>"));
    }

    #[test]
    fn test_message_targets_client() {
        let message = quotation_message(&sample(), "Zeno");
        assert_eq!(message.to, "veg8@example.com");
        assert_eq!(message.subject, "[Zeno] ZN-2026-001 <LINE OA>");
        assert!(message.text_body.is_some() && message.html_body.is_some());
    }
}
