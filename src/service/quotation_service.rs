use crate::config::bank_info_conf::BankInfoConfig;
use crate::dto::webhook_dto::QuoteEmailRequest;
use crate::model::quotation::{next_quote_number, Quotation};
use crate::repository::quotation_repo::{CascadeDeleteResult, QuotationRepository};
use crate::repository::record_repo::UpsertOutcome;
use crate::util::email::{quotation_message, Mailer};
use crate::util::error::ServiceError;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

#[async_trait]
pub trait QuotationService: Send + Sync {
    async fn list_quotations(&self) -> Result<Vec<Quotation>, ServiceError>;
    async fn save_quotation(&self, quotation: Quotation) -> Result<UpsertOutcome, ServiceError>;
    async fn delete_quotation(&self, id: &str) -> Result<CascadeDeleteResult, ServiceError>;
    /// Mail the quotation to its client. Returns the recipient address.
    async fn send_quotation_email(&self, quotation: Quotation) -> Result<String, ServiceError>;
}

pub struct QuotationServiceImpl {
    repo: Arc<dyn QuotationRepository>,
    bank: BankInfoConfig,
    quote_prefix: String,
    mailer: Option<Arc<dyn Mailer>>,
}

impl QuotationServiceImpl {
    pub fn new(
        repo: Arc<dyn QuotationRepository>,
        bank: BankInfoConfig,
        quote_prefix: impl Into<String>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        Self { repo, bank, quote_prefix: quote_prefix.into(), mailer }
    }

    /// Year a quotation is numbered in: its creation date, else today.
    fn numbering_year(quotation: &Quotation) -> i32 {
        NaiveDate::parse_from_str(quotation.created_at.trim(), "%Y-%m-%d")
            .map(|d| d.year())
            .unwrap_or_else(|_| Local::now().year())
    }
}

#[async_trait]
impl QuotationService for QuotationServiceImpl {
    #[instrument(skip(self))]
    async fn list_quotations(&self) -> Result<Vec<Quotation>, ServiceError> {
        let mut quotations = self.repo.list().await?;
        for quotation in quotations.iter_mut() {
            self.bank.apply_default(&mut quotation.bank_info);
        }
        Ok(quotations)
    }

    #[instrument(skip(self, quotation), fields(id = %quotation.id))]
    async fn save_quotation(&self, mut quotation: Quotation) -> Result<UpsertOutcome, ServiceError> {
        if quotation.id.trim().is_empty() {
            return Err(ServiceError::MissingRequiredField("id".to_string()));
        }
        if quotation.created_at.trim().is_empty() {
            quotation.created_at = Local::now().format("%Y-%m-%d").to_string();
        }
        if quotation.quote_number.trim().is_empty() {
            let existing = self.repo.list().await?;
            let stored = existing
                .iter()
                .find(|q| q.id.trim() == quotation.id.trim() && !q.quote_number.trim().is_empty());
            quotation.quote_number = match stored {
                Some(stored) => stored.quote_number.clone(),
                None => {
                    let year = Self::numbering_year(&quotation);
                    let number = next_quote_number(
                        &self.quote_prefix,
                        year,
                        existing.iter().map(|q| q.quote_number.as_str()),
                    );
                    info!(quote_number = %number, "Assigned quote number");
                    number
                }
            };
        }
        self.bank.apply_default(&mut quotation.bank_info);

        let outcome = self.repo.save(quotation).await.map_err(|e| {
            error!("Failed to save quotation: {}", e);
            ServiceError::from(e)
        })?;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn delete_quotation(&self, id: &str) -> Result<CascadeDeleteResult, ServiceError> {
        let result = self.repo.delete_cascade(id).await?;
        if result.total() == 0 {
            warn!(target_id = %id.trim(), "Nothing matched the quotation id");
        }
        Ok(result)
    }

    #[instrument(skip(self, quotation), fields(quote_number = %quotation.quote_number))]
    async fn send_quotation_email(&self, mut quotation: Quotation) -> Result<String, ServiceError> {
        let request = QuoteEmailRequest::from(&quotation);
        request
            .validate()
            .map_err(|e| ServiceError::InvalidInput(format!("Cannot e-mail quotation: {}", e)))?;

        let mailer = self.mailer.as_ref().ok_or_else(|| {
            warn!("Quotation e-mail requested but SMTP is not configured");
            ServiceError::InternalError("E-mail is not configured".to_string())
        })?;

        self.bank.apply_default(&mut quotation.bank_info);
        let message = quotation_message(&quotation, mailer.sender_name());
        mailer.send_email(message).await.map_err(|e| {
            error!("Failed to send quotation e-mail: {}", e);
            ServiceError::InternalError(e.to_string())
        })?;
        info!(to = %request.to, "Quotation e-mailed");
        Ok(request.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::quotation_repo::SheetQuotationRepository;
    use crate::repository::sheet_store::InMemorySheetStore;
    use crate::util::email::{EmailError, EmailMessage};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_email(&self, message: EmailMessage) -> Result<(), EmailError> {
            self.sent.lock().await.push(message);
            Ok(())
        }

        fn sender_name(&self) -> &str {
            "Zeno Studio"
        }
    }

    fn service(mailer: Option<Arc<dyn Mailer>>) -> QuotationServiceImpl {
        let repo = Arc::new(SheetQuotationRepository::new(Arc::new(InMemorySheetStore::new())));
        QuotationServiceImpl::new(repo, BankInfoConfig::from_test_env(), "ZN", mailer)
    }

    fn draft(id: &str, created_at: &str) -> Quotation {
        Quotation { id: id.into(), created_at: created_at.into(), ..Default::default() }
    }

    #[tokio::test]
    async fn test_save_assigns_sequential_numbers() {
        let service = service(None);
        service.save_quotation(draft("Q1", "2026-02-01")).await.unwrap();
        service.save_quotation(draft("Q2", "2026-03-01")).await.unwrap();
        let listed = service.list_quotations().await.unwrap();
        let numbers: Vec<&str> = listed.iter().map(|q| q.quote_number.as_str()).collect();
        assert_eq!(numbers, vec!["ZN-2026-001", "ZN-2026-002"]);
    }

    #[tokio::test]
    async fn test_list_fills_default_bank() {
        let service = service(None);
        service.save_quotation(draft("Q1", "2026-02-01")).await.unwrap();
        let listed = service.list_quotations().await.unwrap();
        assert_eq!(listed[0].bank_info.bank_code, "812");
    }

    #[tokio::test]
    async fn test_save_requires_id() {
        let err = service(None).save_quotation(draft(" ", "")).await.unwrap_err();
        assert_eq!(err, ServiceError::MissingRequiredField("id".to_string()));
    }

    #[tokio::test]
    async fn test_email_without_smtp_fails() {
        let quotation = Quotation {
            quote_number: "ZN-2026-001".into(),
            client_email: "veg8@example.com".into(),
            ..Default::default()
        };
        let err = service(None).send_quotation_email(quotation).await.unwrap_err();
        assert!(matches!(err, ServiceError::InternalError(_)));
    }

    #[tokio::test]
    async fn test_email_sent_to_client() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = service(Some(mailer.clone() as Arc<dyn Mailer>));
        let quotation = Quotation {
            quote_number: "ZN-2026-001".into(),
            client_email: "veg8@example.com".into(),
            ..Default::default()
        };
        let to = service.send_quotation_email(quotation).await.unwrap();
        assert_eq!(to, "veg8@example.com");
        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.starts_with("[Zeno Studio] ZN-2026-001"));
        assert!(sent[0].text_body.as_deref().unwrap_or_default().contains("812"));
    }

    #[tokio::test]
    async fn test_email_rejects_bad_address() {
        let mailer = Arc::new(RecordingMailer::default());
        let quotation = Quotation { quote_number: "ZN-2026-001".into(), client_email: "nope".into(), ..Default::default() };
        let err = service(Some(mailer as Arc<dyn Mailer>)).send_quotation_email(quotation).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
