use std::env;
use tracing::{debug, info};

use crate::model::quotation::BankInfo;

/// Default bank transfer details, copied into quotations that carry none.
///
/// Environment variables (all optional): BANK_NAME, BANK_CODE,
/// BANK_BRANCH_NAME, BANK_ACCOUNT_NUMBER, BANK_ACCOUNT_NAME.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BankInfoConfig {
    pub bank_info: BankInfo,
}

impl BankInfoConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).map(|v| v.trim().to_string()).unwrap_or_default();
        let bank_info = BankInfo {
            bank_name: var("BANK_NAME"),
            bank_code: var("BANK_CODE"),
            branch_name: var("BANK_BRANCH_NAME"),
            account_number: var("BANK_ACCOUNT_NUMBER"),
            account_name: var("BANK_ACCOUNT_NAME"),
        };
        if bank_info.is_empty() {
            debug!("No default bank info configured");
        } else {
            info!(bank = %bank_info.bank_name, "Default bank info loaded");
        }
        BankInfoConfig { bank_info }
    }

    pub fn from_test_env() -> Self {
        BankInfoConfig {
            bank_info: BankInfo {
                bank_name: "台新國際商業銀行".to_string(),
                bank_code: "812".to_string(),
                branch_name: "信義分行".to_string(),
                account_number: "2001-10-0000000".to_string(),
                account_name: "Test Studio".to_string(),
            },
        }
    }

    /// Fill `target` when it is blank.
    pub fn apply_default(&self, target: &mut BankInfo) {
        if target.is_empty() && !self.bank_info.is_empty() {
            *target = self.bank_info.clone();
        }
    }
}
