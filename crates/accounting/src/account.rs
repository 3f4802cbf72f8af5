use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tallybook_core::{AccountId, DomainError, DomainResult, Entity, OrganizationId, checked_sum};

/// Side of the ledger on which an account type customarily increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

/// High-level account type (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// Every account type, in chart-of-accounts order.
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    pub fn normal_balance(self) -> NormalBalance {
        match self {
            AccountType::Asset | AccountType::Expense => NormalBalance::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalBalance::Credit
            }
        }
    }

    /// Change in balance caused by one entry line on an account of this type.
    pub fn balance_delta(self, debit: Decimal, credit: Decimal) -> DomainResult<Decimal> {
        let (plus, minus) = match self.normal_balance() {
            NormalBalance::Debit => (debit, credit),
            NormalBalance::Credit => (credit, debit),
        };
        plus.checked_sub(minus)
            .ok_or_else(|| DomainError::validation("entry amount is out of range"))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::validation(format!("unknown account type '{wanted}'")))
    }
}

/// A ledger account as held by an organization's chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub code: String, // e.g. "1000"
    /// Signed balance under the account type's normal-balance convention.
    pub balance: Decimal,
    pub organization_id: OrganizationId,
}

impl Account {
    pub(crate) fn open(
        organization_id: OrganizationId,
        name: String,
        account_type: AccountType,
        code: String,
    ) -> Self {
        Self {
            id: AccountId::new(),
            name,
            account_type,
            code,
            balance: Decimal::ZERO,
            organization_id,
        }
    }

    /// `balance` moved by one entry line under this account's sign convention.
    pub(crate) fn apply_entry(
        &self,
        balance: Decimal,
        debit: Decimal,
        credit: Decimal,
    ) -> DomainResult<Decimal> {
        let delta = self.account_type.balance_delta(debit, credit)?;
        checked_sum(&format!("balance of account {}", self.code), balance, delta)
    }

    pub fn normal_balance(&self) -> NormalBalance {
        self.account_type.normal_balance()
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

/// Partial update of an account's descriptive fields.
///
/// `None` leaves the field untouched. The balance is not updatable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
}

impl AccountUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = Some(account_type);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.code.is_none() && self.account_type.is_none()
    }
}
