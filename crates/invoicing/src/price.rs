//! Money and invoice reference value objects.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use kitchenops_core::{DomainError, DomainResult, ValueObject};

/// Unit price in the smallest currency unit (cents).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl ValueObject for Price {}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Vendor identifier as used on invoices (e.g. "SYSCO").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(String);

impl VendorId {
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value: String = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("vendor_id must not be blank"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for VendorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The invoice a review session works through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceRef {
    pub vendor_id: VendorId,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
}

impl InvoiceRef {
    pub fn new(
        vendor_id: VendorId,
        invoice_number: impl Into<String>,
        invoice_date: NaiveDate,
    ) -> DomainResult<Self> {
        let invoice_number: String = invoice_number.into();
        let invoice_number = invoice_number.trim().to_string();
        if invoice_number.is_empty() {
            return Err(DomainError::validation("invoice_number must not be blank"));
        }
        Ok(Self {
            vendor_id,
            invoice_number,
            invoice_date,
        })
    }
}

impl ValueObject for InvoiceRef {}

impl core::fmt::Display for InvoiceRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}#{} ({})",
            self.vendor_id, self.invoice_number, self.invoice_date
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_displays_as_decimal_amount() {
        assert_eq!(Price::from_cents(1200).to_string(), "12.00");
        assert_eq!(Price::from_cents(5).to_string(), "0.05");
        assert_eq!(Price::from_cents(-250).to_string(), "-2.50");
    }

    #[test]
    fn vendor_id_is_trimmed_and_required() {
        assert_eq!(VendorId::parse("  SYSCO ").unwrap().as_str(), "SYSCO");
        assert!(matches!(
            VendorId::parse("   "),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn invoice_number_is_required() {
        let vendor = VendorId::parse("SYSCO").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(InvoiceRef::new(vendor.clone(), "INV-1", date).is_ok());
        assert!(matches!(
            InvoiceRef::new(vendor, " ", date),
            Err(DomainError::Validation(_))
        ));
    }
}
