use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{generate_id, require_text};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorId(pub String);

/// A line supplier. `available_lines` is the provisioning headroom left
/// under `total_lines`: every non-retired line drawn from the vendor holds
/// one unit of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub total_lines: u32,
    pub available_lines: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    pub fn provisioned_lines(&self) -> u32 {
        self.total_lines.saturating_sub(self.available_lines)
    }

    pub fn apply(&mut self, update: VendorUpdate, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(name) = update.name {
            self.name = require_text("vendor name", &name)?;
        }
        if let Some(email) = update.contact_email {
            self.contact_email = require_text("contact email", &email)?;
        }
        if let Some(phone) = update.contact_phone {
            self.contact_phone = require_text("contact phone", &phone)?;
        }
        if let Some(total_lines) = update.total_lines {
            self.resize(total_lines)?;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Changes the contracted capacity, keeping the provisioned share intact.
    pub fn resize(&mut self, total_lines: u32) -> Result<(), DomainError> {
        let provisioned = self.provisioned_lines();
        if total_lines < provisioned {
            return Err(DomainError::InvalidInput(format!(
                "vendor `{}` already has {provisioned} provisioned lines; total_lines cannot drop to {total_lines}",
                self.id.0
            )));
        }
        self.total_lines = total_lines;
        self.available_lines = total_lines - provisioned;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVendor {
    pub name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub total_lines: u32,
}

impl NewVendor {
    pub fn into_vendor(self, now: DateTime<Utc>) -> Result<Vendor, DomainError> {
        Ok(Vendor {
            id: VendorId(generate_id()),
            name: require_text("vendor name", &self.name)?,
            contact_email: require_text("contact email", &self.contact_email)?,
            contact_phone: require_text("contact phone", &self.contact_phone)?,
            total_lines: self.total_lines,
            available_lines: self.total_lines,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorUpdate {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub total_lines: Option<u32>,
}
