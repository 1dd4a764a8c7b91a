//! Profiles: customers, providers and administrators.

use crate::error::{Error, Result};
use crate::types::{CommissionRate, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Privilege level of a profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Customer booking cleanings
    User,
    /// Platform administrator
    Admin,
    /// Cleaning provider receiving payouts
    Provider,
}

impl Role {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "provider" => Ok(Self::Provider),
            other => Err(Error::validation("role", format!("unknown role '{other}'"))),
        }
    }
}

/// A persisted profile keyed by the external identity id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Identity-provider id
    pub id: ProfileId,
    /// Display name
    pub name: String,
    /// Contact email (invoices are sent here for providers)
    pub email: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Privilege level; fixed at creation
    pub role: Role,
    /// Commission retained from this provider's bookings (providers only)
    pub commission: Option<CommissionRate>,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
    /// Last edit
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Create a profile, validating name and email.
    ///
    /// Commission is dropped for non-provider roles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank name or malformed email.
    pub fn new(
        id: ProfileId,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: Option<String>,
        role: Role,
        commission: Option<CommissionRate>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        let email = email.into().trim().to_string();
        validate_name(&name)?;
        validate_email(&email)?;
        if id.as_str().trim().is_empty() {
            return Err(Error::validation("id", "identity id is required"));
        }

        Ok(Self {
            id,
            name,
            email,
            phone: phone.filter(|p| !p.trim().is_empty()),
            role,
            commission: if role == Role::Provider { commission } else { None },
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether this profile fulfills bookings.
    #[must_use]
    pub fn is_provider(&self) -> bool {
        self.role == Role::Provider
    }

    /// Whether this profile administers the platform.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Commission, defaulting to zero when unset.
    #[must_use]
    pub fn commission_or_zero(&self) -> CommissionRate {
        self.commission.unwrap_or(CommissionRate::ZERO)
    }

    /// Apply a profile edit. The role is never changed here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank name or malformed email.
    pub fn apply_edit(
        &mut self,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(name) = name {
            let name = name.trim().to_string();
            validate_name(&name)?;
            self.name = name;
        }
        if let Some(email) = email {
            let email = email.trim().to_string();
            validate_email(&email)?;
            self.email = email;
        }
        if let Some(phone) = phone {
            self.phone = Some(phone).filter(|p| !p.trim().is_empty());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Set the provider commission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the profile is not a provider.
    pub fn set_commission(&mut self, commission: CommissionRate, now: DateTime<Utc>) -> Result<()> {
        if !self.is_provider() {
            return Err(Error::validation(
                "commission_percentage",
                "commission applies to provider profiles only",
            ));
        }
        self.commission = Some(commission);
        self.updated_at = now;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("name", "name is required"));
    }
    if name.chars().count() > 120 {
        return Err(Error::validation("name", "name must be at most 120 characters"));
    }
    Ok(())
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the address is malformed.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || Error::validation("email", format!("'{email}' is not a valid email address"));
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}
