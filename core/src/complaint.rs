//! Customer complaints and their response threads.

use crate::error::{Error, Result};
use crate::profile::{Profile, Role};
use crate::types::{BookingId, ComplaintId, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the complaint is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintType {
    /// Property damage during a job
    Damage,
    /// Unsatisfactory cleaning
    ServiceQuality,
}

impl ComplaintType {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Damage => "damage",
            Self::ServiceQuality => "service_quality",
        }
    }
}

impl FromStr for ComplaintType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "damage" => Ok(Self::Damage),
            "service_quality" => Ok(Self::ServiceQuality),
            other => Err(Error::validation("type", format!("unknown complaint type '{other}'"))),
        }
    }
}

/// Resolution state of a complaint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplaintStatus {
    /// Awaiting a resolving response
    Pending,
    /// Closed by a provider or admin response
    Resolved,
}

impl ComplaintStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Resolved" => Ok(Self::Resolved),
            other => Err(Error::validation("status", format!("unknown complaint status '{other}'"))),
        }
    }
}

/// A complaint raised by a customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    /// Complaint id
    pub id: ComplaintId,
    /// Complaining customer
    pub customer_id: ProfileId,
    /// Customer display name
    pub customer_name: String,
    /// Booking concerned, if any
    pub booking_id: Option<BookingId>,
    /// Building name
    pub building: String,
    /// Category
    #[serde(rename = "type")]
    pub complaint_type: ComplaintType,
    /// Complaint body
    pub text: String,
    /// Optional photo URL
    pub image_url: Option<String>,
    /// Resolution state
    pub status: ComplaintStatus,
    /// Provider concerned
    pub provider_id: Option<ProfileId>,
    /// Provider display name snapshot
    pub provider_name: Option<String>,
    /// When the latest response was added
    pub last_response_at: Option<DateTime<Utc>>,
    /// When the complaint was filed
    pub created_at: DateTime<Utc>,
}

/// Append-only response on a complaint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintResponse {
    /// Complaint answered
    pub complaint_id: ComplaintId,
    /// Response body
    pub text: String,
    /// Role of the responder
    pub responder_role: Role,
    /// Responder display name
    pub responder_name: String,
    /// When the response was written
    pub created_at: DateTime<Utc>,
}

impl Complaint {
    /// Validate the customer-supplied fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for blank text or building.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::validation("text", "complaint text is required"));
        }
        if self.text.chars().count() > 5_000 {
            return Err(Error::validation("text", "complaint text must be at most 5000 characters"));
        }
        if self.building.trim().is_empty() {
            return Err(Error::validation("building", "building is required"));
        }
        Ok(())
    }

    /// Build a response from `responder`, resolving the complaint when asked.
    ///
    /// Only admins and the provider the complaint names may respond.
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] when the responder may not answer this complaint
    /// - [`Error::Validation`] for blank text
    /// - [`Error::Conflict`] when resolving an already resolved complaint
    pub fn respond(
        &mut self,
        responder: &Profile,
        text: &str,
        resolve: bool,
        now: DateTime<Utc>,
    ) -> Result<ComplaintResponse> {
        let allowed = responder.is_admin()
            || (responder.is_provider() && self.provider_id.as_ref() == Some(&responder.id));
        if !allowed {
            return Err(Error::Forbidden("only the admin or the provider concerned may respond".to_string()));
        }
        if text.trim().is_empty() {
            return Err(Error::validation("text", "response text is required"));
        }
        if resolve {
            if self.status == ComplaintStatus::Resolved {
                return Err(Error::conflict(format!("complaint {} is already resolved", self.id)));
            }
            self.status = ComplaintStatus::Resolved;
        }
        self.last_response_at = Some(now);

        Ok(ComplaintResponse {
            complaint_id: self.id,
            text: text.trim().to_string(),
            responder_role: responder.role,
            responder_name: responder.name.clone(),
            created_at: now,
        })
    }
}
