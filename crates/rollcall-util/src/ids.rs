//! Strongly-typed identifiers for rollcall

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::RollcallError;

/// Identifier of a verification slot.
///
/// `0` is the end-of-day checkout slot, `1..=8` are the ordinary class periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PeriodId(u8);

impl PeriodId {
    /// The checkout slot at the end of the day
    pub const CHECKOUT: PeriodId = PeriodId(0);

    /// Highest ordinary period number
    pub const LAST_CLASS: u8 = 8;

    pub fn new(id: u8) -> Option<Self> {
        (id <= Self::LAST_CLASS).then_some(Self(id))
    }

    /// All nine slots in evaluation order: class periods first, checkout last
    pub fn all() -> impl Iterator<Item = PeriodId> {
        (1..=Self::LAST_CLASS).chain(std::iter::once(0)).map(PeriodId)
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn is_checkout(&self) -> bool {
        self.0 == 0
    }

    /// Human-readable label used in logs and attendance records
    pub fn label(&self) -> String {
        if self.is_checkout() {
            "Checkout".to_string()
        } else {
            format!("Period {}", self.0)
        }
    }

    /// Filesystem-safe name used for evidence files
    pub fn slug(&self) -> String {
        if self.is_checkout() {
            "checkout".to_string()
        } else {
            format!("period{}", self.0)
        }
    }

    /// Position in evaluation order (class periods ascending, checkout last)
    pub fn sort_key(&self) -> u8 {
        if self.is_checkout() { u8::MAX } else { self.0 }
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for PeriodId {
    type Error = RollcallError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PeriodId::new(value).ok_or(RollcallError::InvalidPeriodId(value))
    }
}

impl From<PeriodId> for u8 {
    fn from(id: PeriodId) -> Self {
        id.0
    }
}

/// Unique identifier for a connected IPC client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_id_range() {
        assert!(PeriodId::new(0).is_some());
        assert!(PeriodId::new(8).is_some());
        assert!(PeriodId::new(9).is_none());
    }

    #[test]
    fn evaluation_order_puts_checkout_last() {
        let order: Vec<u8> = PeriodId::all().map(|p| p.as_u8()).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6, 7, 8, 0]);
    }

    #[test]
    fn labels_and_slugs() {
        assert_eq!(PeriodId::CHECKOUT.label(), "Checkout");
        assert_eq!(PeriodId::new(3).unwrap().label(), "Period 3");
        assert_eq!(PeriodId::new(3).unwrap().slug(), "period3");
        assert_eq!(PeriodId::CHECKOUT.slug(), "checkout");
    }

    #[test]
    fn period_id_rejects_out_of_range_json() {
        let parsed: PeriodId = serde_json::from_str("4").unwrap();
        assert_eq!(parsed.as_u8(), 4);
        assert!(serde_json::from_str::<PeriodId>("12").is_err());
    }

    #[test]
    fn client_id_uniqueness() {
        assert_ne!(ClientId::new(), ClientId::new());
    }
}
