//! Home and work addresses.
//!
//! A user has at most two addresses, one per [`AddressSlot`]. The limit is a
//! property of the type: [`Addresses`] has exactly one field per slot.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when validating an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// A required field is blank.
    #[error("address field `{0}` cannot be empty")]
    EmptyField(&'static str),
    /// The slot name is not `home` or `work`.
    #[error("unknown address slot: {0:?}")]
    UnknownSlot(String),
}

/// Named address slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressSlot {
    Home,
    Work,
}

impl AddressSlot {
    /// Slots in fill order.
    pub const ALL: [Self; 2] = [Self::Home, Self::Work];

    /// Storage name of the slot.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Work => "work",
        }
    }

    /// Parse a slot from its storage name.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::UnknownSlot` for anything but `home` or `work`.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        match s {
            "home" => Ok(Self::Home),
            "work" => Ok(Self::Work),
            other => Err(AddressError::UnknownSlot(other.to_owned())),
        }
    }
}

impl fmt::Display for AddressSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub house: String,
    pub street: String,
    pub city: String,
    pub pincode: String,
}

impl Address {
    /// Check that every field is non-blank.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::EmptyField` naming the first blank field.
    pub fn validate(&self) -> Result<(), AddressError> {
        let fields = [
            ("house", &self.house),
            ("street", &self.street),
            ("city", &self.city),
            ("pincode", &self.pincode),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AddressError::EmptyField(name));
            }
        }
        Ok(())
    }
}

/// A user's address book: one optional address per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addresses {
    pub home: Option<Address>,
    pub work: Option<Address>,
}

impl Addresses {
    /// Get the address stored in `slot`.
    #[must_use]
    pub const fn get(&self, slot: AddressSlot) -> Option<&Address> {
        match slot {
            AddressSlot::Home => self.home.as_ref(),
            AddressSlot::Work => self.work.as_ref(),
        }
    }

    /// Mutable access to a slot.
    pub const fn slot_mut(&mut self, slot: AddressSlot) -> &mut Option<Address> {
        match slot {
            AddressSlot::Home => &mut self.home,
            AddressSlot::Work => &mut self.work,
        }
    }

    /// First empty slot in fill order (home, then work).
    #[must_use]
    pub fn first_free(&self) -> Option<AddressSlot> {
        AddressSlot::ALL
            .into_iter()
            .find(|slot| self.get(*slot).is_none())
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        AddressSlot::ALL
            .into_iter()
            .filter(|slot| self.get(*slot).is_some())
            .count()
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.home.is_none() && self.work.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(house: &str) -> Address {
        Address {
            house: house.to_string(),
            street: "Main St".to_string(),
            city: "Cityville".to_string(),
            pincode: "12345".to_string(),
        }
    }

    #[test]
    fn test_first_free_fills_home_then_work() {
        let mut book = Addresses::default();
        assert_eq!(book.first_free(), Some(AddressSlot::Home));

        book.home = Some(address("1"));
        assert_eq!(book.first_free(), Some(AddressSlot::Work));

        book.work = Some(address("2"));
        assert_eq!(book.first_free(), None);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_first_free_reuses_cleared_home() {
        let book = Addresses {
            home: None,
            work: Some(address("2")),
        };
        assert_eq!(book.first_free(), Some(AddressSlot::Home));
    }

    #[test]
    fn test_validate_reports_blank_field() {
        let mut addr = address("1");
        addr.city = "  ".to_string();
        assert_eq!(addr.validate(), Err(AddressError::EmptyField("city")));
    }

    #[test]
    fn test_slot_parse() {
        assert_eq!(AddressSlot::parse("home"), Ok(AddressSlot::Home));
        assert_eq!(AddressSlot::parse("work"), Ok(AddressSlot::Work));
        assert!(AddressSlot::parse("office").is_err());
    }
}
