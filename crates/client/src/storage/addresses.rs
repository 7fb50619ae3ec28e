//! Saved shipping addresses.
//!
//! Addresses never leave the device until one is used for an order. The
//! whole list is stored as one JSON value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shopfront_core::{AddressId, PhoneNumber};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use super::{KeyValueStore, StorageError, get_json, set_json};
use crate::api::ShippingInfo;

const ADDRESSES_KEY: &str = "shipping_addresses";

/// Errors from address book operations.
#[derive(Debug, Error)]
pub enum AddressError {
    /// No address with this ID.
    #[error("address not found: {0}")]
    NotFound(AddressId),

    /// A required field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Address fields as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub full_name: String,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: PhoneNumber,
}

impl NewAddress {
    fn validate(self) -> Result<Self, AddressError> {
        let required = [
            ("full name", &self.full_name),
            ("address", &self.line1),
            ("city", &self.city),
            ("postal code", &self.postal_code),
            ("country", &self.country),
        ];
        if let Some(&(field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(AddressError::MissingField(field));
        }

        Ok(Self {
            full_name: self.full_name.trim().to_string(),
            line1: self.line1.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: self.country.trim().to_string(),
            phone: self.phone,
        })
    }
}

/// A saved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    #[serde(flatten)]
    pub fields: NewAddress,
    #[serde(default)]
    pub is_default: bool,
}

impl From<&Address> for ShippingInfo {
    fn from(address: &Address) -> Self {
        Self {
            full_name: address.fields.full_name.clone(),
            address: address.fields.line1.clone(),
            city: address.fields.city.clone(),
            postal_code: address.fields.postal_code.clone(),
            country: address.fields.country.clone(),
            phone: address.fields.phone.clone(),
        }
    }
}

/// CRUD over the saved address list.
///
/// At most one address is the default. The first address saved becomes the
/// default, and removing the default promotes the oldest remaining address.
#[derive(Clone)]
pub struct AddressBook {
    store: Arc<dyn KeyValueStore>,
    /// Held across each read-modify-write of the list. Shared by clones.
    edit_lock: Arc<Mutex<()>>,
}

impl AddressBook {
    /// Wrap a key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            edit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// All saved addresses, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn list(&self) -> Result<Vec<Address>, AddressError> {
        Ok(get_json(self.store.as_ref(), ADDRESSES_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Look up one address.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no address has this ID.
    pub async fn get(&self, id: AddressId) -> Result<Address, AddressError> {
        self.list()
            .await?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or(AddressError::NotFound(id))
    }

    /// The default address, if any are saved.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub async fn default_address(&self) -> Result<Option<Address>, AddressError> {
        let addresses = self.list().await?;
        let default = addresses.iter().find(|a| a.is_default).cloned();
        Ok(default.or_else(|| addresses.into_iter().next()))
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for blank fields, or a storage error.
    #[instrument(skip(self, fields))]
    pub async fn add(&self, fields: NewAddress) -> Result<Address, AddressError> {
        let fields = fields.validate()?;
        let _editing = self.edit_lock.lock().await;
        let mut addresses = self.list().await?;

        let address = Address {
            id: AddressId::generate(),
            fields,
            is_default: addresses.is_empty(),
        };
        addresses.push(address.clone());
        self.save(&addresses).await?;

        info!(address_id = %address.id, "Address saved");
        Ok(address)
    }

    /// Replace the fields of an existing address.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `MissingField`, or a storage error.
    pub async fn update(&self, id: AddressId, fields: NewAddress) -> Result<Address, AddressError> {
        let fields = fields.validate()?;
        let _editing = self.edit_lock.lock().await;
        let mut addresses = self.list().await?;

        let address = addresses
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AddressError::NotFound(id))?;
        address.fields = fields;
        let updated = address.clone();

        self.save(&addresses).await?;
        Ok(updated)
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or a storage error.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: AddressId) -> Result<(), AddressError> {
        let _editing = self.edit_lock.lock().await;
        let mut addresses = self.list().await?;
        let index = addresses
            .iter()
            .position(|a| a.id == id)
            .ok_or(AddressError::NotFound(id))?;

        let removed = addresses.remove(index);
        if removed.is_default
            && let Some(first) = addresses.first_mut()
        {
            first.is_default = true;
        }

        self.save(&addresses).await?;
        info!(address_id = %id, "Address removed");
        Ok(())
    }

    /// Make an address the default.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or a storage error.
    pub async fn set_default(&self, id: AddressId) -> Result<(), AddressError> {
        let _editing = self.edit_lock.lock().await;
        let mut addresses = self.list().await?;
        if !addresses.iter().any(|a| a.id == id) {
            return Err(AddressError::NotFound(id));
        }

        for address in &mut addresses {
            address.is_default = address.id == id;
        }
        self.save(&addresses).await
    }

    async fn save(&self, addresses: &[Address]) -> Result<(), AddressError> {
        set_json(self.store.as_ref(), ADDRESSES_KEY, addresses).await?;
        Ok(())
    }
}
