use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

use crate::{
    error::MarshalError,
    marshal::{self, PropertyRecord},
    variant::PropertyMap,
};

/// A record shared between a client and its property-change deliveries.
///
/// Readers hold [`PropertyStore::read`] while inspecting fields; [`PropertyStore::write`] is
/// exclusive and is what every in-place update takes.
#[derive(Debug, Default)]
pub struct PropertyStore<R>(Arc<RwLock<R>>);

impl<R> Clone for PropertyStore<R> {
    fn clone(&self) -> Self {
        PropertyStore(self.0.clone())
    }
}

impl<R: PropertyRecord> PropertyStore<R> {
    pub fn new(record: R) -> Self {
        PropertyStore(Arc::new(RwLock::new(record)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, R> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, R> {
        self.0.write()
    }

    pub fn snapshot(&self) -> R {
        self.0.read().clone()
    }

    pub fn to_map(&self) -> PropertyMap {
        marshal::to_map(&*self.0.read())
    }

    /// Apply `map` in place; on error the stored record is unchanged.
    pub fn update_from_map(&self, map: &PropertyMap) -> Result<(), MarshalError> {
        let mut guard = self.0.write();
        marshal::update_from_map(&mut *guard, map)
    }

    /// Replace the stored record with one built from `map`.
    pub fn replace_from_map(&self, map: &PropertyMap) -> Result<(), MarshalError> {
        let record = marshal::from_map::<R>(map)?;
        *self.0.write() = record;
        Ok(())
    }
}
