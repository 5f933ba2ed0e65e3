//! MAC vendor lookup backed by the IEEE OUI database.

use log::{debug, warn};
use mac_oui::Oui;

/// Resolves a MAC address to the name of the organisation it was assigned to.
pub trait VendorLookup: Send + Sync {
    /// `None` when the vendor is unknown or the address cannot be parsed.
    fn vendor(&self, mac: &str) -> Option<String>;
}

/// [`VendorLookup`] over the OUI database bundled with `mac_oui`.
pub struct OuiVendorLookup {
    db: Option<Oui>,
}

impl OuiVendorLookup {
    /// Loads the database. A database that fails to load turns every lookup
    /// into a miss.
    pub fn load() -> Self {
        let db = match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("OUI database unavailable, vendor lookups will be empty: {}", e);
                None
            }
        };
        Self { db }
    }
}

impl VendorLookup for OuiVendorLookup {
    fn vendor(&self, mac: &str) -> Option<String> {
        let db = self.db.as_ref()?;
        match db.lookup_by_mac(mac) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            Ok(None) => None,
            Err(e) => {
                debug!("Vendor lookup for {:?} failed: {}", mac, e);
                None
            }
        }
    }
}
