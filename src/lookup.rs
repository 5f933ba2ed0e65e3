//! Address annotation: vendor names from the OUI registry and system names
//! from a local prefix table. A miss is never an error.

pub mod systems;
pub mod vendor;

pub use systems::SystemTable;
pub use vendor::{OuiVendorLookup, VendorLookup};
