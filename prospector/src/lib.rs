//! Concrete collaborators and command line plumbing for mineral scans
//!
//! Provides the HTTP geocoder, the directory-backed imagery archive and the
//! argument parsing shared by the scanning tools.

pub mod archive;
pub mod nominatim;
pub mod shared_args;

pub use archive::{Catalog, CatalogScene, DirectoryArchive};
pub use nominatim::NominatimGeocoder;
