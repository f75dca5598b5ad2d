//! Location inference from embedded GPS metadata.
//!
//! - [`gps`]: EXIF GPS reading via `kamadak-exif`
//! - [`resolver`]: the [`AddressResolver`] seam to an external geocoder
//! - [`extractor`]: first-match-wins scan over a batch and the overwrite policy

pub mod extractor;
pub mod gps;
pub mod resolver;

pub use extractor::{AddressExtractor, AddressOutcome, AddressPolicy, AddressSlot, SharedAddress};
pub use gps::{GeoPoint, read_gps};
pub use resolver::{AddressResolver, CoordinateResolver, ResolveError};
