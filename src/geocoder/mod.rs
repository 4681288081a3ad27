//! Postcode → coordinates resolution used at registration.

pub mod base;
pub mod postcodes_io;
pub mod static_geocoder;

pub use base::{
    create_geocoder, normalize_postcode, Coordinates, GeocodeError, Geocoder, GeocoderConfig,
};
pub use postcodes_io::{PostcodesIoConfig, PostcodesIoGeocoder};
pub use static_geocoder::{StaticGeocoder, StaticGeocoderConfig};
