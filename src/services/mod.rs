pub mod analytics;
pub mod classifier;
pub mod geoip;
pub mod image_host;
pub mod links;
pub mod qr;
pub mod redirect;
pub mod short_code;
