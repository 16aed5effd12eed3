//! uPNP protocol plumbing: SSDP discovery, description documents, and SOAP.

pub mod description;
pub mod soap;
pub mod ssdp;
pub mod utils;
