//! EZD registration protocol adapter.
//!
//! Flow for one `RejestrujWplyw` call:
//! 1. `encoder`: form + office config → SOAP request
//! 2. `transport`: POST to the configured endpoint
//! 3. `decoder`: response → `RegistrationResult`
//! 4. `service`: orchestrates the above, converting every failure to data

pub mod decoder;
pub mod encoder;
pub mod service;
pub mod transport;

pub use decoder::decode_register_inflow;
pub use encoder::encode_register_inflow;
pub use service::EzdService;
pub use transport::{HttpTransport, RawResponse, Transport};
