mod conversions;

pub use conversions::InfraError;
pub(crate) use conversions::storage_error;
