//! Token inspection helpers shared by the session layer

mod claims;

pub use claims::{
    decode_claims, has_bypass_marker, seconds_until_expiry, unsigned_token, ClaimsError,
    TokenClaims,
};
