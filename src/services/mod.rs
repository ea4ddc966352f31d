pub mod auth;
pub mod notify;
pub mod payments;
pub mod proofs;
