pub mod middleware;
pub mod nonce;
pub mod token;
