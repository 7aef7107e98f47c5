mod fixture;
mod http;

pub use fixture::{FixtureProvider, FixtureResponse};
pub use http::HttpJsonProvider;
