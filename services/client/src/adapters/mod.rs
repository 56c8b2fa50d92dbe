pub mod clock;
pub mod http;
pub mod token_store;

pub use clock::TokioSleeper;
pub use http::HttpApiAdapter;
pub use token_store::FileTokenStore;
