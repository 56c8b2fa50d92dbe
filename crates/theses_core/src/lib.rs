pub mod domain;
pub mod payment;
pub mod ports;
pub mod session;

#[cfg(test)]
mod testing;

pub use domain::{
    AccessToken, Acknowledgement, CheckoutSession, CheckoutStatus, ClaimReview, ClaimType,
    ConfirmationParams, ConfirmationStatus, Credentials, NewUser, ProfileUpdate, ReportType,
    SessionSnapshot, ThesisClaim, UserProfile, UserRole,
};
pub use payment::{PaymentConfirmation, PollOutcome, PollerConfig};
pub use ports::{AuthApi, CheckoutApi, PortError, PortResult, Sleeper, TokenStore};
pub use session::{SessionError, SessionManager};
