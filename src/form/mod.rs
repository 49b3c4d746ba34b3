//! Client-side form validation. Nothing here touches the network.

pub mod booking;
pub mod login;
pub mod validation;

pub use booking::BookingForm;
pub use login::LoginForm;
pub use validation::{FormErrors, ValidationError};
