//! Client for the room booking REST API.

mod cached;
pub mod envelopes;
pub mod error;
pub mod keys;
pub mod logger;
pub mod services;
pub mod transport;
pub mod types;

pub use cached::{CachedApi, StaleTimes};
pub use error::ApiError;
pub use logger::{ApiLog, ApiLogger, LogKind, LogSummary};
pub use services::{Api, AuthService, MeetingService, RoomService, UserService};
pub use transport::{ApiResponse, Method, Request, ResponseBody, Transport};
pub use types::{BookingPayload, LoginCredentials, LoginResponse, Meeting, MeetingUpdate, User};
