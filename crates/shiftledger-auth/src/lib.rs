//! The credential lifecycle: registration, login, refresh-token rotation
//! with reuse detection, e-mail OTP verification, password reset, employee
//! management, and role permissions.

pub mod email;
pub mod permissions;
pub mod reset;
pub mod service;
pub mod slug;
pub mod users;
pub mod verification;

pub use email::{CapturedEmail, CapturingEmailSender, EmailSender, LogEmailSender};
pub use permissions::PermissionService;
pub use reset::PasswordResetService;
pub use service::{AuthService, TokenPair};
pub use users::{EmployeeCreate, EmployeeService, EmployeeUpdate};
pub use verification::VerificationService;
