pub mod change_password;
pub mod login;
/// Session ownership: bootstrap, refresh scheduling, credential flows.
pub mod session;

pub use change_password::{ChangePasswordView, PasswordFlowCancelled, PasswordFlowDone};
pub use login::LoginView;
pub use session::{
    AuthRequestFailed, AuthStatus, PasswordChanged, PasswordResetSent, SessionChanged,
    SessionState,
};
