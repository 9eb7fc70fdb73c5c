use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AuthError {
    #[snafu(display("auth request to `{endpoint}` failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("auth provider rejected `{stage}` with status {status}: {message}"))]
    Provider {
        stage: &'static str,
        status: u16,
        message: String,
    },
    #[snafu(display("failed to decode auth response on `{stage}`: {source}"))]
    DecodeResponse {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("auth provider returned no session on `{stage}`"))]
    MissingSession { stage: &'static str },
    #[snafu(display("failed to build auth http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
}

impl AuthError {
    /// Provider status code, when the backend produced one.
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            Self::Transport { .. }
            | Self::DecodeResponse { .. }
            | Self::MissingSession { .. }
            | Self::BuildClient { .. } => None,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
