use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GatewayError {
    #[snafu(display("gateway id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
    #[snafu(display("gateway request to `{endpoint}` failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("gateway returned status {status} on `{stage}`"))]
    HttpStatus { stage: &'static str, status: u16 },
    #[snafu(display("gateway rejected `{stage}`: {message}"))]
    GraphqlErrors {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("failed to decode gateway response on `{stage}`: {source}"))]
    DecodeResponse {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to decode gateway payload on `{stage}`: {source}"))]
    DecodePayload {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("gateway response on `{stage}` carried no data"))]
    MissingData { stage: &'static str },
    #[snafu(display("failed to build gateway http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
}

pub type GatewayResult<T> = Result<T, GatewayError>;
