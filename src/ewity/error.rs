use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // 连接、超时等传输错误
    #[error("Ewity HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ewity API error: {status} {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Ewity response decode error: {0}")]
    Decode(String),

    #[error("Ewity configuration error: {0}")]
    Config(String),
}
