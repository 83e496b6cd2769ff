use thiserror::Error;

#[derive(Error, Debug)]
pub enum Text2SqlError {
    #[error(
        "Malformed join key between {table1} and {table2} ('{join_key_1}' vs '{join_key_2}'): {reason}"
    )]
    MalformedJoinKey {
        table1: String,
        table2: String,
        join_key_1: String,
        join_key_2: String,
        reason: String,
    },

    #[error("LLM error: {0}")]
    LlmCall(String),

    #[error("Failed to parse LLM response: {message}. Raw response: {raw}")]
    ResponseParse { message: String, raw: String },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Text2SqlError>;
