use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Timestamp {0} does not fall into any known precision band (seconds through nanoseconds)")]
    UnrecognizedTimestampMagnitude(f64),

    #[error("Unknown {kind} code: {code}")]
    UnknownEnumCode { kind: &'static str, code: i64 },

    #[error("Unknown {kind} name: '{name}'")]
    UnknownEnumName { kind: &'static str, name: String },

    #[error("Malformed embedded {blob} blob: {source}")]
    MalformedEmbeddedBlob {
        blob: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid numeric value for {0}: {1}")]
    InvalidNumber(String, String),
}
