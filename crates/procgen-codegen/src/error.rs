use procgen_model::DigitsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("no call layout for {function}")]
    MissingLayout { function: String },
    #[error("no message {name} in the layout")]
    MissingMessage { name: String },
    #[error("fixture for {function}.{field}: {source}")]
    Fixture {
        function: String,
        field: String,
        #[source]
        source: DigitsError,
    },
    #[error("fixture for {function}.{field}: sample {value:?} is not a valid {wire}")]
    Sample {
        function: String,
        field: String,
        value: String,
        wire: String,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
