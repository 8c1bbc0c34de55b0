use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error(
        "Fills for {group} are out of order: {current} follows {previous}. The cumulative series must be rebuilt from sorted input."
    )]
    OutOfOrderFillSequence {
        group: String,
        previous: f64,
        current: f64,
    },

    #[error("Fill of order '{0}' has a non-directional side and cannot move inventory")]
    NonDirectionalSide(String),
}
