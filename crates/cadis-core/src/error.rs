#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("invalid cycle plan: {0}")]
    InvalidPlan(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
