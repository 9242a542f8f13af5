//! Artifacts, scoring and explanation components

pub mod bundle;
pub mod encoder;
pub mod explainer;
pub mod forest;
pub mod inference;
pub mod loader;
pub mod scaler;

pub use bundle::ArtifactBundle;
pub use encoder::{CategoricalEncoder, UnseenCategory};
pub use explainer::{AttributionEngine, Contributions};
pub use forest::TreeEnsemble;
pub use inference::RiskScorer;
pub use loader::{ArtifactSource, FileArtifactSource};
pub use scaler::StandardScaler;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::BTreeMap;

    pub const FIXTURE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/artifacts");

    /// The frozen bundle under `tests/fixtures/artifacts`, parsed in memory.
    pub fn fixture_bundle() -> ArtifactBundle {
        let model: forest::ModelArtifact =
            serde_json::from_str(include_str!("../../tests/fixtures/artifacts/model.json")).unwrap();
        let encoders: BTreeMap<String, CategoricalEncoder> =
            serde_json::from_str(include_str!("../../tests/fixtures/artifacts/encoders.json"))
                .unwrap();
        let scaler: StandardScaler =
            serde_json::from_str(include_str!("../../tests/fixtures/artifacts/scaler.json"))
                .unwrap();
        let features: Vec<String> =
            serde_json::from_str(include_str!("../../tests/fixtures/artifacts/features.json"))
                .unwrap();

        ArtifactBundle::new(
            TreeEnsemble::from_artifact(model).unwrap(),
            encoders,
            scaler,
            features,
        )
        .unwrap()
    }
}
