use crate::engine::FeatureEngine;
use crate::features::{FeatureVector, Label};

/// Maps a feature vector to a decision. Models live outside this crate.
pub trait Classifier: Send + Sync {
    fn classify(&self, features: &FeatureVector) -> anyhow::Result<Label>;
}

/// Extract features for `url` and record the classifier's decision in the label slot.
pub async fn label_url(
    engine: &FeatureEngine,
    classifier: &dyn Classifier,
    url: &str,
) -> anyhow::Result<FeatureVector> {
    let features = engine.extract_features(url).await;
    let label = classifier.classify(&features)?;
    tracing::info!("{} classified as {:?}", url, label);
    Ok(features.with_label(label))
}
