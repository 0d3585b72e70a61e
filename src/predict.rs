//! Cluster assignment of single new observations against a saved bundle.
//!
//! A request goes through four stages: the raw values are ordered by the
//! bundle's feature list and scaled, a cluster is assigned, the cluster is
//! characterized against the other centers, and a risk tier is attached.

use crate::bundle::ModelBundle;
use crate::cluster::Capabilities;
use crate::error::{ClusterError, Result};
use crate::linalg::nearest_row;
use crate::{Matrix, Vector};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const RECOMMENDATIONS: [&str; 3] = [
    "Monitor the key indicators periodically",
    "Use the cluster assignment as a basis for policy planning",
    "Integrate the clusters with spatial data for further analysis",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTierPolicy {
    /// Cluster 0 is low, cluster 1 medium, everything else high. The ids carry
    /// no meaning, so neither does the tier.
    ClusterId,
    /// Clusters are ranked by the mean of their scaled center coordinates and
    /// the rank is split into three bands. Uses `ClusterId` when the model has
    /// no centers.
    #[default]
    CenterRank,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low risk cluster",
            RiskTier::Medium => "Medium risk cluster",
            RiskTier::High => "High risk cluster",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskTier::Low => "Region with relatively stable and controlled indicators.",
            RiskTier::Medium => "Region in a transitional state that needs moderate attention.",
            RiskTier::High => "Region dominated by high indicators that needs priority handling.",
        }
    }

    fn from_cluster_id(cluster: usize) -> Self {
        match cluster {
            0 => RiskTier::Low,
            1 => RiskTier::Medium,
            _ => RiskTier::High,
        }
    }

    fn from_rank(rank: usize, count: usize) -> Self {
        if count < 2 {
            return RiskTier::Low;
        }
        let band = (2.0 * rank as f64 / (count - 1) as f64).round() as usize;
        match band {
            0 => RiskTier::Low,
            1 => RiskTier::Medium,
            _ => RiskTier::High,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPath {
    Native,
    NearestCenter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relative {
    Higher,
    Lower,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureTrait {
    pub feature: String,
    pub level: Relative,
    pub center_value: f64,
    pub original_value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    pub cluster: usize,
    pub assignment: AssignmentPath,
    pub characterization: Vec<FeatureTrait>,
    pub projected: [f64; 2],
    pub risk: RiskTier,
    pub risk_label: &'static str,
    pub risk_description: &'static str,
    pub recommendations: Vec<&'static str>,
}

pub fn nearest_center(scaled: &Vector, centers: &Matrix) -> usize {
    nearest_row(&scaled.view(), centers)
}

#[derive(Clone, Debug)]
pub struct Predictor {
    bundle: ModelBundle,
    policy: RiskTierPolicy,
    native_classification: bool,
}

impl Predictor {
    pub fn new(bundle: ModelBundle) -> Self {
        Self {
            bundle,
            policy: RiskTierPolicy::default(),
            native_classification: true,
        }
    }

    pub fn risk_tier_policy(mut self, policy: RiskTierPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// When disabled, models with centers are assigned to the nearest stored
    /// center even if they carry their own classification rule.
    pub fn native_classification(mut self, enabled: bool) -> Self {
        self.native_classification = enabled;
        self
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn features(&self) -> &[String] {
        &self.bundle.features
    }

    /// Assigns one observation given as `(feature name, raw value)` pairs.
    ///
    /// The observation must name exactly the bundle's features; order does not
    /// matter and nothing is defaulted.
    pub fn predict<'a, I>(&self, observation: I) -> Result<Prediction>
    where
        I: IntoIterator<Item = (&'a String, &'a f64)>,
    {
        let raw = self.order_features(observation)?;
        let scaled = self.bundle.scaler.transform_row(&raw.view())?;

        let (cluster, assignment) = self.assign(&scaled)?;
        let characterization = self.characterize(cluster);
        let projection = self.bundle.projector.transform_row(&scaled.view())?;
        let risk = self.risk_tier(cluster);

        info!(
            "Observation assigned to cluster {} via {:?} ({:?} risk)",
            cluster, assignment, risk
        );

        Ok(Prediction {
            cluster,
            assignment,
            characterization,
            projected: [projection[0], projection[1]],
            risk,
            risk_label: risk.label(),
            risk_description: risk.description(),
            recommendations: RECOMMENDATIONS.to_vec(),
        })
    }

    fn order_features<'a, I>(&self, observation: I) -> Result<Vector>
    where
        I: IntoIterator<Item = (&'a String, &'a f64)>,
    {
        let supplied: BTreeMap<&str, f64> = observation
            .into_iter()
            .map(|(name, &value)| (name.as_str(), value))
            .collect();

        let missing: Vec<String> = self
            .features()
            .iter()
            .filter(|name| !supplied.contains_key(name.as_str()))
            .cloned()
            .collect();
        let unexpected: Vec<String> = supplied
            .keys()
            .filter(|name| !self.features().iter().any(|f| f == *name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(ClusterError::FeatureMismatch {
                missing,
                unexpected,
            });
        }

        let values: Vector = self
            .features()
            .iter()
            .map(|name| supplied[name.as_str()])
            .collect();
        if let Some((name, value)) = self
            .features()
            .iter()
            .zip(values.iter())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(ClusterError::InvalidObservation {
                message: format!("'{}' is {}, values must be finite", name, value),
            });
        }
        Ok(values)
    }

    fn assign(&self, scaled: &Vector) -> Result<(usize, AssignmentPath)> {
        let model = &self.bundle.model;
        let unsupported = || ClusterError::NoInferenceSupport {
            algorithm: model.algorithm().to_string(),
        };

        match model.capabilities() {
            Capabilities {
                native_classify: true,
                ..
            } if self.native_classification => {
                Ok((model.predict_row(&scaled.view())?, AssignmentPath::Native))
            }
            Capabilities { centers: true, .. } => {
                let centers = model.centers().ok_or_else(unsupported)?;
                Ok((nearest_center(scaled, centers), AssignmentPath::NearestCenter))
            }
            Capabilities { .. } => Err(unsupported()),
        }
    }

    fn characterize(&self, cluster: usize) -> Vec<FeatureTrait> {
        let Some(centers) = self.bundle.model.centers() else {
            debug!("Model has no centers, skipping characterization");
            return Vec::new();
        };
        let Some(overall) = centers.mean_axis(Axis(0)) else {
            return Vec::new();
        };
        if cluster >= centers.nrows() {
            return Vec::new();
        }

        let center = centers.row(cluster);
        let mean = self.bundle.scaler.mean();
        let std = self.bundle.scaler.std();
        self.features()
            .iter()
            .enumerate()
            .map(|(j, feature)| {
                let original_value = match (mean, std) {
                    (Some(m), Some(s)) => m[j] + s[j] * center[j],
                    _ => center[j],
                };
                FeatureTrait {
                    feature: feature.clone(),
                    level: if center[j] > overall[j] {
                        Relative::Higher
                    } else {
                        Relative::Lower
                    },
                    center_value: center[j],
                    original_value,
                }
            })
            .collect()
    }

    fn risk_tier(&self, cluster: usize) -> RiskTier {
        match (self.policy, self.bundle.model.centers()) {
            (RiskTierPolicy::CenterRank, Some(centers)) if cluster < centers.nrows() => {
                let scores: Vec<f64> = centers
                    .axis_iter(Axis(0))
                    .map(|row| row.mean().unwrap_or(0.0))
                    .collect();
                let mut order: Vec<usize> = (0..scores.len()).collect();
                order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));
                let rank = order.iter().position(|&c| c == cluster).unwrap_or(0);
                RiskTier::from_rank(rank, scores.len())
            }
            _ => RiskTier::from_cluster_id(cluster),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Algorithm, FittedModel, GaussianMixture, KMeans, SpectralClustering};
    use crate::decomposition::Pca;
    use crate::error::ErrorKind;
    use crate::preprocessing::StandardScaler;
    use crate::linalg::euclidean;
    use ndarray::array;

    fn names() -> Vec<String> {
        vec!["rain".to_string(), "temp".to_string()]
    }

    fn three_groups() -> Matrix {
        array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [5.0, 5.0],
            [5.1, 5.2],
            [4.9, 5.1],
            [10.0, 0.0],
            [10.2, 0.1],
            [9.9, 0.2]
        ]
    }

    fn bundle_with(model: FittedModel, x: &Matrix) -> ModelBundle {
        let features = names();
        let mut scaler = StandardScaler::new().feature_names(&features);
        scaler.fit(x).unwrap();
        let scaled = scaler.transform(x).unwrap();
        let mut projector = Pca::new(2);
        projector.fit(&scaled).unwrap();
        let model = match model {
            FittedModel::KMeans(mut m) => {
                m.fit(&scaled).unwrap();
                FittedModel::KMeans(m)
            }
            FittedModel::GaussianMixture(mut m) => {
                m.fit(&scaled).unwrap();
                FittedModel::GaussianMixture(m)
            }
            FittedModel::Spectral(mut m) => {
                m.fit(&scaled).unwrap();
                FittedModel::Spectral(m)
            }
            other => other,
        };
        ModelBundle {
            algorithm: model.algorithm(),
            model,
            scaler,
            projector,
            best_k: 3,
            features,
        }
    }

    fn observation(rain: f64, temp: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([("rain".to_string(), rain), ("temp".to_string(), temp)])
    }

    #[test]
    fn test_assignment_matches_brute_force_nearest_center() {
        let x = three_groups();
        let bundle = bundle_with(FittedModel::KMeans(KMeans::new(3)), &x);
        let centers = bundle.model.centers().unwrap().clone();
        let predictor = Predictor::new(bundle);

        for (rain, temp) in [(0.5, 0.5), (4.0, 4.0), (8.0, 1.0), (6.0, 3.0), (2.5, 2.5)] {
            let obs = observation(rain, temp);
            let prediction = predictor.predict(&obs).unwrap();

            let raw = array![rain, temp];
            let scaled = predictor.bundle().scaler.transform_row(&raw.view()).unwrap();
            let brute = (0..centers.nrows())
                .min_by(|&a, &b| {
                    euclidean(&scaled.view(), &centers.row(a))
                        .total_cmp(&euclidean(&scaled.view(), &centers.row(b)))
                })
                .unwrap();

            assert_eq!(prediction.cluster, brute);
            assert_eq!(nearest_center(&scaled, &centers), brute);
            assert_eq!(prediction.assignment, AssignmentPath::Native);
        }
    }

    fn brute_force_nearest(predictor: &Predictor, rain: f64, temp: f64) -> usize {
        let centers = predictor.bundle().model.centers().unwrap();
        let scaled = predictor
            .bundle()
            .scaler
            .transform_row(&array![rain, temp].view())
            .unwrap();
        (0..centers.nrows())
            .min_by(|&a, &b| {
                euclidean(&scaled.view(), &centers.row(a))
                    .total_cmp(&euclidean(&scaled.view(), &centers.row(b)))
            })
            .unwrap()
    }

    #[test]
    fn test_fallback_assigns_nearest_center_without_native_rule() {
        let x = three_groups();
        for model in [
            FittedModel::KMeans(KMeans::new(3)),
            FittedModel::GaussianMixture(GaussianMixture::new(3)),
        ] {
            let predictor = Predictor::new(bundle_with(model, &x)).native_classification(false);

            for (rain, temp) in [(0.5, 0.5), (4.0, 4.0), (8.0, 1.0), (6.0, 3.0), (2.5, 2.5)] {
                let prediction = predictor.predict(&observation(rain, temp)).unwrap();
                assert_eq!(prediction.assignment, AssignmentPath::NearestCenter);
                assert_eq!(prediction.cluster, brute_force_nearest(&predictor, rain, temp));
                assert_eq!(prediction.characterization.len(), 2);
            }
        }
    }

    #[test]
    fn test_fallback_still_needs_centers() {
        let x = three_groups();
        let predictor = Predictor::new(bundle_with(
            FittedModel::Spectral(SpectralClustering::new(3)),
            &x,
        ))
        .native_classification(false);

        let err = predictor.predict(&observation(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, ClusterError::NoInferenceSupport { .. }));
    }

    #[test]
    fn test_non_finite_value_is_input_error() {
        let x = three_groups();
        let predictor = Predictor::new(bundle_with(FittedModel::KMeans(KMeans::new(3)), &x));

        for bad in [f64::NAN, f64::INFINITY] {
            let err = predictor.predict(&observation(1.0, bad)).unwrap_err();
            match &err {
                ClusterError::InvalidObservation { message } => assert!(message.contains("temp")),
                other => panic!("expected InvalidObservation, got {:?}", other),
            }
            assert_eq!(err.kind(), ErrorKind::Input);
        }
    }

    #[test]
    fn test_characterization_against_center_mean() {
        let x = three_groups();
        let predictor = Predictor::new(bundle_with(FittedModel::KMeans(KMeans::new(3)), &x));

        let prediction = predictor.predict(&observation(10.0, 0.0)).unwrap();
        let traits = &prediction.characterization;
        assert_eq!(traits.len(), 2);
        assert_eq!(traits[0].feature, "rain");
        assert_eq!(traits[0].level, Relative::Higher);
        assert_eq!(traits[1].level, Relative::Lower);
        assert!((traits[0].original_value - 10.033333333333333).abs() < 1e-9);
        assert_eq!(prediction.recommendations.len(), 3);
    }

    #[test]
    fn test_center_rank_orders_by_center_level() {
        let x = three_groups();
        let predictor = Predictor::new(bundle_with(FittedModel::KMeans(KMeans::new(3)), &x));

        // Center means in scaled space: (0,0) group lowest, (5,5) group highest
        let low = predictor.predict(&observation(0.1, 0.1)).unwrap();
        let high = predictor.predict(&observation(5.0, 5.0)).unwrap();
        let middle = predictor.predict(&observation(10.0, 0.1)).unwrap();

        assert_eq!(low.risk, RiskTier::Low);
        assert_eq!(middle.risk, RiskTier::Medium);
        assert_eq!(high.risk, RiskTier::High);
        assert_eq!(high.risk_label, RiskTier::High.label());
    }

    #[test]
    fn test_cluster_id_policy() {
        let x = three_groups();
        let predictor = Predictor::new(bundle_with(FittedModel::KMeans(KMeans::new(3)), &x))
            .risk_tier_policy(RiskTierPolicy::ClusterId);

        for (rain, temp) in [(0.1, 0.1), (5.0, 5.0), (10.0, 0.1)] {
            let prediction = predictor.predict(&observation(rain, temp)).unwrap();
            let expected = match prediction.cluster {
                0 => RiskTier::Low,
                1 => RiskTier::Medium,
                _ => RiskTier::High,
            };
            assert_eq!(prediction.risk, expected);
        }
    }

    #[test]
    fn test_rank_bands() {
        assert_eq!(RiskTier::from_rank(0, 1), RiskTier::Low);
        assert_eq!(RiskTier::from_rank(0, 2), RiskTier::Low);
        assert_eq!(RiskTier::from_rank(1, 2), RiskTier::High);
        let four: Vec<RiskTier> = (0..4).map(|r| RiskTier::from_rank(r, 4)).collect();
        assert_eq!(
            four,
            vec![RiskTier::Low, RiskTier::Medium, RiskTier::Medium, RiskTier::High]
        );
    }

    #[test]
    fn test_model_without_centers_has_no_inference() {
        let x = three_groups();
        let predictor = Predictor::new(bundle_with(
            FittedModel::Spectral(SpectralClustering::new(3)),
            &x,
        ));

        let err = predictor.predict(&observation(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, ClusterError::NoInferenceSupport { .. }));
        assert_eq!(err.kind(), ErrorKind::InferenceSupport);
        assert_eq!(predictor.bundle().algorithm, Algorithm::Spectral);
    }

    #[test]
    fn test_feature_mismatch() {
        let x = three_groups();
        let predictor = Predictor::new(bundle_with(FittedModel::KMeans(KMeans::new(3)), &x));

        let mut obs = BTreeMap::from([("rain".to_string(), 1.0)]);
        match predictor.predict(&obs) {
            Err(ClusterError::FeatureMismatch { missing, unexpected }) => {
                assert_eq!(missing, vec!["temp".to_string()]);
                assert!(unexpected.is_empty());
            }
            other => panic!("expected FeatureMismatch, got {:?}", other),
        }

        obs.insert("temp".to_string(), 2.0);
        obs.insert("wind".to_string(), 3.0);
        match predictor.predict(&obs) {
            Err(ClusterError::FeatureMismatch { missing, unexpected }) => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec!["wind".to_string()]);
            }
            other => panic!("expected FeatureMismatch, got {:?}", other),
        }
    }
}
