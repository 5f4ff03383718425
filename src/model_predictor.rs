use ndarray::arr2;
use numpy::IntoPyArray;
use pyo3::prelude::*;

use crate::error::{IdsError, Result};
use crate::features::FeatureVector;

/// Scoring boundary: a feature vector in, an attack probability in [0, 1]
/// out. The engine only ever sees this trait, so the model backend can be
/// swapped (or stubbed in tests) without touching the pipeline.
pub trait Classifier {
    fn predict_probability(&self, features: &FeatureVector) -> Result<f64>;
}

/// Pretrained scikit-learn binary classifier, loaded once from its joblib
/// artifact and scored through the embedded interpreter.
pub struct ModelPredictor {
    model: PyObject,
}

impl ModelPredictor {
    pub fn load(model_path: &str) -> Result<Self> {
        Python::with_gil(|py| {
            let joblib = py
                .import("joblib")
                .map_err(|e| IdsError::Model(format!("joblib unavailable: {}", e)))?;
            let model = joblib
                .call_method1("load", (model_path,))
                .map_err(|e| {
                    IdsError::Model(format!(
                        "failed to load model artifact '{}': {}",
                        model_path, e
                    ))
                })?
                .into();
            Ok(ModelPredictor { model })
        })
    }
}

impl Classifier for ModelPredictor {
    fn predict_probability(&self, features: &FeatureVector) -> Result<f64> {
        Python::with_gil(|py| {
            // One row, five columns, same order as training.
            let x = arr2(&[features.0]).into_pyarray(py);
            let proba = self
                .model
                .call_method1(py, "predict_proba", (x,))
                .map_err(|e| IdsError::Classification(format!("predict_proba failed: {}", e)))?;
            let rows: Vec<Vec<f64>> = proba
                .extract(py)
                .map_err(|e| IdsError::Classification(format!("unexpected model output: {}", e)))?;
            // Column 1 is the positive ("attack") class.
            rows.first()
                .and_then(|row| row.get(1))
                .copied()
                .ok_or_else(|| {
                    IdsError::Classification("model returned no attack-class probability".to_string())
                })
        })
    }
}
