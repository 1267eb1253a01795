use crate::engine::PartImportanceEngine;
use crate::error::{AttributionError, Result};
use crate::importance::PartImportance;
use crate::segmentation::{PartColorMap, SegmentationMap};
use ndarray::{Array2, Array4, Axis};

/// Classifier under evaluation
///
/// Prototype networks that also return prototype similarities should only
/// expose their class logits here.
pub trait ClassifierModel {
    /// Checkpoint representation understood by the model
    type State;

    /// Class scores with shape `[batch, classes]`
    fn predict(&mut self, image: &Array4<f32>) -> anyhow::Result<Array2<f32>>;

    fn load_weights(&mut self, state: &Self::State) -> anyhow::Result<()>;
}

/// A model paired with the engine explaining it
pub struct ModelExplainer<M> {
    model: M,
    engine: PartImportanceEngine,
}

impl<M: ClassifierModel> ModelExplainer<M> {
    pub fn new(model: M, engine: PartImportanceEngine) -> Self {
        Self { model, engine }
    }

    pub fn predict(&mut self, image: &Array4<f32>) -> Result<Array2<f32>> {
        Ok(self.model.predict(image)?)
    }

    /// Highest-scoring class of a single sample
    pub fn predicted_class(&mut self, image: &Array4<f32>) -> Result<usize> {
        crate::attribution::ensure_single_sample(image)?;
        let scores = self.predict(image)?;
        if scores.nrows() != 1 || scores.ncols() == 0 {
            return Err(AttributionError::shape("class scores", &[1, 1], scores.shape()));
        }
        let best = scores
            .index_axis(Axis(0), 0)
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(class, _)| class);
        Ok(best.unwrap_or_default())
    }

    pub fn load_weights(&mut self, state: &M::State) -> Result<()> {
        Ok(self.model.load_weights(state)?)
    }

    /// Part importance for the class the model actually predicts
    pub fn explain_prediction(
        &mut self,
        image: &Array4<f32>,
        part_map: &SegmentationMap,
        colors: &PartColorMap,
        with_bg: bool,
    ) -> Result<(usize, PartImportance)> {
        let target = self.predicted_class(image)?;
        let table = self
            .engine
            .part_importance(image, part_map, target, colors, with_bg)?;
        Ok((target, table))
    }

    pub fn engine(&mut self) -> &mut PartImportanceEngine {
        &mut self.engine
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{Explainer, PrecomputedAttribution};
    use crate::engine::{EngineConfig, EngineVariant};
    use crate::segmentation::PartColor;
    use ndarray::array;

    struct FixedScores {
        scores: Array2<f32>,
        loaded: Option<String>,
    }

    impl ClassifierModel for FixedScores {
        type State = String;

        fn predict(&mut self, _image: &Array4<f32>) -> anyhow::Result<Array2<f32>> {
            Ok(self.scores.clone())
        }

        fn load_weights(&mut self, state: &String) -> anyhow::Result<()> {
            self.loaded = Some(state.clone());
            Ok(())
        }
    }

    fn wrapper(scores: Array2<f32>) -> ModelExplainer<FixedScores> {
        let mut grid = Array2::zeros((6, 6));
        grid[[1, 1]] = 2.0;
        let explainer = Explainer::pixel(PrecomputedAttribution::from_grid(grid).for_target(2));
        let engine =
            PartImportanceEngine::new(explainer, EngineConfig::new(EngineVariant::Attribution))
                .unwrap();
        ModelExplainer::new(
            FixedScores {
                scores,
                loaded: None,
            },
            engine,
        )
    }

    #[test]
    fn predicted_class_is_argmax() {
        let mut wrapped = wrapper(array![[0.1, -1.0, 3.0, 0.5]]);
        let image = Array4::zeros((1, 3, 6, 6));
        assert_eq!(wrapped.predicted_class(&image).unwrap(), 2);
    }

    #[test]
    fn explains_the_predicted_class() {
        let mut wrapped = wrapper(array![[0.1, -1.0, 3.0, 0.5]]);
        let image = Array4::zeros((1, 3, 6, 6));
        let part_map = SegmentationMap::filled(6, 6, PartColor::new(1, 2, 3));
        let colors = PartColorMap::from_pairs([(PartColor::new(1, 2, 3), "body")]).unwrap();

        let (target, table) = wrapped
            .explain_prediction(&image, &part_map, &colors, false)
            .unwrap();
        assert_eq!(target, 2);
        assert_eq!(table.get("body"), Some(2.0));
    }

    #[test]
    fn weights_are_forwarded() {
        let mut wrapped = wrapper(array![[1.0]]);
        wrapped.load_weights(&"epoch-10".to_string()).unwrap();
        assert_eq!(wrapped.model().loaded.as_deref(), Some("epoch-10"));
    }

    #[test]
    fn empty_scores_are_rejected() {
        let mut wrapped = wrapper(Array2::zeros((1, 0)));
        let image = Array4::zeros((1, 3, 6, 6));
        assert!(wrapped.predicted_class(&image).is_err());
    }
}
