use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::decoder::{Decoder, DecoderOrder};
use crate::errors::{Result, RutagError};
use crate::feature::{Instance, InstanceSet};
use crate::loss::{hamming_loss, Evaluation};
use crate::model::LinearModel;
use crate::vector::SparseDiffVector;

/// Summary of one training epoch.
#[derive(Clone, Debug)]
#[cfg_attr(docsrs, doc(cfg(feature = "train")))]
pub struct EpochReport {
    /// Zero-based epoch number.
    pub epoch: usize,

    /// Sum of the Hamming losses of the candidates found during the epoch.
    pub loss: usize,

    /// Number of instances that changed the weights.
    pub updates: usize,

    /// Result on the held-out set if one was given.
    pub evaluation: Option<Evaluation>,
}

/// Online trainer using the Passive-Aggressive (PA-I) update.
#[derive(Clone, Debug)]
#[cfg_attr(docsrs, doc(cfg(feature = "train")))]
pub struct Trainer {
    epochs: usize,
    c: f64,
    margin_loss: bool,
    order: DecoderOrder,
    averaging: bool,
    shuffle_seed: Option<u64>,
}

impl Trainer {
    /// Creates a new trainer
    pub const fn new() -> Self {
        Self {
            epochs: 50,
            c: 0.8,
            margin_loss: true,
            order: DecoderOrder::Linear,
            averaging: false,
            shuffle_seed: None,
        }
    }

    /// Sets the number of epochs. 0 leaves the model untouched.
    pub const fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Sets the aggressiveness bound of the update step.
    ///
    /// # Errors
    ///
    /// `c` must be a positive finite number.
    pub fn c(mut self, c: f64) -> Result<Self> {
        if !c.is_finite() || c <= 0.0 {
            return Err(RutagError::invalid_argument("c", "must be positive"));
        }
        self.c = c;
        Ok(self)
    }

    /// Enables or disables the Hamming margin.
    ///
    /// When enabled, candidates are found by loss-augmented decoding and the required margin is
    /// their Hamming loss. Otherwise candidates are found by plain decoding and the margin is 1.
    pub const fn margin_loss(mut self, enabled: bool) -> Self {
        self.margin_loss = enabled;
        self
    }

    /// Sets the decoder order.
    pub const fn order(mut self, order: DecoderOrder) -> Self {
        self.order = order;
        self
    }

    /// Enables weight averaging.
    pub const fn averaging(mut self, enabled: bool) -> Self {
        self.averaging = enabled;
        self
    }

    /// Shuffles the instances every epoch with the given seed. `None` keeps the input order.
    pub const fn shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    /// Gets the decoder order.
    #[inline(always)]
    pub const fn decoder_order(&self) -> DecoderOrder {
        self.order
    }

    /// Presents one instance and updates the model unless the candidate equals the gold
    /// labeling.
    ///
    /// The step is `min(C, margin / ||delta||^2)`, so every update strictly raises the score of
    /// the gold labeling over the candidate.
    ///
    /// `f` receives every touched weight index and its added value. Returns the Hamming loss of
    /// the candidate and whether the model changed.
    pub(crate) fn update_instance<F>(
        &self,
        decoder: &Decoder,
        model: &mut LinearModel,
        instance: &Instance,
        f: F,
    ) -> (usize, bool)
    where
        F: FnMut(usize, f64),
    {
        let Some(gold) = instance.labels() else {
            return (0, false);
        };
        let positions = instance.positions();
        let candidate = if self.margin_loss {
            decoder.decode_loss_augmented(model, positions, gold)
        } else {
            decoder.decode(model, positions)
        };
        let loss = hamming_loss(gold, &candidate);
        if loss == 0 {
            return (0, false);
        }
        let diff = SparseDiffVector::new(positions, gold, &candidate, self.order.with_bigram());
        let norm = diff.squared_norm();
        if norm == 0.0 {
            log::debug!("skipped an instance with identical feature vectors");
            return (loss, false);
        }
        let margin = if self.margin_loss { loss as f64 } else { 1.0 };
        let tau = self.c.min(margin / norm);
        diff.apply(model, tau, f);
        (loss, true)
    }

    /// Trains the model in place.
    ///
    /// # Arguments
    ///
    /// * `model` - Model to update. Its dimensions must cover the alphabets of `train`.
    /// * `train` - Training instances. Every instance must have gold labels.
    /// * `test` - Held-out instances evaluated after every epoch.
    /// * `callback` - Called after every epoch with the report and the current model.
    ///
    /// # Errors
    ///
    /// Returns an error if a training instance has no label, or if `callback` fails.
    pub fn train<F>(
        &self,
        model: &mut LinearModel,
        train: &InstanceSet,
        test: Option<&InstanceSet>,
        mut callback: F,
    ) -> Result<Vec<EpochReport>>
    where
        F: FnMut(&EpochReport, &LinearModel) -> Result<()>,
    {
        if train.instances().iter().any(|inst| inst.labels().is_none()) {
            return Err(RutagError::invalid_argument(
                "train",
                "training instances must have gold labels",
            ));
        }
        let decoder = Decoder::new(self.order);
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut rng = self.shuffle_seed.map(StdRng::seed_from_u64);

        // sum of c * delta for averaging, where c counts presented instances
        let mut summed_updates = vec![];
        let mut update_counter = 1.0;

        log::info!(
            "training with PA-I (order: {}, c: {}, margin_loss: {}, averaging: {})",
            self.order,
            self.c,
            self.margin_loss,
            self.averaging,
        );

        let start = Instant::now();
        let mut reports = Vec::with_capacity(self.epochs);
        for epoch in 0..self.epochs {
            if let Some(rng) = rng.as_mut() {
                order.shuffle(rng);
            }
            let mut loss_total = 0;
            let mut updates = 0;
            for &i in &order {
                let (loss, updated) = self.update_instance(
                    &decoder,
                    model,
                    &train.instances()[i],
                    |widx, v| {
                        if self.averaging {
                            if summed_updates.len() <= widx {
                                summed_updates.resize(widx + 1, 0.0);
                            }
                            summed_updates[widx] += update_counter * v;
                        }
                    },
                );
                loss_total += loss;
                if updated {
                    updates += 1;
                }
                update_counter += 1.0;
            }

            let averaged = self
                .averaging
                .then(|| averaged_model(model, &summed_updates, update_counter));
            let current = averaged.as_ref().unwrap_or(&*model);
            let evaluation = test.map(|test| evaluate(&decoder, current, test));

            let report = EpochReport {
                epoch,
                loss: loss_total,
                updates,
                evaluation,
            };
            let elapsed = start.elapsed().as_secs_f64();
            match &report.evaluation {
                Some(e) => log::info!(
                    "epoch={epoch}, elapsed={elapsed:.3}, loss={loss_total}, updates={updates}, test: {e}"
                ),
                None => log::info!(
                    "epoch={epoch}, elapsed={elapsed:.3}, loss={loss_total}, updates={updates}"
                ),
            }
            callback(&report, current)?;
            reports.push(report);
        }

        if self.averaging && !reports.is_empty() {
            *model = averaged_model(model, &summed_updates, update_counter);
        }
        model.prune();
        Ok(reports)
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new()
    }
}

fn averaged_model(model: &LinearModel, summed_updates: &[f64], update_counter: f64) -> LinearModel {
    let mut averaged = model.clone();
    for (w, s) in averaged.weights.iter_mut().zip(summed_updates) {
        *w -= s / update_counter;
    }
    averaged
}

/// Decodes every instance with gold labels and accumulates the result.
pub fn evaluate(decoder: &Decoder, model: &LinearModel, instances: &InstanceSet) -> Evaluation {
    let mut evaluation = Evaluation::new();
    for inst in instances.instances() {
        if let Some(gold) = inst.labels() {
            let predicted = decoder.decode(model, inst.positions());
            evaluation.add(gold, &predicted);
        }
    }
    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::corpus::Sentence;
    use crate::feature::FeatureSet;

    fn instance(positions: Vec<FeatureSet>, labels: Vec<u32>) -> Instance {
        Instance::new(positions, Some(labels), Sentence::default())
    }

    fn toy_set() -> InstanceSet {
        // feature 0 = "a", feature 1 = "b"; label 0 = X, label 1 = Y
        vec![instance(
            vec![FeatureSet::new(&[0], &[]), FeatureSet::new(&[1], &[])],
            vec![0, 1],
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_invalid_c() {
        assert!(Trainer::new().c(0.0).is_err());
        assert!(Trainer::new().c(-1.0).is_err());
        assert!(Trainer::new().c(f64::NAN).is_err());
        assert!(Trainer::new().c(0.5).is_ok());
    }

    #[test]
    fn test_zero_epochs() {
        let mut model = LinearModel::new(2, 2);
        let reports = Trainer::new()
            .epochs(0)
            .train(&mut model, &toy_set(), None, |_, _| Ok(()))
            .unwrap();

        assert!(reports.is_empty());
        assert!(model.is_zero());
    }

    #[test]
    fn test_first_update_step() {
        let trainer = Trainer::new().c(0.8).unwrap();
        let decoder = Decoder::new(DecoderOrder::Linear);
        let mut model = LinearModel::new(2, 2);
        let set = toy_set();

        let (loss, updated) =
            trainer.update_instance(&decoder, &mut model, &set.instances()[0], |_, _| {});

        // the loss-augmented candidate is Y X; 6 cells differ, so tau = min(0.8, 2 / 6)
        assert_eq!(2, loss);
        assert!(updated);
        let tau = 2.0 / 6.0;
        assert!((model.score(&[0], 0) - tau).abs() < 1e-12);
        assert!((model.score(&[0], 1) + tau).abs() < 1e-12);
        assert!((model.transition_score(0, 1) - tau).abs() < 1e-12);
        assert_eq!(vec![0, 1], decoder.decode(&model, set.instances()[0].positions()));
    }

    #[test]
    fn test_step_is_bounded_by_c() {
        let trainer = Trainer::new().c(0.1).unwrap();
        let decoder = Decoder::new(DecoderOrder::Linear);
        let mut model = LinearModel::new(2, 2);
        let set = toy_set();

        trainer.update_instance(&decoder, &mut model, &set.instances()[0], |_, _| {});

        assert!((model.score(&[0], 0) - 0.1).abs() < 1e-12);
    }

    fn gold_margin(
        model: &LinearModel,
        inst: &Instance,
        candidate: &[u32],
        with_bigram: bool,
    ) -> f64 {
        model.score_path(inst.positions(), inst.labels().unwrap(), with_bigram)
            - model.score_path(inst.positions(), candidate, with_bigram)
    }

    #[test]
    fn test_margin_increases() {
        let trainer = Trainer::new().order(DecoderOrder::HigherOrder);
        let decoder = Decoder::new(DecoderOrder::HigherOrder);
        let inst = instance(
            vec![
                FeatureSet::new(&[0], &[]),
                FeatureSet::new(&[0], &[1]),
                FeatureSet::new(&[0], &[1]),
            ],
            vec![0, 1, 0],
        );
        let mut model = LinearModel::new(2, 2);

        for _ in 0..5 {
            let candidate =
                decoder.decode_loss_augmented(&model, inst.positions(), inst.labels().unwrap());
            let before = gold_margin(&model, &inst, &candidate, true);
            let (loss, updated) = trainer.update_instance(&decoder, &mut model, &inst, |_, _| {});
            if loss == 0 {
                assert!(!updated);
                break;
            }
            assert!(updated);
            assert!(gold_margin(&model, &inst, &candidate, true) > before);
        }
    }

    #[test]
    fn test_tied_candidate_is_updated() {
        let trainer = Trainer::new();
        let decoder = Decoder::new(DecoderOrder::Linear);
        let mut model = LinearModel::new(2, 2);
        let set = toy_set();
        let inst = &set.instances()[0];
        trainer.update_instance(&decoder, &mut model, inst, |_, _| {});

        // every path now ties under loss-augmented scoring
        let candidate = decoder.decode_loss_augmented(&model, inst.positions(), &[0, 1]);
        let before = gold_margin(&model, inst, &candidate, false);
        let (loss, updated) = trainer.update_instance(&decoder, &mut model, inst, |_, _| {});

        assert!(loss > 0);
        assert!(updated);
        assert!(gold_margin(&model, inst, &candidate, false) > before);
    }

    #[test]
    fn test_unlabeled_training_data() {
        let set: InstanceSet = vec![Instance::new(
            vec![FeatureSet::new(&[0], &[])],
            None,
            Sentence::default(),
        )]
        .into_iter()
        .collect();
        let mut model = LinearModel::new(1, 1);

        assert!(Trainer::new()
            .train(&mut model, &set, None, |_, _| Ok(()))
            .is_err());
    }

    #[test]
    fn test_train_with_evaluation() {
        let set = toy_set();
        let mut model = LinearModel::new(2, 2);
        let mut epochs = vec![];
        let reports = Trainer::new()
            .epochs(5)
            .shuffle_seed(Some(42))
            .train(&mut model, &set, Some(&set), |report, _| {
                epochs.push(report.epoch);
                Ok(())
            })
            .unwrap();

        assert_eq!(vec![0, 1, 2, 3, 4], epochs);
        assert_eq!(5, reports.len());
        assert_eq!(1, reports[0].updates);
        assert_eq!(1, reports[1].updates);
        for report in &reports[2..] {
            assert_eq!(0, report.loss);
            assert_eq!(0, report.updates);
        }
        for report in &reports {
            let evaluation = report.evaluation.unwrap();
            assert_eq!(1.0, evaluation.token_accuracy());
            assert_eq!(1.0, evaluation.sentence_accuracy());
            assert_eq!(0, evaluation.loss());
        }
    }

    #[test]
    fn test_averaging() {
        let set = toy_set();
        let mut model = LinearModel::new(2, 2);
        Trainer::new()
            .epochs(3)
            .averaging(true)
            .train(&mut model, &set, None, |_, _| Ok(()))
            .unwrap();

        let decoder = Decoder::new(DecoderOrder::Linear);
        assert_eq!(vec![0, 1], decoder.decode(&model, set.instances()[0].positions()));
    }

    #[test]
    fn test_without_margin_loss() {
        let set = toy_set();
        let mut model = LinearModel::new(2, 2);
        Trainer::new()
            .epochs(1)
            .margin_loss(false)
            .train(&mut model, &set, None, |_, _| Ok(()))
            .unwrap();

        let decoder = Decoder::new(DecoderOrder::Linear);
        assert_eq!(vec![0, 1], decoder.decode(&model, set.instances()[0].positions()));
    }
}
