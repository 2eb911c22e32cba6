use std::time::{Duration, Instant};

use crate::alphabet::Alphabet;
use crate::corpus::Sentence;
use crate::decoder::{Decoder, DecoderOrder};
use crate::errors::{Result, RutagError};
use crate::feature::{FeatureExtractor, InstanceSet};
use crate::loss::Evaluation;
use crate::model::LinearModel;
use crate::template::TemplateGroup;

#[cfg(feature = "train")]
use crate::store::ModelRef;
#[cfg(feature = "train")]
use crate::trainer::{EpochReport, Trainer};

/// Label printed for positions decoded by a model without labels.
pub const UNKNOWN_LABEL: &str = "<unk>";

/// Predictions of [`Tagger::test`].
#[derive(Debug)]
pub struct TestOutput {
    /// Input sentences in order.
    pub sentences: Vec<Sentence>,

    /// Predicted labels, one sequence per sentence.
    pub predictions: Vec<Vec<String>>,

    /// Accuracy against the gold labels, if any sentence has them.
    pub evaluation: Option<Evaluation>,

    /// Time spent on feature extraction.
    pub feature_time: Duration,

    /// Time spent on decoding.
    pub predict_time: Duration,
}

/// A trained sequence tagger: the template group, both alphabets, and the weights.
#[derive(Debug)]
pub struct Tagger {
    pub(crate) order: DecoderOrder,
    pub(crate) templates: TemplateGroup,
    pub(crate) features: Alphabet,
    pub(crate) labels: Alphabet,
    pub(crate) model: LinearModel,
}

impl Tagger {
    /// Gets the decoder order the model was trained with.
    #[inline(always)]
    pub const fn order(&self) -> DecoderOrder {
        self.order
    }

    /// Gets the template group.
    #[inline(always)]
    pub const fn templates(&self) -> &TemplateGroup {
        &self.templates
    }

    /// Gets the feature alphabet.
    #[inline(always)]
    pub const fn features(&self) -> &Alphabet {
        &self.features
    }

    /// Gets the label alphabet.
    #[inline(always)]
    pub const fn labels(&self) -> &Alphabet {
        &self.labels
    }

    /// Gets the weights.
    #[inline(always)]
    pub const fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Fails unless `templates` equals the stored template group.
    ///
    /// # Errors
    ///
    /// Returns [`RutagError::Inconsistent`] naming the first differing template.
    pub fn check_templates(&self, templates: &TemplateGroup) -> Result<()> {
        if templates.len() != self.templates.len() {
            return Err(RutagError::inconsistent(format!(
                "the model has {} templates but {} were given",
                self.templates.len(),
                templates.len()
            )));
        }
        for (a, b) in self.templates.templates().iter().zip(templates.templates()) {
            if a != b {
                return Err(RutagError::inconsistent(format!(
                    "template {} differs from the model: `{}` != `{}`",
                    a.id(),
                    b.source(),
                    a.source()
                )));
            }
        }
        Ok(())
    }

    /// Extracts sentences against the frozen alphabets.
    fn lookup_all(&self, sentences: Vec<Sentence>) -> Result<InstanceSet> {
        let extractor = FeatureExtractor::new(&self.templates);
        sentences
            .into_iter()
            .map(|s| extractor.lookup(s, &self.features, &self.labels))
            .collect()
    }

    fn label_strings(&self, ids: &[u32]) -> Vec<String> {
        ids.iter()
            .map(|&id| self.labels.lookup(id).unwrap_or(UNKNOWN_LABEL).to_string())
            .collect()
    }

    /// Labels one sentence.
    ///
    /// # Errors
    ///
    /// Returns [`RutagError::Inconsistent`] if the tokens lack a column the templates use.
    pub fn tag(&self, sentence: &Sentence) -> Result<Vec<String>> {
        let instance = FeatureExtractor::new(&self.templates).lookup(
            sentence.clone(),
            &self.features,
            &self.labels,
        )?;
        let predicted = Decoder::new(self.order).decode(&self.model, instance.positions());
        Ok(self.label_strings(&predicted))
    }

    /// Labels all sentences and evaluates the ones with gold labels.
    ///
    /// # Errors
    ///
    /// Returns [`RutagError::Inconsistent`] if the tokens lack a column the templates use.
    pub fn test(&self, sentences: Vec<Sentence>) -> Result<TestOutput> {
        let start = Instant::now();
        let instances = self.lookup_all(sentences)?;
        let feature_time = start.elapsed();

        let start = Instant::now();
        let decoder = Decoder::new(self.order);
        let mut evaluation = Evaluation::new();
        let mut has_gold = false;
        let mut predictions = Vec::with_capacity(instances.len());
        for inst in instances.instances() {
            let predicted = decoder.decode(&self.model, inst.positions());
            if let Some(gold) = inst.labels() {
                evaluation.add(gold, &predicted);
                has_gold = true;
            }
            predictions.push(self.label_strings(&predicted));
        }
        let predict_time = start.elapsed();

        Ok(TestOutput {
            sentences: instances
                .instances()
                .iter()
                .map(|inst| inst.sentence().clone())
                .collect(),
            predictions,
            evaluation: has_gold.then_some(evaluation),
            feature_time,
            predict_time,
        })
    }
}

#[cfg(feature = "train")]
impl Tagger {
    /// Trains a new tagger.
    ///
    /// # Arguments
    ///
    /// * `templates` - Feature schema.
    /// * `train` - Labeled training sentences.
    /// * `test` - Labeled sentences evaluated after every epoch.
    /// * `trainer` - Training settings.
    /// * `callback` - Called after every epoch, e.g., to save interim models.
    ///
    /// # Errors
    ///
    /// Returns an error if the templates need higher-order decoding but `trainer` is linear,
    /// if a sentence does not fit the templates, or if `callback` fails.
    #[cfg_attr(docsrs, doc(cfg(feature = "train")))]
    pub fn train<F>(
        templates: TemplateGroup,
        train: Vec<Sentence>,
        test: Option<Vec<Sentence>>,
        trainer: &Trainer,
        callback: F,
    ) -> Result<(Self, Vec<EpochReport>)>
    where
        F: FnMut(&EpochReport, ModelRef<'_>) -> Result<()>,
    {
        let order = trainer.decoder_order();
        if templates.max_order() > 0 && !order.with_bigram() {
            return Err(RutagError::invalid_argument(
                "order",
                "templates conjoined with the previous label need higher-order decoding",
            ));
        }
        let mut tagger = Self {
            order,
            templates,
            features: Alphabet::new(),
            labels: Alphabet::new(),
            model: LinearModel::default(),
        };
        let train_set = FeatureExtractor::new(&tagger.templates).extract_all(
            train,
            &mut tagger.features,
            &mut tagger.labels,
        )?;
        tagger.features.freeze();
        tagger.labels.freeze();
        let reports = tagger.fit(&train_set, test, trainer, callback)?;
        Ok((tagger, reports))
    }

    /// Continues training on new sentences.
    ///
    /// Both alphabets are reopened while the new sentences are extracted, so unseen features
    /// and labels are added, and frozen again before training.
    ///
    /// # Errors
    ///
    /// Returns an error if `trainer` uses a different decoder order than the model, if a
    /// sentence does not fit the stored templates, or if `callback` fails.
    #[cfg_attr(docsrs, doc(cfg(feature = "train")))]
    pub fn retrain<F>(
        &mut self,
        train: Vec<Sentence>,
        test: Option<Vec<Sentence>>,
        trainer: &Trainer,
        callback: F,
    ) -> Result<Vec<EpochReport>>
    where
        F: FnMut(&EpochReport, ModelRef<'_>) -> Result<()>,
    {
        if trainer.decoder_order() != self.order {
            return Err(RutagError::invalid_argument(
                "order",
                format!(
                    "the model was trained with {} decoding, not {}",
                    self.order,
                    trainer.decoder_order()
                ),
            ));
        }
        let train_set = {
            let mut features = self.features.reopen();
            let mut labels = self.labels.reopen();
            FeatureExtractor::new(&self.templates).extract_all(
                train,
                &mut features,
                &mut labels,
            )?
        };
        self.fit(&train_set, test, trainer, callback)
    }

    fn fit<F>(
        &mut self,
        train_set: &InstanceSet,
        test: Option<Vec<Sentence>>,
        trainer: &Trainer,
        mut callback: F,
    ) -> Result<Vec<EpochReport>>
    where
        F: FnMut(&EpochReport, ModelRef<'_>) -> Result<()>,
    {
        if train_set.is_empty() {
            log::warn!("the training corpus is empty");
        }
        log::info!(
            "# of training sentences: {}, # of tokens: {}",
            train_set.len(),
            train_set.num_tokens()
        );
        log::info!(
            "# of labels: {}, # of features: {}",
            self.labels.len(),
            self.features.len()
        );
        let test_set = test.map(|t| self.lookup_all(t)).transpose()?;
        if let Some(test_set) = &test_set {
            log::info!("# of test sentences: {}", test_set.len());
        }

        self.model.grow(self.features.len(), self.labels.len());
        let order = self.order;
        let templates = &self.templates;
        let features = &self.features;
        let labels = &self.labels;
        trainer.train(
            &mut self.model,
            train_set,
            test_set.as_ref(),
            |report, model| {
                callback(
                    report,
                    ModelRef {
                        order,
                        templates,
                        features,
                        labels,
                        model,
                    },
                )
            },
        )
    }
}

#[cfg(all(test, feature = "train"))]
mod tests {
    use super::*;

    use crate::test_utils::{labeled, toy_tagger};

    #[test]
    fn test_single_template_scenario() {
        let tagger = toy_tagger();

        assert_eq!(
            vec!["X", "Y"],
            tagger.tag(&Sentence::from_words(&["a", "b"])).unwrap()
        );
        let a = tagger.features().get("0:\ta").unwrap();
        let x = tagger.labels().get("X").unwrap();
        let y = tagger.labels().get("Y").unwrap();
        assert!(tagger.model().score(&[a], x) >= tagger.model().score(&[a], y));
    }

    #[test]
    fn test_perfect_test_corpus() {
        let tagger = toy_tagger();
        let output = tagger
            .test(vec![labeled(&["a/X", "b/Y"]), labeled(&["a/X"])])
            .unwrap();
        let evaluation = output.evaluation.unwrap();

        assert_eq!(1.0, evaluation.token_accuracy());
        assert_eq!(1.0, evaluation.sentence_accuracy());
        assert_eq!(0, evaluation.loss());
        assert_eq!(vec![vec!["X", "Y"], vec!["X"]], output.predictions);
    }

    #[test]
    fn test_unlabeled_test_corpus() {
        let tagger = toy_tagger();
        let output = tagger.test(vec![Sentence::from_words(&["b", "z"])]).unwrap();

        assert!(output.evaluation.is_none());
        assert_eq!(2, output.predictions[0].len());
    }

    #[test]
    fn test_unknown_gold_label_counts_as_error() {
        let tagger = toy_tagger();
        let output = tagger.test(vec![labeled(&["a/X", "b/Z"])]).unwrap();

        assert_eq!(1, output.evaluation.unwrap().loss());
        assert_eq!(2, tagger.labels().len());
    }

    #[test]
    fn test_higher_order_templates_need_higher_order() {
        let templates = TemplateGroup::parse("%x[0,0]\n%y[-1]%x[0,0]\n").unwrap();
        let result = Tagger::train(
            templates,
            vec![labeled(&["a/X", "b/Y"])],
            None,
            &Trainer::new(),
            |_, _| Ok(()),
        );

        assert!(matches!(result, Err(RutagError::InvalidArgument(_))));
    }

    #[test]
    fn test_higher_order_training() {
        let templates = TemplateGroup::parse("%x[0,0]\n%y[-1]%x[0,0]\n").unwrap();
        let trainer = Trainer::new().epochs(5).order(DecoderOrder::HigherOrder);
        let (tagger, _) = Tagger::train(
            templates,
            vec![labeled(&["a/X", "a/Y", "a/X"]), labeled(&["b/Y", "a/X"])],
            None,
            &trainer,
            |_, _| Ok(()),
        )
        .unwrap();

        assert_eq!(DecoderOrder::HigherOrder, tagger.order());
        assert_eq!(
            vec!["X", "Y", "X"],
            tagger.tag(&Sentence::from_words(&["a", "a", "a"])).unwrap()
        );
    }

    #[test]
    fn test_retrain_extends_alphabets() {
        let mut tagger = toy_tagger();
        let trainer = Trainer::new().epochs(3);
        let mut calls = 0;
        tagger
            .retrain(
                vec![labeled(&["c/Z", "a/X"])],
                Some(vec![labeled(&["c/Z"])]),
                &trainer,
                |_, snapshot| {
                    calls += 1;
                    assert_eq!(3, snapshot.labels.len());
                    Ok(())
                },
            )
            .unwrap();

        assert_eq!(3, calls);
        assert!(tagger.features().is_frozen());
        assert!(tagger.labels().is_frozen());
        assert_eq!(3, tagger.labels().len());
        assert_eq!(3, tagger.model().num_labels());
        assert_eq!(
            vec!["Z", "X"],
            tagger.tag(&Sentence::from_words(&["c", "a"])).unwrap()
        );
    }

    #[test]
    fn test_retrain_with_other_order() {
        let mut tagger = toy_tagger();
        let trainer = Trainer::new().order(DecoderOrder::HigherOrder);

        assert!(tagger
            .retrain(vec![labeled(&["a/X"])], None, &trainer, |_, _| Ok(()))
            .is_err());
    }

    #[test]
    fn test_retrain_refreezes_on_error() {
        let templates = TemplateGroup::parse("%x[0,1]\n").unwrap();
        let (mut tagger, _) = Tagger::train(
            templates,
            vec![Sentence::with_labels(
                vec![crate::corpus::Token::new(["a", "A"])],
                vec!["X".into()],
            )
            .unwrap()],
            None,
            &Trainer::new().epochs(1),
            |_, _| Ok(()),
        )
        .unwrap();

        // the new sentence has no second column
        let result = tagger.retrain(vec![labeled(&["b/Y"])], None, &Trainer::new(), |_, _| Ok(()));

        assert!(matches!(result, Err(RutagError::Inconsistent(_))));
        assert!(tagger.features().is_frozen());
        assert!(tagger.labels().is_frozen());
    }

    #[test]
    fn test_check_templates() {
        let tagger = toy_tagger();

        assert!(tagger
            .check_templates(&TemplateGroup::parse("%x[0,0]\n").unwrap())
            .is_ok());
        assert!(matches!(
            tagger.check_templates(&TemplateGroup::parse("%x[1,0]\n").unwrap()),
            Err(RutagError::Inconsistent(_))
        ));
    }
}
