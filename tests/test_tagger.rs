use std::fs;
use std::path::PathBuf;

use rutag::errors::RutagError;
use rutag::{
    read_corpus, write_corpus, DecoderOrder, Sentence, Tagger, TemplateGroup, Token, Trainer,
};

const POS_CORPUS: &str = "\
the DT
dog NN
runs VB

a DT
cat NN
sleeps VB

the DT
cat NN
runs VB

dogs NN
sleep VB
";

const POS_TEMPLATES: &str = "\
# current word
%x[0,0]
# previous word
%x[-1,0]
%t[0]
";

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rutag-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn corpus(text: &str) -> Vec<Sentence> {
    read_corpus(text.as_bytes(), true).unwrap()
}

#[test]
fn test_single_template_one_epoch() {
    let templates = TemplateGroup::parse("%x[0,0]\n").unwrap();
    let trainer = Trainer::new().epochs(1).c(0.8).unwrap();
    let (tagger, reports) =
        Tagger::train(templates, corpus("a X\nb Y\n"), None, &trainer, |_, _| Ok(())).unwrap();

    assert_eq!(1, reports.len());
    assert_eq!(
        vec!["X", "Y"],
        tagger.tag(&Sentence::from_words(&["a", "b"])).unwrap()
    );
}

#[test]
fn test_perfect_test_corpus() {
    let templates = TemplateGroup::parse(POS_TEMPLATES).unwrap();
    let trainer = Trainer::new().epochs(10);
    let (tagger, reports) = Tagger::train(
        templates,
        corpus(POS_CORPUS),
        Some(corpus(POS_CORPUS)),
        &trainer,
        |_, _| Ok(()),
    )
    .unwrap();

    assert_eq!(10, reports.len());
    let output = tagger.test(corpus(POS_CORPUS)).unwrap();
    let evaluation = output.evaluation.unwrap();
    assert_eq!(1.0, evaluation.token_accuracy());
    assert_eq!(1.0, evaluation.sentence_accuracy());
    assert_eq!(0, evaluation.loss());
    assert_eq!(
        Some(evaluation),
        reports.last().and_then(|report| report.evaluation)
    );

    // unseen sentences get one label per token
    let unseen = Sentence::from_words(&["a", "dog", "sleeps", "quietly"]);
    let labels = tagger.tag(&unseen).unwrap();
    assert_eq!(4, labels.len());
    assert_eq!(&["DT", "NN", "VB"], &labels[..3]);
}

#[test]
fn test_zero_epochs() {
    let templates = TemplateGroup::parse(POS_TEMPLATES).unwrap();
    let trainer = Trainer::new().epochs(0);
    let (tagger, reports) =
        Tagger::train(templates, corpus(POS_CORPUS), None, &trainer, |_, _| Ok(())).unwrap();

    assert!(reports.is_empty());
    assert!(tagger.model().is_zero());
    assert_eq!(
        vec!["DT", "DT"],
        tagger.tag(&Sentence::from_words(&["dogs", "sleep"])).unwrap()
    );
}

#[test]
fn test_save_load_and_output() {
    let dir = temp_dir("save-load");
    let model_path = dir.join("pos.model");
    let templates = TemplateGroup::parse(POS_TEMPLATES).unwrap();
    let trainer = Trainer::new()
        .epochs(3)
        .order(DecoderOrder::HigherOrder)
        .shuffle_seed(Some(1));
    let mut interim = vec![];
    let (tagger, _) = Tagger::train(
        templates.clone(),
        corpus(POS_CORPUS),
        None,
        &trainer,
        |report, snapshot| {
            let path = dir.join(format!("pos.model.epoch{}", report.epoch + 1));
            snapshot.save(&path, 1)?;
            interim.push(path);
            Ok(())
        },
    )
    .unwrap();
    tagger.save(&model_path, 3).unwrap();

    let loaded = Tagger::load(&model_path).unwrap();
    assert_eq!(DecoderOrder::HigherOrder, loaded.order());
    loaded.check_templates(&templates).unwrap();
    for sentence in corpus(POS_CORPUS) {
        assert_eq!(tagger.tag(&sentence).unwrap(), loaded.tag(&sentence).unwrap());
    }
    assert_eq!(3, interim.len());
    for path in &interim {
        assert!(Tagger::load(path).is_ok());
    }

    let output = loaded.test(corpus("the DT\ndog NN\n")).unwrap();
    let mut buf = vec![];
    write_corpus(&mut buf, &output.sentences, &output.predictions).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(3, lines.len());
    assert!(lines[0].starts_with("the\t"));
    assert!(lines[0].ends_with("\tDT"));
    assert_eq!("", lines[2]);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_retrain_keeps_original_model() {
    let dir = temp_dir("retrain");
    let model_path = dir.join("base.model");
    let new_path = dir.join("new.model");
    let templates = TemplateGroup::parse(POS_TEMPLATES).unwrap();
    let trainer = Trainer::new().epochs(5);
    let (tagger, _) =
        Tagger::train(templates, corpus(POS_CORPUS), None, &trainer, |_, _| Ok(())).unwrap();
    tagger.save(&model_path, 3).unwrap();

    let mut retrained = Tagger::load(&model_path).unwrap();
    retrained
        .retrain(
            corpus("the DT\nbird NN\nflies VB\n\nquickly RB\n"),
            None,
            &trainer,
            |_, _| Ok(()),
        )
        .unwrap();
    retrained.save(&new_path, 3).unwrap();

    let original = Tagger::load(&model_path).unwrap();
    assert_eq!(3, original.labels().len());
    assert_eq!(tagger.model().weights(), original.model().weights());

    let retrained = Tagger::load(&new_path).unwrap();
    assert_eq!(4, retrained.labels().len());
    assert!(retrained.features().len() > original.features().len());
    assert!(retrained.features().is_frozen());
    assert_eq!(
        vec!["RB"],
        retrained.tag(&Sentence::from_words(&["quickly"])).unwrap()
    );

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_corrupted_model() {
    let templates = TemplateGroup::parse("%x[0,0]\n").unwrap();
    let (tagger, _) = Tagger::train(
        templates,
        corpus("a X\nb Y\n"),
        None,
        &Trainer::new().epochs(1),
        |_, _| Ok(()),
    )
    .unwrap();
    let mut buf = vec![];
    tagger.write(&mut buf, 3).unwrap();

    let len = buf.len();
    buf[len / 2] ^= 0xff;
    assert!(matches!(
        Tagger::read(buf.as_slice()),
        Err(RutagError::InvalidModel(_))
    ));
    assert!(matches!(
        Tagger::read(&b"not a model"[..]),
        Err(RutagError::InvalidModel(_))
    ));
}

#[test]
fn test_invalid_inputs() {
    let err = TemplateGroup::parse("%x[0,0]\n%x[0]\n").unwrap_err();
    assert!(matches!(err, RutagError::InvalidFormat(_)));
    assert!(err.to_string().contains("line 2"));

    let err = read_corpus("a X\nb\n".as_bytes(), true).unwrap_err();
    assert!(err.to_string().contains("line 2"));

    // the template reads a second column the tokens do not have
    let templates = TemplateGroup::parse("%x[0,1]\n").unwrap();
    let result = Tagger::train(
        templates,
        corpus("a X\n"),
        None,
        &Trainer::new(),
        |_, _| Ok(()),
    );
    assert!(matches!(result, Err(RutagError::Inconsistent(_))));

    let sentence = Sentence::with_labels(vec![Token::new(["a"])], vec![]);
    assert!(sentence.is_err());
}
