use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use rutag::{
    read_corpus, write_corpus, DecoderOrder, EpochReport, ModelRef, Sentence, Tagger,
    TemplateGroup, Trainer, DEFAULT_COMPRESSION_LEVEL,
};

#[derive(Parser, Debug)]
#[command(about = "A structured sequence tagger trained with Passive-Aggressive updates.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trains a new model
    Train {
        /// The template file
        #[arg(long)]
        template: PathBuf,

        /// A labeled training corpus
        #[arg(long)]
        train: PathBuf,

        /// The file to write the trained model to
        #[arg(long)]
        model: PathBuf,

        #[command(flatten)]
        eval: EvalArgs,

        #[command(flatten)]
        training: TrainingArgs,
    },

    /// Continues training an existing model on another corpus
    Retrain {
        /// A labeled training corpus
        #[arg(long)]
        train: PathBuf,

        /// The model to start from
        #[arg(long)]
        model: PathBuf,

        /// The file to write the retrained model to
        #[arg(long)]
        new_model: PathBuf,

        #[command(flatten)]
        eval: EvalArgs,

        #[command(flatten)]
        training: TrainingArgs,
    },

    /// Tags a corpus
    Test {
        /// The model file
        #[arg(long)]
        model: PathBuf,

        /// The corpus to tag
        #[arg(long)]
        input: PathBuf,

        /// The file to write tagged sentences to
        #[arg(long)]
        output: Option<PathBuf>,

        /// The last column of the input is the gold label
        #[arg(long)]
        has_label: bool,
    },
}

#[derive(Args, Debug)]
struct EvalArgs {
    /// A labeled corpus evaluated after every epoch
    #[arg(long)]
    test: Option<PathBuf>,

    /// The file to write the final tagging of the test corpus to
    #[arg(long, requires = "test")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TrainingArgs {
    /// The number of epochs
    #[arg(long, default_value = "50")]
    iter: usize,

    /// The aggressiveness bound of each update
    #[arg(short, long = "cost", default_value = "0.8")]
    c: f64,

    /// Decode candidates without the Hamming margin
    #[arg(long)]
    no_margin: bool,

    /// The decoder order (linear or higher-order). Ignored by retrain.
    #[arg(long, default_value = "linear")]
    order: DecoderOrder,

    /// Average the weights of all updates
    #[arg(long)]
    averaging: bool,

    /// Shuffle the training corpus every epoch with this seed
    #[arg(long)]
    shuffle_seed: Option<u64>,

    /// Save the model after every epoch as `<model>.epoch<N>`
    #[arg(long)]
    interim: bool,

    /// The zstd compression level of model files
    #[arg(long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    zstd_level: i32,
}

impl TrainingArgs {
    fn trainer(&self, order: DecoderOrder) -> Result<Trainer, Box<dyn Error>> {
        Ok(Trainer::new()
            .epochs(self.iter)
            .c(self.c)?
            .margin_loss(!self.no_margin)
            .order(order)
            .averaging(self.averaging)
            .shuffle_seed(self.shuffle_seed))
    }

    fn save_interim<'a>(
        &'a self,
        model: &'a Path,
    ) -> impl FnMut(&EpochReport, ModelRef<'_>) -> rutag::errors::Result<()> + 'a {
        move |report, snapshot| {
            if self.interim {
                let mut path = model.as_os_str().to_owned();
                path.push(format!(".epoch{}", report.epoch + 1));
                save_model(snapshot, Path::new(&path), self.zstd_level)?;
                log::info!("saved {}", Path::new(&path).display());
            }
            Ok(())
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>, Box<dyn Error>> {
    let f = File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(BufReader::new(f))
}

fn save_model(model: ModelRef<'_>, path: &Path, level: i32) -> rutag::errors::Result<()> {
    model
        .save(path, level)
        .map_err(|e| io::Error::other(format!("{}: {e}", path.display())).into())
}

fn load_model(path: &Path) -> Result<Tagger, Box<dyn Error>> {
    Ok(Tagger::load(path).map_err(|e| format!("{}: {e}", path.display()))?)
}

fn load_corpus(path: &Path, has_label: bool) -> Result<Vec<Sentence>, Box<dyn Error>> {
    eprintln!("Loading {path:?} ...");
    let corpus =
        read_corpus(open(path)?, has_label).map_err(|e| format!("{}: {e}", path.display()))?;
    eprintln!("# of sentences: {}", corpus.len());
    Ok(corpus)
}

fn write_output(
    path: &Path,
    sentences: &[Sentence],
    predictions: &[Vec<String>],
) -> Result<(), Box<dyn Error>> {
    let f = File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut f = BufWriter::new(f);
    write_corpus(&mut f, sentences, predictions)?;
    f.flush()?;
    Ok(())
}

fn run_test(
    tagger: &Tagger,
    sentences: Vec<Sentence>,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let result = tagger.test(sentences)?;
    if let Some(evaluation) = &result.evaluation {
        println!("{evaluation}");
    }
    println!(
        "feature extraction: {:.3}s, prediction: {:.3}s",
        result.feature_time.as_secs_f64(),
        result.predict_time.as_secs_f64()
    );
    if let Some(path) = output {
        write_output(path, &result.sentences, &result.predictions)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train {
            template,
            train,
            model,
            eval,
            training,
        } => {
            let templates = TemplateGroup::read(open(&template)?)
                .map_err(|e| format!("{}: {e}", template.display()))?;
            eprintln!("# of templates: {}", templates.len());
            let train = load_corpus(&train, true)?;
            let test = eval.test.as_deref().map(|p| load_corpus(p, true)).transpose()?;
            let trainer = training.trainer(training.order)?;

            eprintln!("Start training...");
            let start = Instant::now();
            let (tagger, _) = Tagger::train(
                templates,
                train,
                test.clone(),
                &trainer,
                training.save_interim(&model),
            )?;
            eprintln!("Finish training. ({:.3}s)", start.elapsed().as_secs_f64());

            save_model(tagger.as_model_ref(), &model, training.zstd_level)?;
            if let Some(test) = test {
                run_test(&tagger, test, eval.output.as_deref())?;
            }
        }
        Command::Retrain {
            train,
            model,
            new_model,
            eval,
            training,
        } => {
            let mut tagger = load_model(&model)?;
            eprintln!(
                "# of labels: {}, # of features: {}",
                tagger.labels().len(),
                tagger.features().len()
            );
            let train = load_corpus(&train, true)?;
            let test = eval.test.as_deref().map(|p| load_corpus(p, true)).transpose()?;
            let trainer = training.trainer(tagger.order())?;

            eprintln!("Start retraining...");
            let start = Instant::now();
            tagger.retrain(train, test.clone(), &trainer, training.save_interim(&new_model))?;
            eprintln!("Finish retraining. ({:.3}s)", start.elapsed().as_secs_f64());

            save_model(tagger.as_model_ref(), &new_model, training.zstd_level)?;
            if let Some(test) = test {
                run_test(&tagger, test, eval.output.as_deref())?;
            }
        }
        Command::Test {
            model,
            input,
            output,
            has_label,
        } => {
            let tagger = load_model(&model)?;
            let sentences = load_corpus(&input, has_label)?;
            run_test(&tagger, sentences, output.as_deref())?;
            io::stdout().flush()?;
        }
    }
    Ok(())
}
