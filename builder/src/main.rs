use sim_split::embedding::DimReducer;
use sim_split::io::{self, LabeledFingerprints};
use sim_split::splitter::SplitMask;
use sim_split::{FitInput, SimThresholdSplit, SplitConfig};

use glob::glob;
use kdam::tqdm;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;

use clap::Parser;
#[derive(Parser, Debug)] #[command(author, version, about, long_about = None)]
struct Args {

    //Which task to carry out: split, k_fold, pairs, histogram or embed
    #[arg(short, long)]
    task: String,

    //Glob of fingerprint csv files
    #[arg(short, long)]
    input: String,

    //Yaml config, defaults are used if missing
    #[arg(short, long)]
    config: Option<String>,

    //Output filename
    #[arg(short, long)]
    output: String,

    //Comma separated split weights if task is split
    #[arg(short, long, default_value = "70,15,15")]
    ratio: String,

    //Number of folds if task is k_fold
    #[arg(short, long, default_value_t = 5)]
    folds: usize,

    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    //Items to sample if task is histogram or embed
    #[arg(long)]
    subsample: Option<usize>,

    //Reducer if task is embed
    #[arg(long, default_value = "mds")]
    reducer: String,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize, Debug)]
struct SplitOutput {
    threshold: f64,
    clusters: Vec<(String, usize)>,
    splits: Vec<Vec<String>>,
}

#[derive(Serialize, Debug)]
struct FoldOutput {
    threshold: f64,
    clusters: Vec<(String, usize)>,
    folds: Vec<FoldMembers>,
}

#[derive(Serialize, Debug)]
struct FoldMembers {
    train: Vec<String>,
    test: Vec<String>,
}

#[derive(Serialize, Debug)]
struct EmbedOutput {
    labels: Vec<String>,
    clusters: Vec<usize>,
    coords: Vec<[f64; 2]>,
}

fn main() -> Result<(), Box<dyn Error>> {

    env_logger::init();

    let args = Args::parse();

    match args.task.as_str() {
        "split" | "k_fold" | "pairs" | "histogram" | "embed" => run(&args),
        _ => Err(format!("Unknown task: {}", args.task).into()),
    }
}

fn read_inputs(pattern: &str) -> Result<LabeledFingerprints, Box<dyn Error>> {

    let mut filenames = Vec::new();
    for entry in glob(pattern)? {
        filenames.push(entry?);
    }
    filenames.sort();

    if filenames.is_empty() {
        return Err(format!("No files match {}", pattern).into());
    }

    let mut parsed = LabeledFingerprints::new();
    for filename in tqdm!(filenames.iter(), desc = "Reading") {
        let file_fps = io::read_fingerprints_file(filename)?;
        if file_fps.is_empty() {
            warn!("No fingerprints in {}", filename.display());
        }
        parsed.extend(file_fps);
    }
    info!("Read {} fingerprints from {} files", parsed.len(), filenames.len());

    return Ok(parsed);
}

fn parse_ratio(ratio: &str) -> Result<Vec<f64>, Box<dyn Error>> {

    let mut weights = Vec::new();
    for field in ratio.split(',') {
        weights.push(field.trim().parse::<f64>()?);
    }

    return Ok(weights);
}

fn labels_in(mask: &SplitMask, labels: &[String]) -> Vec<String> {
    mask.indices().into_iter().map(|i| labels[i].clone()).collect()
}

fn write_json<T: Serialize>(value: &T, filename: &str) -> Result<(), Box<dyn Error>> {

    let writer = BufWriter::new(File::create(filename)?);
    serde_json::to_writer_pretty(writer, value)?;
    info!("Wrote {}", filename);

    return Ok(());
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {

    let mut config = match &args.config {
        Some(filename) => SplitConfig::from_file(filename)?,
        None => SplitConfig::default(),
    };
    config.verbose |= args.verbose;

    let (labels, fps) = read_inputs(&args.input)?.into_matrix()?;

    let mut splitter = SimThresholdSplit::new(config)?;
    let fitted = splitter.fit_labeled(FitInput::fingerprints(fps), labels.clone())?;
    let summary = fitted.summary();
    info!("Threshold {} gives {} clusters, largest {}", summary.threshold, summary.n_clusters, summary.largest_cluster);

    let mut rng = StdRng::seed_from_u64(args.seed);

    match args.task.as_str() {
        "split" => {
            let ratio = parse_ratio(&args.ratio)?;
            let splits = splitter.split_labels(&ratio, &mut rng)?;
            let output = SplitOutput { threshold: summary.threshold, clusters: summary.clusters, splits };
            write_json(&output, &args.output)?;
        },
        "k_fold" => {
            let folds = splitter
                .k_fold(args.folds, &mut rng)?
                .iter()
                .map(|(train, test)| FoldMembers { train: labels_in(train, &labels), test: labels_in(test, &labels) })
                .collect();
            let output = FoldOutput { threshold: summary.threshold, clusters: summary.clusters, folds };
            write_json(&output, &args.output)?;
        },
        "pairs" => {
            io::write_pairs_to_file(&splitter.fitted()?.pairs, &args.output)?;
        },
        "histogram" => {
            let histogram = splitter.similarity_histogram(args.subsample, 50, &mut rng)?;
            write_json(&histogram, &args.output)?;
        },
        "embed" => {
            let reducer: DimReducer = args.reducer.parse()?;
            let (indices, coords) = splitter.embed_space(&reducer, args.subsample, &mut rng)?;
            let clusters = splitter.clusters()?;
            let output = EmbedOutput {
                labels: indices.iter().map(|i| labels[*i].clone()).collect(),
                clusters: indices.iter().map(|i| clusters.get(*i)).collect(),
                coords,
            };
            write_json(&output, &args.output)?;
        },
        other => return Err(format!("Unknown task: {}", other).into()),
    }

    return Ok(());
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn ratio_parsing() {

        assert_eq!(parse_ratio("70,15,15").unwrap(), vec![70.0, 15.0, 15.0]);
        assert_eq!(parse_ratio(" 1, 1 ").unwrap(), vec![1.0, 1.0]);
        assert!(parse_ratio("1,a").is_err());
    }

    #[test]
    fn split_on_csv_files() {

        let dir = std::env::temp_dir().join("sim_split_builder_test");
        std::fs::create_dir_all(&dir).unwrap();

        let mut text = "id,b0,b1,b2,b3\n".to_string();
        for k in 0..20 {
            let bits: Vec<&str> = (0..4).map(|b| if k % 4 == b { "1" } else { "0" }).collect();
            text.push_str(&format!("mol_{},{}\n", k, bits.join(",")));
        }
        std::fs::write(dir.join("part_0.csv"), &text).unwrap();

        let output = dir.join("split.json");
        let args = Args {
            task: "split".to_string(),
            input: dir.join("*.csv").to_string_lossy().into_owned(),
            config: None,
            output: output.to_string_lossy().into_owned(),
            ratio: "1,1".to_string(),
            folds: 5,
            seed: 3,
            subsample: None,
            reducer: "mds".to_string(),
            verbose: false,
        };

        // the default block width is larger than the dataset
        assert!(run(&args).is_err());

        let config_path = dir.join("config.yaml");
        let mut config = SplitConfig::default();
        config.block_width = 8;
        config.largest_cluster_fraction = 0.25;
        config.to_file(&config_path).unwrap();

        let args = Args { config: Some(config_path.to_string_lossy().into_owned()), ..args };
        run(&args).unwrap();

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let splits = written["splits"].as_array().unwrap();
        assert_eq!(splits.len(), 2);

        let total: usize = splits.iter().map(|s| s.as_array().unwrap().len()).sum();
        assert_eq!(total, 20);
    }
}
