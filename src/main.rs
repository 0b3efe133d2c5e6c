//! Experiment driver: trains an MNIST classifier or evaluates a saved one.
//!
//! Usage:
//!   graphite-nn train [config.json]
//!   graphite-nn infer [config.json]
//!
//! Without a config argument the built-in defaults are used (data/ for the
//! IDX files, models/ for the model).

use std::io;
use std::process;
use std::time::Instant;

use graphite_nn::{
    ExperimentConfig, LinearLayer, Matrix, MnistLoader, ModelSerializer, Network, ReluLayer,
    TrainConfig,
};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mode = args.get(1).map(String::as_str).unwrap_or("train");

    let config = match args.get(2) {
        Some(path) => match ExperimentConfig::load_json(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: cannot load config {path}: {e}");
                process::exit(1);
            }
        },
        None => ExperimentConfig::default(),
    };

    let outcome = match mode {
        "train" => run_training(&config),
        "infer" => run_inference(&config),
        other => {
            eprintln!("error: unknown mode '{other}'");
            eprintln!("usage: graphite-nn [train|infer] [config.json]");
            process::exit(2);
        }
    };

    if let Err(e) = outcome {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// Loads an IDX pair and prepares the float data and one-hot label matrices.
fn load_split(
    config: &ExperimentConfig,
    images_path: &std::path::Path,
    labels_path: &std::path::Path,
) -> io::Result<(Matrix<f32>, Matrix<f32>)> {
    let dataset = MnistLoader::load(images_path, labels_path)?;
    let samples = dataset.num_samples();

    if let Some(&bad) = dataset
        .labels
        .iter()
        .find(|&&label| label as usize >= config.num_classes)
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "label {bad} out of range for {} classes in {}",
                config.num_classes,
                labels_path.display()
            ),
        ));
    }

    let images = Matrix::from_vec(dataset.images, samples, 784);
    let labels = Matrix::from_vec(dataset.labels, samples, 1);

    let x = images.to_f32(config.normalization_factor);
    let y = Matrix::one_hot(&labels.to_f32(1.0), config.num_classes);
    Ok((x, y))
}

fn run_training(config: &ExperimentConfig) -> io::Result<()> {
    println!("[1/4] Loading train & test datasets...");
    let (x_train, y_train) = load_split(config, &config.train_images_path, &config.train_labels_path)?;
    let (x_test, y_test) = load_split(config, &config.test_images_path, &config.test_labels_path)?;
    println!(
        "      {} training samples, {} test samples",
        x_train.rows(),
        x_test.rows()
    );

    println!("[2/4] Constructing network...");
    let lr = config.learning_rate;
    let seed = config.init_seed;
    let mut network = Network::<f32>::new();
    network.add_layer(Box::new(LinearLayer::new(784, 256, lr, seed)));
    network.add_layer(Box::new(ReluLayer::new()));
    network.add_layer(Box::new(LinearLayer::new(256, 256, lr, seed + 1)));
    network.add_layer(Box::new(ReluLayer::new()));
    network.add_layer(Box::new(LinearLayer::new(256, 10, lr, seed + 2)));

    println!("[3/4] Training ({} epochs)...", config.epochs);
    std::fs::create_dir_all(&config.model_path)?;
    let model_file = config.model_file();
    let mut best_accuracy = 0.0f64;

    let mut train_config = TrainConfig::new(config.epochs, config.batch_size)
        .with_epoch_callback(move |epoch, accuracy, net: &Network<f32>| {
            println!("  epoch {epoch}: test accuracy {:.2}%", accuracy * 100.0);
            if accuracy > best_accuracy {
                best_accuracy = accuracy;
                match ModelSerializer::save(net, &model_file) {
                    Ok(()) => println!(
                        "  [checkpoint] new best model saved ({:.2}%)",
                        accuracy * 100.0
                    ),
                    Err(e) => eprintln!("  [error] failed to save model: {e}"),
                }
            }
        });

    let started = Instant::now();
    let history = network.train(&x_train, &y_train, &x_test, &y_test, &mut train_config);
    let elapsed = started.elapsed().as_secs();

    let best = history
        .iter()
        .map(|stats| stats.test_accuracy)
        .fold(0.0, f64::max);
    println!("[4/4] Training complete in {elapsed}s.");
    println!("      Best test accuracy: {:.2}%", best * 100.0);
    Ok(())
}

fn run_inference(config: &ExperimentConfig) -> io::Result<()> {
    println!("[1/3] Loading test dataset...");
    let (x_test, y_test) = load_split(config, &config.test_images_path, &config.test_labels_path)?;

    let model_file = config.model_file();
    println!("[2/3] Loading model from {}...", model_file.display());
    let mut network = ModelSerializer::load::<f32>(&model_file)?;

    println!("[3/3] Evaluating...");
    let accuracy = network.evaluate_accuracy(&x_test, &y_test);
    println!("------------------------------------------");
    println!("Test accuracy: {:.2}%", accuracy * 100.0);
    println!("------------------------------------------");
    Ok(())
}
