//! XOR as a two-class problem: the smallest network that needs the hidden
//! ReLU layer. Run with:
//!   cargo run --example xor

use graphite_nn::{LinearLayer, Matrix, Network, ReluLayer, TrainConfig};

fn main() {
    let inputs = Matrix::from_vec(
        vec![
            0.0, 0.0, //
            0.0, 1.0, //
            1.0, 0.0, //
            1.0, 1.0,
        ],
        4,
        2,
    );
    // Class 1 where exactly one input is set.
    let labels = Matrix::one_hot(&Matrix::from_vec(vec![0.0, 1.0, 1.0, 0.0], 4, 1), 2);

    let mut network = Network::<f64>::new();
    network.add_layer(Box::new(LinearLayer::new(2, 16, 0.1, 1)));
    network.add_layer(Box::new(ReluLayer::new()));
    network.add_layer(Box::new(LinearLayer::new(16, 2, 0.1, 2)));

    let mut config = TrainConfig::new(2000, 4);
    let history = network.train(&inputs, &labels, &inputs, &labels, &mut config);

    for stats in history.iter().filter(|s| s.epoch % 200 == 0) {
        println!(
            "epoch {:4}: loss = {:.6}, accuracy = {:.0}%",
            stats.epoch,
            stats.train_loss,
            stats.train_accuracy * 100.0
        );
    }

    println!("------------------");
    let logits = network.forward(&inputs);
    for r in 0..inputs.rows() {
        println!(
            "{:?} -> class {}",
            [inputs[(r, 0)], inputs[(r, 1)]],
            logits.argmax_row(r)
        );
    }
    println!(
        "final accuracy: {:.0}%",
        network.evaluate_accuracy(&inputs, &labels) * 100.0
    );
}
