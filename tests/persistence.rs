use ndarray::prelude::*;
use serde::Serialize;

use simple_neural_net::cost::QuadraticCost;
use simple_neural_net::*;

fn trained_network() -> Network {
    let samples = vec![
        TrainingSample::with_class(array![0.0, 1.0, 0.5], 0),
        TrainingSample::with_class(array![1.0, 0.0, 0.5], 1),
    ];
    let mut trainer = Trainer::seeded(
        TrainingConfig {
            epochs: 5,
            eta: 1.0,
            lambda: 0.5,
            mini_batch_size: 2,
        },
        8,
    );
    let mut network = Network::new(&[3, 4, 2], 0.0).unwrap();
    network.initialize_weights_and_biases(trainer.rng());
    trainer
        .train(&mut network, &QuadraticCost, &samples, &[])
        .unwrap();
    network
}

#[test]
fn test_decode_reproduces_network() {
    let network = trained_network();
    let decoded = persist::decode(&persist::encode(&network).unwrap()).unwrap();

    assert_eq!(decoded.nodes(), network.nodes());
    assert_eq!(decoded.lambda(), 0.5);
    for layer in 1..network.nodes().len() {
        assert_eq!(decoded.weights(layer), network.weights(layer));
        assert_eq!(decoded.biases(layer), network.biases(layer));
    }
    let input = array![0.2, 0.4, 0.6];
    assert_eq!(decoded.predict(&input), network.predict(&input));
}

#[test]
fn test_encoding_is_stable() {
    let network = trained_network();
    assert_eq!(
        persist::encode(&network).unwrap(),
        persist::encode(&network.clone()).unwrap()
    );
}

/// Same field order as a serialized `Network`, but without the shape checks.
#[derive(Serialize)]
struct RawNetwork {
    nodes: Vec<usize>,
    biases: Vec<Array1<f64>>,
    weights: Vec<Array2<f64>>,
    lambda: f64,
}

#[test]
fn test_decode_rejects_inconsistent_shapes() {
    let good = RawNetwork {
        nodes: vec![2, 1],
        biases: vec![array![0.5]],
        weights: vec![array![[1.0, 2.0]]],
        lambda: 0.0,
    };
    let network = persist::decode(&bincode::serialize(&good).unwrap()).unwrap();
    assert_eq!(network.weight(0, 1, 1), Ok(2.0));

    let wrong_weights = RawNetwork {
        weights: vec![array![[1.0], [2.0]]],
        ..good
    };
    let err = persist::decode(&bincode::serialize(&wrong_weights).unwrap()).unwrap_err();
    assert!(format!("{err:#}").contains("dimension mismatch"), "{err:#}");

    let missing_layer = RawNetwork {
        nodes: vec![2, 1, 1],
        biases: vec![array![0.5]],
        weights: vec![array![[1.0, 2.0]]],
        lambda: 0.0,
    };
    assert!(persist::decode(&bincode::serialize(&missing_layer).unwrap()).is_err());
}

#[test]
fn test_saved_file_loads_back() {
    let network = trained_network();
    let path = std::env::temp_dir().join(format!(
        "simple-neural-net-integration-{}.bin",
        std::process::id()
    ));
    persist::save(&path, &network).unwrap();
    let loaded = persist::load(&path);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded.unwrap(), network);
}
