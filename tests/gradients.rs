//! Checks that backpropagated gradients agree with numerical derivatives of
//! the regularized cost.

use ndarray::prelude::*;
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use simple_neural_net::cost::{CrossEntropyCost, QuadraticCost};
use simple_neural_net::*;

fn random_network(nodes: &[usize], rng: &mut StdRng) -> Network {
    let dist = Uniform::new(-1.0, 1.0);
    let biases = nodes[1..]
        .iter()
        .map(|&n| Array::random_using(n, dist, rng))
        .collect();
    let weights = nodes
        .windows(2)
        .map(|w| Array::random_using((w[1], w[0]), dist, rng))
        .collect();
    Network::from_parameters(nodes.to_vec(), biases, weights, 0.0).unwrap()
}

fn random_samples(nodes: &[usize], count: usize, rng: &mut StdRng) -> Vec<TrainingSample> {
    let inputs = nodes[0];
    let outputs = nodes[nodes.len() - 1];
    let dist = Uniform::new(0.0, 1.0);
    (0..count)
        .map(|_| {
            TrainingSample::new(
                Array::random_using(inputs, dist, rng),
                Array::random_using(outputs, dist, rng),
            )
        })
        .collect()
}

fn err(claimed: f64, measured: f64) -> f64 {
    let d = measured.abs().max(1e-3);
    (claimed - measured).abs() / d
}

const H: f64 = 1e-6;
const ERROR_LIMIT: f64 = 1e-4;

fn check_gradients(cost: &dyn CostFunction, nodes: &[usize], lambda: f64, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut network = random_network(nodes, &mut rng);
    let samples = random_samples(nodes, 3, &mut rng);
    println!("testing {cost} on {nodes:?} with lambda {lambda}");

    for layer in 1..nodes.len() {
        let dw = cost.grad_weight(layer, lambda, &network, &samples).unwrap();
        let db = cost.grad_bias(layer, &network, &samples).unwrap();
        assert_eq!(dw.shape(), [nodes[layer], nodes[layer - 1]]);
        assert_eq!(db.len(), nodes[layer]);

        for i in 0..nodes[layer] {
            for j in 0..nodes[layer - 1] {
                let saved = network.weight(i, j, layer).unwrap();
                network.set_weight(saved - H, i, j, layer).unwrap();
                let minus = cost.evaluate(&network, lambda, &samples).unwrap();
                network.set_weight(saved + H, i, j, layer).unwrap();
                let plus = cost.evaluate(&network, lambda, &samples).unwrap();
                network.set_weight(saved, i, j, layer).unwrap();

                let claimed = dw[(i, j)];
                let measured = (plus - minus) / (2.0 * H);
                let error = err(claimed, measured);
                assert!(
                    error <= ERROR_LIMIT,
                    "weight ({i}, {j}) of layer {layer}: computed derivative = {claimed}, measured = {measured}, error = {error}"
                );
            }

            let saved = network.bias(i, layer).unwrap();
            network.set_bias(saved - H, i, layer).unwrap();
            let minus = cost.evaluate(&network, lambda, &samples).unwrap();
            network.set_bias(saved + H, i, layer).unwrap();
            let plus = cost.evaluate(&network, lambda, &samples).unwrap();
            network.set_bias(saved, i, layer).unwrap();

            let claimed = db[i];
            let measured = (plus - minus) / (2.0 * H);
            let error = err(claimed, measured);
            assert!(
                error <= ERROR_LIMIT,
                "bias {i} of layer {layer}: computed derivative = {claimed}, measured = {measured}, error = {error}"
            );
        }
    }
}

#[test]
fn test_gradient_consistency() {
    for cost in [&QuadraticCost as &dyn CostFunction, &CrossEntropyCost] {
        check_gradients(cost, &[1, 1], 0.0, 1);
        check_gradients(cost, &[2, 3, 2], 0.0, 2);
        check_gradients(cost, &[3, 4, 2], 0.0, 3);
        check_gradients(cost, &[2, 3, 3, 2], 0.0, 4);
        check_gradients(cost, &[3, 4, 2], 0.5, 5);
        check_gradients(cost, &[2, 3, 3, 2], 2.0, 6);
    }
}

#[test]
fn test_minibatch_derivatives_match_cost_gradients() {
    let nodes = [3, 4, 2];
    let mut rng = StdRng::seed_from_u64(11);
    let network = random_network(&nodes, &mut rng);
    let samples = random_samples(&nodes, 4, &mut rng);

    let mut mbs = create_minibatches(samples.len(), network.nodes());
    for (sample, mb) in samples.iter().zip(&mut mbs) {
        network
            .backpropagate_sample(sample, &CrossEntropyCost, mb)
            .unwrap();
    }
    let grads = network.calculate_derivatives(&mbs).unwrap();

    for layer in 1..nodes.len() {
        let dw = CrossEntropyCost
            .grad_weight(layer, 0.0, &network, &samples)
            .unwrap();
        let db = CrossEntropyCost.grad_bias(layer, &network, &samples).unwrap();
        let max_dw = (grads.weights(layer).unwrap() - &dw)
            .iter()
            .fold(0.0f64, |m, x| m.max(x.abs()));
        let max_db = (grads.biases(layer).unwrap() - &db)
            .iter()
            .fold(0.0f64, |m, x| m.max(x.abs()));
        assert!(max_dw < 1e-12, "layer {layer} weights differ by {max_dw}");
        assert!(max_db < 1e-12, "layer {layer} biases differ by {max_db}");
    }
}
