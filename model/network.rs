//! Fully-connected network with a sparse-input first layer.

use super::ModelError;
use crate::design::SparseDesign;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    fn apply(self, z: &mut Array2<f32>) {
        if self == Activation::Relu {
            z.mapv_inplace(|x| x.max(0.0));
        }
    }
}

/// Layer sizes of the network: a first layer over the allele vocabulary,
/// `hidden_layers` layers of `hidden_width`, and one linear output unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkArchitecture {
    pub input_dim: usize,
    pub input_layer_width: usize,
    pub hidden_width: usize,
    pub hidden_layers: usize,
}

impl NetworkArchitecture {
    /// `(fan_in, fan_out, activation)` for every layer, input to output.
    pub fn layer_shapes(&self) -> Vec<(usize, usize, Activation)> {
        let mut shapes = Vec::with_capacity(self.hidden_layers + 2);
        shapes.push((self.input_dim, self.input_layer_width, Activation::Relu));
        let mut fan_in = self.input_layer_width;
        for _ in 0..self.hidden_layers {
            shapes.push((fan_in, self.hidden_width, Activation::Relu));
            fan_in = self.hidden_width;
        }
        shapes.push((fan_in, 1, Activation::Linear));
        shapes
    }

    /// Number of dense layers including the output unit.
    pub fn depth(&self) -> usize {
        self.hidden_layers + 2
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub activation: Activation,
    /// Shape `[fan_in, fan_out]`.
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

/// Per-layer gradient buffers, shaped like the network's parameters.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub weights: Vec<Array2<f32>>,
    pub bias: Vec<Array1<f32>>,
}

impl Gradients {
    pub fn zeros_like(network: &DenseNetwork) -> Self {
        Self {
            weights: network
                .layers
                .iter()
                .map(|l| Array2::zeros(l.weights.raw_dim()))
                .collect(),
            bias: network
                .layers
                .iter()
                .map(|l| Array1::zeros(l.bias.raw_dim()))
                .collect(),
        }
    }

    fn clear(&mut self) {
        for w in &mut self.weights {
            w.fill(0.0);
        }
        for b in &mut self.bias {
            b.fill(0.0);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetwork {
    architecture: NetworkArchitecture,
    layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Glorot-uniform weights and zero biases.
    pub fn new<R: Rng + ?Sized>(architecture: &NetworkArchitecture, rng: &mut R) -> Self {
        let layers = architecture
            .layer_shapes()
            .into_iter()
            .map(|(fan_in, fan_out, activation)| {
                let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
                let dist = Uniform::new_inclusive(-limit, limit);
                DenseLayer {
                    activation,
                    weights: Array2::from_shape_simple_fn((fan_in, fan_out), || dist.sample(rng)),
                    bias: Array1::zeros(fan_out),
                }
            })
            .collect();
        Self {
            architecture: architecture.clone(),
            layers,
        }
    }

    pub fn architecture(&self) -> &NetworkArchitecture {
        &self.architecture
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.architecture.input_dim
    }

    /// Checks that the stored parameters agree with the architecture; used
    /// after deserialization.
    pub fn check_shapes(&self) -> Result<(), ModelError> {
        let shapes = self.architecture.layer_shapes();
        if shapes.len() != self.layers.len() {
            return Err(ModelError::MalformedLayer {
                layer: self.layers.len().min(shapes.len()),
                found: (self.layers.len(), 0),
                expected: (shapes.len(), 0),
            });
        }
        for (i, (layer, &(fan_in, fan_out, _))) in self.layers.iter().zip(shapes.iter()).enumerate()
        {
            if layer.weights.dim() != (fan_in, fan_out) || layer.bias.len() != fan_out {
                return Err(ModelError::MalformedLayer {
                    layer: i,
                    found: layer.weights.dim(),
                    expected: (fan_in, fan_out),
                });
            }
        }
        Ok(())
    }

    /// Predictions for every row of `batch`.
    pub fn forward(&self, batch: &SparseDesign) -> Array1<f32> {
        let activations = self.forward_trace(batch);
        activations
            .last()
            .map(|out| out.column(0).to_owned())
            .unwrap_or_else(|| Array1::zeros(batch.n_rows()))
    }

    /// Post-activation outputs of every layer.
    fn forward_trace(&self, batch: &SparseDesign) -> Vec<Array2<f32>> {
        let mut activations = Vec::with_capacity(self.layers.len());
        let Some((first, rest)) = self.layers.split_first() else {
            return activations;
        };

        // The first layer gathers one weight row per stored entry instead of
        // multiplying by a dense one-hot block.
        let mut z = Array2::<f32>::zeros((batch.n_rows(), first.bias.len()));
        for (r, mut out) in z.axis_iter_mut(Axis(0)).enumerate() {
            for (c, v) in batch.row(r).iter() {
                out.scaled_add(v, &first.weights.row(c));
            }
            out += &first.bias;
        }
        first.activation.apply(&mut z);

        let mut current = z;
        for layer in rest {
            let mut next = current.dot(&layer.weights) + &layer.bias;
            layer.activation.apply(&mut next);
            activations.push(std::mem::replace(&mut current, next));
        }
        activations.push(current);
        activations
    }

    /// Mean squared error of `batch` against `targets`, with the gradient of
    /// that loss written into `grads`.
    pub fn loss_and_gradients(
        &self,
        batch: &SparseDesign,
        targets: ArrayView1<f32>,
        grads: &mut Gradients,
    ) -> f32 {
        grads.clear();
        let n = batch.n_rows();
        if n == 0 {
            return 0.0;
        }
        let activations = self.forward_trace(batch);
        let Some(output) = activations.last() else {
            return 0.0;
        };

        let diff = &output.column(0) - &targets;
        let loss = diff.mapv(|d| d * d).sum() / n as f32;

        // Output unit is linear, so dL/dz is the scaled residual.
        let mut delta = (diff * (2.0 / n as f32)).insert_axis(Axis(1));

        for l in (1..self.layers.len()).rev() {
            let input = &activations[l - 1];
            grads.weights[l].assign(&input.t().dot(&delta));
            grads.bias[l].assign(&delta.sum_axis(Axis(0)));

            let mut back = delta.dot(&self.layers[l].weights.t());
            if self.layers[l - 1].activation == Activation::Relu {
                back.zip_mut_with(input, |d, &a| {
                    if a <= 0.0 {
                        *d = 0.0;
                    }
                });
            }
            delta = back;
        }

        // Sparse first layer: only weight rows of stored columns receive a
        // gradient.
        let grad_w0 = &mut grads.weights[0];
        for (r, d) in delta.axis_iter(Axis(0)).enumerate() {
            for (c, v) in batch.row(r).iter() {
                grad_w0.row_mut(c).scaled_add(v, &d);
            }
        }
        grads.bias[0].assign(&delta.sum_axis(Axis(0)));

        loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{CollisionPolicy, encode_pairs};
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn small_network(seed: u64) -> DenseNetwork {
        let architecture = NetworkArchitecture {
            input_dim: 3,
            input_layer_width: 4,
            hidden_width: 3,
            hidden_layers: 2,
        };
        DenseNetwork::new(&architecture, &mut StdRng::seed_from_u64(seed))
    }

    fn toy_batch() -> SparseDesign {
        encode_pairs(&["A", "B", "A"], &["B", "C", "A"], CollisionPolicy::Sum).design
    }

    #[test]
    fn layer_shapes_follow_architecture() {
        let architecture = NetworkArchitecture {
            input_dim: 100,
            input_layer_width: 100,
            hidden_width: 64,
            hidden_layers: 10,
        };
        let shapes = architecture.layer_shapes();
        assert_eq!(shapes.len(), 12);
        assert_eq!(architecture.depth(), 12);
        assert_eq!(shapes[0], (100, 100, Activation::Relu));
        assert_eq!(shapes[1], (100, 64, Activation::Relu));
        assert_eq!(shapes[10], (64, 64, Activation::Relu));
        assert_eq!(shapes[11], (64, 1, Activation::Linear));
    }

    #[test]
    fn initial_weights_respect_glorot_limit() {
        let network = small_network(1);
        network.check_shapes().unwrap();
        for layer in network.layers() {
            let (fan_in, fan_out) = layer.weights.dim();
            let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
            assert!(layer.weights.iter().all(|w| w.abs() <= limit));
            assert!(layer.bias.iter().all(|&b| b == 0.0));
        }
    }

    #[test]
    fn sparse_first_layer_matches_dense_product() {
        let network = small_network(2);
        let batch = toy_batch();
        let trace = network.forward_trace(&batch);

        let dense = array![[1.0f32, 1.0, 0.0], [0.0, 1.0, 1.0], [2.0, 0.0, 0.0]];
        let first = &network.layers()[0];
        let expected = (dense.dot(&first.weights) + &first.bias).mapv(|x| x.max(0.0));
        for (a, b) in trace[0].iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
        assert_eq!(network.forward(&batch).len(), 3);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut network = small_network(3);
        let batch = toy_batch();
        let targets = array![0.5f32, -1.0, 2.0];
        let mut grads = Gradients::zeros_like(&network);
        network.loss_and_gradients(&batch, targets.view(), &mut grads);

        let h = 1e-3f32;
        let probes = [(0usize, 0usize, 1usize), (0, 2, 3), (1, 1, 2), (3, 2, 0)];
        for &(layer, i, j) in &probes {
            let original = network.layers()[layer].weights[[i, j]];
            network.layers_mut()[layer].weights[[i, j]] = original + h;
            let plus = network.loss_and_gradients(&batch, targets.view(), &mut Gradients::zeros_like(&network));
            network.layers_mut()[layer].weights[[i, j]] = original - h;
            let minus = network.loss_and_gradients(&batch, targets.view(), &mut Gradients::zeros_like(&network));
            network.layers_mut()[layer].weights[[i, j]] = original;

            let numeric = (plus - minus) / (2.0 * h);
            assert_abs_diff_eq!(grads.weights[layer][[i, j]], numeric, epsilon = 1e-2);
        }
    }

    #[test]
    fn unused_columns_get_no_first_layer_gradient() {
        let network = small_network(4);
        let batch = encode_pairs(&["A", "B", "C"], &["B", "A", "C"], CollisionPolicy::Sum)
            .design
            .select_rows(&[0, 1]);
        let mut grads = Gradients::zeros_like(&network);
        network.loss_and_gradients(&batch, array![1.0f32, 1.0].view(), &mut grads);
        assert!(grads.weights[0].row(2).iter().all(|&g| g == 0.0));
    }

    #[test]
    fn malformed_layers_are_detected() {
        let mut network = small_network(5);
        network.layers_mut()[1].weights = Array2::zeros((2, 2));
        assert!(matches!(
            network.check_shapes(),
            Err(ModelError::MalformedLayer { layer: 1, .. })
        ));
    }
}
