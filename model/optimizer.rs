use super::network::{DenseNetwork, Gradients};
use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// Adam with the bias correction folded into the step size:
/// `lr_t = lr * sqrt(1 - beta2^t) / (1 - beta1^t)`.
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    step: i32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_bias: Vec<Array1<f32>>,
    v_bias: Vec<Array1<f32>>,
}

impl Adam {
    pub fn new(network: &DenseNetwork, config: AdamConfig) -> Self {
        let zeros = Gradients::zeros_like(network);
        Self {
            config,
            step: 0,
            m_weights: zeros.weights.clone(),
            v_weights: zeros.weights,
            m_bias: zeros.bias.clone(),
            v_bias: zeros.bias,
        }
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> i32 {
        self.step
    }

    pub fn step(&mut self, network: &mut DenseNetwork, grads: &Gradients) {
        self.step += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let lr_t =
            learning_rate * (1.0 - beta2.powi(self.step)).sqrt() / (1.0 - beta1.powi(self.step));

        for (i, layer) in network.layers_mut().iter_mut().enumerate() {
            Zip::from(&mut layer.weights)
                .and(&mut self.m_weights[i])
                .and(&mut self.v_weights[i])
                .and(&grads.weights[i])
                .for_each(|w, m, v, &g| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    *w -= lr_t * *m / (v.sqrt() + epsilon);
                });
            Zip::from(&mut layer.bias)
                .and(&mut self.m_bias[i])
                .and(&mut self.v_bias[i])
                .and(&grads.bias[i])
                .for_each(|b, m, v, &g| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    *b -= lr_t * *m / (v.sqrt() + epsilon);
                });
        }
    }
}
