use ndarray::{Array, Array1, Array2, Dimension, Zip};

/// RMSprop hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsPropConfig {
    pub learning_rate: f64,
    /// Decay of the running average of squared gradients
    pub rho: f64,
    /// Added to the denominator for numerical stability
    pub epsilon: f64,
}

impl Default for RmsPropConfig {
    fn default() -> Self {
        RmsPropConfig {
            learning_rate: 0.001,
            rho: 0.9,
            epsilon: 1e-7,
        }
    }
}

impl RmsPropConfig {
    pub fn init(&self) -> RmsProp {
        RmsProp {
            config: *self,
            velocity: None,
        }
    }
}

/// Plain (uncentered, momentum-free) RMSprop.
/// Keeps one running mean of squared gradients per parameter
#[derive(Debug, Clone)]
pub struct RmsProp {
    config: RmsPropConfig,
    velocity: Option<Vec<(Array2<f64>, Array1<f64>)>>,
}

impl RmsProp {
    pub fn config(&self) -> &RmsPropConfig {
        &self.config
    }

    /// Apply one update to every layer. `grads` is ordered like `layers`
    pub fn step(
        &mut self,
        layers: &mut [(Array2<f64>, Array1<f64>)],
        grads: &[(Array2<f64>, Array1<f64>)],
    ) {
        let config = self.config;
        let velocity = self.velocity.get_or_insert_with(|| {
            grads
                .iter()
                .map(|(w, b)| (Array2::zeros(w.raw_dim()), Array1::zeros(b.raw_dim())))
                .collect()
        });

        for ((layer, grad), state) in layers.iter_mut().zip(grads).zip(velocity.iter_mut()) {
            update(&mut layer.0, &grad.0, &mut state.0, &config);
            update(&mut layer.1, &grad.1, &mut state.1, &config);
        }
    }
}

fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    velocity: &mut Array<f64, D>,
    config: &RmsPropConfig,
) {
    Zip::from(param)
        .and(grad)
        .and(velocity)
        .for_each(|p, &g, v| {
            *v = config.rho * *v + (1f64 - config.rho) * g * g;
            *p -= config.learning_rate * g / (v.sqrt() + config.epsilon);
        });
}
