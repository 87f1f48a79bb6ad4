use crate::activation::activation::ActivationFunction;
use crate::math::matrix::Matrix;
use crate::network::network::{ForwardPass, Network};

/// Additive weight and bias changes for one online update, already scaled by
/// the learning rate and signed so that `W += dW` descends the error.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightDeltas {
    pub dw_hidden: Matrix,
    pub dw_output: Matrix,
    pub dt_hidden: Option<Matrix>,
    pub dt_output: Option<Matrix>,
}

impl WeightDeltas {
    /// All-zero deltas shaped like `network`.
    pub fn zeros_like(network: &Network) -> WeightDeltas {
        let zeros = |m: &Matrix| Matrix::zeros(m.rows, m.cols);
        WeightDeltas {
            dw_hidden: zeros(network.hidden_weights()),
            dw_output: zeros(network.output_weights()),
            dt_hidden: network.hidden_bias().map(zeros),
            dt_output: network.output_bias().map(zeros),
        }
    }

    fn add_scaled(&mut self, other: &WeightDeltas, factor: f64) {
        self.dw_hidden += &other.dw_hidden.scale(factor);
        self.dw_output += &other.dw_output.scale(factor);
        if let (Some(d), Some(o)) = (self.dt_hidden.as_mut(), other.dt_hidden.as_ref()) {
            *d += &o.scale(factor);
        }
        if let (Some(d), Some(o)) = (self.dt_output.as_mut(), other.dt_output.as_ref()) {
            *d += &o.scale(factor);
        }
    }
}

/// Remembers the previous update of every weight slot.
#[derive(Debug, Clone)]
pub struct Momentum {
    beta: f64,
    previous: WeightDeltas,
}

impl Momentum {
    pub fn new(network: &Network, beta: f64) -> Momentum {
        Momentum { beta, previous: WeightDeltas::zeros_like(network) }
    }

    /// Returns `deltas + beta * previous` and stores the result as the new previous.
    pub fn blend(&mut self, mut deltas: WeightDeltas) -> WeightDeltas {
        deltas.add_scaled(&self.previous, self.beta);
        self.previous.clone_from(&deltas);
        deltas
    }
}

/// Computes the online update for one sample from its forward pass.
///
/// `x` and `target` are `n × 1` and `m × 1` columns. With a softmax output the
/// output error term is `a - t` directly; otherwise it is multiplied by the
/// output activation's derivative.
pub fn compute_deltas(network: &Network, x: &Matrix, target: &Matrix, pass: &ForwardPass) -> WeightDeltas {
    let config = network.config();
    let slope = config.leaky_slope;
    let step = -config.learning_rate;

    let error = &pass.a_output - target;
    let delta_output = match config.output_activation() {
        ActivationFunction::Softmax => error,
        f => error.hadamard(&f.apply_derivative(&pass.net_output, slope)),
    };

    let back = &network.output_weights().transpose() * &delta_output;
    let delta_hidden = back.hadamard(
        &config
            .hidden_activation()
            .apply_derivative(&pass.net_hidden, slope),
    );

    WeightDeltas {
        dw_hidden: (&delta_hidden * &x.transpose()).scale(step),
        dw_output: (&delta_output * &pass.a_hidden.transpose()).scale(step),
        dt_hidden: network.hidden_bias().map(|_| delta_hidden.scale(step)),
        dt_output: network.output_bias().map(|_| delta_output.scale(step)),
    }
}

/// Backward pass plus immediate weight update for one sample.
pub fn backward(
    network: &mut Network,
    x: &Matrix,
    target: &Matrix,
    pass: &ForwardPass,
    momentum: Option<&mut Momentum>,
) {
    let mut deltas = compute_deltas(network, x, target, pass);
    if let Some(m) = momentum {
        deltas = m.blend(deltas);
    }
    network.apply_deltas(
        &deltas.dw_hidden,
        &deltas.dw_output,
        deltas.dt_hidden.as_ref(),
        deltas.dt_output.as_ref(),
    );
}

/// Squared error of one sample: `0.5 * Σ (t - a)²`.
pub fn sample_error(target: &[f64], output: &[f64]) -> f64 {
    0.5 * target
        .iter()
        .zip(output.iter())
        .map(|(t, a)| (t - a).powi(2))
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::config::NetworkConfig;
    use approx::assert_abs_diff_eq;

    fn linear_net(bias: bool) -> Network {
        let config = NetworkConfig::new(2, 1, 1)
            .with_learning_rate(0.5)
            .with_bias(bias)
            .with_activations(ActivationFunction::Linear, ActivationFunction::Linear);
        let (th, to) = if bias {
            (Some(Matrix::column(&[0.0])), Some(Matrix::column(&[0.0])))
        } else {
            (None, None)
        };
        Network::from_parts(
            config,
            Matrix::from_data(vec![vec![1.0, 1.0]]),
            Matrix::from_data(vec![vec![2.0]]),
            th,
            to,
        )
        .unwrap()
    }

    #[test]
    fn linear_deltas_match_hand_derivation() {
        let net = linear_net(true);
        let x = Matrix::column(&[1.0, 0.0]);
        let t = Matrix::column(&[0.0]);
        let pass = net.forward_column(&x);
        // a_h = 1, a_o = 2, delta_o = 2, delta_h = W_o^T * 2 = 4
        let d = compute_deltas(&net, &x, &t, &pass);
        assert_eq!(d.dw_output.data, vec![vec![-1.0]]);
        assert_eq!(d.dw_hidden.data, vec![vec![-2.0, 0.0]]);
        assert_eq!(d.dt_output.unwrap().data, vec![vec![-1.0]]);
        assert_eq!(d.dt_hidden.unwrap().data, vec![vec![-2.0]]);
    }

    #[test]
    fn update_reduces_sample_error() {
        let config = NetworkConfig::new(2, 3, 1).with_learning_rate(0.5);
        let mut net = Network::with_rng(config, &mut rand::thread_rng()).unwrap();
        let input = [0.2, 0.9];
        let x = Matrix::column(&input);
        let t = Matrix::column(&[1.0]);

        let before = sample_error(&[1.0], &net.predict(&input).unwrap());
        let pass = net.forward_column(&x);
        backward(&mut net, &x, &t, &pass, None);
        let after = sample_error(&[1.0], &net.predict(&input).unwrap());
        assert!(after < before, "error went from {} to {}", before, after);
    }

    #[test]
    fn softmax_output_uses_raw_error() {
        let config = NetworkConfig::new(1, 1, 2)
            .with_learning_rate(1.0)
            .with_bias(false)
            .with_activations(ActivationFunction::Linear, ActivationFunction::Softmax);
        let net = Network::from_parts(
            config,
            Matrix::from_data(vec![vec![1.0]]),
            Matrix::from_data(vec![vec![0.0], vec![0.0]]),
            None,
            None,
        )
        .unwrap();
        let x = Matrix::column(&[1.0]);
        let t = Matrix::column(&[1.0, 0.0]);
        let pass = net.forward_column(&x);
        // softmax of [0, 0] = [0.5, 0.5]; delta_o = [-0.5, 0.5]; a_h = 1
        let d = compute_deltas(&net, &x, &t, &pass);
        assert_abs_diff_eq!(d.dw_output.data[0][0], 0.5);
        assert_abs_diff_eq!(d.dw_output.data[1][0], -0.5);
    }

    #[test]
    fn momentum_adds_previous_update() {
        let net = linear_net(false);
        let x = Matrix::column(&[1.0, 0.0]);
        let t = Matrix::column(&[0.0]);
        let pass = net.forward_column(&x);
        let raw = compute_deltas(&net, &x, &t, &pass);

        let mut momentum = Momentum::new(&net, 0.5);
        let first = momentum.blend(raw.clone());
        assert_eq!(first, raw);
        let second = momentum.blend(raw.clone());
        assert_eq!(second.dw_output.data, vec![vec![-1.5]]);
        let third = momentum.blend(raw);
        assert_eq!(third.dw_output.data, vec![vec![-1.75]]);
    }

    #[test]
    fn sample_error_is_half_squared_distance() {
        assert_abs_diff_eq!(sample_error(&[1.0, 0.0], &[0.5, 0.5]), 0.25);
    }
}
