//! The dense sign classification network.

use burn::{
    config::Config,
    module::Module,
    nn::{BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{activation::relu, backend::Backend, Tensor},
};

use crate::landmark::LandmarkVector;

/// Layer sizes and regularization of [`SignNet`].
#[derive(Config, Debug)]
pub struct SignNetConfig {
    /// Number of distinct labels, i.e. the width of the output layer.
    pub num_classes: usize,
    #[config(default = 0.8)]
    pub dropout: f64,
}

impl SignNetConfig {
    /// Builds the network with freshly initialized weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SignNet<B> {
        SignNet {
            input: LinearConfig::new(LandmarkVector::LEN, 256).init(device),
            hidden1: LinearConfig::new(256, 512).init(device),
            norm1: BatchNormConfig::new(512).init(device),
            hidden2: LinearConfig::new(512, 256).init(device),
            norm2: BatchNormConfig::new(256).init(device),
            hidden3: LinearConfig::new(256, 128).init(device),
            norm3: BatchNormConfig::new(128).init(device),
            output: LinearConfig::new(128, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Stack of fully connected layers mapping a [`LandmarkVector`] to one score per label.
///
/// `63 → 256 → 512 → norm → dropout → 256 → norm → dropout → 128 → norm → dropout → classes`,
/// with ReLU after every hidden layer. [`SignNet::forward`] returns logits; apply a softmax to get
/// class probabilities. Dropout and batch statistics are only active on autodiff backends.
#[derive(Module, Debug)]
pub struct SignNet<B: Backend> {
    input: Linear<B>,
    hidden1: Linear<B>,
    norm1: BatchNorm<B, 0>,
    hidden2: Linear<B>,
    norm2: BatchNorm<B, 0>,
    hidden3: Linear<B>,
    norm3: BatchNorm<B, 0>,
    output: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> SignNet<B> {
    /// Maps a `[batch, 63]` input to `[batch, classes]` logits.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.input.forward(input));
        let x = relu(self.hidden1.forward(x));
        let x = self.dropout.forward(self.norm1.forward(x));
        let x = relu(self.hidden2.forward(x));
        let x = self.dropout.forward(self.norm2.forward(x));
        let x = relu(self.hidden3.forward(x));
        let x = self.dropout.forward(self.norm3.forward(x));
        self.output.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::TensorData;

    use super::*;
    use crate::classifier::InferenceBackend;

    #[test]
    fn output_width_is_class_count() {
        let device = Default::default();
        let net = SignNetConfig::new(3).init::<InferenceBackend>(&device);
        let input = Tensor::<InferenceBackend, 2>::from_data(
            TensorData::new(vec![0.1f32; 2 * LandmarkVector::LEN], [2, LandmarkVector::LEN]),
            &device,
        );
        assert_eq!(net.forward(input).dims(), [2, 3]);
    }
}
