//! Neural network inference for pretrained ONNX models.

use std::{fmt, ops::RangeInclusive, path::Path, sync::Arc};

use anyhow::{bail, ensure};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, SimplePlan, TValue, Tensor as TractTensor,
    TypedFact, TypedOp,
};

use crate::image::{Image, Rect, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A dense `f32` N-dimensional array, used as network input and output.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor by invoking `f` with the index of every element, in row-major order.
    pub fn from_shape_fn<const N: usize>(
        shape: [usize; N],
        mut f: impl FnMut([usize; N]) -> f32,
    ) -> Self {
        let len = shape.iter().product();
        let mut data = Vec::with_capacity(len);
        let mut index = [0; N];
        for _ in 0..len {
            data.push(f(index));
            // Increment the multi-index, last dimension fastest.
            for dim in (0..N).rev() {
                index[dim] += 1;
                if index[dim] < shape[dim] {
                    break;
                }
                index[dim] = 0;
            }
        }
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn to_tract(&self) -> anyhow::Result<TractTensor> {
        Ok(TractTensor::from_shape(&self.shape, &self.data)?)
    }

    fn from_tract(tensor: &TractTensor) -> anyhow::Result<Self> {
        Ok(Self {
            shape: tensor.shape().to_vec(),
            data: tensor.as_slice::<f32>()?.to_vec(),
        })
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({:?})", self.shape)
    }
}

/// A pretrained neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads and optimizes a pretrained model from an ONNX file.
    ///
    /// Returns an error if the file cannot be read, if the network data is malformed or
    /// incomplete, or if the network uses unimplemented operations.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!("neural network file must have `.onnx` extension"),
        }

        let model_data = std::fs::read(path)?;
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*model_data)?
            .into_optimized()?;
        let outputs = graph.output_outlets()?.to_vec();
        let model = SimplePlan::new_for_outputs(graph, &outputs)?;
        Ok(Self(Arc::new(model)))
    }

    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the concrete shape of input `index`.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<Vec<usize>> {
        let fact = self.0.model().input_fact(index)?;
        match fact.shape.as_concrete() {
            Some(shape) => Ok(shape.to_vec()),
            None => bail!("network input {index} has a symbolic shape"),
        }
    }

    /// Runs the network on `inputs`, returning one tensor per network output.
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &[Tensor]) -> anyhow::Result<Vec<Tensor>> {
        let inputs = inputs
            .iter()
            .map(|t| Ok(TValue::from_const(Arc::new(t.to_tract()?))))
            .collect::<anyhow::Result<_>>()?;
        let outputs = self.0.run(inputs)?;
        outputs.iter().map(|t| Tensor::from_tract(t)).collect()
    }
}

/// A convolutional network that takes a single `[1, 3, H, W]` RGB image as its input.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    color_range: RangeInclusive<f32>,
}

impl Cnn {
    /// Wraps a [`NeuralNetwork`] whose inputs are RGB images in NCHW order.
    ///
    /// Color channels are mapped linearly from `0..=255` to `color_range`.
    pub fn new(nn: NeuralNetwork, color_range: RangeInclusive<f32>) -> anyhow::Result<Self> {
        ensure!(
            nn.num_inputs() == 1,
            "CNN has to take exactly 1 input, this one takes {}",
            nn.num_inputs(),
        );
        ensure!(color_range.end() > color_range.start(), "empty color range");

        let shape = nn.input_shape(0)?;
        let input_res = match shape[..] {
            [1, 3, h, w] => Resolution::new(w.try_into()?, h.try_into()?),
            ref shape => bail!("invalid CNN input shape {shape:?}, expected [1, 3, H, W]"),
        };

        Ok(Self {
            nn,
            input_res,
            color_range,
        })
    }

    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on the `rect` area of `image`.
    ///
    /// The area is sampled (nearest neighbor) to the network's input resolution. If the aspect
    /// ratios differ, the image will be stretched.
    pub fn estimate(&self, image: &Image, rect: Rect) -> anyhow::Result<Vec<Tensor>> {
        let tensor = image_to_tensor(image, rect, self.input_res, self.color_range.clone());
        self.nn.estimate(&[tensor])
    }
}

fn image_to_tensor(
    image: &Image,
    rect: Rect,
    res: Resolution,
    color_range: RangeInclusive<f32>,
) -> Tensor {
    let (w, h) = (res.width() as usize, res.height() as usize);
    let start = *color_range.start();
    let scale = (color_range.end() - start) / 255.0;
    Tensor::from_shape_fn([1, 3, h, w], |[_, c, y, x]| {
        let u = x as f32 / w as f32;
        let v = y as f32 / h as f32;
        let px = rect.x() + (u * rect.width() as f32) as u32;
        let py = rect.y() + (v * rect.height() as f32) as u32;
        image.get(px, py)[c] as f32 * scale + start
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn shape_fn_is_row_major() {
        let t = Tensor::from_shape_fn([2, 3], |[y, x]| (y * 10 + x) as f32);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn color_mapping() {
        let image = Image::from_rgba(1, 1, vec![0, 255, 51, 255]).unwrap();
        let rect = Rect::new(0, 0, 1, 1);
        let t = image_to_tensor(&image, rect, Resolution::new(2, 2), 0.0..=1.0);
        assert_eq!(t.shape(), &[1, 3, 2, 2]);
        for (i, expected) in [(0, 0.0), (3, 0.0), (4, 1.0), (7, 1.0), (8, 0.2)] {
            assert_abs_diff_eq!(t.as_slice()[i], expected, epsilon = 1e-6);
        }

        let t = image_to_tensor(&image, rect, Resolution::new(1, 1), -1.0..=1.0);
        assert_abs_diff_eq!(t.as_slice()[0], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(t.as_slice()[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(t.as_slice()[2], -0.6, epsilon = 1e-6);
    }

    #[test]
    fn load_rejects_non_onnx() {
        assert!(NeuralNetwork::load(Path::new("model.tflite")).is_err());
        assert!(NeuralNetwork::load(Path::new("/nonexistent/model.onnx")).is_err());
    }
}
