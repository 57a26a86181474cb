//! Neural network inference on camera frames.
//!
//! Networks are pretrained ONNX files executed by [`tract_onnx`]. This module only adapts image
//! data to the network's input tensor and hands back the raw output tensors; interpreting them is
//! up to the code in [`crate::perception`].

use std::{
    fmt,
    ops::{Index, RangeInclusive},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tract_ndarray::Array4, tvec, DatumExt, Framework, Graph, InferenceFact, InferenceModelExt,
    SimplePlan, Tensor, TypedFact, TypedOp,
};

use crate::image::{Color, Image, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, fixed at 1.
/// - `C` is the number of color channels, 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// Element type and value mapping of a CNN's input tensor.
#[derive(Clone, Debug, PartialEq)]
pub enum CnnInputFormat {
    /// Raw `u8` sRGB values.
    U8,
    /// `f32` values, with sRGB values mapped uniformly to the given range.
    F32(RangeInclusive<f32>),
}

impl CnnInputFormat {
    fn map_f32(range: &RangeInclusive<f32>, color: Color) -> [f32; 3] {
        let start = *range.start();
        let adjust_range = (*range.end() - start) / 255.0;
        [color.r(), color.g(), color.b()].map(|col| col as f32 * adjust_range + start)
    }
}

/// A region of a frame that is fed to a network.
///
/// The region is a (possibly rotated) rectangle. The network input is sampled uniformly across it,
/// so regions with a different aspect ratio than the network input get stretched. Parts of the
/// region outside of the frame read as transparent black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
    /// Clockwise rotation in image coordinates.
    radians: f32,
}

impl Roi {
    pub fn new(x_center: f32, y_center: f32, width: f32, height: f32, radians: f32) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
            radians,
        }
    }

    /// A region covering exactly the frame, stretching it to the network's aspect ratio.
    pub fn stretch(res: Resolution) -> Self {
        let (w, h) = (res.width() as f32, res.height() as f32);
        Self::new(w * 0.5, h * 0.5, w, h, 0.0)
    }

    /// A square region centered on the frame that contains all of it, letterboxing the shorter
    /// side.
    pub fn letterbox(res: Resolution) -> Self {
        let (w, h) = (res.width() as f32, res.height() as f32);
        let size = w.max(h);
        Self::new(w * 0.5, h * 0.5, size, size, 0.0)
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.y_center
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn radians(&self) -> f32 {
        self.radians
    }

    /// Maps normalized region coordinates (`0.0..=1.0` on both axes) to frame pixel coordinates.
    pub fn to_frame(&self, u: f32, v: f32) -> (f32, f32) {
        let dx = (u - 0.5) * self.width;
        let dy = (v - 0.5) * self.height;
        let (sin, cos) = self.radians.sin_cos();
        (
            self.x_center + dx * cos - dy * sin,
            self.y_center + dx * sin + dy * cos,
        )
    }
}

/// A convolutional neural network (CNN) that takes a single RGB image as its input.
pub struct Cnn {
    model: Model,
    path: PathBuf,
    input_res: Resolution,
    shape: CnnInputShape,
    format: CnnInputFormat,
}

impl Cnn {
    /// Loads an ONNX network from `path`, fixing its input to `input_res`.
    ///
    /// Returns an error if the file cannot be read, is not a valid ONNX model, does not take
    /// exactly one input, or uses operations that [`tract_onnx`] does not implement.
    pub fn load<P: AsRef<Path>>(
        path: P,
        input_res: Resolution,
        shape: CnnInputShape,
        format: CnnInputFormat,
    ) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref(), input_res, shape, format)
            .with_context(|| format!("failed to load network '{}'", path.as_ref().display()))
    }

    fn load_impl(
        path: &Path,
        input_res: Resolution,
        shape: CnnInputShape,
        format: CnnInputFormat,
    ) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!("neural network file must have `.onnx` extension"),
        }

        let (h, w) = (input_res.height() as usize, input_res.width() as usize);
        let dims = match shape {
            CnnInputShape::NCHW => [1, 3, h, w],
            CnnInputShape::NHWC => [1, h, w, 3],
        };

        let graph = tract_onnx::onnx().model_for_path(path)?;
        if graph.inputs.len() != 1 {
            bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                graph.inputs.len(),
            );
        }

        let fact: InferenceFact = match format {
            CnnInputFormat::U8 => u8::fact(dims).into(),
            CnnInputFormat::F32(_) => f32::fact(dims).into(),
        };
        let model = graph
            .with_input_fact(0, fact)?
            .into_optimized()?
            .into_runnable()?;

        log::debug!(
            "loaded {} ({} input {:?}, {} outputs)",
            path.display(),
            input_res,
            shape,
            model.model().outputs.len(),
        );

        Ok(Self {
            model,
            path: path.to_path_buf(),
            input_res,
            shape,
            format,
        })
    }

    /// Returns the number of output tensors the network produces.
    pub fn num_outputs(&self) -> usize {
        self.model.model().outputs.len()
    }

    /// Runs the network on the region `roi` of `image`, returning the network outputs.
    ///
    /// Pixels are sampled with nearest-neighbor filtering.
    pub fn estimate(&self, image: &Image, roi: &Roi) -> anyhow::Result<Outputs> {
        let tensor = self.input_tensor(image, roi);
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .with_context(|| format!("inference failed for '{}'", self.path.display()))?;

        let tensors = outputs
            .iter()
            .map(|value| -> anyhow::Result<Output> {
                let data = value.cast_to::<f32>()?;
                Ok(Output {
                    shape: value.shape().to_vec(),
                    data: data.as_slice::<f32>()?.to_vec(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Outputs { tensors })
    }

    fn input_tensor(&self, image: &Image, roi: &Roi) -> Tensor {
        let (h, w) = (
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        );
        let sample = |x: usize, y: usize| {
            let (fx, fy) = roi.to_frame((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32);
            image.get_or_null(fx.floor() as i32, fy.floor() as i32)
        };

        match (&self.format, self.shape) {
            (CnnInputFormat::U8, CnnInputShape::NCHW) => {
                Array4::from_shape_fn([1, 3, h, w], |(_, c, y, x)| sample(x, y)[c]).into()
            }
            (CnnInputFormat::U8, CnnInputShape::NHWC) => {
                Array4::from_shape_fn([1, h, w, 3], |(_, y, x, c)| sample(x, y)[c]).into()
            }
            (CnnInputFormat::F32(range), CnnInputShape::NCHW) => {
                Array4::from_shape_fn([1, 3, h, w], |(_, c, y, x)| {
                    CnnInputFormat::map_f32(range, sample(x, y))[c]
                })
                .into()
            }
            (CnnInputFormat::F32(range), CnnInputShape::NHWC) => {
                Array4::from_shape_fn([1, h, w, 3], |(_, y, x, c)| {
                    CnnInputFormat::map_f32(range, sample(x, y))[c]
                })
                .into()
            }
        }
    }
}

impl fmt::Debug for Cnn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cnn")
            .field("path", &self.path)
            .field("input_res", &self.input_res)
            .field("shape", &self.shape)
            .finish()
    }
}

/// A single output tensor, converted to `f32`.
#[derive(Debug, Clone)]
pub struct Output {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Output {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "tensor data does not match shape {shape:?}"
        );
        Self { shape, data }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the tensor elements in row-major order.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// The output tensors of a network, in the order the model declares them.
#[derive(Debug, Clone)]
pub struct Outputs {
    tensors: Vec<Output>,
}

impl Outputs {
    pub fn new(tensors: Vec<Output>) -> Self {
        Self { tensors }
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Output> {
        self.tensors.iter()
    }
}

impl Index<usize> for Outputs {
    type Output = Output;

    fn index(&self, index: usize) -> &Output {
        &self.tensors[index]
    }
}
