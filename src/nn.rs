//! Neural-network primitives: activations, losses and convolution.
//!
//! Composite functions (sigmoid, silu, softmax, ...) are expressed through
//! the primitive operation surface so their gradients come from the tape;
//! the rest (relu, selu, celu, the cross-entropy losses, conv2d) are
//! primitives with their own backward rules.

use ndarray::{arr0, Axis};

use crate::engine;
use crate::error::{Result, TensorError};
use crate::tape::Op;
use crate::tensor::Tensor;
use crate::validate::IntoOperand;

/// How a loss collapses its elementwise result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    Sum,
    None,
}

impl Reduction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Sum => "sum",
            Reduction::None => "none",
        }
    }
}

/// Default SELU parameters from the self-normalizing networks paper.
pub const SELU_ALPHA: f32 = 1.67326;
pub const SELU_SCALE: f32 = 1.0507;

/// Rectified linear unit.
pub fn relu(inputs: &Tensor) -> Tensor {
    let v = inputs.value();
    let value = &v * &engine::greater_scalar(&v, 0.0);
    inputs
        .unary_output(value, Op::Relu { a: inputs.clone() })
        .with_name("out_relu")
}

/// Scaled exponential linear unit.
pub fn selu(inputs: &Tensor, alpha: f32, scale: f32) -> Tensor {
    let v = inputs.value();
    let positive = engine::greater_scalar(&v, 0.0) * &v;
    let negative = engine::less_equal_scalar(&v, 0.0) * v.mapv(|x| alpha * (x.exp() - 1.0));
    let value = (positive + negative) * scale;
    inputs
        .unary_output(value, Op::Selu { a: inputs.clone(), alpha, scale })
        .with_name("out_selu")
}

/// Continuously differentiable exponential linear unit.
pub fn celu(x: impl IntoOperand, alpha: f32) -> Result<Tensor> {
    let x = x.into_operand()?;
    let value = x
        .value()
        .mapv(|v| v.max(0.0) + (alpha * ((v / alpha).exp() - 1.0)).min(0.0));
    Ok(x.unary_output(value, Op::Celu { a: x.clone(), alpha })
        .with_name("out_celu"))
}

/// Sigmoid-weighted linear unit: `x * sigmoid(beta * x)`.
pub fn silu(x: impl IntoOperand, beta: f32) -> Result<Tensor> {
    let x = x.into_operand()?;
    let beta = Tensor::scalar(beta, false);
    beta.multiply(&x)?.sigmoid()?.multiply(&x)
}

pub fn sigmoid(x: impl IntoOperand) -> Result<Tensor> {
    let x = x.into_operand()?;
    let out = x.sigmoid()?;
    out.set_name("out_sigmoid");
    Ok(out)
}

/// `x / (1 + |x|)`.
pub fn softsign(x: impl IntoOperand) -> Result<Tensor> {
    let x = x.into_operand()?;
    x.divide(x.abs().add(1.0)?)
}

/// Softmax over axis 0.
pub fn softmax(x: impl IntoOperand) -> Result<Tensor> {
    let x = x.into_operand()?;
    x.exp().divide(x.exp().sum_axis(0, false)?)
}

/// `ln(1 + e^x)`.
pub fn softplus(x: impl IntoOperand) -> Result<Tensor> {
    let x = x.into_operand()?;
    Ok(x.exp().add(1.0)?.log())
}

/// `x * tanh(softplus(x))`.
pub fn mish(x: impl IntoOperand) -> Result<Tensor> {
    let x = x.into_operand()?;
    let sp = x.exp().add(1.0)?.log();
    x.multiply(sp.tanh())
}

pub fn exponential(x: impl IntoOperand) -> Result<Tensor> {
    Ok(x.into_operand()?.exp())
}

/// Identity activation.
pub fn linear(x: impl IntoOperand) -> Result<Tensor> {
    x.into_operand()
}

/// Squared-error loss, optionally reduced.
pub fn mean_squared_error(
    x: impl IntoOperand,
    y: impl IntoOperand,
    reduction: Reduction,
) -> Result<Tensor> {
    let x = x.into_operand()?;
    let y = y.into_operand()?;
    let loss = x.subtract(&y)?.power(2.0)?;
    Ok(reduce(loss, reduction))
}

/// Absolute-error loss, optionally reduced.
pub fn mean_absolute_error(
    x: impl IntoOperand,
    y: impl IntoOperand,
    reduction: Reduction,
) -> Result<Tensor> {
    let x = x.into_operand()?;
    let y = y.into_operand()?;
    let loss = x.subtract(&y)?.abs();
    Ok(reduce(loss, reduction))
}

fn reduce(loss: Tensor, reduction: Reduction) -> Tensor {
    match reduction {
        Reduction::Mean => loss.mean(),
        Reduction::Sum => loss.sum(false),
        Reduction::None => loss,
    }
}

/// Binary cross entropy between predictions `x` and targets `y`, with the
/// logarithms clamped at -100 for numerical stability.
pub fn binary_cross_entropy(
    x: impl IntoOperand,
    y: impl IntoOperand,
    epsilon: f32,
    reduction: Reduction,
) -> Result<Tensor> {
    let x = x.into_operand()?;
    let y = y.into_operand()?;
    let (vx, vy) = (x.value(), y.value());
    if vx.shape() != vy.shape() {
        return Err(TensorError::ShapeMismatch(format!(
            "binary cross entropy operands have shapes {:?} and {:?}",
            vx.shape(),
            vy.shape()
        )));
    }
    let log1m = vx.mapv(|v| (-v).ln_1p().max(-100.0));
    let logx = vx.mapv(|v| v.ln().max(-100.0));
    let loss = (&vy - 1.0) * &log1m - &vy * &logx;
    let value = match reduction {
        Reduction::Mean => arr0(loss.sum() / loss.len() as f32).into_dyn(),
        Reduction::Sum => arr0(loss.sum()).into_dyn(),
        Reduction::None => loss,
    };
    let op = Op::BinaryCrossEntropy {
        x: x.clone(),
        y: y.clone(),
        epsilon,
        reduction,
    };
    Ok(x.binary_output(&y, value, op).with_name("out_bce"))
}

/// Categorical cross entropy between one-hot targets and row-distributed
/// predictions: rows of `pred` are normalized, clipped into
/// `[epsilon, 1 - epsilon]`, and scored against `truth`.
pub fn cce(truth: &Tensor, pred: &Tensor, epsilon: f32) -> Result<Tensor> {
    let vt = truth.value();
    let vp = pred.value();
    if vp.ndim() != 2 || vt.shape() != vp.shape() {
        return Err(TensorError::ShapeMismatch(format!(
            "cce expects matching 2-D operands, got {:?} and {:?}",
            vt.shape(),
            vp.shape()
        )));
    }
    let row_sums = vp.sum_axis(Axis(1)).insert_axis(Axis(1));
    let normalized = &vp / &row_sums;
    let clipped = normalized.mapv(|v| v.clamp(epsilon, 1.0 - epsilon));
    let total = (&vt * &clipped.mapv(f32::ln)).sum();
    let value = arr0(-total / vt.shape()[0] as f32).into_dyn();
    let op = Op::Cce {
        truth: truth.clone(),
        pred: pred.clone(),
        epsilon,
    };
    Ok(truth.binary_output(pred, value, op).with_name("out_cce"))
}

/// 2-D convolution over NCHW input with OIHW filters. Both forward and the
/// fused backward are delegated to the engine kernels.
pub fn conv2d(
    input: impl IntoOperand,
    filters: impl IntoOperand,
    stride: usize,
    padding: usize,
) -> Result<Tensor> {
    let input = input.into_operand()?;
    let filters = filters.into_operand()?;
    let value = engine::conv2d(&input.value(), &filters.value(), stride, padding)?;
    let op = Op::Conv2d {
        input: input.clone(),
        filters: filters.clone(),
        stride,
        padding,
    };
    Ok(input.binary_output(&filters, value, op).with_name("out_conv2d"))
}
