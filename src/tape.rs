//! Provenance records and the backward-operation registry.
//!
//! Every computed tensor carries at most one [`Op`]: a closed enum over the
//! primitive operations, each variant capturing the forward arguments that
//! its chain-rule needs. The exhaustive match in [`Op::backward`] is the
//! whole rulebook; the single escape hatch is [`Op::Custom`], which carries
//! a caller-supplied backward closure inside an [`OperationContext`].

use std::f32::consts::{LN_10, LN_2, PI};
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use ndarray::{ArrayD, Axis, Ix2, IxDyn};

use crate::engine;
use crate::error::{Result, TensorError};
use crate::nn::Reduction;
use crate::tensor::Tensor;

/// One recorded forward argument: a tensor that participates in backward
/// recursion, or an opaque parameter that carries no gradient.
#[derive(Clone)]
pub enum Arg {
    Tensor(Tensor),
    Float(f32),
    Int(isize),
    Bool(bool),
    Shape(Vec<usize>),
    Str(&'static str),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Tensor(t) => {
                let name = t.name();
                write!(f, "{}", if name.is_empty() { "_nd_".to_string() } else { name })
            }
            Arg::Float(v) => write!(f, "{}", v),
            Arg::Int(v) => write!(f, "{}", v),
            Arg::Bool(v) => write!(f, "{}", v),
            Arg::Shape(s) => write!(f, "{:?}", s),
            Arg::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Backward closure for a custom operation: receives the output tensor, the
/// upstream gradient and the recorded forward arguments, and is responsible
/// for pushing local gradients into each tensor argument via `diff`.
pub type BackwardFn = dyn Fn(&Tensor, &ArrayD<f32>, &[Arg]) -> Result<()> + Send + Sync;

/// Context attached to a custom operation: its name and, once the forward
/// closure installs one, its backward function.
#[derive(Clone)]
pub struct OperationContext {
    name: String,
    backward: Option<Arc<BackwardFn>>,
}

impl OperationContext {
    pub fn new(name: impl Into<String>) -> Self {
        OperationContext {
            name: name.into(),
            backward: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_backward<F>(&mut self, backward: F)
    where
        F: Fn(&Tensor, &ArrayD<f32>, &[Arg]) -> Result<()> + Send + Sync + 'static,
    {
        self.backward = Some(Arc::new(backward));
    }

    fn backward_fn(&self) -> Option<&Arc<BackwardFn>> {
        self.backward.as_ref()
    }
}

/// Tape entry: the operation that produced a tensor, together with the
/// forward arguments its backward rule consumes.
#[derive(Clone)]
pub enum Op {
    Add { a: Tensor, b: Tensor },
    Subtract { a: Tensor, b: Tensor },
    Multiply { a: Tensor, b: Tensor },
    Divide { a: Tensor, b: Tensor },
    Power { a: Tensor, b: Tensor },
    Mod { a: Tensor, b: Tensor },
    Negative { a: Tensor },
    Matmul { a: Tensor, b: Tensor },
    Dot { a: Tensor, b: Tensor },
    Outer { a: Tensor, b: Tensor },
    Exp { a: Tensor },
    Exp2 { a: Tensor },
    Expm1 { a: Tensor },
    Log { a: Tensor },
    Log1p { a: Tensor },
    Log2 { a: Tensor },
    Log10 { a: Tensor },
    Sqrt { a: Tensor },
    Rsqrt { a: Tensor },
    Abs { a: Tensor },
    Sin { a: Tensor },
    Cos { a: Tensor },
    Tan { a: Tensor },
    Arcsin { a: Tensor },
    Arccos { a: Tensor },
    Arctan { a: Tensor },
    Sinh { a: Tensor },
    Cosh { a: Tensor },
    Tanh { a: Tensor },
    Arcsinh { a: Tensor },
    Arccosh { a: Tensor },
    Arctanh { a: Tensor },
    Sinc { a: Tensor },
    Radians { a: Tensor },
    Trunc { a: Tensor },
    Floor { a: Tensor },
    Ceil { a: Tensor },
    Clip { a: Tensor, min: Tensor, max: Tensor },
    Det { a: Tensor },
    Norm { a: Tensor },
    MatrixRank { a: Tensor },
    Cond { a: Tensor },
    Svd { a: Tensor },
    Mean { a: Tensor },
    Sum { a: Tensor, keep_dim: bool },
    SumAxis { a: Tensor, axis: usize, keep_dim: bool },
    Reshape { a: Tensor, shape: Vec<usize> },
    OffsetGet { a: Tensor, index: usize },
    Relu { a: Tensor },
    Selu { a: Tensor, alpha: f32, scale: f32 },
    Celu { a: Tensor, alpha: f32 },
    BinaryCrossEntropy { x: Tensor, y: Tensor, epsilon: f32, reduction: Reduction },
    Cce { truth: Tensor, pred: Tensor, epsilon: f32 },
    Conv2d { input: Tensor, filters: Tensor, stride: usize, padding: usize },
    Custom { context: OperationContext, args: Vec<Arg> },
}

impl Op {
    pub fn name(&self) -> &str {
        match self {
            Op::Add { .. } => "add",
            Op::Subtract { .. } => "subtract",
            Op::Multiply { .. } => "multiply",
            Op::Divide { .. } => "divide",
            Op::Power { .. } => "power",
            Op::Mod { .. } => "mod",
            Op::Negative { .. } => "negative",
            Op::Matmul { .. } => "matmul",
            Op::Dot { .. } => "dot",
            Op::Outer { .. } => "outer",
            Op::Exp { .. } => "exp",
            Op::Exp2 { .. } => "exp2",
            Op::Expm1 { .. } => "expm1",
            Op::Log { .. } => "log",
            Op::Log1p { .. } => "log1p",
            Op::Log2 { .. } => "log2",
            Op::Log10 { .. } => "log10",
            Op::Sqrt { .. } => "sqrt",
            Op::Rsqrt { .. } => "rsqrt",
            Op::Abs { .. } => "abs",
            Op::Sin { .. } => "sin",
            Op::Cos { .. } => "cos",
            Op::Tan { .. } => "tan",
            Op::Arcsin { .. } => "arcsin",
            Op::Arccos { .. } => "arccos",
            Op::Arctan { .. } => "arctan",
            Op::Sinh { .. } => "sinh",
            Op::Cosh { .. } => "cosh",
            Op::Tanh { .. } => "tanh",
            Op::Arcsinh { .. } => "arcsinh",
            Op::Arccosh { .. } => "arccosh",
            Op::Arctanh { .. } => "arctanh",
            Op::Sinc { .. } => "sinc",
            Op::Radians { .. } => "radians",
            Op::Trunc { .. } => "trunc",
            Op::Floor { .. } => "floor",
            Op::Ceil { .. } => "ceil",
            Op::Clip { .. } => "clip",
            Op::Det { .. } => "det",
            Op::Norm { .. } => "norm",
            Op::MatrixRank { .. } => "matrix_rank",
            Op::Cond { .. } => "cond",
            Op::Svd { .. } => "svd",
            Op::Mean { .. } => "mean",
            Op::Sum { .. } => "sum",
            Op::SumAxis { .. } => "sum_axis",
            Op::Reshape { .. } => "reshape",
            Op::OffsetGet { .. } => "offsetGet",
            Op::Relu { .. } => "relu",
            Op::Selu { .. } => "selu",
            Op::Celu { .. } => "celu",
            Op::BinaryCrossEntropy { .. } => "binary_cross_entropy",
            Op::Cce { .. } => "cce",
            Op::Conv2d { .. } => "conv2d",
            Op::Custom { context, .. } => context.name(),
        }
    }

    /// The recorded forward arguments, in registration order. Used by the
    /// graph printer and handed to custom backward closures.
    pub fn args(&self) -> Vec<Arg> {
        use Arg::{Bool, Float, Int, Shape, Tensor as T};
        match self {
            Op::Add { a, b }
            | Op::Subtract { a, b }
            | Op::Multiply { a, b }
            | Op::Divide { a, b }
            | Op::Power { a, b }
            | Op::Mod { a, b }
            | Op::Matmul { a, b }
            | Op::Dot { a, b }
            | Op::Outer { a, b } => vec![T(a.clone()), T(b.clone())],
            Op::Negative { a }
            | Op::Exp { a }
            | Op::Exp2 { a }
            | Op::Expm1 { a }
            | Op::Log { a }
            | Op::Log1p { a }
            | Op::Log2 { a }
            | Op::Log10 { a }
            | Op::Sqrt { a }
            | Op::Rsqrt { a }
            | Op::Abs { a }
            | Op::Sin { a }
            | Op::Cos { a }
            | Op::Tan { a }
            | Op::Arcsin { a }
            | Op::Arccos { a }
            | Op::Arctan { a }
            | Op::Sinh { a }
            | Op::Cosh { a }
            | Op::Tanh { a }
            | Op::Arcsinh { a }
            | Op::Arccosh { a }
            | Op::Arctanh { a }
            | Op::Sinc { a }
            | Op::Radians { a }
            | Op::Trunc { a }
            | Op::Floor { a }
            | Op::Ceil { a }
            | Op::Det { a }
            | Op::Norm { a }
            | Op::MatrixRank { a }
            | Op::Cond { a }
            | Op::Svd { a }
            | Op::Mean { a }
            | Op::Relu { a } => vec![T(a.clone())],
            Op::Clip { a, min, max } => vec![T(a.clone()), T(min.clone()), T(max.clone())],
            Op::Sum { a, keep_dim } => vec![T(a.clone()), Bool(*keep_dim)],
            Op::SumAxis { a, axis, keep_dim } => {
                vec![T(a.clone()), Int(*axis as isize), Bool(*keep_dim)]
            }
            Op::Reshape { a, shape } => vec![T(a.clone()), Shape(shape.clone())],
            Op::OffsetGet { a, index } => vec![T(a.clone()), Int(*index as isize)],
            Op::Selu { a, alpha, scale } => vec![T(a.clone()), Float(*alpha), Float(*scale)],
            Op::Celu { a, alpha } => vec![T(a.clone()), Float(*alpha)],
            Op::BinaryCrossEntropy { x, y, epsilon, reduction } => vec![
                T(x.clone()),
                T(y.clone()),
                Float(*epsilon),
                Arg::Str(reduction.as_str()),
            ],
            Op::Cce { truth, pred, epsilon } => {
                vec![T(truth.clone()), T(pred.clone()), Float(*epsilon)]
            }
            Op::Conv2d { input, filters, stride, padding } => vec![
                T(input.clone()),
                T(filters.clone()),
                Int(*stride as isize),
                Int(*padding as isize),
            ],
            Op::Custom { args, .. } => args.clone(),
        }
    }

    /// Apply this operation's chain rule: compute the local gradient for
    /// each tensor argument from the upstream gradient `grad` and push it
    /// via that argument's `diff`.
    pub fn backward(&self, output: &Tensor, grad: &ArrayD<f32>) -> Result<()> {
        match self {
            Op::Add { a, b } => {
                a.diff(grad)?;
                b.diff(grad)
            }
            Op::Subtract { a, b } => {
                a.diff(grad)?;
                b.diff(&(-grad))
            }
            Op::Multiply { a, b } => {
                let (va, vb) = (a.value(), b.value());
                a.diff(&(grad * &vb))?;
                b.diff(&(&va * grad))
            }
            Op::Divide { a, b } => {
                let (va, vb) = (a.value(), b.value());
                a.diff(&(grad / &vb))?;
                let gb = (&va * grad) / (&vb * &vb);
                b.diff(&(-gb))
            }
            Op::Power { a, b } => {
                let (va, vb) = (a.value(), b.value());
                let ga = grad * &(&vb * &engine::pow(&va, &(&vb - 1.0)));
                a.diff(&ga)?;
                let gb = grad * &engine::pow(&va, &vb) * &va.mapv(f32::ln);
                b.diff(&gb)
            }
            Op::Mod { a, b } => {
                a.diff(grad)?;
                b.diff(&engine::zeros(grad.shape()))
            }
            Op::Negative { a } => a.diff(&(-grad)),
            Op::Matmul { a, b } => {
                let va = a.value();
                let vb = b.value();
                let a2 = va
                    .view()
                    .into_dimensionality::<Ix2>()
                    .expect("matmul records 2-D operands");
                let b2 = vb
                    .view()
                    .into_dimensionality::<Ix2>()
                    .expect("matmul records 2-D operands");
                let g2 = grad
                    .view()
                    .into_dimensionality::<Ix2>()
                    .expect("matmul gradient is 2-D");
                a.diff(&g2.dot(&b2.t()).into_dyn())?;
                b.diff(&a2.t().dot(&g2).into_dyn())
            }
            Op::Dot { a, b } => {
                let (va, vb) = (a.value(), b.value());
                a.diff(&(grad * &vb))?;
                b.diff(&(grad * &va))
            }
            Op::Outer { a, b } => {
                let (va, vb) = (a.value(), b.value());
                a.diff(&(engine::ones(vb.shape()) * vb.sum()))?;
                b.diff(&(engine::ones(va.shape()) * va.sum()))
            }
            Op::Exp { a } => a.diff(&(grad * &a.value().mapv(f32::exp))),
            Op::Exp2 { a } => a.diff(&(grad * &output.value() * LN_2)),
            Op::Expm1 { a } => a.diff(&(grad * &(&output.value() + 1.0))),
            Op::Log { a } => a.diff(&(grad / &a.value())),
            Op::Log1p { a } => a.diff(&(grad / &(&a.value() + 1.0))),
            Op::Log2 { a } => a.diff(&(grad / &(&a.value() * LN_2))),
            Op::Log10 { a } => a.diff(&(grad / &(&a.value() * LN_10))),
            Op::Sqrt { a } => a.diff(&(grad / &(&output.value() * 2.0))),
            Op::Rsqrt { a } => {
                let y = output.value();
                let y3 = &y * &(&y * &y);
                a.diff(&(grad * &y3 * -0.5))
            }
            Op::Abs { a } => a.diff(&(grad * &engine::sign(&a.value()))),
            Op::Sin { a } => a.diff(&(grad * &a.value().mapv(f32::cos))),
            Op::Cos { a } => a.diff(&(grad * &a.value().mapv(|v| -v.sin()))),
            Op::Tan { a } => {
                let y = output.value();
                a.diff(&(grad * &(&(&y * &y) + 1.0)))
            }
            Op::Arcsin { a } => {
                a.diff(&(grad * &a.value().mapv(|v| 1.0 / (1.0 - v * v).sqrt())))
            }
            Op::Arccos { a } => {
                a.diff(&(grad * &a.value().mapv(|v| -1.0 / (1.0 - v * v).sqrt())))
            }
            Op::Arctan { a } => a.diff(&(grad / &a.value().mapv(|v| v * v + 1.0))),
            Op::Sinh { a } => a.diff(&(grad * &a.value().mapv(f32::cosh))),
            Op::Cosh { a } => a.diff(&(grad * &a.value().mapv(f32::sinh))),
            Op::Tanh { a } => {
                let d = output.value().mapv(|v| 1.0 - v * v);
                a.diff(&(grad * &d))
            }
            Op::Arcsinh { a } => {
                a.diff(&(grad * &a.value().mapv(|v| 1.0 / (v * v + 1.0).sqrt())))
            }
            Op::Arccosh { a } => {
                a.diff(&(grad * &a.value().mapv(|v| 1.0 / (v * v - 1.0).sqrt())))
            }
            Op::Arctanh { a } => a.diff(&(grad / &a.value().mapv(|v| 1.0 - v * v))),
            Op::Sinc { a } => {
                let d = a.value().mapv(|v| {
                    let p = PI * v;
                    (p * p.cos() - p.sin()) / (PI * v * v)
                });
                a.diff(&(grad * &d))
            }
            Op::Radians { a } => a.diff(&(grad * (PI / 180.0))),
            Op::Trunc { a } | Op::Floor { a } | Op::Ceil { a } => {
                a.diff(&engine::zeros(grad.shape()))
            }
            Op::Clip { a, min, max } => {
                // Bounds are recorded on the tape but stay gradient-free.
                let va = a.value();
                let mask = engine::greater_equal(&va, &min.value())
                    * engine::less_equal(&va, &max.value());
                a.diff(&(grad * &mask))
            }
            Op::Det { a } => {
                let y = output
                    .value()
                    .iter()
                    .next()
                    .copied()
                    .expect("det output is scalar");
                let inv_t = engine::inverse(&a.value())?.reversed_axes();
                a.diff(&(inv_t * y))
            }
            Op::Norm { a } => {
                let y = output
                    .value()
                    .iter()
                    .next()
                    .copied()
                    .expect("norm output is scalar");
                a.diff(&(&a.value() / y))
            }
            Op::MatrixRank { a } | Op::Cond { a } => {
                a.diff(&engine::zeros(a.shape().as_slice()))
            }
            Op::Svd { a } => Err(TensorError::UngradableOperation(format!(
                "svd of `{}`",
                a.name()
            ))),
            Op::Mean { a } => {
                let va = a.value();
                let n = va.len() as f32;
                a.diff(&(grad * &engine::ones(va.shape()) / n))
            }
            Op::Sum { a, .. } => {
                if a.is_scalar() {
                    a.diff(grad)
                } else {
                    a.diff(&(&engine::ones(a.shape().as_slice()) * grad))
                }
            }
            Op::SumAxis { a, axis, keep_dim } => {
                let expanded = if *keep_dim {
                    grad.clone()
                } else {
                    grad.clone().insert_axis(Axis(*axis))
                };
                a.diff(&(&engine::ones(a.shape().as_slice()) * &expanded))
            }
            Op::Reshape { a, .. } => {
                let original = a.shape();
                let g = grad
                    .to_shape(IxDyn(&original))
                    .expect("reshape gradient matches the recorded element count")
                    .to_owned();
                a.diff(&g)
            }
            Op::OffsetGet { a, index } => {
                let mut full = engine::zeros(a.shape().as_slice());
                let mut slot = full.index_axis_mut(Axis(0), *index);
                if grad.ndim() > slot.ndim() {
                    slot.fill(grad.sum());
                } else {
                    slot.assign(
                        &grad
                            .broadcast(slot.raw_dim())
                            .expect("indexed gradient must broadcast into its slot"),
                    );
                }
                a.diff(&full)
            }
            Op::Relu { a } => {
                a.diff(&(grad * &engine::greater_scalar(&a.value(), 0.0)))
            }
            Op::Selu { a, alpha, scale } => {
                let va = a.value();
                let pos = engine::greater_scalar(&va, 0.0);
                let neg = engine::less_equal_scalar(&va, 0.0) * va.mapv(f32::exp) * *alpha;
                a.diff(&(grad * &((pos + neg) * *scale)))
            }
            Op::Celu { a, alpha } => {
                let scale = 1.0f32;
                let negcoef = alpha * scale;
                let poscoef = scale;
                let negiptcoef = scale / alpha;
                let va = a.value();
                let below = engine::less_equal_scalar(&va, 0.0)
                    * (grad * &va.mapv(f32::exp))
                    * (negiptcoef * negcoef * negiptcoef);
                let above = engine::greater_scalar(&va, 0.0) * grad * poscoef;
                a.diff(&(below + above))
            }
            Op::BinaryCrossEntropy { x, y, epsilon, reduction } => {
                let (vx, vy) = (x.value(), y.value());
                let denom = vx.mapv(|v| (v * (1.0 - v)).clamp(*epsilon, f32::MAX));
                let mut gx = grad * &(&vx - &vy) / denom;
                if *reduction == Reduction::Mean {
                    gx = gx / vx.len() as f32;
                }
                let gy = vx.mapv(|v| -(v / (1.0 - v)).ln());
                x.diff(&gx)?;
                y.diff(&gy)
            }
            Op::Cce { truth, pred, epsilon } => {
                let (vt, vp) = (truth.value(), pred.value());
                let clipped = vp.mapv(|v| v.clamp(*epsilon, 1.0 - epsilon));
                let d_pred = -(&vt / &clipped) / vt.ndim() as f32;
                let d_truth = vp.mapv(|v| -v.ln());
                pred.diff(&(grad * &d_truth))?;
                truth.diff(&(grad * &d_pred))
            }
            Op::Conv2d { input, filters, stride, padding } => {
                let (d_input, d_filters) = engine::conv2d_backward(
                    &input.value(),
                    &filters.value(),
                    grad,
                    *stride,
                    *padding,
                )?;
                input.diff(&d_input)?;
                filters.diff(&d_filters)
            }
            Op::Custom { context, args } => match context.backward_fn() {
                Some(backward) => backward(output, grad, args),
                None => Err(TensorError::UngradableOperation(
                    context.name().to_string(),
                )),
            },
        }
    }
}

const OPERATION_WIDTH: usize = 20;
const ARGS_WIDTH: usize = 40;

/// Pre-order rendering of the provenance tree rooted at `tensor`: one line
/// per tape entry, recursing into tensor arguments that have provenance and
/// stopping at leaves.
pub(crate) fn render_graph(tensor: &Tensor, out: &mut String, with_header: bool) {
    let Some(op) = tensor.tape() else {
        return;
    };
    if with_header {
        let _ = writeln!(
            out,
            "{:<ow$} {:<aw$}",
            "Operation",
            "Arguments",
            ow = OPERATION_WIDTH,
            aw = ARGS_WIDTH
        );
        let _ = writeln!(
            out,
            "{:<ow$} {:<aw$}",
            "=".repeat(OPERATION_WIDTH),
            "=".repeat(ARGS_WIDTH),
            ow = OPERATION_WIDTH,
            aw = ARGS_WIDTH
        );
    }
    let args = op.args();
    let rendered: Vec<String> = args.iter().map(Arg::to_string).collect();
    let _ = writeln!(
        out,
        "{:<ow$} {:<aw$}",
        op.name(),
        format!("[{}]", rendered.join(", ")),
        ow = OPERATION_WIDTH,
        aw = ARGS_WIDTH
    );
    for arg in &args {
        if let Arg::Tensor(t) = arg {
            render_graph(t, out, false);
        }
    }
}
