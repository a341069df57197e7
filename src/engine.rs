//! The narrow seam onto the dense-array engine.
//!
//! Forward arithmetic, broadcasting and the elementary functions come from
//! `ndarray` directly; this module adds the pieces the autograd core needs
//! on top of it: broadcast-shape validation, reduction of gradients back to
//! an operand's shape, comparison masks, and the dense decompositions
//! (determinant, inverse, SVD, rank, condition number) computed via `faer`.

use faer::linalg::solvers::{Solve, Svd};
use faer::Mat;
use ndarray::{ArrayD, Axis, IxDyn, Zip};

use crate::error::{Result, TensorError};

/// All-ones array of the given shape.
pub fn ones(shape: &[usize]) -> ArrayD<f32> {
    ArrayD::ones(IxDyn(shape))
}

/// All-zeros array of the given shape.
pub fn zeros(shape: &[usize]) -> ArrayD<f32> {
    ArrayD::zeros(IxDyn(shape))
}

/// Broadcast shape of two operands, or `ShapeMismatch` if they are not
/// co-broadcastable. Checked before any tape entry is created so that an
/// invalid call leaves the graph unmodified.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![1usize; ndim];
    for (i, slot) in out.iter_mut().enumerate() {
        let ai = if i + a.len() >= ndim { a[i + a.len() - ndim] } else { 1 };
        let bi = if i + b.len() >= ndim { b[i + b.len() - ndim] } else { 1 };
        *slot = if ai == bi || bi == 1 {
            ai
        } else if ai == 1 {
            bi
        } else {
            return Err(TensorError::ShapeMismatch(format!(
                "cannot broadcast shapes {:?} and {:?}",
                a, b
            )));
        };
    }
    Ok(out)
}

/// Reduce `grad` to `shape` by summing the axes that were expanded by
/// broadcasting in the forward direction. A gradient narrower than the
/// target is broadcast up instead.
pub(crate) fn reduce_to_shape(grad: &ArrayD<f32>, shape: &[usize]) -> ArrayD<f32> {
    if grad.shape() == shape {
        return grad.clone();
    }

    let target_len: usize = shape.iter().product();
    if grad.len() < target_len {
        return grad
            .broadcast(IxDyn(shape))
            .expect("gradient must broadcast to the operand shape")
            .to_owned();
    }

    // Sum over leading axes the target does not have, then over axes where
    // the target dimension is 1.
    let mut res = grad.clone();
    while res.ndim() > shape.len() {
        res = res.sum_axis(Axis(0));
    }
    for axis in 0..shape.len().min(res.ndim()) {
        if shape[axis] == 1 && res.shape()[axis] != 1 {
            let summed = res.sum_axis(Axis(axis));
            res = summed.insert_axis(Axis(axis));
        }
    }
    if res.shape() != shape {
        res = res
            .to_shape(IxDyn(shape))
            .expect("gradient reduction produced an incompatible shape")
            .to_owned();
    }
    res
}

/// Elementwise power with broadcasting.
pub fn pow(a: &ArrayD<f32>, b: &ArrayD<f32>) -> ArrayD<f32> {
    let shape = broadcast_shape(a.shape(), b.shape())
        .expect("power operands must broadcast");
    let dim = IxDyn(&shape);
    let ab = a.broadcast(dim.clone()).expect("lhs broadcast");
    let bb = b.broadcast(dim).expect("rhs broadcast");
    Zip::from(&ab).and(&bb).map_collect(|&x, &y| x.powf(y))
}

/// Elementwise sign: -1, 0 or 1.
pub fn sign(a: &ArrayD<f32>) -> ArrayD<f32> {
    a.mapv(|x| if x == 0.0 { 0.0 } else { x.signum() })
}

/// Mask of elements strictly greater than a scalar.
pub fn greater_scalar(a: &ArrayD<f32>, rhs: f32) -> ArrayD<f32> {
    a.mapv(|x| if x > rhs { 1.0 } else { 0.0 })
}

/// Mask of elements less than or equal to a scalar.
pub fn less_equal_scalar(a: &ArrayD<f32>, rhs: f32) -> ArrayD<f32> {
    a.mapv(|x| if x <= rhs { 1.0 } else { 0.0 })
}

/// Mask of `a >= b`, with `b` broadcast to `a`'s shape.
pub fn greater_equal(a: &ArrayD<f32>, b: &ArrayD<f32>) -> ArrayD<f32> {
    let bb = b
        .broadcast(a.raw_dim())
        .expect("comparison operands must broadcast");
    Zip::from(a)
        .and(&bb)
        .map_collect(|&x, &y| if x >= y { 1.0 } else { 0.0 })
}

/// Mask of `a <= b`, with `b` broadcast to `a`'s shape.
pub fn less_equal(a: &ArrayD<f32>, b: &ArrayD<f32>) -> ArrayD<f32> {
    let bb = b
        .broadcast(a.raw_dim())
        .expect("comparison operands must broadcast");
    Zip::from(a)
        .and(&bb)
        .map_collect(|&x, &y| if x <= y { 1.0 } else { 0.0 })
}

/// Frobenius norm.
pub fn norm(a: &ArrayD<f32>) -> f32 {
    a.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn to_mat(a: &ArrayD<f32>) -> Result<Mat<f32>> {
    if a.ndim() != 2 {
        return Err(TensorError::ShapeMismatch(format!(
            "expected a 2-D matrix, got shape {:?}",
            a.shape()
        )));
    }
    Ok(Mat::from_fn(a.shape()[0], a.shape()[1], |i, j| a[[i, j]]))
}

fn square_mat(a: &ArrayD<f32>) -> Result<Mat<f32>> {
    let mat = to_mat(a)?;
    if mat.nrows() != mat.ncols() {
        return Err(TensorError::ShapeMismatch(format!(
            "expected a square matrix, got shape {:?}",
            a.shape()
        )));
    }
    Ok(mat)
}

/// Determinant of a square matrix.
pub fn det(a: &ArrayD<f32>) -> Result<f32> {
    let mat = square_mat(a)?;
    Ok(mat.as_ref().determinant())
}

/// Inverse of a square matrix, via LU with partial pivoting.
pub fn inverse(a: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    let mat = square_mat(a)?;
    let n = mat.nrows();
    let lu = mat.as_ref().partial_piv_lu();
    let mut inv = Mat::<f32>::identity(n, n);
    lu.solve_in_place(&mut inv);
    Ok(ArrayD::from_shape_fn(IxDyn(&[n, n]), |ix| inv[(ix[0], ix[1])]))
}

/// Singular values of a matrix, in decreasing order.
pub fn singular_values(a: &ArrayD<f32>) -> Result<Vec<f32>> {
    let mat = to_mat(a)?;
    let svd = Svd::new_thin(mat.as_ref())
        .map_err(|e| TensorError::InvalidInput(format!("svd failed to converge: {:?}", e)))?;
    let s = svd.S();
    Ok((0..mat.nrows().min(mat.ncols())).map(|k| s[k]).collect())
}

/// Numerical rank: singular values above `max(m, n) * eps * s_max`.
pub fn matrix_rank(a: &ArrayD<f32>) -> Result<usize> {
    let s = singular_values(a)?;
    let largest = s.first().copied().unwrap_or(0.0);
    let tol = a.shape().iter().copied().max().unwrap_or(1) as f32 * f32::EPSILON * largest;
    Ok(s.iter().filter(|&&v| v > tol).count())
}

/// 2-norm condition number: ratio of the extreme singular values.
pub fn cond(a: &ArrayD<f32>) -> Result<f32> {
    let s = singular_values(a)?;
    let (largest, smallest) = (s[0], s[s.len() - 1]);
    Ok(largest / smallest)
}

/// Direct 2-D convolution over NCHW input and OIHW filters.
pub fn conv2d(
    input: &ArrayD<f32>,
    filters: &ArrayD<f32>,
    stride: usize,
    padding: usize,
) -> Result<ArrayD<f32>> {
    let x = input
        .view()
        .into_dimensionality::<ndarray::Ix4>()
        .map_err(|_| TensorError::ShapeMismatch("conv2d input must be 4-D (NCHW)".into()))?;
    let w = filters
        .view()
        .into_dimensionality::<ndarray::Ix4>()
        .map_err(|_| TensorError::ShapeMismatch("conv2d filters must be 4-D (OIHW)".into()))?;
    let (n, cin, hin, win) = x.dim();
    let (cout, cin_w, kh, kw) = w.dim();
    if cin != cin_w {
        return Err(TensorError::ShapeMismatch(format!(
            "conv2d channel mismatch: input has {}, filters expect {}",
            cin, cin_w
        )));
    }

    let (hout, wout) = conv_out_dims(hin, win, kh, kw, stride, padding);
    let mut out = ArrayD::<f32>::zeros(IxDyn(&[n, cout, hout, wout]));
    {
        let mut out4 = out.view_mut().into_dimensionality::<ndarray::Ix4>().unwrap();
        for b in 0..n {
            for oc in 0..cout {
                for oh in 0..hout {
                    for ow in 0..wout {
                        let mut acc = 0.0f32;
                        for ic in 0..cin {
                            for (ki, kj, ih, iw) in kernel_window(oh, ow, kh, kw, stride, padding, hin, win) {
                                acc += x[[b, ic, ih, iw]] * w[[oc, ic, ki, kj]];
                            }
                        }
                        out4[[b, oc, oh, ow]] = acc;
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Fused backward kernel for [`conv2d`]: gradients for the input and the
/// filters, accumulated in a single sweep over the output positions.
pub fn conv2d_backward(
    input: &ArrayD<f32>,
    filters: &ArrayD<f32>,
    grad: &ArrayD<f32>,
    stride: usize,
    padding: usize,
) -> Result<(ArrayD<f32>, ArrayD<f32>)> {
    let x = input
        .view()
        .into_dimensionality::<ndarray::Ix4>()
        .map_err(|_| TensorError::ShapeMismatch("conv2d input must be 4-D (NCHW)".into()))?;
    let w = filters
        .view()
        .into_dimensionality::<ndarray::Ix4>()
        .map_err(|_| TensorError::ShapeMismatch("conv2d filters must be 4-D (OIHW)".into()))?;
    let g = grad
        .view()
        .into_dimensionality::<ndarray::Ix4>()
        .map_err(|_| TensorError::ShapeMismatch("conv2d gradient must be 4-D".into()))?;

    let (n, cin, hin, win) = x.dim();
    let (cout, _, kh, kw) = w.dim();
    let (_, _, hout, wout) = g.dim();

    let mut d_input = ArrayD::<f32>::zeros(IxDyn(&[n, cin, hin, win]));
    let mut d_filters = ArrayD::<f32>::zeros(IxDyn(&[cout, cin, kh, kw]));
    {
        let mut dx = d_input.view_mut().into_dimensionality::<ndarray::Ix4>().unwrap();
        let mut dw = d_filters.view_mut().into_dimensionality::<ndarray::Ix4>().unwrap();
        for b in 0..n {
            for oc in 0..cout {
                for oh in 0..hout {
                    for ow in 0..wout {
                        let gv = g[[b, oc, oh, ow]];
                        for ic in 0..cin {
                            for (ki, kj, ih, iw) in kernel_window(oh, ow, kh, kw, stride, padding, hin, win) {
                                dx[[b, ic, ih, iw]] += gv * w[[oc, ic, ki, kj]];
                                dw[[oc, ic, ki, kj]] += gv * x[[b, ic, ih, iw]];
                            }
                        }
                    }
                }
            }
        }
    }
    Ok((d_input, d_filters))
}

fn conv_out_dims(
    hin: usize,
    win: usize,
    kh: usize,
    kw: usize,
    stride: usize,
    padding: usize,
) -> (usize, usize) {
    let hout = (hin as isize - kh as isize + 2 * padding as isize) / stride as isize + 1;
    let wout = (win as isize - kw as isize + 2 * padding as isize) / stride as isize + 1;
    (hout as usize, wout as usize)
}

/// In-bounds kernel positions for one output location: `(ki, kj, ih, iw)`.
fn kernel_window(
    oh: usize,
    ow: usize,
    kh: usize,
    kw: usize,
    stride: usize,
    padding: usize,
    hin: usize,
    win: usize,
) -> impl Iterator<Item = (usize, usize, usize, usize)> {
    let (oh, ow) = (oh as isize, ow as isize);
    let (stride, pad) = (stride as isize, padding as isize);
    (0..kh).flat_map(move |ki| {
        (0..kw).filter_map(move |kj| {
            let ih = oh * stride + ki as isize - pad;
            let iw = ow * stride + kj as isize - pad;
            if ih >= 0 && ih < hin as isize && iw >= 0 && iw < win as isize {
                Some((ki, kj, ih as usize, iw as usize))
            } else {
                None
            }
        })
    })
}
