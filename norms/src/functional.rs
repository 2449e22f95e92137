//! 无状态的归一化函数。

use crate::{
    autocast::is_autocast_enabled_for,
    common_cpu::{Cpu, ThisThread},
    layer_norm, rms_norm,
    shape_mismatch,
    utils::{rank_error, split_trailing},
    LaunchError, Operator, Param, Tensor, TensorLayout,
};
use digit_layout::types::F32;
use std::borrow::Cow;

/// 层归一化，在 `normalized_shape` 覆盖的尾部维度上减均值、除标准差，再做可选的仿射变换。
///
/// 这是全精度算子：输入所在设备类型启用了自动混合精度时，输入和参数先转换到 F32，输出也是 F32。
/// 否则输出与输入类型相同。
pub fn layer_norm(
    x: &Tensor,
    normalized_shape: &[usize],
    weight: Option<&Tensor>,
    bias: Option<&Tensor>,
    eps: f32,
) -> Result<Tensor, LaunchError> {
    let upcast = is_autocast_enabled_for(x.device().ty);
    let x = if upcast && x.dt() != F32 {
        Cow::Owned(x.to_dt(F32)?)
    } else {
        Cow::Borrowed(x)
    };
    let weight = maybe_promote(weight, upcast)?;
    let bias = maybe_promote(bias, upcast)?;

    let (n, d) = split_trailing(x.shape(), normalized_shape)?;
    let param = |p: &Option<Cow<Tensor>>| -> Result<Option<Param<Cpu>>, LaunchError> {
        p.as_deref()
            .map(|p| -> Result<Param<Cpu>, LaunchError> {
                if p.shape() != normalized_shape {
                    return Err(shape_mismatch(format!(
                        "parameter shape {:?} is not {normalized_shape:?}",
                        p.shape()
                    )));
                }
                Ok(Param {
                    layout: TensorLayout::new_contiguous(p.dt(), &[d])?,
                    base: p.as_ptr(),
                })
            })
            .transpose()
    };

    let mut y = Tensor::zeros(x.dt(), x.shape(), x.device())?;
    let args = layer_norm::Args::<Cpu> {
        y_layout: y.matrix(n, d)?,
        y_base: y.as_mut_ptr(),
        x_layout: x.matrix(n, d)?,
        x_base: x.as_ptr(),
        scale: param(&weight)?,
        bias: param(&bias)?,
        epsilon: eps,
    };
    layer_norm::common_cpu::Operator::new(&Cpu).launch(&args, &mut [], &ThisThread)?;
    Ok(y)
}

fn maybe_promote(
    t: Option<&Tensor>,
    upcast: bool,
) -> Result<Option<Cow<'_, Tensor>>, LaunchError> {
    t.map(|t| {
        if upcast && t.dt() != F32 {
            t.to_dt(F32).map(Cow::Owned)
        } else {
            Ok(Cow::Borrowed(t))
        }
    })
    .transpose()
}

/// 均方根归一化：`x * rsqrt(mean(x², -1) + eps)`，再乘以可选的权重。
///
/// 输入总是先转换到 F32 计算，输出为 F32。权重的形状必须与输入的尾部维度一致。
pub fn rms_norm(x: &Tensor, weight: Option<&Tensor>, eps: f32) -> Result<Tensor, LaunchError> {
    let &[.., d] = x.shape() else {
        return Err(rank_error("x", 1, 0));
    };
    let x = if x.dt() == F32 {
        Cow::Borrowed(x)
    } else {
        Cow::Owned(x.to_dt(F32)?)
    };
    let n = x.numel() / d.max(1);

    let w = match weight {
        Some(w) => {
            split_trailing(x.shape(), w.shape())?;
            let layout = match *w.shape() {
                [] => return Err(rank_error("w", 1, 0)),
                [_] => TensorLayout::new_contiguous(w.dt(), &[d])?,
                _ => TensorLayout::new_contiguous(w.dt(), &[w.numel() / d.max(1), d])?,
            };
            Some(Param {
                layout,
                base: w.as_ptr(),
            })
        }
        None => None,
    };

    let mut y = Tensor::zeros(F32, x.shape(), x.device())?;
    let args = rms_norm::Args::<Cpu> {
        y_layout: y.matrix(n, d)?,
        y_base: y.as_mut_ptr(),
        x_layout: x.matrix(n, d)?,
        x_base: x.as_ptr(),
        w,
        epsilon: eps,
    };
    rms_norm::common_cpu::Operator::new(&Cpu).launch(&args, &mut [], &ThisThread)?;
    Ok(y)
}

#[cfg(test)]
mod test {
    use super::{layer_norm, rms_norm};
    use crate::{
        autocast::Autocast, test_utils::check, Device, DeviceType, LaunchErrorKind, Tensor,
    };
    use digit_layout::types::{BF16, F16, F32, F64};
    use rand::Rng;

    fn random(len: usize) -> Vec<f64> {
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen_range(-2.0..2.0)).collect()
    }

    fn rms_ref(x: &[f64], w: Option<&[f64]>, d: usize, eps: f64) -> Vec<f64> {
        x.chunks(d)
            .enumerate()
            .flat_map(|(i, row)| {
                let k = 1. / (row.iter().map(|x| x * x).sum::<f64>() / d as f64 + eps).sqrt();
                row.iter().enumerate().map(move |(j, x)| {
                    let w = w.map_or(1., |w| w[(i * d + j) % w.len()]);
                    x * k * w
                })
            })
            .collect()
    }

    fn layer_norm_ref(x: &[f64], s: Option<&[f64]>, b: Option<&[f64]>, d: usize) -> Vec<f64> {
        x.chunks(d)
            .flat_map(|row| {
                let e = row.iter().sum::<f64>() / d as f64;
                let var = row.iter().map(|x| (x - e).powi(2)).sum::<f64>() / d as f64;
                let k = 1. / (var + 1e-5).sqrt();
                row.iter().enumerate().map(move |(j, x)| {
                    (x - e) * k * s.map_or(1., |s| s[j]) + b.map_or(0., |b| b[j])
                })
            })
            .collect()
    }

    #[test]
    fn test_rms_unit_rows() {
        let x = Tensor::from_slice(&[1.0f32, 1., 1., 1., 2., 0., 0., 0.], &[2, 4], Device::CPU)
            .unwrap();
        let y = rms_norm(&x, None, 1e-5).unwrap();
        assert_eq!(y.dt(), F32);
        assert_eq!(y.shape(), &[2, 4]);

        let y = y.to_vec::<f64>().unwrap();
        let expected = [1., 1., 1., 1., 2. / (1.0f64 + 1e-5).sqrt(), 0., 0., 0.];
        for (a, b) in y.iter().zip(expected) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
        assert!((y[4] - 1.99999).abs() < 1e-4);
    }

    #[test]
    fn test_rms_zero_row() {
        let x = Tensor::zeros(F16, &[3, 8], Device::CPU).unwrap();
        let y = rms_norm(&x, None, 1e-5).unwrap().to_vec::<f32>().unwrap();
        assert!(y.iter().all(|y| y.is_finite() && *y == 0.));
    }

    #[test]
    fn test_rms_compute() {
        let (n, d) = (5, 64);
        let x = random(n * d);
        let w = random(d);
        let x_t = Tensor::from_slice(&x, &[n, d], Device::CPU).unwrap();
        let w_t = Tensor::from_slice(&w, &[d], Device::CPU).unwrap();

        let y = rms_norm(&x_t, Some(&w_t), 1e-5).unwrap();
        assert_eq!(y.dt(), F32);
        let y = y.to_vec::<f64>().unwrap();
        assert_eq!(check(&y, &rms_ref(&x, Some(&w), d, 1e-5), 1e-5, 1e-5), 0);

        let y = rms_norm(&x_t, None, 1e-5).unwrap().to_vec::<f64>().unwrap();
        assert_eq!(check(&y, &rms_ref(&x, None, d, 1e-5), 1e-5, 1e-5), 0);
    }

    #[test]
    fn test_rms_half_weight() {
        let (n, m, d) = (3, 2, 16);
        let x = random(n * m * d);
        let w = random(m * d);
        let x_t = Tensor::from_slice(&x, &[n, m, d], Device::CPU)
            .unwrap()
            .to_dt(BF16)
            .unwrap();
        let w_t = Tensor::from_slice(&w, &[m, d], Device::CPU)
            .unwrap()
            .to_dt(F16)
            .unwrap();

        let y = rms_norm(&x_t, Some(&w_t), 1e-5).unwrap();
        assert_eq!(y.shape(), &[n, m, d]);
        let x = x_t.to_vec::<f64>().unwrap();
        let w = w_t.to_vec::<f64>().unwrap();
        let y = y.to_vec::<f64>().unwrap();
        assert_eq!(check(&y, &rms_ref(&x, Some(&w), d, 1e-5), 1e-5, 1e-4), 0);
    }

    #[test]
    fn test_rms_weight_mismatch() {
        let x = Tensor::zeros(F32, &[2, 4], Device::CPU).unwrap();
        let w = Tensor::ones(F32, &[3], Device::CPU).unwrap();
        let e = rms_norm(&x, Some(&w), 1e-5).unwrap_err();
        assert_eq!(e.kind, LaunchErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_layer_norm_compute() {
        let (n, d) = (7, 32);
        let x = random(n * d);
        let s = random(d);
        let b = random(d);
        let x_t = Tensor::from_slice(&x, &[n, d], Device::CPU).unwrap();
        let s_t = Tensor::from_slice(&s, &[d], Device::CPU).unwrap();
        let b_t = Tensor::from_slice(&b, &[d], Device::CPU).unwrap();

        let y = layer_norm(&x_t, &[d], Some(&s_t), Some(&b_t), 1e-5).unwrap();
        assert_eq!(y.dt(), F64);
        let y = y.to_vec::<f64>().unwrap();
        assert_eq!(check(&y, &layer_norm_ref(&x, Some(&s), Some(&b), d), 1e-9, 1e-9), 0);

        let y = layer_norm(&x_t, &[d], None, None, 1e-5).unwrap();
        let y = y.to_vec::<f64>().unwrap();
        assert_eq!(check(&y, &layer_norm_ref(&x, None, None, d), 1e-9, 1e-9), 0);
    }

    #[test]
    fn test_layer_norm_trailing_dims() {
        let x = random(2 * 3 * 4);
        let x_t = Tensor::from_slice(&x, &[2, 3, 4], Device::CPU).unwrap();
        let y = layer_norm(&x_t, &[3, 4], None, None, 1e-5).unwrap();
        assert_eq!(y.shape(), &[2, 3, 4]);
        let y = y.to_vec::<f64>().unwrap();
        assert_eq!(check(&y, &layer_norm_ref(&x, None, None, 12), 1e-9, 1e-9), 0);

        let e = layer_norm(&x_t, &[4, 3], None, None, 1e-5).unwrap_err();
        assert_eq!(e.kind, LaunchErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_layer_norm_large_mean() {
        // 均值远大于离散程度，E[x²] - E[x]² 在 f32 下会完全抵消
        let (n, d) = (3, 8);
        let x = (0..n * d)
            .map(|i| 10000. + 1000. * (i / d) as f64 + 0.125 * (i % d) as f64)
            .collect::<Vec<_>>();
        let x_t = Tensor::from_slice(&x, &[n, d], Device::CPU)
            .unwrap()
            .to_dt(F32)
            .unwrap();

        let y = layer_norm(&x_t, &[d], None, None, 1e-5).unwrap();
        assert_eq!(y.dt(), F32);
        let y = y.to_vec::<f64>().unwrap();
        assert!(y.iter().all(|y| y.is_finite()));
        assert_eq!(check(&y, &layer_norm_ref(&x, None, None, d), 1e-3, 1e-3), 0);
    }

    #[test]
    fn test_layer_norm_param_shape() {
        let x = Tensor::from_slice(&random(2 * 4), &[2, 4], Device::CPU).unwrap();
        let w = Tensor::ones(F64, &[2, 4], Device::CPU).unwrap();
        let e = layer_norm(&x, &[4], Some(&w), None, 1e-5).unwrap_err();
        assert_eq!(e.kind, LaunchErrorKind::ShapeMismatch);

        let b = Tensor::zeros(F64, &[1, 4], Device::CPU).unwrap();
        let e = layer_norm(&x, &[4], None, Some(&b), 1e-5).unwrap_err();
        assert_eq!(e.kind, LaunchErrorKind::ShapeMismatch);

        let w = Tensor::ones(F64, &[4], Device::CPU).unwrap();
        assert!(layer_norm(&x, &[4], Some(&w), None, 1e-5).is_ok());
    }

    #[test]
    fn test_layer_norm_autocast_fp32() {
        let x = Tensor::from_slice(&random(4 * 8), &[4, 8], Device::CPU)
            .unwrap()
            .to_dt(F16)
            .unwrap();
        let w = Tensor::ones(F16, &[8], Device::CPU).unwrap();

        assert_eq!(layer_norm(&x, &[8], Some(&w), None, 1e-5).unwrap().dt(), F16);
        {
            let _guard = Autocast::new(DeviceType::Cpu, true);
            assert_eq!(layer_norm(&x, &[8], Some(&w), None, 1e-5).unwrap().dt(), F32);
        }
        {
            // 只影响输入所在的设备类型
            let _guard = Autocast::new(DeviceType::Cuda, true);
            assert_eq!(layer_norm(&x, &[8], Some(&w), None, 1e-5).unwrap().dt(), F16);
        }
    }
}
