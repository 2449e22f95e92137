use super::{args::Meta, Args, LayerNorm};
use crate::{
    common_cpu::Cpu, type_not_support, ByteOf, Element, LaunchError, Param, QueueAlloc,
    SchemeError,
};
use half::{bf16, f16};
use num_traits::Float;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::ptr::null;

pub struct Operator;

impl LayerNorm<Cpu> for Operator {}

impl crate::Operator for Operator {
    type Hardware = Cpu;
    type Args = Args<Cpu>;

    fn new(_processor: &Self::Hardware) -> Self {
        Self
    }

    fn scheme(
        &mut self,
        args: &Self::Args,
        _max_workspace_size: usize,
    ) -> Result<usize, SchemeError> {
        let _meta = args.meta()?;
        Ok(0)
    }

    fn launch<QA>(
        &self,
        args: &Self::Args,
        _workspace: &mut [ByteOf<Self::Hardware>],
        _queue_alloc: &QA,
    ) -> Result<(), LaunchError>
    where
        QA: QueueAlloc<Hardware = Self::Hardware>,
    {
        let Meta { dt_w, dt_a, n, d } = args.meta()?;
        let Args {
            y_layout,
            y_base,
            x_layout,
            x_base,
            scale,
            bias,
            epsilon,
        } = args;
        let &[nsy, dsy] = y_layout.strides() else {
            unreachable!()
        };
        let &[nsx, dsx] = x_layout.strides() else {
            unreachable!()
        };
        let param = |p: &Option<Param<Cpu>>| match p {
            Some(Param { layout, base }) => (layout.strides()[0], *base),
            None => (0, null()),
        };
        let (dss, scale_base) = param(scale);
        let (dsb, bias_base) = param(bias);

        macro_rules! calculate {
            ($x:ty; $w:ty, $a:ty) => {
                Scheme::<$x, $w, $a> {
                    n,
                    d,
                    nsy,
                    dsy,
                    nsx,
                    dsx,
                    dss,
                    dsb,
                    epsilon: <$x>::cast_from(*epsilon as _),
                    y: y_base.cast(),
                    x: x_base.cast(),
                    s: scale_base.cast(),
                    b: bias_base.cast(),
                }
                .calculate()
            };
        }

        macro_rules! with_w {
            ($x:ty; $a:ty) => {
                match dt_w {
                    ty::F16 => calculate!($x; f16, $a),
                    ty::BF16 => calculate!($x; bf16, $a),
                    ty::F32 => calculate!($x; f32, $a),
                    ty::F64 => calculate!($x; f64, $a),
                    dt => return Err(type_not_support(format!("scale/bias: {dt:?}"))),
                }
            };
        }

        use digit_layout::types as ty;
        match dt_a {
            ty::F16 => with_w!(f32; f16),
            ty::BF16 => with_w!(f32; bf16),
            ty::F32 => with_w!(f32; f32),
            ty::F64 => with_w!(f64; f64),
            dt => return Err(type_not_support(format!("x: {dt:?}"))),
        }

        Ok(())
    }
}

struct Scheme<X, W, A> {
    n: usize,
    d: usize,
    nsy: isize,
    dsy: isize,
    nsx: isize,
    dsx: isize,
    dss: isize,
    dsb: isize,
    epsilon: X,
    y: *mut A,
    x: *const A,
    s: *const W,
    b: *const W,
}

unsafe impl<X, W, A> Send for Scheme<X, W, A> {}
unsafe impl<X, W, A> Sync for Scheme<X, W, A> {}

impl<X, W, A> Scheme<X, W, A>
where
    X: Element + Float,
    W: Element,
    A: Element,
{
    fn calculate(self) {
        let d = self.d as isize;
        let len = X::cast_from(self.d as _);
        (0..self.n as isize).into_par_iter().for_each(|i| {
            let _ = &self;
            let x = |j: isize| get::<X, _>(self.x, i * self.nsx + j * self.dsx);
            // 两遍求方差，均值远大于离散程度时 E[x²] - E[x]² 会抵消
            let e = (0..d).map(x).fold(X::zero(), |acc, x| acc + x) / len;
            let var = (0..d)
                .map(x)
                .fold(X::zero(), |acc, x| acc + (x - e) * (x - e))
                / len;
            let k = (var + self.epsilon).sqrt().recip();

            for j in 0..d {
                let x: X = get(self.x, i * self.nsx + j * self.dsx);
                let s = if self.s.is_null() {
                    X::one()
                } else {
                    get(self.s, j * self.dss)
                };
                let b = if self.b.is_null() {
                    X::zero()
                } else {
                    get(self.b, j * self.dsb)
                };
                let y = (x - e).mul_add(s * k, b);
                unsafe {
                    self.y
                        .byte_offset(i * self.nsy + j * self.dsy)
                        .write(A::cast_from(y.as_f64()))
                }
            }
        })
    }
}

#[inline]
fn get<X: Element, T: Element>(ptr: *const T, offset: isize) -> X {
    X::cast_from(unsafe { ptr.byte_offset(offset).read() }.as_f64())
}

#[cfg(test)]
mod test {
    use super::{Args, Operator};
    use crate::{
        common_cpu::{Cpu, ThisThread},
        test_utils::check,
        LaunchErrorKind, Operator as _, Param, TensorLayout,
    };
    use digit_layout::types::{F16, F32};
    use half::f16;
    use std::ptr::{null, null_mut};

    fn param(dt: digit_layout::DigitLayout, d: usize) -> Option<Param<Cpu>> {
        Some(Param {
            layout: TensorLayout::new_contiguous(dt, &[d]).unwrap(),
            base: null(),
        })
    }

    #[test]
    fn test_scheme() {
        let mut op = Operator::new(&Cpu);
        let layout = TensorLayout::new_contiguous(F16, &[4, 16]).unwrap();
        let mut args = Args::<Cpu> {
            y_layout: layout.clone(),
            y_base: null_mut(),
            x_layout: layout,
            x_base: null(),
            scale: param(F32, 16),
            bias: param(F32, 16),
            epsilon: 1e-5,
        };
        assert_eq!(op.scheme(&args, 0).unwrap(), 0);

        args.bias = param(F16, 16);
        assert_eq!(op.scheme(&args, 0).unwrap_err().kind, LaunchErrorKind::TypeMismatch);

        args.bias = None;
        args.scale = param(F32, 8);
        assert_eq!(op.scheme(&args, 0).unwrap_err().kind, LaunchErrorKind::ShapeMismatch);

        args.scale = None;
        assert_eq!(op.scheme(&args, 0).unwrap(), 0);
    }

    #[test]
    fn test_compute_f16() {
        let (n, d) = (2, 64);
        let x = (0..n * d)
            .map(|i| ((i * 13 % 29) as f64 - 14.) / 8.)
            .collect::<Vec<_>>();
        let s = (0..d).map(|j| 1. + j as f32 / 64.).collect::<Vec<_>>();
        let b = (0..d).map(|j| j as f32 / -32.).collect::<Vec<_>>();
        let x_half = x.iter().map(|&x| f16::from_f64(x)).collect::<Vec<_>>();
        let mut y = vec![f16::ZERO; n * d];

        let layout = TensorLayout::new_contiguous(F16, &[n, d]).unwrap();
        let affine = |p: &[f32]| {
            Some(Param {
                layout: TensorLayout::new_contiguous(F32, &[d]).unwrap(),
                base: p.as_ptr().cast(),
            })
        };
        let args = Args::<Cpu> {
            y_layout: layout.clone(),
            y_base: y.as_mut_ptr().cast(),
            x_layout: layout,
            x_base: x_half.as_ptr().cast(),
            scale: affine(&s),
            bias: affine(&b),
            epsilon: 1e-5,
        };
        Operator::new(&Cpu)
            .launch(&args, &mut [], &ThisThread)
            .unwrap();

        let y_ref = x
            .chunks(d)
            .flat_map(|row| {
                let e = row.iter().sum::<f64>() / d as f64;
                let var = row.iter().map(|x| (x - e) * (x - e)).sum::<f64>() / d as f64;
                let k = (var + 1e-5).sqrt().recip();
                row.iter()
                    .zip(&s)
                    .zip(&b)
                    .map(move |((x, s), b)| (x - e) * k * *s as f64 + *b as f64)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let y = y.iter().map(|y| y.to_f64()).collect::<Vec<_>>();
        assert_eq!(check(&y, &y_ref, f16::EPSILON.to_f64(), 1e-3), 0);
    }

    #[test]
    fn test_type_not_support() {
        use digit_layout::types::U8;
        let layout = TensorLayout::new(U8, &[1, 4], &[4, 1]);
        let args = Args::<Cpu> {
            y_layout: layout.clone(),
            y_base: null_mut(),
            x_layout: layout,
            x_base: null(),
            scale: None,
            bias: None,
            epsilon: 1e-5,
        };
        let e = Operator::new(&Cpu)
            .launch(&args, &mut [], &ThisThread)
            .unwrap_err();
        assert_eq!(e.kind, LaunchErrorKind::TypeNotSupport);
    }
}
