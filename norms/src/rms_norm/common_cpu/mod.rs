use super::{args::Meta, Args, RmsNorm};
use crate::{
    common_cpu::Cpu, type_not_support, ByteOf, Element, LaunchError, Param, QueueAlloc,
    SchemeError,
};
use half::{bf16, f16};
use num_traits::Float;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::ptr::null;

pub struct Operator;

impl RmsNorm<Cpu> for Operator {}

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
        let Meta { dt_a, dt_w, n, m, d } = args.meta()?;
        let Args {
            y_layout,
            y_base,
            x_layout,
            x_base,
            w,
            epsilon,
        } = args;
        let &[nsy, dsy] = y_layout.strides() else {
            unreachable!()
        };
        let &[nsx, dsx] = x_layout.strides() else {
            unreachable!()
        };
        let (msw, dsw, w_base) = match w {
            Some(Param { layout, base }) => match *layout.strides() {
                [dsw] => (0, dsw, *base),
                [msw, dsw] => (msw, dsw, *base),
                _ => unreachable!(),
            },
            None => (0, 0, null()),
        };

        macro_rules! calculate {
            ($x:ty; $a:ty, $w:ty) => {
                Scheme::<$x, $a, $w> {
                    n,
                    m,
                    d,
                    nsy,
                    dsy,
                    nsx,
                    dsx,
                    msw,
                    dsw,
                    epsilon: <$x>::cast_from(*epsilon as _),
                    y: y_base.cast(),
                    x: x_base.cast(),
                    w: w_base.cast(),
                }
                .calculate()
            };
        }

        macro_rules! with_w {
            ($x:ty; $a:ty) => {
                match dt_w {
                    ty::F16 => calculate!($x; $a, f16),
                    ty::BF16 => calculate!($x; $a, bf16),
                    ty::F32 => calculate!($x; $a, f32),
                    ty::F64 => calculate!($x; $a, f64),
                    dt => return Err(type_not_support(format!("w: {dt:?}"))),
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

struct Scheme<X, A, W> {
    n: usize,
    m: usize,
    d: usize,
    nsy: isize,
    dsy: isize,
    nsx: isize,
    dsx: isize,
    msw: isize,
    dsw: isize,
    epsilon: X,
    y: *mut A,
    x: *const A,
    w: *const W,
}

unsafe impl<X, A, W> Send for Scheme<X, A, W> {}
unsafe impl<X, A, W> Sync for Scheme<X, A, W> {}

impl<X, A, W> Scheme<X, A, W>
where
    X: Element + Float,
    A: Element,
    W: Element,
{
    fn calculate(self) {
        let d = self.d as isize;
        (0..self.n as isize).into_par_iter().for_each(|i| {
            let _ = &self;
            let sum2 = (0..d)
                .map(|j| get::<X, _>(self.x, i * self.nsx + j * self.dsx))
                .fold(X::zero(), |acc, x| acc + x * x);
            let k = (sum2 / X::cast_from(self.d as _) + self.epsilon)
                .sqrt()
                .recip();

            let w_row = (i % self.m as isize) * self.msw;
            for j in 0..d {
                let x: X = get(self.x, i * self.nsx + j * self.dsx);
                let mut y = x * k;
                if !self.w.is_null() {
                    y = y * get::<X, _>(self.w, w_row + j * self.dsw);
                }
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
