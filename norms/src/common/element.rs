use super::{type_not_support, LaunchError};
use digit_layout::{types as ty, DigitLayout};
use half::{bf16, f16};

/// 张量可以存储的浮点元素类型。
pub trait Element: Copy + Send + Sync + 'static {
    const DT: DigitLayout;

    fn as_f64(self) -> f64;
    fn cast_from(val: f64) -> Self;
}

macro_rules! element {
    ($ty:ty: $dt:expr; $to:expr, $from:expr) => {
        impl Element for $ty {
            const DT: DigitLayout = $dt;
            #[inline(always)]
            fn as_f64(self) -> f64 {
                $to(self)
            }
            #[inline(always)]
            fn cast_from(val: f64) -> Self {
                $from(val)
            }
        }
    };
}

element!(f16 : ty::F16 ; f16::to_f64     , f16::from_f64         );
element!(bf16: ty::BF16; bf16::to_f64    , bf16::from_f64        );
element!(f32 : ty::F32 ; |x: f32| x as f64, |x: f64| x as f32);
element!(f64 : ty::F64 ; |x: f64| x       , |x: f64| x       );

/// 浮点类型的元素字节数。
pub fn nbytes(dt: DigitLayout) -> Result<usize, LaunchError> {
    match dt {
        ty::F16 | ty::BF16 => Ok(2),
        ty::F32 => Ok(4),
        ty::F64 => Ok(8),
        _ => Err(type_not_support(format!("{dt:?} is not a floating type"))),
    }
}
