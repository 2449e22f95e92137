use crate::{
    utils::{dim_distinct, rank_error, type_distinct},
    ConstPtr, Hardware, MutPtr, Param, SchemeError, TensorLayout,
};
use digit_layout::DigitLayout;

pub struct Args<H: Hardware> {
    pub y_layout: TensorLayout,
    pub y_base: MutPtr<H>,
    pub x_layout: TensorLayout,
    pub x_base: ConstPtr<H>,
    /// 形状为 `[d]` 或 `[m, d]`，第 `i` 行使用第 `i % m` 行权重。
    pub w: Option<Param<H>>,
    pub epsilon: f32,
}

pub(super) struct Meta {
    pub dt_a: DigitLayout,
    pub dt_w: DigitLayout,
    pub n: usize,
    pub m: usize,
    pub d: usize,
}

impl<H: Hardware> Args<H> {
    pub(super) fn meta(&self) -> Result<Meta, SchemeError> {
        let Self {
            y_layout: y,
            x_layout: x,
            w,
            ..
        } = self;

        let &[ny, dy] = y.shape() else {
            return Err(rank_error("y", 2, y.ndim()));
        };
        let &[nx, dx] = x.shape() else {
            return Err(rank_error("x", 2, x.ndim()));
        };
        let dt_a = type_distinct(&[y.dt(), x.dt()])?;
        let n = dim_distinct(&[ny, nx])?;

        let Some(Param { layout: w, .. }) = w else {
            return Ok(Meta {
                dt_a,
                dt_w: dt_a,
                n,
                m: 1,
                d: dim_distinct(&[dy, dx])?,
            });
        };
        let (m, dw) = match *w.shape() {
            [dw] => (1, dw),
            [m, dw] => (m, dw),
            _ => return Err(rank_error("w", 2, w.ndim())),
        };
        if m == 0 || n % m != 0 {
            return Err(crate::shape_mismatch(format!(
                "{n} rows can not be covered by {m} weight rows"
            )));
        }

        Ok(Meta {
            dt_a,
            dt_w: w.dt(),
            n,
            m,
            d: dim_distinct(&[dy, dx, dw])?,
        })
    }
}
