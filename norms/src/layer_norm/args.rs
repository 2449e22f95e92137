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
    pub scale: Option<Param<H>>,
    pub bias: Option<Param<H>>,
    pub epsilon: f32,
}

pub(super) struct Meta {
    pub dt_a: DigitLayout,
    pub dt_w: DigitLayout,
    pub n: usize,
    pub d: usize,
}

impl<H: Hardware> Args<H> {
    pub(super) fn meta(&self) -> Result<Meta, SchemeError> {
        let Self {
            y_layout: y,
            x_layout: x,
            scale,
            bias,
            ..
        } = self;

        let &[ny, dy] = y.shape() else {
            return Err(rank_error("y", 2, y.ndim()));
        };
        let &[nx, dx] = x.shape() else {
            return Err(rank_error("x", 2, x.ndim()));
        };
        let dt_a = type_distinct(&[y.dt(), x.dt()])?;

        let mut dims = vec![dy, dx];
        let mut dts = vec![];
        for (name, param) in [("scale", scale), ("bias", bias)] {
            if let Some(Param { layout, .. }) = param {
                let &[d] = layout.shape() else {
                    return Err(rank_error(name, 1, layout.ndim()));
                };
                dims.push(d);
                dts.push(layout.dt());
            }
        }

        Ok(Meta {
            dt_a,
            dt_w: if dts.is_empty() {
                dt_a
            } else {
                type_distinct(&dts)?
            },
            n: dim_distinct(&[ny, nx])?,
            d: dim_distinct(&dims)?,
        })
    }
}
