//! 自动混合精度上下文。
//!
//! 状态按线程保存，加速卡和 CPU 各有一组开关和目标精度。
//! [`Autocast`] 守卫在作用域内修改状态，析构时恢复。

mod cast;

pub use cast::cast_if_autocast_enabled;

use crate::{device_not_support, nbytes, DeviceType, LaunchError};
use digit_layout::{types as ty, DigitLayout};
use std::{cell::Cell, marker::PhantomData};

#[derive(Clone, Copy, Debug)]
struct Policy {
    enabled: bool,
    dt: DigitLayout,
}

#[derive(Clone, Copy, Debug)]
struct State {
    gpu: Policy,
    cpu: Policy,
}

impl State {
    const DEFAULT: Self = Self {
        gpu: Policy {
            enabled: false,
            dt: ty::F16,
        },
        cpu: Policy {
            enabled: false,
            dt: ty::BF16,
        },
    };

    fn policy_mut(&mut self, device: DeviceType) -> Option<&mut Policy> {
        match device {
            DeviceType::Cuda => Some(&mut self.gpu),
            DeviceType::Cpu => Some(&mut self.cpu),
            _ => None,
        }
    }
}

thread_local! {
    static STATE: Cell<State> = const { Cell::new(State::DEFAULT) };
}

fn update(f: impl FnOnce(&mut State)) -> State {
    STATE.with(|cell| {
        let prev = cell.get();
        let mut next = prev;
        f(&mut next);
        cell.set(next);
        log::trace!("autocast {prev:?} -> {next:?}");
        prev
    })
}

/// 当前线程是否对加速器（[`DeviceType::Cuda`]）启用了自动混合精度。
///
/// 只启用 CPU 自动混合精度不算在内，查询 CPU 状态用 [`is_autocast_enabled_for`]。
pub fn is_autocast_enabled() -> bool {
    STATE.with(Cell::get).gpu.enabled
}

/// 当前线程是否对 `device` 启用了自动混合精度。
pub fn is_autocast_enabled_for(device: DeviceType) -> bool {
    STATE
        .with(Cell::get)
        .policy_mut(device)
        .is_some_and(|p| p.enabled)
}

pub fn autocast_gpu_dtype() -> DigitLayout {
    STATE.with(Cell::get).gpu.dt
}

pub fn autocast_cpu_dtype() -> DigitLayout {
    STATE.with(Cell::get).cpu.dt
}

/// 查询 `device` 的目标精度，没有定义策略的设备类型返回错误。
pub fn autocast_dtype(device: DeviceType) -> Result<DigitLayout, LaunchError> {
    STATE
        .with(Cell::get)
        .policy_mut(device)
        .map(|p| p.dt)
        .ok_or_else(|| {
            device_not_support(format!("no autocast policy for device type {device}"))
        })
}

pub fn set_autocast_gpu_dtype(dt: DigitLayout) -> Result<(), LaunchError> {
    set_dtype(DeviceType::Cuda, dt)
}

pub fn set_autocast_cpu_dtype(dt: DigitLayout) -> Result<(), LaunchError> {
    set_dtype(DeviceType::Cpu, dt)
}

fn set_dtype(device: DeviceType, dt: DigitLayout) -> Result<(), LaunchError> {
    nbytes(dt)?;
    update(|state| {
        if let Some(p) = state.policy_mut(device) {
            p.dt = dt
        }
    });
    Ok(())
}

/// 不经守卫直接修改开关，对没有策略的设备类型无效。
pub fn set_autocast_enabled(device: DeviceType, enabled: bool) {
    update(|state| match state.policy_mut(device) {
        Some(p) => p.enabled = enabled,
        None => log::warn!("autocast is not available on {device}"),
    });
}

/// 自动混合精度作用域守卫。
///
/// 创建时修改当前线程的状态，析构时恢复创建前的状态，因此只能在创建它的线程上析构。
#[must_use]
pub struct Autocast {
    prev: State,
    _not_send: PhantomData<*const ()>,
}

impl Autocast {
    /// 对 `device` 打开或关闭自动混合精度，目标精度保持不变。
    pub fn new(device: DeviceType, enabled: bool) -> Self {
        let prev = update(|state| match state.policy_mut(device) {
            Some(p) => p.enabled = enabled,
            None if enabled => log::warn!("autocast is not available on {device}, ignored"),
            None => {}
        });
        Self {
            prev,
            _not_send: PhantomData,
        }
    }

    /// 对 `device` 打开自动混合精度并指定目标精度。
    pub fn with_dtype(device: DeviceType, dt: DigitLayout) -> Result<Self, LaunchError> {
        nbytes(dt)?;
        let prev = update(|state| match state.policy_mut(device) {
            Some(p) => *p = Policy { enabled: true, dt },
            None => log::warn!("autocast is not available on {device}, ignored"),
        });
        Ok(Self {
            prev,
            _not_send: PhantomData,
        })
    }
}

impl Drop for Autocast {
    fn drop(&mut self) {
        let prev = self.prev;
        update(|state| *state = prev);
    }
}

/// 在指定的自动混合精度状态下执行 `f`。
pub fn autocast<R>(device: DeviceType, enabled: bool, f: impl FnOnce() -> R) -> R {
    let _guard = Autocast::new(device, enabled);
    f()
}
