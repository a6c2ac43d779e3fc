// renderer/target.rs
//
// Off-screen colour buffers and the scoped guards that bind them.
//
// Binding state lives on the device and is global: a guard restores what it
// replaced when it is unbound or dropped, so nested bindings unwind in LIFO
// order on every exit path. The borrow checker enforces the nesting: the
// inner guard borrows the device through the outer one.

use std::ops::{Deref, DerefMut};

use crate::error::{DemoError, Result};
use crate::renderer::device::{Device, DeviceResult, Resource, Surface, TargetId};

#[derive(Debug)]
pub struct RenderTarget {
    id: TargetId,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn new<D: Device + ?Sized>(
        device: &mut D,
        width: u32,
        height: u32,
        label: &str,
    ) -> Result<Self> {
        let id = device
            .create_render_target(width, height, label)
            .map_err(|source| DemoError::init(format!("render target `{label}`"), source))?;
        log::info!("Created render target {} ({}x{})", label, width, height);
        Ok(Self { id, width, height })
    }

    /// Installs this target at `slot` until the returned guard is unbound.
    ///
    /// Only slot 0 remembers what it replaced; unbinding any other slot
    /// leaves it empty.
    pub fn bind_as_output<'d, D: Device + ?Sized>(
        &self,
        device: &'d mut D,
        slot: u32,
    ) -> Result<OutputBinding<'d, D>> {
        let previous = if slot == 0 {
            device.render_target(slot)?
        } else {
            None
        };
        device.set_render_target(slot, Some(Surface::Target(self.id)))?;
        Ok(OutputBinding {
            device,
            slot,
            previous,
            bound: true,
        })
    }

    /// Exposes this target to pixel shaders at `sampler` until the guard is unbound.
    pub fn bind_as_input<'d, D: Device + ?Sized>(
        &self,
        device: &'d mut D,
        sampler: u32,
    ) -> Result<InputBinding<'d, D>> {
        InputBinding::attach(device, sampler, self.id)
    }

    pub fn resource(&self) -> Resource {
        Resource::Target(self.id)
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn float_width(&self) -> f32 {
        self.width as f32
    }

    pub fn float_height(&self) -> f32 {
        self.height as f32
    }
}

pub struct OutputBinding<'d, D: Device + ?Sized> {
    device: &'d mut D,
    slot: u32,
    previous: Option<Surface>,
    bound: bool,
}

impl<D: Device + ?Sized> OutputBinding<'_, D> {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Restores the surface captured at bind time (slot 0) or clears the slot.
    pub fn unbind(mut self) -> Result<()> {
        self.bound = false;
        self.restore()?;
        Ok(())
    }

    fn restore(&mut self) -> DeviceResult<()> {
        let surface = if self.slot == 0 { self.previous } else { None };
        self.device.set_render_target(self.slot, surface)
    }
}

impl<D: Device + ?Sized> Deref for OutputBinding<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: Device + ?Sized> DerefMut for OutputBinding<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: Device + ?Sized> Drop for OutputBinding<'_, D> {
    fn drop(&mut self) {
        if self.bound {
            if let Err(err) = self.restore() {
                log::error!("Failed to restore output slot {}: {}", self.slot, err);
            }
        }
    }
}

pub struct InputBinding<'d, D: Device + ?Sized> {
    device: &'d mut D,
    sampler: u32,
    bound: bool,
}

impl<'d, D: Device + ?Sized> InputBinding<'d, D> {
    /// Binds a target known only by handle, as textured models hold it.
    pub fn attach(device: &'d mut D, sampler: u32, target: TargetId) -> Result<Self> {
        device.set_texture(sampler, Some(target))?;
        Ok(Self {
            device,
            sampler,
            bound: true,
        })
    }

    pub fn sampler(&self) -> u32 {
        self.sampler
    }

    pub fn unbind(mut self) -> Result<()> {
        self.bound = false;
        self.device.set_texture(self.sampler, None)?;
        Ok(())
    }
}

impl<D: Device + ?Sized> Deref for InputBinding<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: Device + ?Sized> DerefMut for InputBinding<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: Device + ?Sized> Drop for InputBinding<'_, D> {
    fn drop(&mut self) {
        if self.bound {
            if let Err(err) = self.device.set_texture(self.sampler, None) {
                log::error!("Failed to unbind sampler {}: {}", self.sampler, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::software::SoftwareDevice;

    fn device() -> SoftwareDevice {
        SoftwareDevice::new(8, 8)
    }

    #[test]
    fn slot_zero_restores_the_previous_surface() {
        let mut device = device();
        let first = RenderTarget::new(&mut device, 8, 8, "first").unwrap();
        let second = RenderTarget::new(&mut device, 8, 8, "second").unwrap();

        let mut outer = first.bind_as_output(&mut device, 0).unwrap();
        {
            let inner = second.bind_as_output(&mut *outer, 0).unwrap();
            assert_eq!(
                inner.render_target(0).unwrap(),
                Some(Surface::Target(second.id()))
            );
            inner.unbind().unwrap();
        }
        assert_eq!(
            outer.render_target(0).unwrap(),
            Some(Surface::Target(first.id()))
        );
        outer.unbind().unwrap();

        assert_eq!(device.render_target(0).unwrap(), Some(Surface::BackBuffer));
    }

    #[test]
    fn slot_one_is_cleared_not_restored() {
        let mut device = device();
        let first = RenderTarget::new(&mut device, 8, 8, "first").unwrap();
        let second = RenderTarget::new(&mut device, 8, 8, "second").unwrap();

        let mut outer = first.bind_as_output(&mut device, 1).unwrap();
        let inner = second.bind_as_output(&mut *outer, 1).unwrap();
        inner.unbind().unwrap();
        // the outer binding is gone: slot 1 never remembers its previous surface
        assert_eq!(outer.render_target(1).unwrap(), None);
        outer.unbind().unwrap();
    }

    #[test]
    fn dropping_a_guard_restores_bindings_on_error_paths() {
        let mut device = device();
        let target = RenderTarget::new(&mut device, 8, 8, "target").unwrap();

        let mut attempt = || -> Result<()> {
            let mut output = target.bind_as_output(&mut device, 0)?;
            let _input = target.bind_as_input(&mut *output, 1)?;
            Err(DemoError::ConstantBudgetExceeded {
                needed: 9,
                capacity: 8,
            })
        };
        assert!(attempt().is_err());

        assert_eq!(device.render_target(0).unwrap(), Some(Surface::BackBuffer));
        assert_eq!(device.texture(1), None);
    }

    #[test]
    fn input_binding_detaches_on_unbind() {
        let mut device = device();
        let target = RenderTarget::new(&mut device, 8, 8, "target").unwrap();
        let input = target.bind_as_input(&mut device, 0).unwrap();
        assert_eq!(input.texture(0), Some(target.id()));
        input.unbind().unwrap();
        assert_eq!(device.texture(0), None);
    }
}
