//! Driver-chip port abstraction.
//!
//! A [`DriverPort`] carries named-field and raw-register access to one
//! physical driver chip. The production implementation wraps the actual
//! bus (SPI/UART) and owns the field-to-register mapping; [`MemoryPort`]
//! backs the same trait with a register array for bench setups and tests.

use std::cell::RefCell;
use std::rc::Rc;

use super::bits::{ramp, ramp_mode, Field, FIELD_COUNT};

/// Register-level access to one driver chip.
pub trait DriverPort {
    /// Read a named field.
    fn read_field(&mut self, field: Field) -> i32;
    /// Write a named field. Status fields are write-1-to-clear.
    fn write_field(&mut self, field: Field, value: i32);
    /// Read a raw register (diagnostic access).
    fn read_register(&mut self, addr: u8) -> i32;
    /// Write a raw register (diagnostic access).
    fn write_register(&mut self, addr: u8, value: i32);
}

/// Number of raw registers kept by [`MemoryPort`].
const REGISTER_COUNT: usize = 128;

#[derive(Debug)]
struct MemoryPortState {
    fields: [i32; FIELD_COUNT],
    regs: [i32; REGISTER_COUNT],
}

/// Register-array port with instant-settle motion semantics: a target
/// write in position mode lands immediately and raises the reached bits.
/// Cloning yields a second handle onto the same state.
#[derive(Debug, Clone)]
pub struct MemoryPort {
    state: Rc<RefCell<MemoryPortState>>,
}

impl MemoryPort {
    /// Create a port at power-on state (standstill, position reached).
    pub fn new() -> Self {
        let mut fields = [0i32; FIELD_COUNT];
        fields[Field::RampStatus as usize] = ramp::VELOCITY_ZERO | ramp::POSITION_REACHED;
        fields[Field::DriveFaults as usize] = super::bits::drv::STANDSTILL;
        Self {
            state: Rc::new(RefCell::new(MemoryPortState {
                fields,
                regs: [0; REGISTER_COUNT],
            })),
        }
    }

    /// Overwrite a field without write-1-to-clear handling. Lets bench
    /// and test code plant status/fault bits.
    pub fn force_field(&self, field: Field, value: i32) {
        self.state.borrow_mut().fields[field as usize] = value;
    }

    /// Set bits in a field without write-1-to-clear handling.
    pub fn raise_field(&self, field: Field, bits: i32) {
        self.state.borrow_mut().fields[field as usize] |= bits;
    }

    /// Plain field read without going through the trait.
    pub fn field(&self, field: Field) -> i32 {
        self.state.borrow().fields[field as usize]
    }
}

impl Default for MemoryPort {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverPort for MemoryPort {
    fn read_field(&mut self, field: Field) -> i32 {
        self.state.borrow().fields[field as usize]
    }

    fn write_field(&mut self, field: Field, value: i32) {
        let mut st = self.state.borrow_mut();
        match field {
            // Status fields clear the written bits.
            Field::RampStatus | Field::EncoderStatus | Field::GlobalFaults => {
                st.fields[field as usize] &= !value;
            }
            // Instant settle: a position-mode target lands immediately.
            Field::TargetPosition => {
                st.fields[Field::TargetPosition as usize] = value;
                if st.fields[Field::RampMode as usize] == ramp_mode::POSITION {
                    st.fields[Field::ActualPosition as usize] = value;
                    st.fields[Field::RampStatus as usize] |=
                        ramp::EVENT_POS_REACHED | ramp::POSITION_REACHED | ramp::VELOCITY_ZERO;
                }
            }
            _ => st.fields[field as usize] = value,
        }
    }

    fn read_register(&mut self, addr: u8) -> i32 {
        self.state.borrow().regs[addr as usize % REGISTER_COUNT]
    }

    fn write_register(&mut self, addr: u8, value: i32) {
        self.state.borrow_mut().regs[addr as usize % REGISTER_COUNT] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_writes_clear_bits() {
        let mut port = MemoryPort::new();
        port.raise_field(Field::RampStatus, ramp::STATUS_LATCH_R | ramp::EVENT_STOP_R);
        port.write_field(Field::RampStatus, ramp::STATUS_LATCH_R);
        let left = port.read_field(Field::RampStatus);
        assert_eq!(left & ramp::STATUS_LATCH_R, 0);
        assert_ne!(left & ramp::EVENT_STOP_R, 0);
    }

    #[test]
    fn position_target_settles_instantly() {
        let mut port = MemoryPort::new();
        port.write_field(Field::RampMode, ramp_mode::POSITION);
        port.write_field(Field::RampStatus, ramp::EVENT_POS_REACHED | ramp::POSITION_REACHED);
        port.write_field(Field::TargetPosition, 777);
        assert_eq!(port.read_field(Field::ActualPosition), 777);
        assert_ne!(port.read_field(Field::RampStatus) & ramp::POSITION_REACHED, 0);
    }

    #[test]
    fn clones_share_state() {
        let port = MemoryPort::new();
        let mut handle: Box<dyn DriverPort> = Box::new(port.clone());
        handle.write_field(Field::RunCurrent, 12);
        assert_eq!(port.field(Field::RunCurrent), 12);
    }
}
