//! Field buffer set
//!
//! Every quantity the solver touches lives here. Iterative quantities are kept
//! as two fixed slots with an index toggle, so a Jacobi sweep never allocates.

use super::field::{FieldBuffer, GridSize, Sample, ScalarField, VelocityField};

/// Which slot of a [`PingPong`] pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }

    /// Source slot for a given Jacobi iteration; the destination is its `other()`
    pub fn for_iteration(iteration: usize) -> Self {
        if iteration % 2 == 0 {
            Slot::First
        } else {
            Slot::Second
        }
    }
}

/// Two equally sized buffers used as read/write partners
#[derive(Clone, Debug)]
pub struct PingPong<T> {
    slots: [FieldBuffer<T>; 2],
}

impl<T: Sample> PingPong<T> {
    pub fn new(size: GridSize) -> Self {
        Self {
            slots: [FieldBuffer::new(size), FieldBuffer::new(size)],
        }
    }

    pub fn get(&self, slot: Slot) -> &FieldBuffer<T> {
        &self.slots[slot as usize]
    }

    pub fn get_mut(&mut self, slot: Slot) -> &mut FieldBuffer<T> {
        &mut self.slots[slot as usize]
    }

    /// Borrow `src` for reading and its partner for writing
    pub fn split(&mut self, src: Slot) -> (&FieldBuffer<T>, &mut FieldBuffer<T>) {
        let [first, second] = &mut self.slots;
        match src {
            Slot::First => (&*first, second),
            Slot::Second => (&*second, first),
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.fill(T::zero());
        }
    }
}

/// All field buffers of one simulation, sized together
///
/// Velocity `First` is buffer "A": it holds the projected field between ticks.
/// Velocity `Second` receives advection and the external force.
#[derive(Clone, Debug)]
pub struct FieldBufferSet {
    size: GridSize,
    pub velocity: PingPong<cgmath::Vector2<f32>>,
    pub viscous: PingPong<cgmath::Vector2<f32>>,
    pub divergence: ScalarField,
    pub pressure: PingPong<f32>,
}

impl FieldBufferSet {
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            velocity: PingPong::new(size),
            viscous: PingPong::new(size),
            divergence: ScalarField::new(size),
            pressure: PingPong::new(size),
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Reallocate every buffer at `size`. Previous contents are discarded.
    pub fn resize(&mut self, size: GridSize) {
        *self = Self::new(size);
    }

    pub fn clear(&mut self) {
        self.velocity.clear();
        self.viscous.clear();
        self.divergence.fill(0.0);
        self.pressure.clear();
    }

    /// Dimensions of every buffer in the set, for invariant checks
    pub fn buffer_sizes(&self) -> [GridSize; 7] {
        [
            self.velocity.get(Slot::First).size(),
            self.velocity.get(Slot::Second).size(),
            self.viscous.get(Slot::First).size(),
            self.viscous.get(Slot::Second).size(),
            self.divergence.size(),
            self.pressure.get(Slot::First).size(),
            self.pressure.get(Slot::Second).size(),
        ]
    }

    pub fn velocity_a(&self) -> &VelocityField {
        self.velocity.get(Slot::First)
    }
}
