// kgsp-shacl: Shape table
// Linearly probed, power-of-two capacity, load-order iteration

use crate::constraint::Constraint;
use crate::ShaclError;
use arrayvec::ArrayVec;
use kgsp_rdf::StringRef;

/// Maximum constraints per shape.
pub const MAX_CONSTRAINTS: usize = 16;

/// A compiled shape: a named constraint set targeting a class.
#[derive(Debug, Clone)]
pub struct Shape {
    pub iri: StringRef,
    pub target_class: StringRef,
    pub constraints: ArrayVec<Constraint, MAX_CONSTRAINTS>,
    pub active: bool,
    pub memory_footprint: usize,
}

impl Shape {
    pub fn new(iri: StringRef, target_class: StringRef) -> Self {
        Self {
            iri,
            target_class,
            constraints: ArrayVec::new(),
            active: true,
            memory_footprint: std::mem::size_of::<Shape>(),
        }
    }

    /// Append a constraint; `Capacity` past the 16th.
    pub fn push_constraint(&mut self, constraint: Constraint) -> Result<(), ShaclError> {
        self.constraints
            .try_push(constraint)
            .map_err(|_| ShaclError::Capacity)?;
        self.memory_footprint += std::mem::size_of::<Constraint>();
        Ok(())
    }
}

/// Linearly probed shape table keyed by shape IRI.
///
/// Capacity is a power of two; iteration respects load order, which the
/// validator relies on for deterministic reports.
pub struct ShapeTable {
    slots: Box<[Option<Shape>]>,
    /// Slot indices in insertion order.
    order: Vec<u32>,
    mask: usize,
}

impl ShapeTable {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(2);
        Self {
            slots: std::iter::repeat_with(|| None)
                .take(capacity)
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            order: Vec::new(),
            mask: capacity - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Insert a shape. `Duplicate` when the IRI is already loaded,
    /// `Capacity` when the table is full.
    pub fn insert(&mut self, shape: Shape) -> Result<(), ShaclError> {
        if self.order.len() == self.slots.len() {
            return Err(ShaclError::Capacity);
        }
        let mut slot = shape.iri.hash as usize & self.mask;
        loop {
            match &self.slots[slot] {
                Some(existing) => {
                    if existing.iri == shape.iri {
                        return Err(ShaclError::Duplicate);
                    }
                    slot = (slot + 1) & self.mask;
                }
                None => {
                    self.slots[slot] = Some(shape);
                    self.order.push(slot as u32);
                    return Ok(());
                }
            }
        }
    }

    fn probe(&self, iri: StringRef) -> Option<usize> {
        let mut slot = iri.hash as usize & self.mask;
        for _ in 0..self.slots.len() {
            match &self.slots[slot] {
                Some(shape) if shape.iri == iri => return Some(slot),
                Some(_) => slot = (slot + 1) & self.mask,
                None => return None,
            }
        }
        None
    }

    pub fn find(&self, iri: StringRef) -> Option<&Shape> {
        let slot = self.probe(iri)?;
        self.slots[slot].as_ref()
    }

    pub fn find_mut(&mut self, iri: StringRef) -> Option<&mut Shape> {
        let slot = self.probe(iri)?;
        self.slots[slot].as_mut()
    }

    /// Slot index for direct access during validation.
    pub fn slot_of(&self, iri: StringRef) -> Option<u32> {
        self.probe(iri).map(|s| s as u32)
    }

    pub fn slot(&self, slot: u32) -> Option<&Shape> {
        self.slots.get(slot as usize)?.as_ref()
    }

    pub fn slot_mut(&mut self, slot: u32) -> Option<&mut Shape> {
        self.slots.get_mut(slot as usize)?.as_mut()
    }

    /// Shapes in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        self.order
            .iter()
            .filter_map(move |&s| self.slots[s as usize].as_ref())
    }

    /// Slot indices in load order.
    pub fn slots_in_order(&self) -> impl Iterator<Item = u32> + '_ {
        self.order.iter().copied()
    }
}
