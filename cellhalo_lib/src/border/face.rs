//! Faces: border regions shared with exactly one neighbor process

use crate::Real;
use crate::border::{BorderRegion, RegionLayout};
use crate::cell_grid::CellGrid;
use crate::geometry::{GeometryInvariantViolation, SimulationGeometry};
use crate::ghost::ProxyRegistry;
use crate::topology::DirectedAxis;

/// One of the six faces of a subdomain
///
/// All `L×L` boundary cells of the face are its anchors, the face interior without the cells on
/// its edges are the cells it owns. If the face is external it creates one ghost proxy for every
/// anchor: the directly opposite cell of the neighbor process.
#[derive(Clone, Debug)]
pub struct Face {
    normal: DirectedAxis,
    is_external: bool,
    layout: RegionLayout,
}

impl Face {
    /// Builds the face with the given outward normal and wires its ghost proxies
    pub fn new<R: Real>(
        geometry: &SimulationGeometry<R>,
        normal: DirectedAxis,
        grid: &mut CellGrid<R>,
        registry: &mut ProxyRegistry<R>,
    ) -> Result<Self, GeometryInvariantViolation> {
        let is_external = geometry.external_axes().contains(normal.axis.flag());
        let layout = RegionLayout::build(
            geometry,
            grid,
            registry,
            normal.neighbor_direction(),
            is_external,
        )?;
        Ok(Self {
            normal,
            is_external,
            layout,
        })
    }

    /// Returns the outward normal of the face
    #[inline(always)]
    pub fn normal(&self) -> DirectedAxis {
        self.normal
    }

    #[inline(always)]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    #[inline(always)]
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }
}

impl<R: Real> BorderRegion<R> for Face {
    fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    fn is_external(&self) -> bool {
        self.is_external
    }
}
