//! Corners: single cell border regions shared with up to seven neighbor processes

use std::sync::Arc;

use crate::Real;
use crate::border::face::Face;
use crate::border::{BorderRegion, RegionLayout};
use crate::cell_grid::CellGrid;
use crate::geometry::{GeometryInvariantViolation, SimulationGeometry};
use crate::ghost::{ProxyIndex, ProxyRegistry};
use crate::topology::NeighborDirection;

/// One of the eight corners of a subdomain, consisting of exactly one cell
#[derive(Clone, Debug)]
pub struct Corner {
    faces: [Arc<Face>; 3],
    layout: RegionLayout,
}

impl Corner {
    /// Builds the corner shared by the three given faces, faces and edges have to be already built
    pub fn new<R: Real>(
        geometry: &SimulationGeometry<R>,
        faces: [Arc<Face>; 3],
        grid: &mut CellGrid<R>,
        registry: &mut ProxyRegistry<R>,
    ) -> Result<Self, GeometryInvariantViolation> {
        let mut offset = [0i8; 3];
        for face in &faces {
            let normal = face.normal();
            assert_eq!(offset[normal.axis.dim()], 0, "the faces of a corner have to be orthogonal");
            offset[normal.axis.dim()] = normal.direction.sign();
        }
        let offset = NeighborDirection::new(offset)
            .expect("sum of three orthogonal face normals is a valid direction");

        let is_external = faces.iter().any(|f| f.is_external());
        let layout = RegionLayout::build(geometry, grid, registry, offset, is_external)?;
        debug_assert_eq!(layout.cells().len(), 1);
        Ok(Self { faces, layout })
    }

    #[inline(always)]
    pub fn faces(&self) -> &[Arc<Face>; 3] {
        &self.faces
    }

    /// A corner is external if one of its faces is external
    #[inline(always)]
    pub fn is_external(&self) -> bool {
        self.faces.iter().any(|f| f.is_external())
    }

    /// Returns the index of the corner cell
    #[inline(always)]
    pub fn cell(&self) -> usize {
        self.layout.cells()[0]
    }

    /// Returns the proxy of the diagonal neighbor cell if the corner is external
    #[inline(always)]
    pub fn ghost(&self) -> Option<ProxyIndex> {
        self.layout.ghosts().first().copied()
    }

    #[inline(always)]
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }
}

impl<R: Real> BorderRegion<R> for Corner {
    fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    fn is_external(&self) -> bool {
        Corner::is_external(self)
    }
}
