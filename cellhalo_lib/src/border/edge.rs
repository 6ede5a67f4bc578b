//! Edges: border regions between two faces, shared with up to three neighbor processes

use std::sync::Arc;

use crate::Real;
use crate::border::face::Face;
use crate::border::{BorderRegion, RegionLayout};
use crate::cell_grid::CellGrid;
use crate::geometry::{GeometryInvariantViolation, SimulationGeometry};
use crate::ghost::ProxyRegistry;
use crate::topology::NeighborDirection;

/// One of the twelve edges of a subdomain
///
/// The edge owns the `L-2` cells between its two corners ("pure" cells) while all `L` cells of the
/// edge are its anchors. If both faces are external, the edge creates the proxies of the diagonal
/// neighbor cells itself. Otherwise these are the proxies of its external face.
#[derive(Clone, Debug)]
pub struct Edge {
    faces: [Arc<Face>; 2],
    layout: RegionLayout,
}

impl Edge {
    /// Builds the edge between the two given faces, which have to be already built
    pub fn new<R: Real>(
        geometry: &SimulationGeometry<R>,
        faces: [Arc<Face>; 2],
        grid: &mut CellGrid<R>,
        registry: &mut ProxyRegistry<R>,
    ) -> Result<Self, GeometryInvariantViolation> {
        let [a, b] = [faces[0].normal(), faces[1].normal()];
        assert_ne!(a.axis, b.axis, "the faces of an edge have to be orthogonal");

        let mut offset = a.offset();
        offset[b.axis.dim()] = b.direction.sign();
        let offset = NeighborDirection::new(offset)
            .expect("sum of two orthogonal face normals is a valid direction");

        let is_external = faces.iter().any(|f| f.is_external());
        let layout = RegionLayout::build(geometry, grid, registry, offset, is_external)?;
        Ok(Self { faces, layout })
    }

    /// Returns the two faces adjacent to this edge
    #[inline(always)]
    pub fn faces(&self) -> &[Arc<Face>; 2] {
        &self.faces
    }

    /// An edge is external if one of its faces is external
    #[inline(always)]
    pub fn is_external(&self) -> bool {
        self.faces.iter().any(|f| f.is_external())
    }

    #[inline(always)]
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }
}

impl<R: Real> BorderRegion<R> for Edge {
    fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    fn is_external(&self) -> bool {
        Edge::is_external(self)
    }
}
