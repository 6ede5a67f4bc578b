//! Construction of all border regions of a subdomain in dependency order
//!
//! Edges reference the proxies and the externality of their faces, corners those of their faces
//! and edges. The builder encodes this order in its types: edges can only be built from a
//! [`FacesBuilt`] and corners only from an [`EdgesBuilt`].

use std::sync::Arc;

use log::debug;

use crate::border::{BorderRegion, Corner, Edge, Face, RegionId};
use crate::cell_grid::CellGrid;
use crate::geometry::SimulationGeometry;
use crate::ghost::ProxyRegistry;
use crate::topology::{Axis, DirectedAxis, Direction};
use crate::{HaloError, Real};

/// Entry point for building the border regions of a subdomain
pub struct BorderBuilder<'a, R: Real> {
    geometry: &'a SimulationGeometry<R>,
    grid: &'a mut CellGrid<R>,
    registry: &'a mut ProxyRegistry<R>,
}

/// All six faces are built
pub struct FacesBuilt<'a, R: Real> {
    builder: BorderBuilder<'a, R>,
    faces: Vec<Arc<Face>>,
}

/// All faces and all twelve edges are built
pub struct EdgesBuilt<'a, R: Real> {
    builder: BorderBuilder<'a, R>,
    faces: Vec<Arc<Face>>,
    edges: Vec<Arc<Edge>>,
}

impl<'a, R: Real> BorderBuilder<'a, R> {
    pub fn new(
        geometry: &'a SimulationGeometry<R>,
        grid: &'a mut CellGrid<R>,
        registry: &'a mut ProxyRegistry<R>,
    ) -> Self {
        Self {
            geometry,
            grid,
            registry,
        }
    }

    /// Builds the six faces, ordered like [`DirectedAxis::all_possible`]
    pub fn build_faces(self) -> Result<FacesBuilt<'a, R>, HaloError> {
        let mut faces = Vec::with_capacity(6);
        for &normal in DirectedAxis::all_possible() {
            let face = Face::new(
                self.geometry,
                normal,
                &mut *self.grid,
                &mut *self.registry,
            )?;
            faces.push(Arc::new(face));
        }
        Ok(FacesBuilt {
            builder: self,
            faces,
        })
    }
}

/// Returns the face with the given outward normal
fn face_with_normal(faces: &[Arc<Face>], axis: Axis, direction: Direction) -> Arc<Face> {
    let normal = DirectedAxis::new(axis, direction);
    faces
        .iter()
        .find(|f| f.normal() == normal)
        .cloned()
        .expect("all six faces are built")
}

impl<'a, R: Real> FacesBuilt<'a, R> {
    #[inline(always)]
    pub fn faces(&self) -> &[Arc<Face>] {
        self.faces.as_slice()
    }

    /// Builds the twelve edges from pairs of orthogonal faces
    pub fn build_edges(self) -> Result<EdgesBuilt<'a, R>, HaloError> {
        let FacesBuilt { builder, faces } = self;
        let mut edges = Vec::with_capacity(12);
        for (axis_a, axis_b) in [(Axis::X, Axis::Y), (Axis::X, Axis::Z), (Axis::Y, Axis::Z)] {
            for &dir_a in Direction::all_possible() {
                for &dir_b in Direction::all_possible() {
                    let edge = Edge::new(
                        builder.geometry,
                        [
                            face_with_normal(&faces, axis_a, dir_a),
                            face_with_normal(&faces, axis_b, dir_b),
                        ],
                        &mut *builder.grid,
                        &mut *builder.registry,
                    )?;
                    edges.push(Arc::new(edge));
                }
            }
        }
        Ok(EdgesBuilt {
            builder,
            faces,
            edges,
        })
    }
}

impl<'a, R: Real> EdgesBuilt<'a, R> {
    #[inline(always)]
    pub fn edges(&self) -> &[Arc<Edge>] {
        self.edges.as_slice()
    }

    /// Builds the eight corners and finishes the construction by checking that every neighbor slot is wired
    pub fn build_corners(self) -> Result<BorderSet<R>, HaloError> {
        let EdgesBuilt {
            builder,
            faces,
            edges,
        } = self;

        let mut corners = Vec::with_capacity(8);
        for &dir_x in Direction::all_possible() {
            for &dir_y in Direction::all_possible() {
                for &dir_z in Direction::all_possible() {
                    let corner = Corner::new(
                        builder.geometry,
                        [
                            face_with_normal(&faces, Axis::X, dir_x),
                            face_with_normal(&faces, Axis::Y, dir_y),
                            face_with_normal(&faces, Axis::Z, dir_z),
                        ],
                        &mut *builder.grid,
                        &mut *builder.registry,
                    )?;
                    corners.push(Arc::new(corner));
                }
            }
        }

        builder.grid.validate_wiring()?;
        Ok(BorderSet::new(builder.geometry, faces, edges, corners))
    }
}

/// All border regions of a subdomain and the remaining bulk cells
pub struct BorderSet<R: Real> {
    faces: Vec<Arc<Face>>,
    edges: Vec<Arc<Edge>>,
    corners: Vec<Arc<Corner>>,
    /// All regions indexed by their [`RegionId`]
    regions: Vec<Arc<dyn BorderRegion<R>>>,
    bulk_cells: Vec<usize>,
}

impl<R: Real> BorderSet<R> {
    fn new(
        geometry: &SimulationGeometry<R>,
        faces: Vec<Arc<Face>>,
        edges: Vec<Arc<Edge>>,
        corners: Vec<Arc<Corner>>,
    ) -> Self {
        let mut regions: Vec<Arc<dyn BorderRegion<R>>> = Vec::with_capacity(RegionId::COUNT);
        regions.extend(faces.iter().map(|f| f.clone() as Arc<dyn BorderRegion<R>>));
        regions.extend(edges.iter().map(|e| e.clone() as Arc<dyn BorderRegion<R>>));
        regions.extend(corners.iter().map(|c| c.clone() as Arc<dyn BorderRegion<R>>));
        regions.sort_unstable_by_key(|r| r.id());

        let mut on_border = vec![false; geometry.num_subdomain_cells()];
        for region in &regions {
            for &cell in region.cells() {
                on_border[cell] = true;
            }
        }
        let bulk_cells: Vec<_> = on_border
            .iter()
            .enumerate()
            .filter(|(_, on_border)| !**on_border)
            .map(|(i, _)| i)
            .collect();

        debug!(
            "Built {} border regions ({} external), {} bulk cells",
            regions.len(),
            regions.iter().filter(|r| r.is_external()).count(),
            bulk_cells.len()
        );

        Self {
            faces,
            edges,
            corners,
            regions,
            bulk_cells,
        }
    }

    /// Builds all regions of a subdomain in the required order
    pub fn build(
        geometry: &SimulationGeometry<R>,
        grid: &mut CellGrid<R>,
        registry: &mut ProxyRegistry<R>,
    ) -> Result<Self, HaloError> {
        BorderBuilder::new(geometry, grid, registry)
            .build_faces()?
            .build_edges()?
            .build_corners()
    }

    #[inline(always)]
    pub fn faces(&self) -> &[Arc<Face>] {
        self.faces.as_slice()
    }

    #[inline(always)]
    pub fn edges(&self) -> &[Arc<Edge>] {
        self.edges.as_slice()
    }

    #[inline(always)]
    pub fn corners(&self) -> &[Arc<Corner>] {
        self.corners.as_slice()
    }

    /// Returns all 26 regions ordered by their id
    #[inline(always)]
    pub fn regions(&self) -> &[Arc<dyn BorderRegion<R>>] {
        self.regions.as_slice()
    }

    /// Returns the region with the given id
    #[inline(always)]
    pub fn region(&self, id: RegionId) -> &dyn BorderRegion<R> {
        self.regions[id.index()].as_ref()
    }

    /// Iterates over all regions that border another process
    pub fn external_regions(&self) -> impl Iterator<Item = &Arc<dyn BorderRegion<R>>> {
        self.regions.iter().filter(|r| r.is_external())
    }

    /// Returns the cells that are not part of any region
    #[inline(always)]
    pub fn bulk_cells(&self) -> &[usize] {
        self.bulk_cells.as_slice()
    }
}
