//! Half-edge mesh data structure.
//!
//! This is the working mesh handed to the parameterizer and the quad extractor.
//! Besides connectivity it carries the per-element attributes those stages read:
//! vertex normals and relative heights, face normals, and the per-face cross
//! field direction written by a successful parameterization.
//!
//! # Structure
//!
//! - Each edge is split into two **half-edges** pointing in opposite directions
//! - Each half-edge knows its **twin**, **next**, **prev**, **origin vertex** and
//!   **incident face**
//! - Each vertex stores one outgoing half-edge
//! - Each face stores one half-edge on its boundary
//!
//! # Boundary Handling
//!
//! Boundary half-edges have an invalid face ID. Their twins are the interior
//! half-edges, and boundary loops are linked through `next`/`prev`.

use nalgebra::{Point3, Vector3};

use super::index::{FaceId, HalfEdgeId, VertexId};

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// The 3D position of this vertex.
    pub position: Point3<f64>,

    /// One outgoing half-edge from this vertex.
    /// For boundary vertices, this is guaranteed to be a boundary half-edge.
    pub halfedge: HalfEdgeId,

    /// Area-weighted vertex normal.
    pub normal: Vector3<f64>,

    /// Average of the neighboring vertex normals.
    pub average_normal: Vector3<f64>,

    /// Normalized relative height; `f64::MAX` near the boundary.
    pub relative_height: f64,
}

impl Vertex {
    /// Create a new vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            halfedge: HalfEdgeId::invalid(),
            normal: Vector3::zeros(),
            average_normal: Vector3::zeros(),
            relative_height: 0.0,
        }
    }

    /// Whether a finite relative height was computed for this vertex.
    #[inline]
    pub fn has_relative_height(&self) -> bool {
        self.relative_height < f64::MAX
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge {
    /// The vertex this half-edge originates from.
    pub origin: VertexId,

    /// The opposite half-edge (pointing in the reverse direction).
    pub twin: HalfEdgeId,

    /// The next half-edge around the face (counter-clockwise).
    pub next: HalfEdgeId,

    /// The previous half-edge around the face (clockwise).
    pub prev: HalfEdgeId,

    /// The face this half-edge belongs to.
    /// Invalid for boundary half-edges.
    pub face: FaceId,
}

impl HalfEdge {
    /// Create a new uninitialized half-edge.
    pub fn new() -> Self {
        Self {
            origin: VertexId::invalid(),
            twin: HalfEdgeId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            face: FaceId::invalid(),
        }
    }

    /// Check if this half-edge is on the boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !self.face.is_valid()
    }
}

impl Default for HalfEdge {
    fn default() -> Self {
        Self::new()
    }
}

/// A triangular face in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face {
    /// One half-edge on the boundary of this face.
    pub halfedge: HalfEdgeId,

    /// Unit face normal.
    pub normal: Vector3<f64>,

    /// Representative direction of the cross field on this face.
    /// Zero until a parameterization has been committed.
    pub field: Vector3<f64>,
}

impl Face {
    /// Create a new face with the given half-edge.
    pub fn new(halfedge: HalfEdgeId) -> Self {
        Self {
            halfedge,
            normal: Vector3::zeros(),
            field: Vector3::zeros(),
        }
    }
}

/// A half-edge mesh data structure for triangle meshes.
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) halfedges: Vec<HalfEdge>,
    pub(crate) faces: Vec<Face>,
}

impl HalfEdgeMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // Closed mesh: HE = 3F; boundaries add a few more
        let num_halfedges = num_faces * 3 + num_faces / 2;

        Self {
            vertices: Vec::with_capacity(num_vertices),
            halfedges: Vec::with_capacity(num_halfedges),
            faces: Vec::with_capacity(num_faces),
        }
    }

    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of half-edges.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Get the number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by ID.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.halfedges[id.index()]
    }

    /// Get a mutable half-edge by ID.
    #[inline]
    pub fn halfedge_mut(&mut self, id: HalfEdgeId) -> &mut HalfEdge {
        &mut self.halfedges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.index()]
    }

    /// Get a mutable face by ID.
    #[inline]
    pub fn face_mut(&mut self, id: FaceId) -> &mut Face {
        &mut self.faces[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.vertex(v).position
    }

    // ==================== Topology Queries ====================

    /// Get the twin (opposite) half-edge.
    #[inline]
    pub fn twin(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).twin
    }

    /// Get the next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId) -> HalfEdgeId {
        self.halfedge(he).prev
    }

    /// Get the origin vertex of a half-edge.
    #[inline]
    pub fn origin(&self, he: HalfEdgeId) -> VertexId {
        self.halfedge(he).origin
    }

    /// Get the destination vertex of a half-edge.
    #[inline]
    pub fn dest(&self, he: HalfEdgeId) -> VertexId {
        self.origin(self.twin(he))
    }

    /// Get the face of a half-edge.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId) -> FaceId {
        self.halfedge(he).face
    }

    /// Check if a half-edge is on the boundary.
    #[inline]
    pub fn is_boundary_halfedge(&self, he: HalfEdgeId) -> bool {
        self.halfedge(he).is_boundary()
    }

    /// Check if an edge (represented by one of its half-edges) is on the boundary.
    #[inline]
    pub fn is_boundary_edge(&self, he: HalfEdgeId) -> bool {
        self.is_boundary_halfedge(he) || self.is_boundary_halfedge(self.twin(he))
    }

    /// Check if a vertex is on the boundary (or isolated).
    pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
        if !self.vertex(v).halfedge.is_valid() {
            return true;
        }
        self.vertex_halfedges(v)
            .any(|he| self.is_boundary_halfedge(he))
    }

    // ==================== Iteration ====================

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// Iterate over all half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        (0..self.halfedges.len()).map(HalfEdgeId::new)
    }

    /// Iterate over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// Iterate over outgoing half-edges around a vertex (clockwise).
    pub fn vertex_halfedges(&self, v: VertexId) -> VertexHalfEdgeIter<'_> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over vertices adjacent to a vertex.
    pub fn vertex_neighbors(&self, v: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.vertex_halfedges(v).map(|he| self.dest(he))
    }

    /// Collect the outgoing half-edges of an interior vertex in
    /// counter-clockwise order, one per incident face.
    ///
    /// Returns `None` for boundary vertices and for fans that do not close.
    pub fn vertex_halfedges_ccw(&self, v: VertexId) -> Option<Vec<HalfEdgeId>> {
        let start = self.vertex(v).halfedge;
        if !start.is_valid() {
            return None;
        }

        let mut fan = Vec::new();
        let mut he = start;
        for _ in 0..self.halfedges.len() {
            if !self.face_of(he).is_valid() {
                return None;
            }
            fan.push(he);
            // prev(he) ends at v; its twin leaves v into the next face ccw
            he = self.twin(self.prev(he));
            if he == start {
                return Some(fan);
            }
        }
        None
    }

    /// Get the three half-edges of a triangular face.
    pub fn face_halfedges(&self, f: FaceId) -> [HalfEdgeId; 3] {
        let he0 = self.face(f).halfedge;
        let he1 = self.next(he0);
        let he2 = self.next(he1);
        [he0, he1, he2]
    }

    /// Get the three vertices of a triangular face.
    pub fn face_triangle(&self, f: FaceId) -> [VertexId; 3] {
        let [he0, he1, he2] = self.face_halfedges(f);
        [self.origin(he0), self.origin(he1), self.origin(he2)]
    }

    /// Get the positions of the three vertices of a triangular face.
    pub fn face_positions(&self, f: FaceId) -> [Point3<f64>; 3] {
        let [v0, v1, v2] = self.face_triangle(f);
        [*self.position(v0), *self.position(v1), *self.position(v2)]
    }

    // ==================== Geometry ====================

    /// Compute the (unnormalized) area vector of a face.
    pub fn face_area_vector(&self, f: FaceId) -> Vector3<f64> {
        let [p0, p1, p2] = self.face_positions(f);
        (p1 - p0).cross(&(p2 - p0))
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: FaceId) -> f64 {
        0.5 * self.face_area_vector(f).norm()
    }

    /// Compute the edge vector (from origin to destination).
    pub fn edge_vector(&self, he: HalfEdgeId) -> Vector3<f64> {
        self.position(self.dest(he)) - self.position(self.origin(he))
    }

    /// Compute the interior angle of the face corner at the origin of `he`.
    pub fn corner_angle(&self, he: HalfEdgeId) -> f64 {
        let a = self.edge_vector(he);
        let b = -self.edge_vector(self.prev(he));
        a.angle(&b)
    }

    /// Compute the bounding box of the mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?;
        let mut min = first.position;
        let mut max = first.position;

        for v in &self.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }

        Some((min, max))
    }

    // ==================== Construction ====================

    /// Add a new vertex and return its ID.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId {
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::new(position));
        id
    }

    // ==================== Validation ====================

    /// Check if the mesh is valid (all connectivity is consistent).
    pub fn is_valid(&self) -> bool {
        for (i, v) in self.vertices.iter().enumerate() {
            if v.halfedge.is_valid() && self.halfedge(v.halfedge).origin.index() != i {
                return false;
            }
        }

        for (i, he) in self.halfedges.iter().enumerate() {
            if !he.twin.is_valid() || self.halfedge(he.twin).twin.index() != i {
                return false;
            }
            if he.next.is_valid() && self.halfedge(he.next).prev.index() != i {
                return false;
            }
            if he.prev.is_valid() && self.halfedge(he.prev).next.index() != i {
                return false;
            }
        }

        self.faces.iter().all(|f| f.halfedge.is_valid())
    }
}

/// Iterator over outgoing half-edges around a vertex.
///
/// Stops after visiting every half-edge once, so broken fans cannot loop forever.
pub struct VertexHalfEdgeIter<'a> {
    mesh: &'a HalfEdgeMesh,
    start: HalfEdgeId,
    current: HalfEdgeId,
    remaining: usize,
}

impl<'a> VertexHalfEdgeIter<'a> {
    fn new(mesh: &'a HalfEdgeMesh, v: VertexId) -> Self {
        let start = mesh.vertex(v).halfedge;
        Self {
            mesh,
            start,
            current: start,
            remaining: if start.is_valid() { mesh.num_halfedges() } else { 0 },
        }
    }
}

impl Iterator for VertexHalfEdgeIter<'_> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || !self.current.is_valid() {
            return None;
        }
        self.remaining -= 1;

        let result = self.current;

        // twin(he) ends at v, so next(twin(he)) leaves v again
        self.current = self.mesh.next(self.mesh.twin(self.current));
        if self.current == self.start {
            self.remaining = 0;
        }

        Some(result)
    }
}
