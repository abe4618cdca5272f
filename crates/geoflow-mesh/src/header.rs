//! Binary grid file header and the geometry derived from it.
//!
//! Every axis and field file starts with the same fixed layout (native
//! endian, no padding):
//!
//! ```text
//! int32      version
//! int32      dim                // 2 or 3
//! size_t     element_count
//! int32[dim] poly_order
//! int32      grid_type
//! size_t     time_cycle
//! float64    time_stamp
//! int32      has_mult_vars
//! ```
//!
//! followed directly by the value array.

use std::fmt;
use std::path::Path;

use bytes::Buf;

use crate::error::{MeshError, Result};

/// Upper bound on the header size (3D layout).
pub const MAX_HEADER_BYTES: usize = 4 + 4 + 8 + 3 * 4 + 4 + 8 + 8 + 4;

/// Header fields as stored in a grid file.
#[derive(Debug, Clone, PartialEq)]
pub struct GridHeader {
    pub version: u32,
    pub dim: u32,
    pub element_count: u64,
    /// Polynomial order per reference direction, `dim` entries.
    pub poly_order: Vec<u32>,
    pub grid_type: u32,
    pub time_cycle: u64,
    pub time_stamp: f64,
    pub has_mult_vars: u32,
    /// Byte offset of the value array.
    pub header_bytes: usize,
}

/// Cursor over the raw header bytes that reports truncation as a format error.
struct HeaderCursor<'a> {
    buf: &'a [u8],
    path: &'a Path,
}

impl<'a> HeaderCursor<'a> {
    fn ensure(&self, n: usize, field: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(MeshError::format(
                self.path,
                format!("header truncated while reading {}", field),
            ));
        }
        Ok(())
    }

    fn u32(&mut self, field: &str) -> Result<u32> {
        self.ensure(4, field)?;
        Ok(self.buf.get_u32_ne())
    }

    fn u64(&mut self, field: &str) -> Result<u64> {
        self.ensure(8, field)?;
        Ok(self.buf.get_u64_ne())
    }

    fn f64(&mut self, field: &str) -> Result<f64> {
        self.ensure(8, field)?;
        Ok(self.buf.get_f64_ne())
    }
}

impl GridHeader {
    /// Parse a header from the leading bytes of a grid file.
    ///
    /// `path` is only used for error context.
    pub fn parse(data: &[u8], path: &Path) -> Result<Self> {
        let total = data.len();
        let mut cur = HeaderCursor { buf: data, path };

        let version = cur.u32("version")?;
        let dim = cur.u32("dim")?;
        if dim != 2 && dim != 3 {
            return Err(MeshError::format(
                path,
                format!("unsupported dimension {} (expected 2 or 3)", dim),
            ));
        }
        let element_count = cur.u64("element count")?;

        let mut poly_order = Vec::with_capacity(dim as usize);
        for i in 0..dim {
            poly_order.push(cur.u32(&format!("poly order {}", i))?);
        }

        let grid_type = cur.u32("grid type")?;
        let time_cycle = cur.u64("time cycle")?;
        let time_stamp = cur.f64("time stamp")?;
        let has_mult_vars = cur.u32("multi-variable flag")?;

        let header_bytes = total - cur.buf.remaining();

        Ok(Self {
            version,
            dim,
            element_count,
            poly_order,
            grid_type,
            time_cycle,
            time_stamp,
            has_mult_vars,
            header_bytes,
        })
    }

    /// Derive node, face and layer counts for a volume split into
    /// `element_layers` element layers.
    pub fn geometry(&self, element_layers: usize, path: &Path) -> Result<HeaderGeometry> {
        HeaderGeometry::new(self, element_layers, path)
    }
}

impl fmt::Display for GridHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let orders: Vec<String> = self.poly_order.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "version={} dim={} elements={} poly_order=[{}] grid_type={} time_cycle={} time_stamp={} mult_vars={} header_bytes={}",
            self.version,
            self.dim,
            self.element_count,
            orders.join(","),
            self.grid_type,
            self.time_cycle,
            self.time_stamp,
            self.has_mult_vars,
            self.header_bytes
        )
    }
}

/// Counts derived once from a header.
///
/// Nodes inside an element are stored z-slab outer, then x, then y, so one
/// x,y block of `nodes_per_2d_elem` nodes is contiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderGeometry {
    pub dim: usize,
    pub element_count: usize,
    /// Nodes along x, y and z inside one element (z is 1 for 2D data).
    pub nodes_per_axis: [usize; 3],
    pub nodes_per_elem: usize,
    pub nodes_per_2d_elem: usize,
    pub element_layers: usize,
    pub elems_per_layer: usize,
    pub nodes_per_2d_layer: usize,
    pub faces_per_2d_layer: usize,
    /// 2D mesh layers contributed by one element layer.
    pub sub_layers: usize,
    pub n_2d_layers: usize,
    pub nodes_per_volume: usize,
}

impl HeaderGeometry {
    /// Compute derived geometry. Fails if the element count does not split
    /// evenly into `element_layers`.
    pub fn new(header: &GridHeader, element_layers: usize, path: &Path) -> Result<Self> {
        if header.poly_order.len() < 2 || header.poly_order.len() != header.dim as usize {
            return Err(MeshError::format(
                path,
                format!(
                    "expected {} polynomial orders, found {}",
                    header.dim,
                    header.poly_order.len()
                ),
            ));
        }
        if element_layers == 0 {
            return Err(MeshError::format(path, "element layer count must be >= 1"));
        }

        let element_count = usize::try_from(header.element_count).map_err(|_| {
            MeshError::format(
                path,
                format!("element count {} overflows", header.element_count),
            )
        })?;
        if element_count % element_layers != 0 {
            return Err(MeshError::format(
                path,
                format!(
                    "{} elements do not split into {} element layers",
                    element_count, element_layers
                ),
            ));
        }

        let mul = |a: usize, b: usize, what: &str| {
            a.checked_mul(b)
                .ok_or_else(|| MeshError::format(path, format!("{} overflows", what)))
        };

        let p = &header.poly_order;
        let nx = p[0] as usize + 1;
        let ny = p[1] as usize + 1;
        let nz = if header.dim == 3 { p[2] as usize + 1 } else { 1 };

        let elems_per_layer = element_count / element_layers;
        let nodes_per_2d_elem = mul(nx, ny, "nodes per 2D element")?;
        let nodes_per_elem = mul(nodes_per_2d_elem, nz, "nodes per element")?;
        let faces_per_2d_elem = mul(p[0] as usize, p[1] as usize, "faces per 2D element")?;

        Ok(Self {
            dim: header.dim as usize,
            element_count,
            nodes_per_axis: [nx, ny, nz],
            nodes_per_elem,
            nodes_per_2d_elem,
            element_layers,
            elems_per_layer,
            nodes_per_2d_layer: mul(elems_per_layer, nodes_per_2d_elem, "nodes per 2D layer")?,
            faces_per_2d_layer: mul(elems_per_layer, faces_per_2d_elem, "faces per 2D layer")?,
            sub_layers: nz,
            n_2d_layers: mul(element_layers, nz, "2D layer count")?,
            nodes_per_volume: mul(nodes_per_elem, element_count, "nodes per volume")?,
        })
    }

    /// Element a file-order value index belongs to.
    pub fn element_of(&self, index: usize) -> usize {
        index / self.nodes_per_elem
    }

    /// z sub-layer inside its element for a file-order value index.
    pub fn sub_layer_of(&self, index: usize) -> usize {
        (index % self.nodes_per_elem) / self.nodes_per_2d_elem
    }
}

impl fmt::Display for HeaderGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes_per_elem={} nodes_per_2d_layer={} faces_per_2d_layer={} n_2d_layers={} element_layers={} elems_per_layer={} nodes_per_volume={}",
            self.nodes_per_elem,
            self.nodes_per_2d_layer,
            self.faces_per_2d_layer,
            self.n_2d_layers,
            self.element_layers,
            self.elems_per_layer,
            self.nodes_per_volume
        )
    }
}
