//! Synthetic grid file generators.
//!
//! These produce files in the solver's binary layout with predictable values
//! so tests can check exactly where each value ends up.

use std::fs;
use std::io;
use std::path::Path;

/// Value array payload of a generated file.
#[derive(Debug, Clone)]
enum Payload {
    F64(Vec<f64>),
    F32(Vec<f32>),
}

/// Builds one binary grid file: header followed by a value array.
///
/// # Example
///
/// ```
/// use test_utils::GridFileBuilder;
///
/// let bytes = GridFileBuilder::new(2, 1, vec![1, 1])
///     .values(vec![0.0, 1.0, 2.0, 3.0])
///     .to_bytes();
/// assert_eq!(bytes.len(), 48 + 4 * 8);
/// ```
#[derive(Debug, Clone)]
pub struct GridFileBuilder {
    version: u32,
    dim: u32,
    elements: u64,
    poly_order: Vec<u32>,
    grid_type: u32,
    time_cycle: u64,
    time_stamp: f64,
    has_mult_vars: u32,
    payload: Payload,
}

impl GridFileBuilder {
    pub fn new(dim: u32, elements: u64, poly_order: Vec<u32>) -> Self {
        Self {
            version: 1,
            dim,
            elements,
            poly_order,
            grid_type: 0,
            time_cycle: 0,
            time_stamp: 0.0,
            has_mult_vars: 0,
            payload: Payload::F64(Vec::new()),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn grid_type(mut self, grid_type: u32) -> Self {
        self.grid_type = grid_type;
        self
    }

    pub fn time(mut self, cycle: u64, stamp: f64) -> Self {
        self.time_cycle = cycle;
        self.time_stamp = stamp;
        self
    }

    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.payload = Payload::F64(values);
        self
    }

    pub fn values_f32(mut self, values: Vec<f32>) -> Self {
        self.payload = Payload::F32(values);
        self
    }

    /// Nodes in the full volume described by the header.
    pub fn node_count(&self) -> usize {
        let per_elem: u64 = self
            .poly_order
            .iter()
            .take(self.dim as usize)
            .map(|&p| p as u64 + 1)
            .product();
        (per_elem * self.elements) as usize
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_ne_bytes());
        out.extend_from_slice(&self.dim.to_ne_bytes());
        out.extend_from_slice(&self.elements.to_ne_bytes());
        for p in &self.poly_order {
            out.extend_from_slice(&p.to_ne_bytes());
        }
        out.extend_from_slice(&self.grid_type.to_ne_bytes());
        out.extend_from_slice(&self.time_cycle.to_ne_bytes());
        out.extend_from_slice(&self.time_stamp.to_ne_bytes());
        out.extend_from_slice(&self.has_mult_vars.to_ne_bytes());
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        match &self.payload {
            Payload::F64(values) => values
                .iter()
                .for_each(|v| out.extend_from_slice(&v.to_ne_bytes())),
            Payload::F32(values) => values
                .iter()
                .for_each(|v| out.extend_from_slice(&v.to_ne_bytes())),
        }
        out
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }
}

/// Shape of a synthetic dataset: a regular block of elements.
///
/// Elements are written layer by layer; inside a layer, `elements_x`
/// columns of `elements_y` elements each. Node order inside an element is
/// z-slab outer, then x, then y, as the solver writes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetSpec {
    pub dim: u32,
    pub elements_x: usize,
    pub elements_y: usize,
    pub element_layers: usize,
    pub order: u32,
    /// Wrap the block onto a spherical shell instead of a flat box.
    pub spherical: bool,
    /// Write the top element layer first.
    pub reversed_layers: bool,
}

impl Default for DatasetSpec {
    fn default() -> Self {
        Self {
            dim: 2,
            elements_x: 2,
            elements_y: 1,
            element_layers: 1,
            order: 1,
            spherical: false,
            reversed_layers: false,
        }
    }
}

impl DatasetSpec {
    pub fn elements(&self) -> usize {
        self.elements_x * self.elements_y * self.element_layers
    }

    pub fn poly_order(&self) -> Vec<u32> {
        vec![self.order; self.dim as usize]
    }

    pub fn nodes_per_elem(&self) -> usize {
        let n = self.order as usize + 1;
        if self.dim == 3 {
            n * n * n
        } else {
            n * n
        }
    }

    pub fn node_count(&self) -> usize {
        self.elements() * self.nodes_per_elem()
    }

    /// x, y and z coordinates in file order.
    pub fn coordinates(&self) -> [Vec<f64>; 3] {
        let p = self.order.max(1) as f64;
        let n = self.order as usize + 1;
        let nz = if self.dim == 3 { n } else { 1 };

        let mut xs = Vec::with_capacity(self.node_count());
        let mut ys = Vec::with_capacity(self.node_count());
        let mut zs = Vec::with_capacity(self.node_count());

        for file_layer in 0..self.element_layers {
            let layer = if self.reversed_layers {
                self.element_layers - 1 - file_layer
            } else {
                file_layer
            };
            for ex in 0..self.elements_x {
                for ey in 0..self.elements_y {
                    for iz in 0..nz {
                        for ix in 0..n {
                            for iy in 0..n {
                                let u = ex as f64 + ix as f64 / p;
                                let v = ey as f64 + iy as f64 / p;
                                let w = layer as f64 + iz as f64 / p;
                                let [x, y, z] = if self.spherical {
                                    shell_point(u, v, w)
                                } else {
                                    [u, v, w]
                                };
                                xs.push(x);
                                ys.push(y);
                                zs.push(z);
                            }
                        }
                    }
                }
            }
        }

        [xs, ys, zs]
    }

    pub fn grid_file(&self, values: Vec<f64>) -> GridFileBuilder {
        GridFileBuilder::new(self.dim, self.elements() as u64, self.poly_order()).values(values)
    }
}

/// Map block coordinates onto a shell: 10 degrees per element in lon/lat,
/// radius `1 + w`.
fn shell_point(u: f64, v: f64, w: f64) -> [f64; 3] {
    let lon = (u * 10.0).to_radians();
    let lat = (v * 10.0).to_radians();
    let r = 1.0 + w;
    [r * lat.cos() * lon.cos(), r * lat.cos() * lon.sin(), r * lat.sin()]
}

/// Field values tagged with their file position and timestep:
/// `timestep * 1000 + index`.
///
/// ```
/// use test_utils::field_values;
///
/// let v = field_values(3, 2);
/// assert_eq!(v, vec![2000.0, 2001.0, 2002.0]);
/// ```
pub fn field_values(n: usize, timestep: u64) -> Vec<f64> {
    (0..n)
        .map(|i| (timestep * 1000) as f64 + i as f64)
        .collect()
}
