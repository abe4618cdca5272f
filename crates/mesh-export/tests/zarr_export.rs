//! Integration test: build a mesh from synthetic files, export it, read the
//! arrays back through zarrs.

use std::sync::Arc;

use geoflow_mesh::{
    apply_coordinate_transform, CoordinateMode, FaceBuilder, GridFileReader, MeshReorganizer,
    MeshStore, VariableTable,
};
use mesh_export::{runtime_dimensions, Schema, ZarrMeshWriter, DIMENSIONS_ATTRIBUTE};
use test_utils::{field_values, DatasetSpec, TempDataset};
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::group::Group;
use zarrs_filesystem::FilesystemStore;

const SCHEMA: &str = r#"{
    "attributes": { "Conventions": "UGRID-1.0", "title": "export test" },
    "dimensions": [
        { "name": "nNodesPer2DLayer", "value": 0 },
        { "name": "nFacesPer2DLayer", "value": 0 },
        { "name": "n2DLayers", "value": 0 },
        { "name": "nMaxFaceNodes", "value": 0 },
        { "name": "nTimesteps", "value": 0 }
    ],
    "variables": [
        { "name": "mesh", "type": "int",
          "attributes": { "cf_role": "mesh_topology", "topology_dimension": 2 } },
        { "name": "mesh_node_lat", "type": "double",
          "dimensions": ["n2DLayers", "nNodesPer2DLayer"],
          "attributes": { "units": "degrees_north" }, "source": { "node": "lat" } },
        { "name": "mesh_node_z", "type": "float",
          "dimensions": ["n2DLayers", "nNodesPer2DLayer"], "source": { "node": "z" } },
        { "name": "mesh_face_nodes", "type": "int",
          "dimensions": ["nFacesPer2DLayer", "nMaxFaceNodes"], "source": "faces" },
        { "name": "time", "type": "uint64", "dimensions": ["nTimesteps"], "source": "timesteps" },
        { "name": "T", "type": "double",
          "dimensions": ["nTimesteps", "n2DLayers", "nNodesPer2DLayer"], "source": { "field": "T" } }
    ]
}"#;

struct Fixture {
    data: TempDataset,
    mesh: MeshStore,
    table: VariableTable,
    reader: GridFileReader<f64>,
}

fn fixture(spec: DatasetSpec) -> Fixture {
    // spherical transform needs every node off the origin
    let spec = DatasetSpec {
        spherical: true,
        ..spec
    };
    let data = TempDataset::new(spec).unwrap();
    data.write_fields(&["T"], &[0, 10]).unwrap();

    let reader = GridFileReader::<f64>::new(spec.element_layers);
    let [xp, yp, zp] = data.grid_paths();
    let (x, y, z) = (
        reader.read(&xp).unwrap(),
        reader.read(&yp).unwrap(),
        reader.read(&zp).unwrap(),
    );
    let table = VariableTable::for_job(CoordinateMode::Spherical, &["T".to_string()]).unwrap();

    let mut mesh = MeshStore::from_grid(&x, &y, &z, &table).unwrap();
    apply_coordinate_transform(&mut mesh, &table, CoordinateMode::Spherical).unwrap();
    MeshReorganizer::new(&x.geometry).reorganize(&mut mesh).unwrap();
    FaceBuilder::new(&x.geometry).build(&mut mesh).unwrap();

    Fixture {
        data,
        mesh,
        table,
        reader,
    }
}

fn read_f64(store: &Arc<FilesystemStore>, path: &str) -> (Vec<u64>, Vec<f64>) {
    let array = Array::open(store.clone(), path).unwrap();
    let shape = array.shape().to_vec();
    let subset = ArraySubset::new_with_shape(shape.clone());
    (shape, array.retrieve_array_subset_elements::<f64>(&subset).unwrap())
}

#[test]
fn test_export_static_and_fields() {
    let spec = DatasetSpec {
        dim: 3,
        elements_x: 2,
        elements_y: 2,
        element_layers: 2,
        spherical: true,
        ..Default::default()
    };
    let mut fx = fixture(spec);
    let timesteps = vec![0u64, 10];

    let out = tempfile::tempdir().unwrap();
    let zarr_path = out.path().join("mesh.zarr");
    let schema = Schema::from_json(SCHEMA)
        .unwrap()
        .resolve(&runtime_dimensions(&fx.mesh.dimensions(), timesteps.len()))
        .unwrap();
    let writer = ZarrMeshWriter::create(&zarr_path, schema).unwrap();

    assert!(writer.write_static(&fx.mesh, &fx.table, &timesteps).unwrap() > 0);
    for (i, &t) in timesteps.iter().enumerate() {
        let path = fx.data.path().join(format!("T.{:06}.out", t));
        let sample = fx.reader.read(&path).unwrap();
        fx.mesh.read_field_by_name(&sample, "T", &fx.table).unwrap();
        writer.write_field(i, "T", &fx.mesh, &fx.table).unwrap();
    }

    let dims = fx.mesh.dimensions();
    let store = Arc::new(FilesystemStore::new(&zarr_path).unwrap());

    // root group carries the resolved dimension table
    let root = Group::open(store.clone(), "/").unwrap();
    let attrs = root.attributes();
    assert_eq!(attrs["Conventions"], "UGRID-1.0");
    assert_eq!(attrs["dimensions"]["nMaxFaceNodes"], 4);
    assert_eq!(attrs["dimensions"]["n2DLayers"], 4);
    assert!(attrs.contains_key("date_created"));

    // metadata-only variable
    let mesh_var = Group::open(store.clone(), "/mesh").unwrap();
    assert_eq!(mesh_var.attributes()["cf_role"], "mesh_topology");

    // node variable in layered order
    let (shape, lat) = read_f64(&store, "/mesh_node_lat");
    assert_eq!(shape, vec![4, dims.nodes_per_2d_layer as u64]);
    let expected = fx.mesh.values(fx.table.slot("lat").unwrap()).unwrap();
    assert_eq!(lat, expected);

    let z = Array::open(store.clone(), "/mesh_node_z").unwrap();
    assert_eq!(
        z.attributes()[DIMENSIONS_ATTRIBUTE],
        serde_json::json!(["n2DLayers", "nNodesPer2DLayer"])
    );

    // faces
    let faces = Array::open(store.clone(), "/mesh_face_nodes").unwrap();
    let face_values = faces
        .retrieve_array_subset_elements::<i32>(&ArraySubset::new_with_shape(
            faces.shape().to_vec(),
        ))
        .unwrap();
    assert_eq!(faces.shape(), &[dims.faces_per_2d_layer as u64, 4]);
    assert_eq!(&face_values[..4], &[0, 2, 3, 1]);

    // timesteps
    let time = Array::open(store.clone(), "/time").unwrap();
    let steps = time
        .retrieve_array_subset_elements::<u64>(&ArraySubset::new_with_shape(vec![2]))
        .unwrap();
    assert_eq!(steps, timesteps);

    // field slices follow node order, one per timestep
    let (shape, t) = read_f64(&store, "/T");
    assert_eq!(shape, vec![2, 4, dims.nodes_per_2d_layer as u64]);
    let per_step = spec.node_count();
    for (i, &step) in timesteps.iter().enumerate() {
        let file_values = field_values(per_step, step);
        for (k, node) in fx.mesh.nodes().iter().enumerate() {
            assert_eq!(t[i * per_step + k], file_values[node.origin()]);
        }
    }
}

#[test]
fn test_unwritten_timestep_stays_fill() {
    let mut fx = fixture(DatasetSpec::default());
    let out = tempfile::tempdir().unwrap();
    let zarr_path = out.path().join("mesh.zarr");
    let schema = Schema::from_json(SCHEMA)
        .unwrap()
        .resolve(&runtime_dimensions(&fx.mesh.dimensions(), 2))
        .unwrap();
    let writer = ZarrMeshWriter::create(&zarr_path, schema).unwrap();

    let path = fx.data.path().join("T.000010.out");
    let sample = fx.reader.read(&path).unwrap();
    fx.mesh.read_field_by_name(&sample, "T", &fx.table).unwrap();
    writer.write_field(1, "T", &fx.mesh, &fx.table).unwrap();

    let store = Arc::new(FilesystemStore::new(&zarr_path).unwrap());
    let (_, t) = read_f64(&store, "/T");
    let n = fx.mesh.len();
    assert!(t[..n].iter().all(|v| v.is_nan()));
    assert!(t[n..].iter().all(|v| v.is_finite()));
}

#[test]
fn test_timestep_index_out_of_range() {
    let fx = fixture(DatasetSpec::default());
    let out = tempfile::tempdir().unwrap();
    let schema = Schema::from_json(SCHEMA)
        .unwrap()
        .resolve(&runtime_dimensions(&fx.mesh.dimensions(), 1))
        .unwrap();
    let writer = ZarrMeshWriter::create(&out.path().join("m.zarr"), schema).unwrap();

    assert!(writer.write_field(1, "T", &fx.mesh, &fx.table).is_err());
}
