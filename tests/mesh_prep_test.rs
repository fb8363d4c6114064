//! End-to-end mesh preparation from OBJ text, without a GPU device.

use std::io::{BufReader, Cursor};

use voxcone::resources::mesh::prepare_mesh;

const CUBE_OBJ: &str = "
v -1.0 -1.0  1.0
v  1.0 -1.0  1.0
v  1.0  1.0  1.0
v -1.0  1.0  1.0
v -1.0 -1.0 -1.0
v  1.0 -1.0 -1.0
v  1.0  1.0 -1.0
v -1.0  1.0 -1.0
vn  0.0  0.0  1.0
vn  0.0  0.0 -1.0
vn  1.0  0.0  0.0
vn -1.0  0.0  0.0
vn  0.0  1.0  0.0
vn  0.0 -1.0  0.0
f 1//1 2//1 3//1 4//1
f 6//2 5//2 8//2 7//2
f 2//3 6//3 7//3 3//3
f 5//4 1//4 4//4 8//4
f 4//5 3//5 7//5 8//5
f 5//6 6//6 2//6 1//6
";

// The bare object comes first: a usemtl statement stays active across
// object boundaries, so only faces before the first one have no material.
const TWO_OBJECTS_OBJ: &str = "
mtllib scene.mtl
o bare
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
o painted
usemtl red
v 0.0 0.0 1.0
v 1.0 0.0 1.0
v 0.0 1.0 1.0
f 4 5 6
";

const SCENE_MTL: &str = "
newmtl red
Ka 1.0 1.0 1.0
Kd 0.8 0.1 0.1
Ks 0.2 0.2 0.2
Ns 32.0
";

fn load(obj: &str, mtl: Option<&str>) -> (Vec<tobj::Model>, usize) {
    let mut reader = BufReader::new(Cursor::new(obj.to_string()));
    let (models, materials) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        },
        |_| match mtl {
            Some(text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(text.to_string()))),
            None => Err(tobj::LoadError::OpenFileFailed),
        },
    )
    .expect("obj text parses");
    let material_count = materials.map(|m| m.len()).unwrap_or(0);
    (models, material_count)
}

#[test]
fn quad_faces_triangulate_and_weld_per_corner() {
    let (models, material_count) = load(CUBE_OBJ, None);
    let data = prepare_mesh(&models, material_count).unwrap();

    // A cube welded by (position, normal) pairs: 4 corners per face side.
    assert_eq!(data.vertices.len(), 24);
    let total: usize = data.drawable_indices.iter().map(|d| d.len()).sum();
    assert_eq!(total, 36);

    assert_eq!(data.bounds.min, [-1.0, -1.0, -1.0]);
    assert_eq!(data.bounds.max, [1.0, 1.0, 1.0]);
    assert!((data.bounds.radius - 1.0).abs() < 1e-6);

    // Every face normal survives welding.
    for v in &data.vertices {
        let n = v.normal;
        assert!((n[0].abs() + n[1].abs() + n[2].abs() - 1.0).abs() < 1e-6);
    }
}

#[test]
fn faces_split_between_named_and_default_material() {
    let (models, material_count) = load(TWO_OBJECTS_OBJ, Some(SCENE_MTL));
    assert_eq!(material_count, 1);
    let data = prepare_mesh(&models, material_count).unwrap();

    // One named drawable plus the trailing default one.
    assert_eq!(data.drawable_indices.len(), 2);
    assert_eq!(data.drawable_indices[0].len(), 3);
    assert_eq!(data.drawable_indices[data.default_slot()].len(), 3);
}

#[test]
fn single_textured_triangle_prepares_end_to_end() {
    const TRIANGLE_OBJ: &str = "
mtllib scene.mtl
usemtl red
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vn 0.0 0.0 1.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
f 1/1/1 2/2/1 3/3/1
";
    let (models, material_count) = load(TRIANGLE_OBJ, Some(SCENE_MTL));
    let data = prepare_mesh(&models, material_count).unwrap();

    assert_eq!(data.vertices.len(), 3);
    assert_eq!(data.drawable_indices.len(), 2);
    assert_eq!(data.drawable_indices[0], vec![0, 1, 2]);
    assert!(data.drawable_indices[data.default_slot()].is_empty());

    assert_eq!(data.bounds.min, [0.0, 0.0, 0.0]);
    assert_eq!(data.bounds.max, [1.0, 1.0, 0.0]);

    // With U along +X and V along +Y, the tangent frame is axis aligned.
    for v in &data.vertices {
        assert!((v.tangent[0] - 1.0).abs() < 1e-6);
        assert!((v.bitangent[1].abs() - 1.0).abs() < 1e-6);
        assert_eq!(v.normal, [0.0, 0.0, 1.0]);
    }
}

#[test]
fn missing_material_file_still_prepares() {
    let (models, material_count) = load(TWO_OBJECTS_OBJ, None);
    assert_eq!(material_count, 0);
    let data = prepare_mesh(&models, material_count).unwrap();

    // Everything binds to the default drawable.
    assert_eq!(data.drawable_indices.len(), 1);
    assert_eq!(data.drawable_indices[data.default_slot()].len(), 6);
}
